use super::{Game, ParseGame, Score, INF};
use std::fmt;
use std::str::FromStr;

pub const SIZE: usize = 3;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Marker {
    X,
    O,
}

impl Marker {
    pub fn flip(&self) -> Marker {
        match *self {
            Marker::X => Marker::O,
            Marker::O => Marker::X,
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Marker::X => write!(f, "X"),
            Marker::O => write!(f, "O"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct Board {
    cells: [Option<Marker>; SIZE * SIZE],
}

impl Board {
    fn get(&self, i: usize, j: usize) -> Option<Marker> {
        self.cells[i * SIZE + j]
    }

    fn set(&mut self, i: usize, j: usize, m: Marker) {
        self.cells[i * SIZE + j] = Some(m);
    }
}

impl Default for Board {
    fn default() -> Self {
        Board { cells: [None; SIZE * SIZE] }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let dashes: String = (0..SIZE * 3).map(|_| "-").collect();
        writeln!(f, "|{}|", dashes)?;
        for i in 0..SIZE {
            write!(f, "|")?;
            for j in 0..SIZE {
                match self.get(i, j) {
                    Some(m) => write!(f, " {} ", m)?,
                    None => write!(f, " {} ", i * SIZE + j + 1)?,
                }
            }
            writeln!(f, "|")?;
        }
        write!(f, "|{}|", dashes)
    }
}

#[derive(Clone, Debug)]
pub struct TicTacToe {
    board: Board,
    to_act: Marker,
    ref_player: Marker,
    winner: Option<Marker>,
}

// Board contents plus active player; the cached winner is derived from the
// board and the reference player is bookkeeping, so neither participates.
impl PartialEq for TicTacToe {
    fn eq(&self, other: &Self) -> bool {
        self.board == other.board && self.to_act == other.to_act
    }
}

impl Eq for TicTacToe {}

impl fmt::Display for TicTacToe {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{} to act.", self.to_act)?;
        writeln!(f, "{}", self.board)
    }
}

impl TicTacToe {
    /// Whether the line placement at `(i, j)` completed a row, column or
    /// diagonal for `m`. Only lines through the last move are examined.
    fn completes_line(&self, i: usize, j: usize, m: Marker) -> bool {
        let full = |cells: [(usize, usize); SIZE]| {
            cells.iter().all(|&(a, b)| self.board.get(a, b) == Some(m))
        };
        if full([(i, 0), (i, 1), (i, 2)]) || full([(0, j), (1, j), (2, j)]) {
            return true;
        }
        if i == j && full([(0, 0), (1, 1), (2, 2)]) {
            return true;
        }
        i + j == SIZE - 1 && full([(0, 2), (1, 1), (2, 0)])
    }
}

impl Game for TicTacToe {
    type Move = (usize, usize);
    type Agent = Marker;

    fn new(first: Marker) -> Self {
        TicTacToe {
            board: Board::default(),
            to_act: first,
            ref_player: first,
            winner: None,
        }
    }

    fn to_act(&self) -> Marker {
        self.to_act
    }

    fn agent_id(&self, agent: Marker) -> usize {
        match agent {
            Marker::X => 0,
            Marker::O => 1,
        }
    }

    fn winner(&self) -> Option<Marker> {
        self.winner
    }

    fn evaluate(&self) -> Score {
        match self.winner {
            Some(w) => INF * self.player_weight(w),
            None => 0,
        }
    }

    fn ref_player(&self) -> Marker {
        self.ref_player
    }

    fn legal_moves(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let done = self.winner.is_some();
        (0..SIZE * SIZE)
            .filter(move |_| !done)
            .map(|n| (n / SIZE, n % SIZE))
            .filter(|&(i, j)| self.board.get(i, j).is_none())
    }

    fn apply(&self, (i, j): (usize, usize)) -> Option<Self> {
        if i >= SIZE || j >= SIZE || self.winner.is_some() || self.board.get(i, j).is_some() {
            return None;
        }
        let mut next = self.clone();
        next.board.set(i, j, self.to_act);
        if next.completes_line(i, j, self.to_act) {
            next.winner = Some(self.to_act);
        }
        next.to_act = self.to_act.flip();
        Some(next)
    }
}

impl ParseGame for TicTacToe {
    /// Cells are numbered 1-9, left to right, top to bottom.
    fn parse_move(&self, input: &str) -> Option<Self::Move> {
        let n = usize::from_str(input.trim()).ok()?;
        if (1..=SIZE * SIZE).contains(&n) {
            Some(((n - 1) / SIZE, (n - 1) % SIZE))
        } else {
            None
        }
    }
}
