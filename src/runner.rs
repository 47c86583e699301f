use crate::game::{Game, ParseGame};
use crate::strategies::Strategy;
use std::fmt;
use std::io;
use std::io::Write;
use std::marker::PhantomData;

/// Identity plus move selection, the only surface the driver sees. `None`
/// from `select_move` is a forfeit/tie; the driver never retries it.
pub trait Player<G: Game> {
    fn select_move(&mut self, game: &G) -> Option<G::Move>;
    fn display_name(&self) -> &str;
    fn player_kind(&self) -> &str;
    fn full_name(&self) -> String {
        format!("{} ({})", self.display_name(), self.player_kind())
    }
}

pub struct HumanPlayer {
    name: String,
}

impl HumanPlayer {
    pub fn new(name: &str) -> Self {
        HumanPlayer { name: String::from(name) }
    }
}

impl<G> Player<G> for HumanPlayer
where
    G: ParseGame + fmt::Display,
{
    fn display_name(&self) -> &str {
        &self.name
    }

    fn player_kind(&self) -> &str {
        "Human"
    }

    fn select_move(&mut self, game: &G) -> Option<G::Move> {
        loop {
            print!("Your move: ");
            let _ = io::stdout().flush();
            let mut line = String::new();
            match io::stdin().read_line(&mut line) {
                Ok(0) | Err(_) => return None, // end of input forfeits
                Ok(_) => {}
            }
            match game.parse_move(line.trim()) {
                Some(m) => return Some(m),
                None => println!("Could not read that move."),
            }
        }
    }
}

pub struct AiPlayer<G: Game, S: Strategy<G>> {
    name: String,
    strategy: S,
    _phantom: PhantomData<G>,
}

impl<G: Game, S: Strategy<G>> AiPlayer<G, S> {
    pub fn new(name: &str, strategy: S) -> Self {
        AiPlayer {
            name: String::from(name),
            strategy,
            _phantom: PhantomData,
        }
    }
}

impl<G, S> Player<G> for AiPlayer<G, S>
where
    G: Game,
    S: Strategy<G>,
{
    fn display_name(&self) -> &str {
        &self.name
    }

    fn player_kind(&self) -> &str {
        "Computer"
    }

    fn select_move(&mut self, game: &G) -> Option<G::Move> {
        self.strategy.decide(game)
    }
}

pub type Plr<'a, G> = &'a mut dyn Player<G>;

/// Drives a game to completion: alternates `select_move`/`apply`, retries the
/// same player after an illegal move, and stops on a win, a tie, or a
/// forfeit.
pub struct Runner<'a, G: Game> {
    board: G,
    players: (Plr<'a, G>, Plr<'a, G>),
    forfeited: bool,
}

impl<'a, G> Runner<'a, G>
where
    G: Game + fmt::Display,
    G::Agent: fmt::Display,
{
    pub fn new(first: G::Agent, p1: Plr<'a, G>, p2: Plr<'a, G>) -> Self {
        Runner {
            board: G::new(first),
            players: (p1, p2),
            forfeited: false,
        }
    }

    pub fn run(first: G::Agent, p1: Plr<'a, G>, p2: Plr<'a, G>) -> Option<G::Agent> {
        let mut runner = Runner::new(first, p1, p2);
        runner.init();
        runner.game_loop()
    }

    fn init(&self) {
        println!("Player 1 is {}", self.players.0.full_name());
        println!("Player 2 is {}", self.players.1.full_name());
        println!("{} goes first.", self.board.to_act());
    }

    /// One turn. `false` when the acting player has no move to offer.
    fn step(&mut self) -> bool {
        println!("{}", self.board);
        let acting = self.board.to_act();
        loop {
            let chosen = if self.board.agent_id(acting) == 0 {
                self.players.0.select_move(&self.board)
            } else {
                self.players.1.select_move(&self.board)
            };
            let Some(m) = chosen else {
                return false;
            };
            match self.board.apply(m) {
                Some(next) => {
                    println!("{} played {:?}.", acting, m);
                    self.board = next;
                    return true;
                }
                None => println!("Illegal move."),
            }
        }
    }

    fn game_loop(&mut self) -> Option<G::Agent> {
        while self.board.winner().is_none() && !self.board.is_tie() {
            if !self.step() {
                self.forfeited = true;
                break;
            }
        }

        println!("{}", self.board);
        match self.board.winner() {
            Some(w) => println!("The winner is {}!", w),
            None if self.forfeited => println!("Game abandoned."),
            None => println!("It's a tie!"),
        }
        self.board.winner()
    }
}
