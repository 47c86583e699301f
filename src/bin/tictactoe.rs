use clap::{value_parser, Arg, ArgAction, Command};
use gamesearch::game::tictactoe::{Marker, TicTacToe};
use gamesearch::runner::{AiPlayer, HumanPlayer, Runner};
use gamesearch::strategies::{
    AlphaBeta, AlphaBetaParams, Mcts, MctsParams, Strategy, DEFAULT_EXPLORATION,
};
use std::time::Duration;

fn main() {
    env_logger::init();

    let matches = Command::new("tictactoe")
        .about("Play tic-tac-toe against the search engines")
        .arg(
            Arg::new("engine")
                .short('e')
                .long("engine")
                .value_parser(["alphabeta", "mcts"])
                .default_value("mcts")
                .help("Which search engine drives the computer player"),
        )
        .arg(
            Arg::new("depth")
                .short('d')
                .long("search-depth")
                .value_parser(value_parser!(usize))
                .default_value("9")
                .help("Alpha-beta: game tree levels to search before the heuristic"),
        )
        .arg(
            Arg::new("iterations")
                .short('i')
                .long("iterations")
                .value_parser(value_parser!(u64))
                .default_value("2000")
                .help("MCTS: sampling iterations per move"),
        )
        .arg(
            Arg::new("millis")
                .short('t')
                .long("millis")
                .value_parser(value_parser!(u64))
                .help("MCTS: time budget per move in milliseconds (overrides --iterations)"),
        )
        .arg(
            Arg::new("ponder")
                .short('p')
                .long("ponder")
                .action(ArgAction::SetTrue)
                .help("MCTS: keep searching while the human thinks"),
        )
        .arg(
            Arg::new("second")
                .long("second")
                .action(ArgAction::SetTrue)
                .help("Let the computer move first"),
        )
        .get_matches();

    let mut human = HumanPlayer::new("You");
    let first = if matches.get_flag("second") {
        Marker::O
    } else {
        Marker::X
    };

    let winner = match matches.get_one::<String>("engine").map(String::as_str) {
        Some("alphabeta") => {
            let params = AlphaBetaParams {
                max_depth: *matches.get_one::<usize>("depth").unwrap(),
            };
            let mut pc = AiPlayer::new("Minnie", AlphaBeta::<TicTacToe>::create(params));
            Runner::run(first, &mut human, &mut pc)
        }
        _ => {
            let params = MctsParams {
                iterations: *matches.get_one::<u64>("iterations").unwrap(),
                time_budget: matches
                    .get_one::<u64>("millis")
                    .map(|&ms| Duration::from_millis(ms)),
                ponder: matches.get_flag("ponder"),
                exploration: DEFAULT_EXPLORATION,
            };
            let mut pc = AiPlayer::new("Carlo", Mcts::<TicTacToe>::create(params));
            Runner::run(first, &mut human, &mut pc)
        }
    };

    if let Some(w) = winner {
        log::info!("game over, {} won", w);
    }
}
