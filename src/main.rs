//! Arbitro chess engine: command line self-play driver.

use arbitro::board::{Board, START_FEN};
use arbitro::search::{random_move, Search, SearchParams};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Starting position in FEN.
    #[arg(short, long, default_value_t = String::from(START_FEN))]
    fen: String,

    /// Search depth in plies.
    #[arg(short, long, default_value_t = 3)]
    depth: u8,

    /// Stop after this many plies even without a result.
    #[arg(short, long, default_value_t = 120)]
    max_plies: u32,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut board = match Board::from_fen(&args.fen) {
        Ok(board) => board,
        Err(e) => {
            eprintln!("cannot set up position: {e}");
            std::process::exit(1);
        }
    };
    let mut search = Search::new(SearchParams::new().max_depth(args.depth));

    for ply in 1..=args.max_plies {
        let moves = board.valid_moves();
        if moves.is_empty() {
            if board.is_checkmate() {
                println!("checkmate: {:?} wins", board.side_to_move().opponent());
            } else {
                println!("stalemate");
            }
            return;
        }

        let (selected, score) = search.best_move(&mut board);
        let mv = selected.or_else(|| random_move(&moves)).unwrap_or(moves[0]);
        tracing::info!(
            nodes = search.stats().nodes,
            nps = search.stats().nps,
            "ply {} searched",
            ply
        );
        println!("{:3}. {:7} ({}, score {})", ply, mv.notation(), mv, score);
        board.make_move(mv);
    }
    println!("ply limit reached");
}
