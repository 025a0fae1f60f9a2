//! Perft driver with a cross-check against shakmaty.
//!
//! Promotion here is queen-only, so counts can differ from the reference
//! at depths where underpromotions occur.

use clap::Parser;
use arbitro::board::{Board, START_FEN};
use shakmaty::fen::Fen;
use shakmaty::{Chess, Position};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = String::from(START_FEN))]
    fen: String,

    #[arg(short, long, default_value_t = 4)]
    depth: u8,
}

fn main() {
    let args = Args::parse();

    println!("Running perft on FEN: '{}' up to depth {}", args.fen, args.depth);

    let mut board = match Board::from_fen(&args.fen) {
        Ok(board) => board,
        Err(e) => {
            eprintln!("cannot set up position: {e}");
            std::process::exit(1);
        }
    };
    let pos: Chess = if args.fen != START_FEN {
        let fen: Fen = args.fen.parse().unwrap();
        fen.into_position(shakmaty::CastlingMode::Standard).unwrap()
    } else {
        Chess::default()
    };

    for depth in 1..=args.depth {
        let start = std::time::Instant::now();
        let nodes = perft(&mut board, depth);
        let duration = start.elapsed();
        let reference = perft_shakmaty(&pos, depth);
        let verdict = if nodes == reference { "ok" } else { "MISMATCH" };
        println!(
            "perft({}) = {} nodes ({} ms), reference {} -> {}",
            depth,
            nodes,
            duration.as_millis(),
            reference,
            verdict
        );
    }
}

fn perft(board: &mut Board, depth: u8) -> u64 {
    if depth == 0 {
        return 1;
    }
    let mut nodes = 0u64;
    for mv in board.valid_moves() {
        board.make_move(mv);
        nodes += perft(board, depth - 1);
        board.undo_move();
    }
    nodes
}

fn perft_shakmaty(pos: &Chess, depth: u8) -> u64 {
    if depth == 0 {
        return 1;
    }
    let mut nodes = 0;
    for m in pos.legal_moves() {
        let mut new_pos = pos.clone();
        new_pos.play_unchecked(&m);
        nodes += perft_shakmaty(&new_pos, depth - 1);
    }
    nodes
}
