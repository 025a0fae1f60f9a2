use arbitro::board::{Board, Color, PieceKind, Square};

fn sq(s: &str) -> Square {
    Square::from_algebraic(s).unwrap()
}

// ---------------------------------------------------------------- en passant

#[test]
fn en_passant_captures_the_double_pushed_pawn() {
    // Pedone bianco già in e5; il nero spinge d7-d5 di due case.
    let mut board =
        Board::from_fen("rnbqkbnr/pppppppp/8/4P3/8/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1").unwrap();
    let d5 = board.parse_move("d7d5").unwrap();
    board.make_move(d5);
    assert_eq!(board.ep_square(), Some(sq("d6")));

    let moves = board.valid_moves();
    let ep = moves
        .iter()
        .find(|m| m.from == sq("e5") && m.to == sq("d6"))
        .copied()
        .expect("en passant must be offered");
    assert!(ep.is_en_passant());

    board.make_move(ep);
    // Il pedone catturato sparisce da d5, non da d6.
    assert_eq!(board.piece_at(sq("d5")), None);
    let pawn = board.piece_at(sq("d6")).unwrap();
    assert_eq!(pawn.color, Color::White);
    assert_eq!(pawn.kind, PieceKind::Pawn);

    board.undo_move();
    assert_eq!(board.piece_at(sq("d6")), None);
    assert_eq!(board.piece_at(sq("e5")).unwrap().color, Color::White);
    let restored = board.piece_at(sq("d5")).unwrap();
    assert_eq!(restored.color, Color::Black);
    assert_eq!(restored.kind, PieceKind::Pawn);
}

#[test]
fn en_passant_expires_after_one_ply() {
    let mut board =
        Board::from_fen("rnbqkbnr/pppppppp/8/4P3/8/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1").unwrap();
    let d5 = board.parse_move("d7d5").unwrap();
    board.make_move(d5);

    // Il bianco gioca altro; il bersaglio decade con la mossa successiva.
    let quiet = board.parse_move("a2a3").unwrap();
    board.make_move(quiet);
    assert_eq!(board.ep_square(), None);
    let reply = board.parse_move("h7h6").unwrap();
    board.make_move(reply);

    assert!(board.valid_moves().iter().all(|m| !m.is_en_passant()));
}

#[test]
fn en_passant_refused_when_it_uncovers_a_rank_check() {
    // Re bianco e torre nera sulla stessa traversa dei due pedoni:
    // la cattura al varco li farebbe sparire entrambi.
    let mut board = Board::from_fen("8/8/8/K2pP2r/8/8/8/4k3 w - d6 0 2").unwrap();
    let moves = board.valid_moves();
    assert!(
        moves.iter().all(|m| !m.is_en_passant()),
        "exd6 would expose the king along the fifth rank"
    );
}

#[test]
fn en_passant_allowed_when_a_blocker_shields_the_rank() {
    // Stessa traversa, ma un cavallo bianco fa da schermo alla torre.
    let mut board = Board::from_fen("8/8/8/K2pP1Nr/8/8/8/4k3 w - d6 0 2").unwrap();
    let moves = board.valid_moves();
    assert!(
        moves.iter().any(|m| m.is_en_passant()),
        "the knight blocks the rook, exd6 is safe"
    );
}

// ------------------------------------------------------------------ castling

#[test]
fn kingside_castle_moves_king_and_rook() {
    let mut board = Board::from_fen("4k3/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
    let moves = board.valid_moves();
    let castle = moves
        .iter()
        .find(|m| m.is_castle())
        .copied()
        .expect("O-O must be offered");
    assert_eq!(castle.notation(), "O-O");
    assert_eq!(castle.to, sq("g1"));

    board.make_move(castle);
    assert_eq!(board.king_square(Color::White), sq("g1"));
    assert_eq!(board.piece_at(sq("f1")).unwrap().kind, PieceKind::Rook);
    assert_eq!(board.piece_at(sq("h1")), None);
    assert_eq!(board.piece_at(sq("e1")), None);

    board.undo_move();
    assert_eq!(board.king_square(Color::White), sq("e1"));
    assert_eq!(board.piece_at(sq("h1")).unwrap().kind, PieceKind::Rook);
    assert_eq!(board.piece_at(sq("f1")), None);
    assert!(board.castle_rights().wks);
}

#[test]
fn queenside_castle_moves_king_and_rook() {
    let mut board = Board::from_fen("4k3/8/8/8/8/8/8/R3K3 w Q - 0 1").unwrap();
    let castle = board
        .valid_moves()
        .into_iter()
        .find(|m| m.is_castle())
        .expect("O-O-O must be offered");
    assert_eq!(castle.notation(), "O-O-O");
    assert_eq!(castle.to, sq("c1"));

    board.make_move(castle);
    assert_eq!(board.king_square(Color::White), sq("c1"));
    assert_eq!(board.piece_at(sq("d1")).unwrap().kind, PieceKind::Rook);
    assert_eq!(board.piece_at(sq("a1")), None);
}

#[test]
fn rook_movement_revokes_the_right_for_good() {
    let mut board = Board::from_fen("4k3/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
    assert!(board.valid_moves().iter().any(|m| m.is_castle()));

    // La torre esce e rientra: il diritto non torna.
    for text in ["h1h2", "e8e7", "h2h1", "e7e8"] {
        let mv = board.parse_move(text).unwrap();
        board.make_move(mv);
    }
    assert!(!board.castle_rights().wks);
    assert!(board.valid_moves().iter().all(|m| !m.is_castle()));
}

#[test]
fn king_movement_revokes_both_rights() {
    let mut board = Board::from_fen("4k3/8/8/8/8/8/8/R3K2R w KQ - 0 1").unwrap();
    for text in ["e1e2", "e8e7", "e2e1", "e7e8"] {
        let mv = board.parse_move(text).unwrap();
        board.make_move(mv);
    }
    let rights = board.castle_rights();
    assert!(!rights.wks && !rights.wqs);
    assert!(board.valid_moves().iter().all(|m| !m.is_castle()));
}

#[test]
fn capturing_the_rook_revokes_the_victim_right() {
    let mut board = Board::from_fen("4k2r/8/8/8/8/8/7R/4K3 w k - 0 1").unwrap();
    let capture = board.parse_move("h2h8").unwrap();
    board.make_move(capture);
    assert!(!board.castle_rights().bks);
}

#[test]
fn castling_is_barred_while_king_or_transit_is_attacked() {
    // Torre nera su f7: la casella di transito f1 è battuta.
    let mut board = Board::from_fen("4k3/5r2/8/8/8/8/8/4K2R w K - 0 1").unwrap();
    assert!(board.valid_moves().iter().all(|m| !m.is_castle()));

    // Torre nera su e7: il re è sotto scacco, niente arrocco.
    let mut board = Board::from_fen("4k3/4r3/8/8/8/8/8/4K2R w K - 0 1").unwrap();
    let moves = board.valid_moves();
    assert!(board.in_check());
    assert!(moves.iter().all(|m| !m.is_castle()));
}

#[test]
fn castling_needs_empty_squares() {
    let mut board = Board::from_fen("4k3/8/8/8/8/8/8/4KB1R w K - 0 1").unwrap();
    assert!(board.valid_moves().iter().all(|m| !m.is_castle()));

    // Sul lato di donna conta anche la casella b1.
    let mut board = Board::from_fen("4k3/8/8/8/8/8/8/RN2K3 w Q - 0 1").unwrap();
    assert!(board.valid_moves().iter().all(|m| !m.is_castle()));
}

// ----------------------------------------------------------------- promotion

#[test]
fn promotion_is_fixed_to_queen() {
    let mut board = Board::from_fen("8/4P3/8/8/k7/8/8/4K3 w - - 0 1").unwrap();
    let push = board.parse_move("e7e8").unwrap();
    assert!(push.is_promotion());
    board.make_move(push);
    let piece = board.piece_at(sq("e8")).unwrap();
    assert_eq!(piece.kind, PieceKind::Queen);
    assert_eq!(piece.color, Color::White);

    board.undo_move();
    assert_eq!(board.piece_at(sq("e7")).unwrap().kind, PieceKind::Pawn);
    assert_eq!(board.piece_at(sq("e8")), None);
}

#[test]
fn capture_promotion_also_promotes() {
    let mut board = Board::from_fen("3r4/4P3/8/8/k7/8/8/4K3 w - - 0 1").unwrap();
    let capture = board.parse_move("e7d8").unwrap();
    assert!(capture.is_promotion());
    assert_eq!(capture.notation(), "exd8");
    board.make_move(capture);
    assert_eq!(board.piece_at(sq("d8")).unwrap().kind, PieceKind::Queen);
}
