// Convenzione di mappatura: riga 0 = ottava traversa (lato nero),
// riga 7 = prima traversa (lato bianco). Colonna 0 = colonna 'a'.
// Usiamo questo mapping coerente per tutte le operazioni.

use std::fmt;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    White = 0,
    Black = 1,
}

impl Color {
    pub fn opponent(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    Pawn = 0,
    Knight = 1,
    Bishop = 2,
    Rook = 3,
    Queen = 4,
    King = 5,
}

impl PieceKind {
    /// Uppercase notation letter for the piece kind.
    pub fn letter(self) -> char {
        match self {
            PieceKind::Pawn => 'P',
            PieceKind::Knight => 'N',
            PieceKind::Bishop => 'B',
            PieceKind::Rook => 'R',
            PieceKind::Queen => 'Q',
            PieceKind::King => 'K',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    pub color: Color,
    pub kind: PieceKind,
}

impl Piece {
    pub fn new(color: Color, kind: PieceKind) -> Self {
        Self { color, kind }
    }

    fn from_fen_char(ch: char) -> Option<Self> {
        let color = if ch.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        let kind = match ch.to_ascii_lowercase() {
            'p' => PieceKind::Pawn,
            'n' => PieceKind::Knight,
            'b' => PieceKind::Bishop,
            'r' => PieceKind::Rook,
            'q' => PieceKind::Queen,
            'k' => PieceKind::King,
            _ => return None,
        };
        Some(Self { color, kind })
    }
}

/// A board coordinate. Always in range: construction validates `0..=7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Square {
    row: i8,
    col: i8,
}

impl Square {
    pub fn new(row: i8, col: i8) -> Result<Self, EngineError> {
        if (0..8).contains(&row) && (0..8).contains(&col) {
            Ok(Self { row, col })
        } else {
            Err(EngineError::InvalidSquare { row, col })
        }
    }

    pub fn row(self) -> usize {
        self.row as usize
    }

    pub fn col(self) -> usize {
        self.col as usize
    }

    /// Flat index 0..64, row-major from the black back rank.
    pub fn index(self) -> usize {
        (self.row as usize) * 8 + self.col as usize
    }

    /// The square displaced by (dr, dc), or None when off the board.
    pub fn offset(self, dr: i8, dc: i8) -> Option<Square> {
        let (row, col) = (self.row + dr, self.col + dc);
        if (0..8).contains(&row) && (0..8).contains(&col) {
            Some(Square { row, col })
        } else {
            None
        }
    }

    /// All 64 squares, row 0 first.
    pub fn all() -> impl Iterator<Item = Square> {
        (0..8i8).flat_map(|row| (0..8i8).map(move |col| Square { row, col }))
    }

    /// Parse algebraic form: files 'a'..'h' are columns 0..7, ranks
    /// '1'..'8' are rows 7..0 (rank 1 is the white back rank).
    pub fn from_algebraic(s: &str) -> Result<Self, EngineError> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return Err(EngineError::InvalidNotation(s.to_string()));
        }
        let (file, rank) = (bytes[0], bytes[1]);
        if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
            return Err(EngineError::InvalidNotation(s.to_string()));
        }
        Ok(Square {
            row: (b'8' - rank) as i8,
            col: (file - b'a') as i8,
        })
    }

    fn file_char(self) -> char {
        (b'a' + self.col as u8) as char
    }

    fn rank_char(self) -> char {
        (b'8' - self.row as u8) as char
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.file_char(), self.rank_char())
    }
}

/// The four castling permissions. Forward play only ever clears them;
/// undo restores the exact prior value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CastleRights {
    pub wks: bool,
    pub wqs: bool,
    pub bks: bool,
    pub bqs: bool,
}

impl CastleRights {
    pub fn all() -> Self {
        Self {
            wks: true,
            wqs: true,
            bks: true,
            bqs: true,
        }
    }

    pub fn none() -> Self {
        Self {
            wks: false,
            wqs: false,
            bks: false,
            bqs: false,
        }
    }
}

// Flag di mossa speciale
pub const FLAG_EN_PASSANT: u8 = 1 << 0;
pub const FLAG_PROMOTION: u8 = 1 << 1;
pub const FLAG_CASTLE: u8 = 1 << 2;

/// One state transition. For en passant the captured piece is the pawn
/// beside the destination file on the mover's starting rank; the
/// destination square itself is empty.
#[derive(Debug, Clone, Copy)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub piece: Piece,
    pub captured: Option<Piece>,
    pub flags: u8,
}

impl Move {
    pub fn is_en_passant(&self) -> bool {
        self.flags & FLAG_EN_PASSANT != 0
    }

    pub fn is_promotion(&self) -> bool {
        self.flags & FLAG_PROMOTION != 0
    }

    pub fn is_castle(&self) -> bool {
        self.flags & FLAG_CASTLE != 0
    }

    /// Integer id encoding both coordinate pairs; unique over all from/to
    /// combinations on the 8x8 board.
    pub fn id(&self) -> u16 {
        (self.from.index() as u16) * 64 + self.to.index() as u16
    }

    /// Reduced short notation: `O-O`/`O-O-O` for castles, destination
    /// square for pawn pushes, `<file>x<dest>` for pawn captures, piece
    /// letter plus optional `x` and destination otherwise. No
    /// disambiguation and no check/mate suffixes.
    pub fn notation(&self) -> String {
        if self.is_castle() {
            return if self.to.col > self.from.col {
                "O-O".to_string()
            } else {
                "O-O-O".to_string()
            };
        }
        let dest = self.to.to_string();
        if self.piece.kind == PieceKind::Pawn {
            if self.captured.is_some() {
                format!("{}x{}", self.from.file_char(), dest)
            } else {
                dest
            }
        } else {
            let mut out = String::new();
            out.push(self.piece.kind.letter());
            if self.captured.is_some() {
                out.push('x');
            }
            out.push_str(&dest);
            out
        }
    }
}

// Due mosse sono uguali se coincidono origine, destinazione e flag;
// l'identità del pezzo è derivata dalla posizione.
impl PartialEq for Move {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id() && self.flags == other.flags
    }
}

impl Eq for Move {}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)
    }
}

/// A pin or check record: the square involved plus the ray direction from
/// the king (for a checking knight, the knight offset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ray {
    pub square: Square,
    pub dir: (i8, i8),
}

const ORTHOGONALS: [(i8, i8); 4] = [(-1, 0), (0, -1), (0, 1), (1, 0)];
const DIAGONALS: [(i8, i8); 4] = [(-1, -1), (-1, 1), (1, -1), (1, 1)];
const ALL_DIRECTIONS: [(i8, i8); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];
const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (-2, -1),
    (-2, 1),
    (-1, -2),
    (-1, 2),
    (1, -2),
    (1, 2),
    (2, -1),
    (2, 1),
];

fn pin_on(pins: &[Ray], sq: Square) -> Option<(i8, i8)> {
    pins.iter().find(|p| p.square == sq).map(|p| p.dir)
}

// Un pezzo inchiodato può muoversi solo lungo il raggio dell'inchiodatura,
// verso il re o in direzione opposta.
fn pin_allows(pin: Option<(i8, i8)>, dir: (i8, i8)) -> bool {
    match pin {
        None => true,
        Some(p) => p == dir || p == (-dir.0, -dir.1),
    }
}

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Full game state: the 8x8 grid plus side to move, king tracking,
/// castling rights, en-passant target and the history needed for exact
/// undo. Mutated in place for the life of a game; a reset is a fresh
/// instance.
#[derive(Debug, Clone)]
pub struct Board {
    grid: [[Option<Piece>; 8]; 8],
    side: Color,
    white_king_sq: Square,
    black_king_sq: Square,
    castling: CastleRights,
    ep: Option<Square>,
    in_check: bool,
    pins: Vec<Ray>,
    checks: Vec<Ray>,
    checkmate: bool,
    stalemate: bool,
    move_log: Vec<Move>,
    // Snapshot pre-mossa, una voce per mossa applicata.
    castle_log: Vec<CastleRights>,
    ep_log: Vec<Option<Square>>,
}

impl Board {
    /// The standard starting layout, white to move, all rights intact.
    pub fn new() -> Self {
        const BACK_RANK: [PieceKind; 8] = [
            PieceKind::Rook,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Queen,
            PieceKind::King,
            PieceKind::Bishop,
            PieceKind::Knight,
            PieceKind::Rook,
        ];
        let mut grid: [[Option<Piece>; 8]; 8] = [[None; 8]; 8];
        for (col, &kind) in BACK_RANK.iter().enumerate() {
            grid[0][col] = Some(Piece::new(Color::Black, kind));
            grid[1][col] = Some(Piece::new(Color::Black, PieceKind::Pawn));
            grid[6][col] = Some(Piece::new(Color::White, PieceKind::Pawn));
            grid[7][col] = Some(Piece::new(Color::White, kind));
        }
        Self {
            grid,
            side: Color::White,
            white_king_sq: Square { row: 7, col: 4 },
            black_king_sq: Square { row: 0, col: 4 },
            castling: CastleRights::all(),
            ep: None,
            in_check: false,
            pins: Vec::new(),
            checks: Vec::new(),
            checkmate: false,
            stalemate: false,
            move_log: Vec::new(),
            castle_log: Vec::new(),
            ep_log: Vec::new(),
        }
    }

    /// Set up an arbitrary position from a FEN string. The halfmove and
    /// fullmove counters are accepted and ignored; this engine does not
    /// track the fifty-move rule.
    pub fn from_fen(fen: &str) -> Result<Self, EngineError> {
        let mut parts = fen.trim().split_whitespace();
        let piece_part = parts
            .next()
            .ok_or(EngineError::InvalidFen("missing piece placement"))?;
        let side_part = parts.next().ok_or(EngineError::InvalidFen("missing side"))?;
        let castle_part = parts
            .next()
            .ok_or(EngineError::InvalidFen("missing castling"))?;
        let ep_part = parts
            .next()
            .ok_or(EngineError::InvalidFen("missing en-passant"))?;

        let mut grid: [[Option<Piece>; 8]; 8] = [[None; 8]; 8];
        let mut white_king = None;
        let mut black_king = None;

        // FEN elenca le traverse dall'ottava alla prima: stesso ordine
        // delle righe della griglia.
        let mut row = 0usize;
        for rank_part in piece_part.split('/') {
            if row > 7 {
                return Err(EngineError::InvalidFen("too many ranks"));
            }
            let mut col = 0usize;
            for ch in rank_part.chars() {
                if let Some(d) = ch.to_digit(10) {
                    col += d as usize;
                } else {
                    if col > 7 {
                        return Err(EngineError::InvalidFen("rank overflow"));
                    }
                    let piece = Piece::from_fen_char(ch)
                        .ok_or(EngineError::InvalidFen("invalid piece char"))?;
                    let sq = Square {
                        row: row as i8,
                        col: col as i8,
                    };
                    if piece.kind == PieceKind::King {
                        let slot = match piece.color {
                            Color::White => &mut white_king,
                            Color::Black => &mut black_king,
                        };
                        if slot.is_some() {
                            return Err(EngineError::InvalidFen("duplicate king"));
                        }
                        *slot = Some(sq);
                    }
                    grid[row][col] = Some(piece);
                    col += 1;
                }
            }
            row += 1;
        }
        if row != 8 {
            return Err(EngineError::InvalidFen("expected 8 ranks"));
        }
        let white_king_sq = white_king.ok_or(EngineError::NoKingFound(Color::White))?;
        let black_king_sq = black_king.ok_or(EngineError::NoKingFound(Color::Black))?;

        let side = match side_part {
            "w" => Color::White,
            "b" => Color::Black,
            _ => return Err(EngineError::InvalidFen("invalid side char")),
        };

        let mut castling = CastleRights::none();
        for ch in castle_part.chars() {
            match ch {
                'K' => castling.wks = true,
                'Q' => castling.wqs = true,
                'k' => castling.bks = true,
                'q' => castling.bqs = true,
                '-' => {}
                _ => return Err(EngineError::InvalidFen("invalid castle char")),
            }
        }

        let ep = match ep_part {
            "-" => None,
            s => {
                let sq = Square::from_algebraic(s)
                    .map_err(|_| EngineError::InvalidFen("invalid en-passant square"))?;
                if sq.row != 2 && sq.row != 5 {
                    return Err(EngineError::InvalidFen("invalid en-passant rank"));
                }
                Some(sq)
            }
        };

        Ok(Self {
            grid,
            side,
            white_king_sq,
            black_king_sq,
            castling,
            ep,
            in_check: false,
            pins: Vec::new(),
            checks: Vec::new(),
            checkmate: false,
            stalemate: false,
            move_log: Vec::new(),
            castle_log: Vec::new(),
            ep_log: Vec::new(),
        })
    }

    // Accessi in sola lettura ------------------------------------

    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.grid[sq.row()][sq.col()]
    }

    pub fn side_to_move(&self) -> Color {
        self.side
    }

    pub fn in_check(&self) -> bool {
        self.in_check
    }

    pub fn is_checkmate(&self) -> bool {
        self.checkmate
    }

    pub fn is_stalemate(&self) -> bool {
        self.stalemate
    }

    pub fn castle_rights(&self) -> CastleRights {
        self.castling
    }

    pub fn ep_square(&self) -> Option<Square> {
        self.ep
    }

    pub fn king_square(&self, color: Color) -> Square {
        match color {
            Color::White => self.white_king_sq,
            Color::Black => self.black_king_sq,
        }
    }

    pub fn move_log(&self) -> &[Move] {
        &self.move_log
    }

    /// Pins recorded by the last `valid_moves` call.
    pub fn pins(&self) -> &[Ray] {
        &self.pins
    }

    /// Checks recorded by the last `valid_moves` call.
    pub fn checks(&self) -> &[Ray] {
        &self.checks
    }

    fn set(&mut self, sq: Square, piece: Option<Piece>) {
        self.grid[sq.row()][sq.col()] = piece;
    }

    fn set_king_square(&mut self, color: Color, sq: Square) {
        match color {
            Color::White => self.white_king_sq = sq,
            Color::Black => self.black_king_sq = sq,
        }
    }

    // Mutazione --------------------------------------------------

    /// Apply a move assumed to come from the current legal move set.
    /// Callers holding a move of unknown provenance go through
    /// [`Board::try_move`] instead.
    pub fn make_move(&mut self, mv: Move) {
        // Snapshot pre-mossa per l'undo esatto.
        self.castle_log.push(self.castling);
        self.ep_log.push(self.ep);

        self.set(mv.from, None);
        let placed = if mv.is_promotion() {
            // La promozione è fissa a donna.
            Piece::new(mv.piece.color, PieceKind::Queen)
        } else {
            mv.piece
        };
        self.set(mv.to, Some(placed));
        if mv.piece.kind == PieceKind::King {
            self.set_king_square(mv.piece.color, mv.to);
        }

        if mv.is_en_passant() {
            // Il pedone catturato sta sulla traversa di partenza del
            // pedone che cattura, stessa colonna della destinazione.
            self.set(
                Square {
                    row: mv.from.row,
                    col: mv.to.col,
                },
                None,
            );
        }

        // Doppio passo di pedone: la casella intermedia diventa bersaglio
        // en passant; qualunque altra mossa lo azzera.
        self.ep = if mv.piece.kind == PieceKind::Pawn && (mv.from.row - mv.to.row).abs() == 2 {
            Some(Square {
                row: (mv.from.row + mv.to.row) / 2,
                col: mv.from.col,
            })
        } else {
            None
        };

        if mv.is_castle() {
            let row = mv.to.row;
            let (rook_from, rook_to) = if mv.to.col > mv.from.col {
                (Square { row, col: 7 }, Square { row, col: 5 })
            } else {
                (Square { row, col: 0 }, Square { row, col: 3 })
            };
            let rook = self.piece_at(rook_from);
            self.set(rook_to, rook);
            self.set(rook_from, None);
        }

        self.update_castle_rights(&mv);

        self.move_log.push(mv);
        self.side = self.side.opponent();
    }

    /// Take back the last move. A no-op when the history is empty, so a
    /// caller may press undo repeatedly without harm.
    pub fn undo_move(&mut self) {
        let Some(mv) = self.move_log.pop() else {
            return;
        };

        self.set(mv.from, Some(mv.piece));
        if mv.is_en_passant() {
            self.set(mv.to, None);
            self.set(
                Square {
                    row: mv.from.row,
                    col: mv.to.col,
                },
                mv.captured,
            );
        } else {
            self.set(mv.to, mv.captured);
        }
        if mv.piece.kind == PieceKind::King {
            self.set_king_square(mv.piece.color, mv.from);
        }
        self.side = self.side.opponent();

        self.ep = self
            .ep_log
            .pop()
            .expect("en-passant log out of step with the move log");
        self.castling = self
            .castle_log
            .pop()
            .expect("castling log out of step with the move log");

        if mv.is_castle() {
            let row = mv.to.row;
            let (rook_from, rook_to) = if mv.to.col > mv.from.col {
                (Square { row, col: 7 }, Square { row, col: 5 })
            } else {
                (Square { row, col: 0 }, Square { row, col: 3 })
            };
            let rook = self.piece_at(rook_to);
            self.set(rook_from, rook);
            self.set(rook_to, None);
        }

        // Dopo un undo lo stato non è mai terminale; valid_moves li
        // ricalcola comunque.
        self.checkmate = false;
        self.stalemate = false;
    }

    /// Validate a caller-supplied move against the current legal set and
    /// apply the matching generated move.
    pub fn try_move(&mut self, mv: Move) -> Result<(), EngineError> {
        match self.valid_moves().into_iter().find(|m| *m == mv) {
            Some(found) => {
                self.make_move(found);
                Ok(())
            }
            None => Err(EngineError::IllegalMove(mv.to_string())),
        }
    }

    /// Parse a coordinate-form move string ("e2e4") and resolve it against
    /// the current legal move set.
    pub fn parse_move(&mut self, text: &str) -> Result<Move, EngineError> {
        let t = text.trim();
        if t.len() != 4 || !t.is_ascii() {
            return Err(EngineError::InvalidNotation(t.to_string()));
        }
        let from = Square::from_algebraic(&t[0..2])?;
        let to = Square::from_algebraic(&t[2..4])?;
        self.valid_moves()
            .into_iter()
            .find(|m| m.from == from && m.to == to)
            .ok_or_else(|| EngineError::IllegalMove(t.to_string()))
    }

    fn update_castle_rights(&mut self, mv: &Move) {
        match (mv.piece.color, mv.piece.kind) {
            (Color::White, PieceKind::King) => {
                self.castling.wks = false;
                self.castling.wqs = false;
            }
            (Color::Black, PieceKind::King) => {
                self.castling.bks = false;
                self.castling.bqs = false;
            }
            (Color::White, PieceKind::Rook) => {
                if mv.from.row == 7 && mv.from.col == 0 {
                    self.castling.wqs = false;
                } else if mv.from.row == 7 && mv.from.col == 7 {
                    self.castling.wks = false;
                }
            }
            (Color::Black, PieceKind::Rook) => {
                if mv.from.row == 0 && mv.from.col == 0 {
                    self.castling.bqs = false;
                } else if mv.from.row == 0 && mv.from.col == 7 {
                    self.castling.bks = false;
                }
            }
            _ => {}
        }
        // Catturare una torre sulla sua casella d'angolo originaria toglie
        // all'avversario il diritto corrispondente.
        if let Some(captured) = mv.captured {
            if captured.kind == PieceKind::Rook && !mv.is_en_passant() {
                match (mv.to.row, mv.to.col) {
                    (7, 0) => self.castling.wqs = false,
                    (7, 7) => self.castling.wks = false,
                    (0, 0) => self.castling.bqs = false,
                    (0, 7) => self.castling.bks = false,
                    _ => {}
                }
            }
        }
    }

    // Rilevamento inchiodature e scacchi -------------------------

    /// Scan outward from `king_sq` along the eight rays plus the knight
    /// offsets. Returns the in-check flag, the pinned friendly pieces and
    /// the checking enemy pieces, each with its ray direction. The
    /// friendly king itself is skipped on the rays, so the scan can be run
    /// from a candidate king square while the king still sits on its
    /// origin.
    fn pins_and_checks(&self, king_sq: Square, color: Color) -> (bool, Vec<Ray>, Vec<Ray>) {
        let mut pins = Vec::new();
        let mut checks = Vec::new();
        let enemy = color.opponent();
        // Raggi dai quali un pedone nemico dà scacco (solo a distanza 1).
        let pawn_dirs: [(i8, i8); 2] = match enemy {
            Color::White => [(1, -1), (1, 1)],
            Color::Black => [(-1, -1), (-1, 1)],
        };

        for &dir in &ALL_DIRECTIONS {
            let mut candidate: Option<Ray> = None;
            for step in 1i8..8 {
                let Some(sq) = king_sq.offset(dir.0 * step, dir.1 * step) else {
                    break;
                };
                match self.piece_at(sq) {
                    Some(p) if p.color == color => {
                        if p.kind == PieceKind::King {
                            continue;
                        }
                        if candidate.is_none() {
                            candidate = Some(Ray { square: sq, dir });
                        } else {
                            // Due pezzi amici: nessuna inchiodatura né
                            // scacco su questo raggio.
                            break;
                        }
                    }
                    Some(p) => {
                        let orthogonal = dir.0 == 0 || dir.1 == 0;
                        let threatens = match p.kind {
                            PieceKind::Rook => orthogonal,
                            PieceKind::Bishop => !orthogonal,
                            PieceKind::Queen => true,
                            PieceKind::King => step == 1,
                            PieceKind::Pawn => step == 1 && pawn_dirs.contains(&dir),
                            PieceKind::Knight => false,
                        };
                        if threatens {
                            match candidate {
                                None => checks.push(Ray { square: sq, dir }),
                                Some(pin) => pins.push(pin),
                            }
                        }
                        break;
                    }
                    None => {}
                }
            }
        }

        // I cavalli non possono essere bloccati: ogni salto è uno scacco
        // indipendente, senza analogo di inchiodatura.
        for &off in &KNIGHT_OFFSETS {
            if let Some(sq) = king_sq.offset(off.0, off.1) {
                if let Some(p) = self.piece_at(sq) {
                    if p.color == enemy && p.kind == PieceKind::Knight {
                        checks.push(Ray {
                            square: sq,
                            dir: off,
                        });
                    }
                }
            }
        }

        (!checks.is_empty(), pins, checks)
    }

    // Generatori per tipo di pezzo -------------------------------

    fn new_move(&self, from: Square, to: Square, flags: u8) -> Move {
        let piece = self
            .piece_at(from)
            .expect("move generated from an empty square");
        let captured = if flags & FLAG_EN_PASSANT != 0 {
            Some(Piece::new(piece.color.opponent(), PieceKind::Pawn))
        } else {
            self.piece_at(to)
        };
        Move {
            from,
            to,
            piece,
            captured,
            flags,
        }
    }

    fn pawn_moves(&self, sq: Square, color: Color, pins: &[Ray], out: &mut Vec<Move>) {
        let pin = pin_on(pins, sq);
        let (advance, start_row, back_row): (i8, i8, i8) = match color {
            Color::White => (-1, 6, 0),
            Color::Black => (1, 1, 7),
        };
        let enemy = color.opponent();

        if let Some(one) = sq.offset(advance, 0) {
            if self.piece_at(one).is_none() && pin_allows(pin, (advance, 0)) {
                let flags = if one.row == back_row { FLAG_PROMOTION } else { 0 };
                out.push(self.new_move(sq, one, flags));
                if sq.row == start_row {
                    if let Some(two) = sq.offset(2 * advance, 0) {
                        if self.piece_at(two).is_none() {
                            out.push(self.new_move(sq, two, 0));
                        }
                    }
                }
            }
        }

        for dc in [-1i8, 1] {
            let Some(dest) = sq.offset(advance, dc) else {
                continue;
            };
            if !pin_allows(pin, (advance, dc)) {
                continue;
            }
            match self.piece_at(dest) {
                Some(p) if p.color == enemy => {
                    let flags = if dest.row == back_row { FLAG_PROMOTION } else { 0 };
                    out.push(self.new_move(sq, dest, flags));
                }
                None if Some(dest) == self.ep => {
                    if self.en_passant_safe(sq, dest, color) {
                        out.push(self.new_move(sq, dest, FLAG_EN_PASSANT));
                    }
                }
                _ => {}
            }
        }
    }

    /// Guard against the horizontal discovered check that only en passant
    /// can produce: both pawns leave the rank in one move, so a rook or
    /// queen hiding behind them would hit the king. The first piece found
    /// on the rank (skipping the vanishing pair) decides.
    fn en_passant_safe(&self, pawn_sq: Square, dest: Square, color: Color) -> bool {
        let king_sq = self.king_square(color);
        if king_sq.row != pawn_sq.row {
            return true;
        }
        let step: i8 = if king_sq.col < pawn_sq.col { 1 } else { -1 };
        let skip = [pawn_sq.col, dest.col];
        let mut col = king_sq.col + step;
        while (0..8).contains(&col) {
            if skip.contains(&col) {
                col += step;
                continue;
            }
            if let Some(p) = self.piece_at(Square {
                row: pawn_sq.row,
                col,
            }) {
                return !(p.color != color
                    && matches!(p.kind, PieceKind::Rook | PieceKind::Queen));
            }
            col += step;
        }
        true
    }

    fn slider_moves(
        &self,
        sq: Square,
        color: Color,
        dirs: &[(i8, i8)],
        pins: &[Ray],
        out: &mut Vec<Move>,
    ) {
        let pin = pin_on(pins, sq);
        let enemy = color.opponent();
        for &dir in dirs {
            if !pin_allows(pin, dir) {
                continue;
            }
            for step in 1i8..8 {
                let Some(dest) = sq.offset(dir.0 * step, dir.1 * step) else {
                    break;
                };
                match self.piece_at(dest) {
                    None => out.push(self.new_move(sq, dest, 0)),
                    Some(p) if p.color == enemy => {
                        out.push(self.new_move(sq, dest, 0));
                        break;
                    }
                    Some(_) => break,
                }
            }
        }
    }

    fn knight_moves(&self, sq: Square, color: Color, pins: &[Ray], out: &mut Vec<Move>) {
        // Nessun salto di cavallo può restare sul raggio di una
        // inchiodatura: un cavallo inchiodato è immobile.
        if pin_on(pins, sq).is_some() {
            return;
        }
        for &off in &KNIGHT_OFFSETS {
            if let Some(dest) = sq.offset(off.0, off.1) {
                if self.piece_at(dest).map_or(true, |p| p.color != color) {
                    out.push(self.new_move(sq, dest, 0));
                }
            }
        }
    }

    fn king_moves(&self, sq: Square, color: Color, out: &mut Vec<Move>) {
        for &off in &ALL_DIRECTIONS {
            let Some(dest) = sq.offset(off.0, off.1) else {
                continue;
            };
            if self.piece_at(dest).is_some_and(|p| p.color == color) {
                continue;
            }
            // Sonda con la sola coordinata del re spostata: il rilevatore
            // ignora il re amico rimasto sulla casella d'origine.
            let (in_check, _, _) = self.pins_and_checks(dest, color);
            if !in_check {
                out.push(self.new_move(sq, dest, 0));
            }
        }
    }

    fn castle_moves(&self, sq: Square, color: Color, out: &mut Vec<Move>) {
        let enemy = color.opponent();
        if self.square_attacked(sq, enemy) {
            return;
        }
        let (kingside, queenside) = match color {
            Color::White => (self.castling.wks, self.castling.wqs),
            Color::Black => (self.castling.bks, self.castling.bqs),
        };
        let (row, col) = (sq.row, sq.col);

        if kingside && col + 2 < 8 {
            let f = Square { row, col: col + 1 };
            let g = Square { row, col: col + 2 };
            if self.piece_at(f).is_none()
                && self.piece_at(g).is_none()
                && !self.square_attacked(f, enemy)
                && !self.square_attacked(g, enemy)
            {
                out.push(self.new_move(sq, g, FLAG_CASTLE));
            }
        }
        if queenside && col - 3 >= 0 {
            let d = Square { row, col: col - 1 };
            let c = Square { row, col: col - 2 };
            let b = Square { row, col: col - 3 };
            if self.piece_at(d).is_none()
                && self.piece_at(c).is_none()
                && self.piece_at(b).is_none()
                && !self.square_attacked(d, enemy)
                && !self.square_attacked(c, enemy)
            {
                out.push(self.new_move(sq, c, FLAG_CASTLE));
            }
        }
    }

    /// Every pseudo-legal move for `color`, pin constraints applied from
    /// the given slice. Castling is not included here; `valid_moves` adds
    /// it separately.
    fn all_pseudo_moves(&self, color: Color, pins: &[Ray]) -> Vec<Move> {
        let mut moves = Vec::with_capacity(64);
        for sq in Square::all() {
            let Some(piece) = self.piece_at(sq) else {
                continue;
            };
            if piece.color != color {
                continue;
            }
            match piece.kind {
                PieceKind::Pawn => self.pawn_moves(sq, color, pins, &mut moves),
                PieceKind::Knight => self.knight_moves(sq, color, pins, &mut moves),
                PieceKind::Bishop => self.slider_moves(sq, color, &DIAGONALS, pins, &mut moves),
                PieceKind::Rook => self.slider_moves(sq, color, &ORTHOGONALS, pins, &mut moves),
                PieceKind::Queen => {
                    self.slider_moves(sq, color, &ALL_DIRECTIONS, pins, &mut moves)
                }
                PieceKind::King => self.king_moves(sq, color, &mut moves),
            }
        }
        moves
    }

    /// Whether `by` has any pseudo-legal move landing on `sq`. Attacker
    /// pins are irrelevant here, so the generation runs with an empty pin
    /// context. Accepted as O(branching factor) per call; only the
    /// castling path uses it.
    pub fn square_attacked(&self, sq: Square, by: Color) -> bool {
        self.all_pseudo_moves(by, &[]).iter().any(|m| m.to == sq)
    }

    // Filtro di legalità -----------------------------------------

    /// The fully legal move set for the side to move, recomputed on every
    /// call. This is the single authoritative source of legal moves; it
    /// also refreshes the in-check, checkmate and stalemate flags and the
    /// pin/check lists.
    pub fn valid_moves(&mut self) -> Vec<Move> {
        let king_sq = self.king_square(self.side);
        let (in_check, pins, checks) = self.pins_and_checks(king_sq, self.side);

        let moves = if in_check {
            if checks.len() == 1 {
                let mut moves = self.all_pseudo_moves(self.side, &pins);
                let check = checks[0];
                let checker = self
                    .piece_at(check.square)
                    .expect("check ray must end on the checking piece");
                // Caselle che risolvono lo scacco: cattura dello scaccante
                // oppure blocco lungo il raggio. Un cavallo non si blocca.
                let mut targets = Vec::new();
                if checker.kind == PieceKind::Knight {
                    targets.push(check.square);
                } else {
                    for step in 1i8..8 {
                        let Some(sq) = king_sq.offset(check.dir.0 * step, check.dir.1 * step)
                        else {
                            break;
                        };
                        targets.push(sq);
                        if sq == check.square {
                            break;
                        }
                    }
                }
                moves.retain(|m| m.piece.kind == PieceKind::King || targets.contains(&m.to));
                moves
            } else {
                // Scacco doppio: muove solo il re.
                let mut moves = Vec::new();
                self.king_moves(king_sq, self.side, &mut moves);
                moves
            }
        } else {
            let mut moves = self.all_pseudo_moves(self.side, &pins);
            self.castle_moves(king_sq, self.side, &mut moves);
            moves
        };

        if moves.is_empty() {
            self.checkmate = in_check;
            self.stalemate = !in_check;
        } else {
            self.checkmate = false;
            self.stalemate = false;
        }
        self.in_check = in_check;
        self.pins = pins;
        self.checks = checks;
        moves
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
