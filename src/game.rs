use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter;
use thiserror::Error;

/// Board size (the board is always square)
pub const BOARD_SIZE: usize = 10;

/// Ray directions, in the order actions are enumerated.
const DIRECTIONS: [(isize, isize); 8] = [
    (1, 0),
    (1, 1),
    (1, -1),
    (-1, 0),
    (-1, 1),
    (-1, -1),
    (0, -1),
    (0, 1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Player {
    One,
    Two,
}

impl Player {
    pub fn opponent(&self) -> Player {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    /// Numeric id used on the board grid and by the game room (1 or 2)
    pub fn id(&self) -> u8 {
        match self {
            Player::One => 1,
            Player::Two => 2,
        }
    }

    pub fn from_id(id: i64) -> Option<Player> {
        match id {
            1 => Some(Player::One),
            2 => Some(Player::Two),
            _ => None,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player {}", self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cell {
    Empty,
    Queen(Player),
    /// Permanently blocked by an arrow
    Arrow,
}

impl Cell {
    pub const EMPTY_CODE: u8 = 0;
    pub const ARROW_CODE: u8 = 7;

    /// Grid code of the cell: 0 empty, 1/2 queens, 7 arrow
    pub fn code(&self) -> u8 {
        match self {
            Cell::Empty => Self::EMPTY_CODE,
            Cell::Queen(player) => player.id(),
            Cell::Arrow => Self::ARROW_CODE,
        }
    }

    pub fn from_code(code: i64) -> Option<Cell> {
        match code {
            0 => Some(Cell::Empty),
            7 => Some(Cell::Arrow),
            id => Player::from_id(id).map(Cell::Queen),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub fn new(row: usize, col: usize) -> Self {
        Position { row, col }
    }

    /// Step by (dr, dc), or None when that leaves the board
    pub fn offset(&self, dr: isize, dc: isize) -> Option<Position> {
        let row = self.row.checked_add_signed(dr)?;
        let col = self.col.checked_add_signed(dc)?;
        (row < BOARD_SIZE && col < BOARD_SIZE).then_some(Position { row, col })
    }

    /// Every square in row-major order
    pub fn all() -> impl Iterator<Item = Position> {
        (0..BOARD_SIZE).flat_map(|row| (0..BOARD_SIZE).map(move |col| Position::new(row, col)))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// A full turn: queen move followed by an arrow shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub queen_from: Position,
    pub queen_to: Position,
    pub arrow: Position,
}

impl Move {
    pub fn new(queen_from: Position, queen_to: Position, arrow: Position) -> Self {
        Move {
            queen_from,
            queen_to,
            arrow,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} x {}", self.queen_from, self.queen_to, self.arrow)
    }
}

/// Id of an action, unique only within the enumeration that produced it.
pub type ActionId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action {
    pub mv: Move,
    pub id: ActionId,
}

#[derive(Debug, Error)]
pub enum GameError {
    #[error("Invalid board: {0}")]
    InvalidBoard(String),
    #[error("Invalid player id: {0}")]
    InvalidPlayer(i64),
    #[error("Invalid move: {0}")]
    InvalidMove(String),
    #[error("Game already over")]
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Board {
    cells: [[Cell; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    pub fn empty() -> Self {
        Board {
            cells: [[Cell::Empty; BOARD_SIZE]; BOARD_SIZE],
        }
    }

    /// Opening position used by the game room
    pub fn standard() -> Self {
        let mut board = Board::empty();
        for (row, col) in [(0, 3), (0, 6), (3, 0), (3, 9)] {
            board.set(Position::new(row, col), Cell::Queen(Player::Two));
        }
        for (row, col) in [(6, 0), (6, 9), (9, 3), (9, 6)] {
            board.set(Position::new(row, col), Cell::Queen(Player::One));
        }
        board
    }

    /// Build a board from rows of grid codes, rejecting anything that is not
    /// a 10x10 grid of {0, 1, 2, 7}.
    pub fn from_rows<T, R>(rows: &[R]) -> Result<Self, GameError>
    where
        T: Copy + Into<i64>,
        R: AsRef<[T]>,
    {
        if rows.len() != BOARD_SIZE {
            return Err(GameError::InvalidBoard(format!(
                "expected {} rows, got {}",
                BOARD_SIZE,
                rows.len()
            )));
        }

        let mut board = Board::empty();
        for (row, cells) in rows.iter().enumerate() {
            let cells = cells.as_ref();
            if cells.len() != BOARD_SIZE {
                return Err(GameError::InvalidBoard(format!(
                    "row {} has {} cells, expected {}",
                    row,
                    cells.len(),
                    BOARD_SIZE
                )));
            }
            for (col, &code) in cells.iter().enumerate() {
                let code = code.into();
                let cell = Cell::from_code(code).ok_or_else(|| {
                    GameError::InvalidBoard(format!("unknown cell code {} at ({}, {})", code, row, col))
                })?;
                board.cells[row][col] = cell;
            }
        }
        Ok(board)
    }

    /// Grid codes, row-major
    pub fn to_rows(&self) -> [[u8; BOARD_SIZE]; BOARD_SIZE] {
        let mut rows = [[0; BOARD_SIZE]; BOARD_SIZE];
        for pos in Position::all() {
            rows[pos.row][pos.col] = self.get(pos).code();
        }
        rows
    }

    pub fn get(&self, pos: Position) -> Cell {
        self.cells[pos.row][pos.col]
    }

    pub fn set(&mut self, pos: Position, cell: Cell) {
        self.cells[pos.row][pos.col] = cell;
    }

    /// Squares holding the player's queens, in raster order
    pub fn queens(&self, player: Player) -> impl Iterator<Item = Position> + '_ {
        Position::all().filter(move |&pos| self.get(pos) == Cell::Queen(player))
    }

    fn ray(&self, from: Position, (dr, dc): (isize, isize)) -> impl Iterator<Item = Position> + '_ {
        iter::successors(from.offset(dr, dc), move |pos| pos.offset(dr, dc))
            .take_while(move |&pos| self.get(pos) == Cell::Empty)
    }

    /// Empty squares reachable from `from` along straight or diagonal lines
    pub fn reachable(&self, from: Position) -> impl Iterator<Item = Position> + '_ {
        DIRECTIONS.into_iter().flat_map(move |dir| self.ray(from, dir))
    }

    /// Copy of the board with the move played by `player`
    pub fn apply(&self, mv: &Move, player: Player) -> Board {
        let mut next = *self;
        next.set(mv.queen_from, Cell::Empty);
        next.set(mv.queen_to, Cell::Queen(player));
        next.set(mv.arrow, Cell::Arrow);
        next
    }

    /// Number of queen destinations available to the player
    pub fn mobility(&self, player: Player) -> usize {
        self.queens(player)
            .map(|queen| self.reachable(queen).count())
            .sum()
    }

    /// A queen with a destination always has an arrow shot back to its origin.
    pub fn has_legal_action(&self, player: Player) -> bool {
        self.queens(player)
            .any(|queen| self.reachable(queen).next().is_some())
    }

    pub fn display(&self) -> String {
        let mut output = String::new();

        output.push_str("   ");
        for col in 0..BOARD_SIZE {
            output.push_str(&format!("{} ", col));
        }
        output.push('\n');

        for row in 0..BOARD_SIZE {
            output.push_str(&format!("{:2} ", row));
            for col in 0..BOARD_SIZE {
                let symbol = match self.get(Position::new(row, col)) {
                    Cell::Empty => '.',
                    Cell::Queen(Player::One) => 'W',
                    Cell::Queen(Player::Two) => 'B',
                    Cell::Arrow => 'x',
                };
                output.push(symbol);
                output.push(' ');
            }
            output.push('\n');
        }

        output
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::standard()
    }
}

/// Enumerate every legal compound action for `player`.
///
/// Queens are visited in raster order, destinations and arrow landings in
/// [`DIRECTIONS`] order, so the result (and its ids, which count up from 1)
/// is fully determined by the board.
pub fn enumerate_actions(board: &Board, player: Player) -> Vec<Action> {
    let mut actions = Vec::new();
    let mut next_id: ActionId = 0;

    for from in board.queens(player) {
        for to in board.reachable(from) {
            let mut scratch = *board;
            scratch.set(from, Cell::Empty);
            scratch.set(to, Cell::Queen(player));

            for arrow in scratch.reachable(to) {
                next_id += 1;
                actions.push(Action {
                    mv: Move::new(from, to, arrow),
                    id: next_id,
                });
            }
        }
    }

    actions
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    PlayerOneWins,
    PlayerTwoWins,
}

impl GameResult {
    pub fn winner(&self) -> Player {
        match self {
            GameResult::PlayerOneWins => Player::One,
            GameResult::PlayerTwoWins => Player::Two,
        }
    }

    pub fn won_by(player: Player) -> Self {
        match player {
            Player::One => GameResult::PlayerOneWins,
            Player::Two => GameResult::PlayerTwoWins,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    board: Board,
    current_player: Player,
    move_count: usize,
    result: Option<GameResult>,
}

impl GameState {
    /// Standard opening; player two moves first
    pub fn new() -> Self {
        Self::from_board(Board::standard(), Player::Two)
    }

    pub fn from_board(board: Board, current_player: Player) -> Self {
        let mut state = GameState {
            board,
            current_player,
            move_count: 0,
            result: None,
        };
        state.check_game_end();
        state
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn current_player(&self) -> Player {
        self.current_player
    }

    pub fn result(&self) -> Option<&GameResult> {
        self.result.as_ref()
    }

    pub fn is_game_over(&self) -> bool {
        self.result.is_some()
    }

    pub fn move_count(&self) -> usize {
        self.move_count
    }

    /// Get all legal moves for the current player
    pub fn legal_moves(&self) -> Vec<Move> {
        if self.is_game_over() {
            return Vec::new();
        }

        enumerate_actions(&self.board, self.current_player)
            .into_iter()
            .map(|action| action.mv)
            .collect()
    }

    pub fn is_legal(&self, mv: &Move) -> bool {
        !self.is_game_over() && self.legal_moves().contains(mv)
    }

    /// Make a move and update the game state
    pub fn make_move(&mut self, mv: Move) -> Result<(), GameError> {
        if self.is_game_over() {
            return Err(GameError::GameOver);
        }

        if !self.is_legal(&mv) {
            return Err(GameError::InvalidMove(format!("Move {} is not legal", mv)));
        }

        self.board = self.board.apply(&mv, self.current_player);
        self.current_player = self.current_player.opponent();
        self.move_count += 1;

        self.check_game_end();

        Ok(())
    }

    /// The player to move loses when none of their queens can move.
    fn check_game_end(&mut self) {
        if !self.board.has_legal_action(self.current_player) {
            self.result = Some(GameResult::won_by(self.current_player.opponent()));
        }
    }

    pub fn display_board(&self) -> String {
        self.board.display()
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}
