//! Engine facade used by a game-room client.
//!
//! The room numbers rows from the opposite edge of the board and columns from
//! 1. Conversion to and from the internal row-major, 0-based squares happens
//! only in [`Engine::select_move`] and [`Engine::report_opponent_move`].

use crate::config::EngineConfig;
use crate::game::{BOARD_SIZE, Board, GameError, Move, Player, Position};
use crate::tree::SearchTree;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// A square in game-room coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalPosition {
    pub row: usize,
    pub col: usize,
}

impl ExternalPosition {
    pub fn new(row: usize, col: usize) -> Self {
        ExternalPosition { row, col }
    }

    pub fn from_internal(pos: Position) -> Self {
        ExternalPosition {
            row: BOARD_SIZE - pos.row,
            col: pos.col + 1,
        }
    }

    /// None when the square is off the board.
    pub fn to_internal(self) -> Option<Position> {
        let on_board = |x: usize| (1..=BOARD_SIZE).contains(&x);
        (on_board(self.row) && on_board(self.col))
            .then(|| Position::new(BOARD_SIZE - self.row, self.col - 1))
    }
}

impl fmt::Display for ExternalPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.row, self.col)
    }
}

/// A move in game-room coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalMove {
    pub queen_from: ExternalPosition,
    pub queen_to: ExternalPosition,
    pub arrow: ExternalPosition,
}

impl ExternalMove {
    pub fn new(queen_from: ExternalPosition, queen_to: ExternalPosition, arrow: ExternalPosition) -> Self {
        ExternalMove {
            queen_from,
            queen_to,
            arrow,
        }
    }

    pub fn from_internal(mv: Move) -> Self {
        ExternalMove {
            queen_from: ExternalPosition::from_internal(mv.queen_from),
            queen_to: ExternalPosition::from_internal(mv.queen_to),
            arrow: ExternalPosition::from_internal(mv.arrow),
        }
    }

    pub fn to_internal(self) -> Option<Move> {
        Some(Move::new(
            self.queen_from.to_internal()?,
            self.queen_to.to_internal()?,
            self.arrow.to_internal()?,
        ))
    }
}

impl fmt::Display for ExternalMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} x {}", self.queen_from, self.queen_to, self.arrow)
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Illegal state request: {0}")]
    IllegalStateRequest(#[from] GameError),
    #[error("No legal move from the current position")]
    NoLegalMove,
    #[error("Opponent move {0} is not legal in the current position")]
    UnrecognizedOpponentMove(ExternalMove),
    #[error("Engine has no position loaded")]
    Uninitialized,
    #[error("Invalid parallelism {0}: need at least one worker")]
    InvalidParallelism(usize),
    #[error("Failed to build rollout pool: {0}")]
    ThreadPool(#[from] ThreadPoolBuildError),
}

/// MCTS engine holding one search tree at a time.
pub struct Engine {
    tree: Option<SearchTree>,
    rng: StdRng,
    parallelism: usize,
    /// Only built when more than one worker is requested
    pool: Option<ThreadPool>,
}

impl Engine {
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut engine = Self::with_seed(config.seed);
        engine.set_parallelism(config.parallelism)?;
        Ok(engine)
    }

    /// Sequential engine with a seeded random source
    pub fn with_seed(seed: u64) -> Self {
        Engine {
            tree: None,
            rng: StdRng::seed_from_u64(seed),
            parallelism: 1,
            pool: None,
        }
    }

    /// Install a fresh root from room-supplied grid codes.
    ///
    /// Nothing changes when the grid or player id is invalid.
    pub fn load_state<T, R>(&mut self, grid: &[R], player_id: i64) -> Result<(), EngineError>
    where
        T: Copy + Into<i64>,
        R: AsRef<[T]>,
    {
        let board = Board::from_rows(grid)?;
        let player = Player::from_id(player_id).ok_or(GameError::InvalidPlayer(player_id))?;
        self.load_board(board, player);
        Ok(())
    }

    pub fn load_board(&mut self, board: Board, player: Player) {
        let tree = SearchTree::new(board, player);
        tree.expand(tree.root());
        info!(
            %player,
            moves = tree.children(tree.root()).len(),
            "loaded position"
        );
        self.tree = Some(tree);
    }

    pub fn is_loaded(&self) -> bool {
        self.tree.is_some()
    }

    pub fn tree(&self) -> Result<&SearchTree, EngineError> {
        self.tree.as_ref().ok_or(EngineError::Uninitialized)
    }

    /// Board and mover at the current root
    pub fn root_state(&self) -> Result<(Board, Player), EngineError> {
        let tree = self.tree()?;
        Ok(tree.state(tree.root()))
    }

    pub fn is_terminal(&self) -> Result<bool, EngineError> {
        let tree = self.tree()?;
        Ok(tree.stats(tree.root()).terminal.is_terminal())
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Set the number of rollout workers.
    pub fn set_parallelism(&mut self, workers: usize) -> Result<(), EngineError> {
        if workers == 0 {
            return Err(EngineError::InvalidParallelism(workers));
        }

        self.pool = if workers > 1 {
            Some(
                ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|index| format!("rollout-{}", index))
                    .build()?,
            )
        } else {
            None
        };
        self.parallelism = workers;
        debug!(workers, "rollout parallelism set");
        Ok(())
    }

    /// One rollout from the current root; does nothing at a terminal root.
    pub fn run_rollout(&mut self) -> Result<(), EngineError> {
        self.run_rollouts(1).map(|_| ())
    }

    /// Run a batch of rollouts, spread over the worker pool when there is one.
    ///
    /// Each rollout gets its own generator seeded from the engine's, so a
    /// sequential batch is reproducible. Returns the number of rollouts that
    /// reached the tree (zero at a terminal root).
    pub fn run_rollouts(&mut self, count: usize) -> Result<usize, EngineError> {
        let tree = self.tree.as_ref().ok_or(EngineError::Uninitialized)?;
        let seeds: Vec<u64> = (0..count).map(|_| self.rng.random()).collect();

        let rollout = |seed: &u64| {
            let mut rng = StdRng::seed_from_u64(*seed);
            tree.rollout(&mut rng).is_some()
        };

        let completed = match &self.pool {
            Some(pool) => pool.install(|| seeds.par_iter().filter(|&seed| rollout(seed)).count()),
            None => seeds.iter().filter(|&seed| rollout(seed)).count(),
        };
        Ok(completed)
    }

    /// Run rollouts in batches of one per worker until `budget` has elapsed
    /// or `max_rollouts` have been run.
    pub fn think(&mut self, budget: Duration, max_rollouts: Option<u32>) -> Result<usize, EngineError> {
        let start = Instant::now();
        let limit = max_rollouts.map_or(usize::MAX, |max| max as usize);
        let mut total = 0;

        while total < limit && start.elapsed() < budget {
            let batch = self.parallelism.min(limit - total);
            let completed = self.run_rollouts(batch)?;
            if completed == 0 {
                break;
            }
            total += completed;
        }

        debug!(rollouts = total, elapsed = ?start.elapsed(), "finished thinking");
        Ok(total)
    }

    /// Commit to the best-scoring root child and re-root there.
    pub fn select_move(&mut self) -> Result<ExternalMove, EngineError> {
        let root = self.tree()?.root();

        if self.tree()?.children(root).is_empty() {
            self.run_rollout()?;
            self.tree()?.expand(root);
        }

        let tree = self.tree.as_mut().ok_or(EngineError::Uninitialized)?;
        let best = tree.best_child(root).ok_or(EngineError::NoLegalMove)?;
        let action = tree.action(best).ok_or(EngineError::NoLegalMove)?;
        let stats = tree.stats(best);
        let root_stats = tree.stats(root);

        tree.reroot(best);
        // Settle the new root's terminal status before the next batch
        tree.expand(tree.root());

        let mv = ExternalMove::from_internal(action.mv);
        info!(
            internal = %action.mv,
            external = %mv,
            score = stats.score,
            visits = stats.visit_count,
            wins = stats.win_count,
            root_visits = root_stats.visit_count,
            "selected move"
        );
        Ok(mv)
    }

    /// Absorb the opponent's move, re-rooting onto the matching child.
    ///
    /// A move that matches no legal action leaves the tree untouched.
    pub fn report_opponent_move(&mut self, reported: ExternalMove) -> Result<(), EngineError> {
        let tree = self.tree.as_mut().ok_or(EngineError::Uninitialized)?;
        let root = tree.root();

        let action = reported
            .to_internal()
            .and_then(|mv| tree.find_action(root, &mv));
        let Some(action) = action else {
            warn!(%reported, "opponent move not recognised");
            return Err(EngineError::UnrecognizedOpponentMove(reported));
        };

        let reused = tree.cached_child(root, &action.mv).is_some();
        let child = tree.child_for(root, &action);
        tree.reroot(child);
        tree.expand(tree.root());

        info!(%reported, internal = %action.mv, reused, "absorbed opponent move");
        Ok(())
    }

    /// Boolean form of [`Engine::report_opponent_move`].
    pub fn accepts_opponent_move(&mut self, reported: ExternalMove) -> bool {
        self.report_opponent_move(reported).is_ok()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::with_seed(EngineConfig::default().seed)
    }
}
