use crate::config::EngineConfig;
use crate::engine::{Engine, EngineError, ExternalMove};
use crate::game::{GameState, Move, Player};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use std::time::Duration;
use tracing::{debug, warn};

/// Trait that all bots must implement
pub trait Bot: Send {
    /// Get the name of the bot
    fn name(&self) -> &str;

    /// Get the next move for the current game state
    /// The bot has a time limit to respond; None resigns
    fn get_move(&mut self, state: &GameState, time_limit: Duration) -> Option<Move>;

    /// Notified when the game starts
    fn game_start(&mut self, _player: Player) {}

    /// Notified when a move is made (by either player)
    fn notify_move(&mut self, _mv: Move) {}

    /// Notified when the game ends
    fn game_end(&mut self) {}
}

/// Plays a uniformly random legal move
pub struct RandomBot {
    name: String,
    rng: StdRng,
}

impl RandomBot {
    pub fn new(name: String, seed: u64) -> Self {
        RandomBot {
            name,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Bot for RandomBot {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_move(&mut self, state: &GameState, _time_limit: Duration) -> Option<Move> {
        state.legal_moves().choose(&mut self.rng).copied()
    }
}

/// Greedy one-ply bot: maximise own queen mobility minus the opponent's
pub struct GreedyBot {
    name: String,
}

impl GreedyBot {
    pub fn new(name: String) -> Self {
        GreedyBot { name }
    }

    fn evaluate_move(&self, state: &GameState, mv: &Move) -> i64 {
        let player = state.current_player();
        let next = state.board().apply(mv, player);
        next.mobility(player) as i64 - next.mobility(player.opponent()) as i64
    }
}

impl Bot for GreedyBot {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_move(&mut self, state: &GameState, _time_limit: Duration) -> Option<Move> {
        // max_by_key keeps the last maximum; reverse so the first one wins
        state
            .legal_moves()
            .into_iter()
            .rev()
            .max_by_key(|mv| self.evaluate_move(state, mv))
    }
}

/// Bot backed by the MCTS engine.
///
/// The engine keeps its tree between turns: its own move re-roots the tree
/// in `get_move`, the opponent's move is absorbed in `notify_move`. When the
/// tree stops tracking the game (first turn, rejected opponent move) the
/// position is reloaded from scratch.
pub struct MctsBot {
    name: String,
    engine: Engine,
    config: EngineConfig,
    /// Our own move, already absorbed by `select_move`
    pending: Option<Move>,
}

impl MctsBot {
    pub fn new(name: String, config: EngineConfig) -> Result<Self, EngineError> {
        Ok(MctsBot {
            name,
            engine: Engine::new(&config)?,
            config,
            pending: None,
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    fn sync(&mut self, state: &GameState) {
        let tracking = self
            .engine
            .root_state()
            .is_ok_and(|root| root == (*state.board(), state.current_player()));
        if !tracking {
            debug!(bot = %self.name, "reloading position");
            self.engine.load_board(*state.board(), state.current_player());
        }
    }

    fn think_budget(&self, time_limit: Duration) -> Duration {
        // Leave room for move selection inside the limit
        self.config.think_time().min(time_limit.mul_f64(0.8))
    }
}

impl Bot for MctsBot {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_move(&mut self, state: &GameState, time_limit: Duration) -> Option<Move> {
        self.sync(state);

        let budget = self.think_budget(time_limit);
        if let Err(e) = self.engine.think(budget, self.config.max_rollouts_per_move) {
            warn!(bot = %self.name, error = %e, "thinking failed");
        }

        match self.engine.select_move() {
            Ok(mv) => {
                let mv = mv.to_internal()?;
                self.pending = Some(mv);
                Some(mv)
            }
            Err(EngineError::NoLegalMove) => None,
            Err(e) => {
                warn!(bot = %self.name, error = %e, "move selection failed");
                None
            }
        }
    }

    fn game_start(&mut self, _player: Player) {
        self.pending = None;
    }

    fn notify_move(&mut self, mv: Move) {
        if self.pending.take() == Some(mv) {
            return;
        }
        if !self.engine.is_loaded() {
            return;
        }

        if let Err(e) = self.engine.report_opponent_move(ExternalMove::from_internal(mv)) {
            // The next get_move reloads from the observed state
            warn!(bot = %self.name, error = %e, "opponent move rejected");
        }
    }

    fn game_end(&mut self) {
        self.pending = None;
    }
}
