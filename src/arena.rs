use crate::bot::Bot;
use crate::config::MatchConfig;
use crate::game::{GameResult, GameState, Move, Player};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    PlayerOneWins { winner_name: String, moves: usize },
    PlayerTwoWins { winner_name: String, moves: usize },
    Timeout { violator: String, winner: String },
    IllegalMove { violator: String, winner: String },
    Resigned { violator: String, winner: String },
    /// Move limit reached with both sides still able to move
    Unfinished { moves: usize },
}

impl MatchResult {
    pub fn winner(&self) -> Option<&str> {
        match self {
            MatchResult::PlayerOneWins { winner_name, .. } => Some(winner_name),
            MatchResult::PlayerTwoWins { winner_name, .. } => Some(winner_name),
            MatchResult::Timeout { winner, .. } => Some(winner),
            MatchResult::IllegalMove { winner, .. } => Some(winner),
            MatchResult::Resigned { winner, .. } => Some(winner),
            MatchResult::Unfinished { .. } => None,
        }
    }
}

/// One game between two bots, refereed move by move.
pub struct Match {
    config: MatchConfig,
    state: GameState,
    player_one_bot: Box<dyn Bot>,
    player_two_bot: Box<dyn Bot>,
}

impl Match {
    /// Match on the standard opening position.
    pub fn new(player_one_bot: Box<dyn Bot>, player_two_bot: Box<dyn Bot>, config: MatchConfig) -> Self {
        Self::with_state(player_one_bot, player_two_bot, config, GameState::new())
    }

    pub fn with_state(
        player_one_bot: Box<dyn Bot>,
        player_two_bot: Box<dyn Bot>,
        config: MatchConfig,
        state: GameState,
    ) -> Self {
        Match {
            config,
            state,
            player_one_bot,
            player_two_bot,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn play(&mut self) -> MatchResult {
        self.player_one_bot.game_start(Player::One);
        self.player_two_bot.game_start(Player::Two);

        info!(
            player_one = self.player_one_bot.name(),
            player_two = self.player_two_bot.name(),
            first = %self.state.current_player(),
            "match starting"
        );
        debug!("initial board:\n{}", self.state.display_board());

        let result = loop {
            if self.state.is_game_over() || self.state.move_count() >= self.config.max_moves {
                break self.final_result();
            }
            if let Some(result) = self.play_move() {
                break result;
            }
        };

        self.player_one_bot.game_end();
        self.player_two_bot.game_end();
        result
    }

    fn bot_name(&self, player: Player) -> &str {
        match player {
            Player::One => self.player_one_bot.name(),
            Player::Two => self.player_two_bot.name(),
        }
    }

    fn final_result(&self) -> MatchResult {
        let moves = self.state.move_count();
        match self.state.result() {
            Some(GameResult::PlayerOneWins) => {
                let winner_name = self.bot_name(Player::One).to_string();
                info!(winner = %winner_name, moves, "player one wins");
                MatchResult::PlayerOneWins { winner_name, moves }
            }
            Some(GameResult::PlayerTwoWins) => {
                let winner_name = self.bot_name(Player::Two).to_string();
                info!(winner = %winner_name, moves, "player two wins");
                MatchResult::PlayerTwoWins { winner_name, moves }
            }
            None => {
                info!(max_moves = self.config.max_moves, "move limit reached");
                MatchResult::Unfinished { moves }
            }
        }
    }

    fn play_move(&mut self) -> Option<MatchResult> {
        let current_player = self.state.current_player();
        let time_limit = self.config.time_per_move();
        let bot = match current_player {
            Player::One => &mut self.player_one_bot,
            Player::Two => &mut self.player_two_bot,
        };

        debug!(
            move_number = self.state.move_count() + 1,
            bot = bot.name(),
            legal_moves = self.state.legal_moves().len(),
            "to play"
        );

        let start = Instant::now();
        let mv = bot.get_move(&self.state, time_limit);
        let elapsed = start.elapsed();

        self.handle_move_result(mv, elapsed, current_player)
    }

    fn handle_move_result(&mut self, mv: Option<Move>, elapsed: Duration, current_player: Player) -> Option<MatchResult> {
        let violator = self.bot_name(current_player).to_string();
        let winner = self.bot_name(current_player.opponent()).to_string();

        if elapsed > self.config.time_per_move() {
            warn!(bot = %violator, ?elapsed, limit = ?self.config.time_per_move(), "timeout");
            return Some(MatchResult::Timeout { violator, winner });
        }

        let Some(mv) = mv else {
            info!(bot = %violator, "resigned");
            return Some(MatchResult::Resigned { violator, winner });
        };

        if let Err(e) = self.state.make_move(mv) {
            warn!(bot = %violator, %mv, error = %e, "illegal move");
            return Some(MatchResult::IllegalMove { violator, winner });
        }
        debug!(bot = %violator, %mv, ?elapsed, "played");

        self.player_one_bot.notify_move(mv);
        self.player_two_bot.notify_move(mv);

        debug!("\n{}", self.state.display_board());
        None
    }
}
