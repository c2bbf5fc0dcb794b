use amazons_arena::*;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "amazons-arena")]
#[command(about = "Play an MCTS Amazons engine against a greedy bot")]
struct Args {
    /// JSON arena config; built-in defaults when omitted
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes priority
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "loading config");
            ArenaConfig::from_json_file(path)?
        }
        None => ArenaConfig::default(),
    };

    info!(
        parallelism = config.engine.parallelism,
        think_time_ms = config.engine.think_time_ms,
        time_per_move_ms = config.match_config.time_per_move_ms,
        "Amazons arena starting"
    );

    // Engine plays player two and therefore opens
    let greedy = Box::new(GreedyBot::new("GreedyBot".to_string()));
    let mcts = Box::new(MctsBot::new("MctsBot".to_string(), config.engine.clone())?);

    let mut game = Match::new(greedy, mcts, config.match_config.clone());
    let result = game.play();

    match &result {
        MatchResult::PlayerOneWins { winner_name, moves } => {
            info!("{} wins as player one in {} moves", winner_name, moves);
        }
        MatchResult::PlayerTwoWins { winner_name, moves } => {
            info!("{} wins as player two in {} moves", winner_name, moves);
        }
        MatchResult::Timeout { violator, winner } => {
            info!("{} wins by timeout (opponent: {})", winner, violator);
        }
        MatchResult::IllegalMove { violator, winner } => {
            info!("{} wins by illegal move (opponent: {})", winner, violator);
        }
        MatchResult::Resigned { violator, winner } => {
            info!("{} wins by resignation (opponent: {})", winner, violator);
        }
        MatchResult::Unfinished { moves } => {
            info!("Unfinished after {} moves", moves);
        }
    }
    println!("{}", game.state().display_board());

    Ok(())
}
