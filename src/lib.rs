pub mod arena;
pub mod bot;
pub mod config;
pub mod engine;
pub mod game;
pub mod node;
pub mod tree;

pub use arena::*;
pub use bot::*;
pub use config::*;
pub use engine::*;
pub use game::*;
pub use node::{Node, NodeId, TerminalStatus};
pub use tree::*;
