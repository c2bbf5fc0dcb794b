//! Search tree node.
//!
//! A node is one board position together with the statistics gathered by
//! rollouts passing through it. Nodes live in the arena owned by
//! [`SearchTree`](crate::tree::SearchTree) and refer to each other by [`NodeId`].

use crate::game::{Action, Board, Move, Player};
use std::collections::HashMap;
use std::f64::consts::SQRT_2;

/// Punishment carried by a node that has not lost a rollout yet.
pub const INITIAL_PUNISHMENT: f64 = 0.4;
/// Added to the punishment for every rollout that does not credit the mover.
pub const PUNISHMENT_STEP: f64 = 0.3;
/// Exploration constant of the confidence bound.
pub const EXPLORATION: f64 = SQRT_2;

/// Index into the node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminalStatus {
    /// Legal actions not computed yet
    #[default]
    Unknown,
    Ongoing,
    Won(Player),
}

impl TerminalStatus {
    pub fn winner(&self) -> Option<Player> {
        match self {
            TerminalStatus::Won(player) => Some(*player),
            TerminalStatus::Unknown | TerminalStatus::Ongoing => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.winner().is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    /// Position at this node, fixed at construction
    pub state: Board,

    /// Player who acts from this position
    pub player: Player,

    /// Action that produced this node (None for a freshly loaded root)
    pub action: Option<Action>,

    /// Starts at 1: a new node counts as visited once
    pub visit_count: u32,

    /// Rollouts through this node won by `player`
    pub win_count: u32,

    pub punishment: f64,

    /// Selection score; +inf until the first backpropagation
    pub score: f64,

    /// Currently legal children in enumeration order
    pub children: Vec<NodeId>,

    /// Every child built so far, keyed by the move leading to it
    pub child_cache: HashMap<Move, NodeId>,

    pub terminal: TerminalStatus,
}

impl Node {
    pub fn new(state: Board, player: Player, action: Option<Action>) -> Self {
        Self {
            state,
            player,
            action,
            visit_count: 1,
            win_count: 0,
            punishment: INITIAL_PUNISHMENT,
            score: f64::INFINITY,
            children: Vec::new(),
            child_cache: HashMap::new(),
            terminal: TerminalStatus::Unknown,
        }
    }

    /// Create a root node for a loaded position.
    pub fn root(state: Board, player: Player) -> Self {
        Self::new(state, player, None)
    }

    /// Create the node reached by `player` playing `action` from `state`.
    pub fn child(state: &Board, player: Player, action: Action) -> Self {
        Self::new(state.apply(&action.mv, player), player.opponent(), Some(action))
    }

    #[inline]
    pub fn average_win(&self) -> f64 {
        self.win_count as f64 / self.visit_count as f64
    }

    /// Confidence bound minus punishment, relative to the parent's visit count.
    pub fn update_score(&mut self, parent_visits: u32) {
        let exploration = ((parent_visits as f64).ln() / self.visit_count as f64).sqrt();
        self.score = self.average_win() + EXPLORATION * exploration - self.punishment;
    }

    /// Backpropagate one finished rollout.
    pub fn record(&mut self, winner: Player, parent_visits: u32) {
        if winner == self.player {
            self.win_count += 1;
        } else {
            self.punishment += PUNISHMENT_STEP;
        }
        self.update_score(parent_visits);
    }
}
