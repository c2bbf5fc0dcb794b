//! Search tree with arena-allocated nodes.
//!
//! Nodes are stored in a vector of handles and referenced by [`NodeId`].
//! Every node sits behind its own mutex so rollouts can share the tree: all
//! statistics updates and child-cache inserts for a node happen while that
//! node is locked. The arena lock is only held to look up or append a handle
//! and is never held while waiting for a node, so the lock order is always
//! node, then arena.
//!
//! Re-rooting takes `&mut self`, which keeps it from running while any
//! rollout holds a reference into the tree.

use crate::game::{Action, Board, Move, Player, enumerate_actions};
use crate::node::{Node, NodeId, TerminalStatus};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::trace;

type NodeHandle = Arc<Mutex<Node>>;

fn lock(node: &Mutex<Node>) -> MutexGuard<'_, Node> {
    node.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Point-in-time copy of a node's statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeStats {
    pub visit_count: u32,
    pub win_count: u32,
    pub punishment: f64,
    pub score: f64,
    pub terminal: TerminalStatus,
}

#[derive(Debug)]
pub struct SearchTree {
    nodes: RwLock<Vec<NodeHandle>>,
    root: NodeId,
}

impl SearchTree {
    /// Create a tree holding only an unexpanded root.
    pub fn new(state: Board, player: Player) -> Self {
        Self {
            nodes: RwLock::new(vec![Arc::new(Mutex::new(Node::root(state, player)))]),
            root: NodeId(0),
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes in the arena, reachable or not.
    pub fn node_count(&self) -> usize {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn node(&self, id: NodeId) -> NodeHandle {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&nodes[id.index()])
    }

    fn allocate(&self, node: Node) -> NodeId {
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        let id = NodeId(nodes.len());
        nodes.push(Arc::new(Mutex::new(node)));
        id
    }

    /// Run `f` on a node while holding its lock.
    pub fn with_node<T>(&self, id: NodeId, f: impl FnOnce(&Node) -> T) -> T {
        let handle = self.node(id);
        let node = lock(&handle);
        f(&node)
    }

    pub fn stats(&self, id: NodeId) -> NodeStats {
        self.with_node(id, |node| NodeStats {
            visit_count: node.visit_count,
            win_count: node.win_count,
            punishment: node.punishment,
            score: node.score,
            terminal: node.terminal,
        })
    }

    pub fn state(&self, id: NodeId) -> (Board, Player) {
        self.with_node(id, |node| (node.state, node.player))
    }

    pub fn action(&self, id: NodeId) -> Option<Action> {
        self.with_node(id, |node| node.action)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.with_node(id, |node| node.children.clone())
    }

    pub fn cached_child(&self, id: NodeId, mv: &Move) -> Option<NodeId> {
        self.with_node(id, |node| node.child_cache.get(mv).copied())
    }

    pub fn cache_len(&self, id: NodeId) -> usize {
        self.with_node(id, |node| node.child_cache.len())
    }

    /// Cached child for `action`, built and cached on first use.
    fn child_locked(&self, node: &mut Node, action: &Action) -> NodeId {
        if let Some(&child) = node.child_cache.get(&action.mv) {
            return child;
        }
        let child = self.allocate(Node::child(&node.state, node.player, *action));
        node.child_cache.insert(action.mv, child);
        child
    }

    /// Resolve the child reached by `action`, creating it if needed.
    pub fn child_for(&self, id: NodeId, action: &Action) -> NodeId {
        let handle = self.node(id);
        let mut node = lock(&handle);
        self.child_locked(&mut node, action)
    }

    fn expand_locked(&self, node: &mut Node) {
        let actions = enumerate_actions(&node.state, node.player);

        let legal: HashSet<Move> = actions.iter().map(|action| action.mv).collect();
        node.child_cache.retain(|mv, _| legal.contains(mv));

        if node.terminal == TerminalStatus::Unknown {
            node.terminal = if actions.is_empty() {
                TerminalStatus::Won(node.player.opponent())
            } else {
                TerminalStatus::Ongoing
            };
        }

        if node.terminal.is_terminal() {
            node.children.clear();
            return;
        }

        let children: Vec<NodeId> = actions
            .iter()
            .map(|action| self.child_locked(node, action))
            .collect();
        node.children = children;
    }

    /// Refresh the node's legal children, reusing cached ones.
    pub fn expand(&self, id: NodeId) {
        let handle = self.node(id);
        let mut node = lock(&handle);
        self.expand_locked(&mut node);
    }

    /// One rollout from `id`: a uniform random walk down to a terminal
    /// position, backpropagating the winner on the way out.
    ///
    /// Terminal nodes return their winner untouched. Every other node on the
    /// path gains a visit, then a win (if the winner is its mover) or more
    /// punishment, and a fresh score computed against `parent_visits`.
    pub fn simulate<R: Rng>(&self, id: NodeId, parent_visits: u32, rng: &mut R) -> Player {
        let handle = self.node(id);

        let (child, visits) = {
            let mut node = lock(&handle);
            self.expand_locked(&mut node);
            if let Some(winner) = node.terminal.winner() {
                return winner;
            }

            node.visit_count += 1;

            let actions = enumerate_actions(&node.state, node.player);
            let action = actions[rng.random_range(0..actions.len())];
            (self.child_locked(&mut node, &action), node.visit_count)
        };

        let winner = self.simulate(child, visits, rng);

        lock(&handle).record(winner, parent_visits);
        winner
    }

    /// Rollout from the root, or None when the root is terminal.
    pub fn rollout<R: Rng>(&self, rng: &mut R) -> Option<Player> {
        let root = self.root;
        let parent_visits = self.with_node(root, |node| {
            (!node.terminal.is_terminal()).then_some(node.visit_count)
        })?;

        let winner = self.simulate(root, parent_visits, rng);
        trace!(%winner, "rollout finished");
        Some(winner)
    }

    /// Highest-scoring child; the earliest child wins ties.
    pub fn best_child(&self, id: NodeId) -> Option<NodeId> {
        let mut best: Option<(NodeId, f64)> = None;
        for child in self.children(id) {
            let score = self.stats(child).score;
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((child, score));
            }
        }
        best.map(|(child, _)| child)
    }

    /// Legal action from `id` whose move matches `mv` exactly.
    pub fn find_action(&self, id: NodeId, mv: &Move) -> Option<Action> {
        let (state, player) = self.state(id);
        enumerate_actions(&state, player)
            .into_iter()
            .find(|action| action.mv == *mv)
    }

    /// Make `new_root` the root and drop everything not below it.
    ///
    /// The arena is compacted: surviving nodes are renumbered in
    /// breadth-first order from the new root, which becomes `NodeId(0)`.
    pub fn reroot(&mut self, new_root: NodeId) {
        let nodes = self.nodes.get_mut().unwrap_or_else(PoisonError::into_inner);
        let old = std::mem::take(nodes);

        let mut remap: HashMap<NodeId, NodeId> = HashMap::from([(new_root, NodeId(0))]);
        let mut order = vec![new_root];
        let mut next = 0;
        while next < order.len() {
            let node = lock(&old[order[next].index()]);
            for &child in node.child_cache.values() {
                remap.entry(child).or_insert_with(|| {
                    order.push(child);
                    NodeId(order.len() - 1)
                });
            }
            next += 1;
        }

        *nodes = order
            .iter()
            .map(|id| {
                let handle = Arc::clone(&old[id.index()]);
                {
                    let mut node = lock(&handle);
                    for child in node.children.iter_mut() {
                        *child = remap[&*child];
                    }
                    for child in node.child_cache.values_mut() {
                        *child = remap[&*child];
                    }
                }
                handle
            })
            .collect();

        trace!(kept = nodes.len(), dropped = old.len() - nodes.len(), "re-rooted search tree");
        self.root = NodeId(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Cell, Position};
    use crate::node::{INITIAL_PUNISHMENT, PUNISHMENT_STEP};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    /// Top-left 3x4 pocket open, everything else blocked.
    fn pocket() -> Board {
        let mut board = Board::empty();
        for pos in Position::all() {
            if pos.row > 2 || pos.col > 3 {
                board.set(pos, Cell::Arrow);
            }
        }
        board.set(Position::new(0, 0), Cell::Queen(Player::One));
        board.set(Position::new(2, 3), Cell::Queen(Player::Two));
        board
    }

    fn trapped() -> Board {
        let mut board = Board::empty();
        board.set(Position::new(0, 0), Cell::Queen(Player::One));
        board.set(Position::new(0, 1), Cell::Arrow);
        board.set(Position::new(1, 0), Cell::Arrow);
        board.set(Position::new(1, 1), Cell::Arrow);
        board.set(Position::new(5, 5), Cell::Queen(Player::Two));
        board
    }

    #[test]
    fn test_new_tree() {
        let tree = SearchTree::new(pocket(), Player::One);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.root(), NodeId(0));
        assert_eq!(tree.stats(tree.root()).terminal, TerminalStatus::Unknown);
    }

    #[test]
    fn test_expand_builds_children_in_enumeration_order() {
        let tree = SearchTree::new(pocket(), Player::One);
        let root = tree.root();
        tree.expand(root);

        let actions = enumerate_actions(&pocket(), Player::One);
        let children = tree.children(root);
        assert_eq!(children.len(), actions.len());
        for (child, action) in children.iter().zip(&actions) {
            assert_eq!(tree.action(*child).map(|a| a.mv), Some(action.mv));
            assert_eq!(tree.state(*child).1, Player::Two);
        }
        assert_eq!(tree.stats(root).terminal, TerminalStatus::Ongoing);
    }

    #[test]
    fn test_expand_is_idempotent() {
        let tree = SearchTree::new(pocket(), Player::One);
        let root = tree.root();
        tree.expand(root);
        let first = tree.children(root);
        let nodes = tree.node_count();

        tree.expand(root);

        assert_eq!(tree.children(root), first);
        assert_eq!(tree.cache_len(root), first.len());
        assert_eq!(tree.node_count(), nodes);
    }

    #[test]
    fn test_expand_marks_trapped_mover_as_loser() {
        let tree = SearchTree::new(trapped(), Player::One);
        let root = tree.root();
        tree.expand(root);

        assert_eq!(tree.stats(root).terminal, TerminalStatus::Won(Player::Two));
        assert!(tree.children(root).is_empty());
    }

    #[test]
    fn test_terminal_rollout_is_noop() {
        let tree = SearchTree::new(trapped(), Player::One);
        tree.expand(tree.root());
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(tree.rollout(&mut rng), None);
        assert_eq!(tree.stats(tree.root()).visit_count, 1);
    }

    #[test]
    fn test_simulate_on_terminal_node_returns_winner() {
        let tree = SearchTree::new(trapped(), Player::One);
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(tree.simulate(tree.root(), 1, &mut rng), Player::Two);
        let stats = tree.stats(tree.root());
        assert_eq!(stats.visit_count, 1);
        assert_eq!(stats.score, f64::INFINITY);
    }

    #[test]
    fn test_rollouts_update_root_statistics() {
        let tree = SearchTree::new(pocket(), Player::One);
        tree.expand(tree.root());
        let mut rng = StdRng::seed_from_u64(7);

        let rollouts = 20;
        let mut wins = 0;
        for _ in 0..rollouts {
            if tree.rollout(&mut rng) == Some(Player::One) {
                wins += 1;
            }
        }

        let stats = tree.stats(tree.root());
        assert_eq!(stats.visit_count, 1 + rollouts);
        assert_eq!(stats.win_count, wins);
        let losses = (rollouts - wins) as f64;
        assert!((stats.punishment - (INITIAL_PUNISHMENT + PUNISHMENT_STEP * losses)).abs() < 1e-9);
        assert!(stats.score.is_finite());
    }

    #[test]
    fn test_rollouts_are_reproducible_with_seed() {
        let run = |seed| {
            let tree = SearchTree::new(pocket(), Player::One);
            tree.expand(tree.root());
            let mut rng = StdRng::seed_from_u64(seed);
            (0..10).map(|_| tree.rollout(&mut rng)).collect::<Vec<_>>()
        };
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn test_best_child_prefers_unscored_then_first() {
        let tree = SearchTree::new(pocket(), Player::One);
        let root = tree.root();
        tree.expand(root);

        // Nothing simulated: every child is at +inf, the first one wins
        let children = tree.children(root);
        assert_eq!(tree.best_child(root), Some(children[0]));
    }

    #[test]
    fn test_best_child_picks_highest_score() {
        let tree = SearchTree::new(pocket(), Player::One);
        let root = tree.root();
        tree.expand(root);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..30 {
            tree.rollout(&mut rng);
        }

        let best = tree.best_child(root).unwrap();
        let best_score = tree.stats(best).score;
        for child in tree.children(root) {
            assert!(tree.stats(child).score <= best_score);
        }
    }

    #[test]
    fn test_find_action_matches_full_move() {
        let tree = SearchTree::new(pocket(), Player::One);
        let action = enumerate_actions(&pocket(), Player::One)[5];

        assert_eq!(tree.find_action(tree.root(), &action.mv), Some(action));

        let bogus = Move::new(Position::new(0, 0), Position::new(9, 9), Position::new(8, 8));
        assert_eq!(tree.find_action(tree.root(), &bogus), None);
    }

    fn most_visited_child(tree: &SearchTree, id: NodeId) -> NodeId {
        tree.children(id)
            .into_iter()
            .max_by_key(|&child| tree.stats(child).visit_count)
            .unwrap()
    }

    /// Move and statistics of every child, in children order
    fn child_summary(tree: &SearchTree, id: NodeId) -> Vec<(Move, NodeStats)> {
        tree.children(id)
            .into_iter()
            .map(|child| (tree.action(child).unwrap().mv, tree.stats(child)))
            .collect()
    }

    #[test]
    fn test_reroot_keeps_subtree_statistics() {
        let mut tree = SearchTree::new(pocket(), Player::One);
        let root = tree.root();
        tree.expand(root);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..25 {
            tree.rollout(&mut rng);
        }

        let target = most_visited_child(&tree, root);
        let before = tree.stats(target);
        assert!(before.visit_count > 1);
        let state = tree.state(target);
        let grandchildren = child_summary(&tree, target);
        assert!(!grandchildren.is_empty());

        tree.reroot(target);

        assert_eq!(tree.root(), NodeId(0));
        assert_eq!(tree.stats(tree.root()), before);
        assert_eq!(tree.state(tree.root()), state);
        assert_eq!(child_summary(&tree, tree.root()), grandchildren);
        for child in tree.children(tree.root()) {
            assert!(child.index() < tree.node_count());
            assert_eq!(tree.state(child).1, state.1.opponent());
        }
    }

    #[test]
    fn test_reroot_discards_siblings() {
        let mut tree = SearchTree::new(pocket(), Player::One);
        let root = tree.root();
        tree.expand(root);
        let before = tree.node_count();
        let target = tree.children(root)[0];

        tree.reroot(target);

        assert_eq!(tree.node_count(), 1);
        assert!(tree.node_count() < before);
    }

    #[test]
    fn test_parallel_rollouts_do_not_lose_updates() {
        use rayon::prelude::*;

        let tree = SearchTree::new(pocket(), Player::One);
        tree.expand(tree.root());

        let rollouts = 64u64;
        (0..rollouts).into_par_iter().for_each(|seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            tree.rollout(&mut rng);
        });

        let stats = tree.stats(tree.root());
        assert_eq!(stats.visit_count as u64, 1 + rollouts);
        let losses = (stats.punishment - INITIAL_PUNISHMENT) / PUNISHMENT_STEP;
        assert_eq!(stats.win_count as u64 + losses.round() as u64, rollouts);
        // No duplicate children for the same move
        assert_eq!(tree.cache_len(tree.root()), tree.children(tree.root()).len());
    }
}
