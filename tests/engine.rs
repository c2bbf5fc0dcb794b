use amazons_arena::*;
use std::time::Duration;

fn open_board() -> Board {
    let mut board = Board::empty();
    board.set(Position::new(0, 0), Cell::Queen(Player::One));
    board.set(Position::new(9, 9), Cell::Queen(Player::Two));
    board
}

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

#[test]
fn test_open_board_move_is_legal() {
    let mut engine = Engine::with_seed(42);
    engine.load_state(&open_board().to_rows(), 1).unwrap();

    let completed = engine.run_rollouts(3).unwrap();
    assert_eq!(completed, 3);

    let mv = engine.select_move().unwrap();
    let internal = mv.to_internal().unwrap();
    assert!(
        enumerate_actions(&open_board(), Player::One)
            .iter()
            .any(|action| action.mv == internal)
    );
}

#[test]
fn test_seeded_engines_agree() {
    let pick = |seed| {
        let mut engine = Engine::with_seed(seed);
        engine.load_board(pocket(), Player::Two);
        engine.run_rollouts(30).unwrap();
        engine.select_move().unwrap()
    };
    assert_eq!(pick(11), pick(11));
}

#[test]
fn test_parallel_batch_counts_every_rollout() {
    let config = EngineConfig {
        parallelism: 4,
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(&config).unwrap();
    engine.load_board(pocket(), Player::One);

    assert_eq!(engine.run_rollouts(64).unwrap(), 64);

    let tree = engine.tree().unwrap();
    let root = tree.root();
    assert_eq!(tree.stats(root).visit_count, 65);

    // Children only count visits from rollouts that continued through them
    let child_visits: u32 = tree
        .children(root)
        .iter()
        .map(|&child| tree.stats(child).visit_count - 1)
        .sum();
    assert!(child_visits <= 64);
}

#[test]
fn test_full_exchange_tracks_game() {
    let mut engine = Engine::with_seed(7);
    let mut game = GameState::from_board(pocket(), Player::Two);
    engine.load_board(*game.board(), game.current_player());

    while !game.is_game_over() {
        engine.think(Duration::from_secs(10), Some(15)).unwrap();
        let mv = engine.select_move().unwrap().to_internal().unwrap();
        game.make_move(mv).unwrap();
        assert_eq!(engine.root_state().unwrap(), (*game.board(), game.current_player()));

        if game.is_game_over() {
            break;
        }
        let reply = game.legal_moves()[0];
        game.make_move(reply).unwrap();
        engine
            .report_opponent_move(ExternalMove::from_internal(reply))
            .unwrap();
        assert_eq!(engine.root_state().unwrap(), (*game.board(), game.current_player()));
    }

    assert!(engine.is_terminal().unwrap());
    assert!(matches!(engine.select_move(), Err(EngineError::NoLegalMove)));
}
