use amazons_arena::*;

fn pocket_state() -> GameState {
    let mut board = Board::empty();
    for pos in Position::all() {
        if pos.row > 3 || pos.col > 3 {
            board.set(pos, Cell::Arrow);
        }
    }
    board.set(Position::new(0, 0), Cell::Queen(Player::One));
    board.set(Position::new(3, 3), Cell::Queen(Player::Two));
    GameState::from_board(board, Player::Two)
}

#[test]
fn test_mcts_against_greedy_completes() {
    let engine = EngineConfig {
        think_time_ms: 5_000,
        max_rollouts_per_move: Some(25),
        ..EngineConfig::default()
    };
    let config = MatchConfig {
        time_per_move_ms: 20_000,
        ..MatchConfig::default()
    };
    let greedy = Box::new(GreedyBot::new("Greedy".to_string()));
    let mcts = Box::new(MctsBot::new("Mcts".to_string(), engine).unwrap());

    let mut game = Match::with_state(greedy, mcts, config, pocket_state());
    let result = game.play();

    assert!(game.state().is_game_over());
    let expected = match game.state().result().unwrap().winner() {
        Player::One => "Greedy",
        Player::Two => "Mcts",
    };
    assert_eq!(result.winner(), Some(expected));
}

#[test]
fn test_arena_config_drives_match() {
    let config = ArenaConfig::from_json_str(
        r#"{ "engine": { "seed": 3, "max_rollouts_per_move": 5 }, "match": { "max_moves": 1 } }"#,
    )
    .unwrap();
    let greedy = Box::new(GreedyBot::new("Greedy".to_string()));
    let mcts = Box::new(MctsBot::new("Mcts".to_string(), config.engine.clone()).unwrap());

    let mut game = Match::with_state(greedy, mcts, config.match_config, pocket_state());

    assert_eq!(game.play(), MatchResult::Unfinished { moves: 1 });
}
