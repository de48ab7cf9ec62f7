//! Drive the real listener with an HTTP client.

use gz_core::{Config, Move, Stone};
use gz_infer::LinearModel;
use gz_server::Server;
use serde_json::{json, Value};

fn empty_board(n: usize) -> Vec<Vec<Option<&'static str>>> {
    vec![vec![None; n]; n]
}

fn start_server(cfg_mut: impl FnOnce(&mut Config, &std::path::Path)) -> (Server, String, tempfile::TempDir) {
    let root = tempfile::tempdir().unwrap();
    let model_dir = root.path().join("model");
    LinearModel::create_random(&model_dir, 9, 77).unwrap();

    let mut cfg = Config::default();
    cfg.board.size = 9;
    cfg.paths.model_dir = model_dir.display().to_string();
    cfg.mcts.fast_mode = true;
    cfg.tactics.node_cap = 2_000;
    cfg.selfplay.swap2_budget_ms = 150;
    cfg_mut(&mut cfg, root.path());

    let server = Server::start(cfg, "127.0.0.1:0").unwrap();
    let base = format!("http://{}", server.addr());
    (server, base, root)
}

#[test]
fn health_reports_the_model() {
    let (server, base, _root) = start_server(|_, _| {});
    let resp: Value = ureq::get(&format!("{base}/health"))
        .call()
        .unwrap()
        .into_json()
        .unwrap();
    assert_eq!(resp["ok"], true);
    assert!(resp["modelPath"].as_str().unwrap().contains("model"));
    server.stop();
}

#[test]
fn get_move_opens_in_the_center() {
    let (server, base, _root) = start_server(|_, _| {});
    let resp: Value = ureq::post(&format!("{base}/get-move"))
        .send_json(json!({
            "board": empty_board(9),
            "player": "black",
            "forceThinkTimeMs": 200,
        }))
        .unwrap()
        .into_json()
        .unwrap();
    assert_eq!(resp["move"], json!([4, 4]));
    server.stop();
}

#[test]
fn wrong_board_size_is_a_400() {
    let (server, base, _root) = start_server(|_, _| {});
    let err = ureq::post(&format!("{base}/get-move"))
        .send_json(json!({
            "board": empty_board(15),
            "player": "black",
        }))
        .unwrap_err();
    match err {
        ureq::Error::Status(code, resp) => {
            assert_eq!(code, 400);
            let v: Value = resp.into_json().unwrap();
            assert!(v["error"].as_str().unwrap().contains("board size"));
        }
        other => panic!("expected status error, got {other}"),
    }
    server.stop();
}

#[test]
fn malformed_json_is_a_400() {
    let (server, base, _root) = start_server(|_, _| {});
    let err = ureq::post(&format!("{base}/get-move"))
        .set("Content-Type", "application/json")
        .send_string("{not json")
        .unwrap_err();
    match err {
        ureq::Error::Status(code, _) => assert_eq!(code, 400),
        other => panic!("expected status error, got {other}"),
    }
    server.stop();
}

#[test]
fn book_hit_answers_with_source_book() {
    let (server, base, _root) = start_server(|cfg, root| {
        // One book entry on the 9x9 board: stone at (4,4), reply (4,5).
        let mut board = gz_core::Board::new(9);
        board.place(Move::new(4, 4), Stone::Black);
        let book = json!([{ "board_hash": board.key(), "best_move": [4, 5], "move_count": 1 }]);
        let path = root.join("book.json");
        std::fs::write(&path, serde_json::to_vec(&book).unwrap()).unwrap();
        cfg.server.opening_book_path = Some(path.display().to_string());
    });

    let mut board = empty_board(9);
    board[4][4] = Some("black");
    let resp: Value = ureq::post(&format!("{base}/get-move"))
        .send_json(json!({
            "board": board,
            "player": "white",
            "moves": [[4, 4]],
        }))
        .unwrap()
        .into_json()
        .unwrap();
    assert_eq!(resp["source"], "book");
    assert_eq!(resp["move"], json!([4, 5]));
    server.stop();
}

#[test]
fn swap2_endpoints_negotiate_an_opening() {
    let (server, base, _root) = start_server(|_, _| {});

    let proposal: Value = ureq::post(&format!("{base}/swap2/propose"))
        .send_json(json!({}))
        .unwrap()
        .into_json()
        .unwrap();
    assert_eq!(proposal["toMove"], "white");
    let board = proposal["board"].clone();
    let stones: usize = board
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|row| row.as_array().unwrap())
        .filter(|c| !c.is_null())
        .count();
    assert_eq!(stones, 3);

    let second: Value = ureq::post(&format!("{base}/swap2/second"))
        .send_json(json!({ "board": board }))
        .unwrap()
        .into_json()
        .unwrap();
    assert!(second["swapColors"].is_boolean());
    assert!(second["toMove"] == "white" || second["toMove"] == "black");
    server.stop();
}

#[test]
fn unknown_route_is_a_404() {
    let (server, base, _root) = start_server(|_, _| {});
    let err = ureq::get(&format!("{base}/nope")).call().unwrap_err();
    match err {
        ureq::Error::Status(code, _) => assert_eq!(code, 404),
        other => panic!("expected status error, got {other}"),
    }
    server.stop();
}
