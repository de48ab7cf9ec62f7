//! Request routing and server state.

use std::net::{TcpListener, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use gz_core::{Config, Stone};
use gz_infer::{InferError, LinearModel, ModelWatcher};
use gz_logging::now_ms;
use gz_mcts::{propose_opening, second_player_choice, Mcts};
use gz_replay::{board_to_state, state_to_board};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::book::OpeningBook;
use crate::http::{read_request, write_response, Request, Response};
use crate::think::{compute_think_time, ThinkRequest};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("model: {0}")]
    Model(#[from] InferError),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetMoveRequest {
    board: Vec<Vec<Option<Stone>>>,
    player: Stone,
    #[serde(default)]
    moves: Option<Vec<[i16; 2]>>,
    #[serde(default)]
    turn_ends_at: Option<u64>,
    #[serde(default)]
    time_left_ms: Option<u64>,
    #[serde(default)]
    turn_limit_ms: Option<u64>,
    #[serde(default)]
    force_think_time_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Swap2SecondRequest {
    board: Vec<Vec<Option<Stone>>>,
}

struct ServerState {
    cfg: Config,
    model: RwLock<Arc<LinearModel>>,
    model_path: PathBuf,
    mcts: Mutex<Mcts>,
    book: OpeningBook,
}

/// The running listener plus its background threads.
pub struct Server {
    addr: std::net::SocketAddr,
    stop: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
    reload_thread: Option<JoinHandle<()>>,
}

impl Server {
    /// Load the model and book, bind the listener, and start serving.
    pub fn start(cfg: Config, addr: impl ToSocketAddrs) -> Result<Server, ServerError> {
        let model_path = PathBuf::from(&cfg.paths.model_dir);
        let model = Arc::new(LinearModel::load(&model_path)?);
        let book = match &cfg.server.opening_book_path {
            Some(p) => OpeningBook::load(Path::new(p)).unwrap_or_else(|e| {
                eprintln!("opening book unavailable ({e}); serving without it");
                OpeningBook::empty()
            }),
            None => OpeningBook::empty(),
        };
        let mcts = Mcts::new(
            {
                // Competitive play: no exploration noise at serve time.
                let mut m = cfg.mcts.clone();
                m.dirichlet_epsilon = 0.0;
                m
            },
            cfg.tactics.clone(),
            5_000,
            now_ms(),
        );

        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let local = listener.local_addr()?;

        let state = Arc::new(ServerState {
            cfg,
            model: RwLock::new(model),
            model_path,
            mcts: Mutex::new(mcts),
            book,
        });

        let stop = Arc::new(AtomicBool::new(false));

        let accept_state = state.clone();
        let accept_stop = stop.clone();
        let accept_thread = std::thread::spawn(move || {
            accept_loop(listener, accept_state, accept_stop);
        });

        let reload_state = state.clone();
        let reload_stop = stop.clone();
        let reload_thread = std::thread::spawn(move || {
            reload_loop(reload_state, reload_stop);
        });

        Ok(Server {
            addr: local,
            stop,
            accept_thread: Some(accept_thread),
            reload_thread: Some(reload_thread),
        })
    }

    pub fn addr(&self) -> std::net::SocketAddr {
        self.addr
    }

    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(h) = self.accept_thread.take() {
            let _ = h.join();
        }
        if let Some(h) = self.reload_thread.take() {
            let _ = h.join();
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

fn accept_loop(listener: TcpListener, state: Arc<ServerState>, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((mut stream, _peer)) => {
                let _ = stream.set_nonblocking(false);
                let _ = stream.set_read_timeout(Some(Duration::from_secs(10)));
                let state = state.clone();
                std::thread::spawn(move || {
                    let resp = match read_request(&mut stream) {
                        Some(req) => route(&state, req),
                        None => Response::json(400, json!({"error": "malformed request"})),
                    };
                    let _ = write_response(&mut stream, &resp);
                });
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(25));
            }
            Err(_) => break,
        }
    }
}

/// Periodic model staleness check (file mtime, or remote ETag when a model
/// URL is configured).
fn reload_loop(state: Arc<ServerState>, stop: Arc<AtomicBool>) {
    let mut watcher = ModelWatcher::new(&state.model_path, state.cfg.paths.model_url.clone());
    // Prime the watcher with the already-loaded model.
    let _ = watcher.check_reload();

    let interval = Duration::from_millis(state.cfg.server.model_check_interval_ms.max(100));
    let mut next_check = Instant::now() + interval;
    while !stop.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(50));
        if Instant::now() < next_check {
            continue;
        }
        next_check = Instant::now() + interval;
        match watcher.check_reload() {
            Ok(Some(model)) => {
                *state.model.write().expect("model lock") = Arc::new(model);
            }
            Ok(None) => {}
            Err(e) => eprintln!("model reload failed: {e}"),
        }
    }
}

fn route(state: &ServerState, req: Request) -> Response {
    match (req.method.as_str(), req.path.as_str()) {
        ("POST", "/get-move") => get_move(state, &req.body),
        ("GET", "/health") => health(state),
        ("POST", "/swap2/propose") => swap2_propose(state),
        ("POST", "/swap2/second") => swap2_second(state, &req.body),
        _ => Response::json(404, json!({"error": "not found"})),
    }
}

fn health(state: &ServerState) -> Response {
    Response::json(
        200,
        json!({
            "ok": true,
            "modelPath": state.model_path.display().to_string(),
        }),
    )
}

fn get_move(state: &ServerState, body: &[u8]) -> Response {
    let req: GetMoveRequest = match serde_json::from_slice(body) {
        Ok(r) => r,
        Err(e) => return Response::json(400, json!({"error": format!("bad request: {e}")})),
    };

    let model = state.model.read().expect("model lock").clone();
    if req.board.len() != model.board_size() {
        return Response::json(
            400,
            json!({"error": format!(
                "board size {} does not match model size {}",
                req.board.len(),
                model.board_size()
            )}),
        );
    }
    let Some(board) = state_to_board(&req.board) else {
        return Response::json(400, json!({"error": "ragged board"}));
    };

    let move_count = req
        .moves
        .as_ref()
        .map(|m| m.len())
        .unwrap_or_else(|| board.stone_count());

    // The opening book answers shallow positions without a search.
    if move_count <= state.cfg.server.book_max_moves {
        if let Some(mv) = state.book.lookup(&board) {
            return Response::json(
                200,
                json!({"move": [mv.row, mv.col], "source": "book"}),
            );
        }
    }

    let think_ms = compute_think_time(
        ThinkRequest {
            force_think_time_ms: req.force_think_time_ms,
            time_left_ms: req.time_left_ms,
            turn_limit_ms: req.turn_limit_ms,
            turn_ends_at_ms: req.turn_ends_at,
        },
        move_count,
        &state.cfg.server.time_control,
        now_ms(),
    );

    let mut mcts = state.mcts.lock().expect("mcts lock");
    match mcts.find_best_move(&board, req.player, think_ms, model.as_ref()) {
        Ok(result) => Response::json(200, json!({"move": [result.best.row, result.best.col]})),
        Err(e) => Response::json(500, json!({"error": e.to_string()})),
    }
}

fn swap2_propose(state: &ServerState) -> Response {
    let model = state.model.read().expect("model lock");
    let board = propose_opening(model.board_size());
    Response::json(
        200,
        json!({
            "board": board_to_state(&board),
            "toMove": "white",
        }),
    )
}

fn swap2_second(state: &ServerState, body: &[u8]) -> Response {
    let req: Swap2SecondRequest = match serde_json::from_slice(body) {
        Ok(r) => r,
        Err(e) => return Response::json(400, json!({"error": format!("bad request: {e}")})),
    };
    let model = state.model.read().expect("model lock").clone();
    if req.board.len() != model.board_size() {
        return Response::json(400, json!({"error": "board size mismatch"}));
    }
    let Some(board) = state_to_board(&req.board) else {
        return Response::json(400, json!({"error": "ragged board"}));
    };

    match second_player_choice(
        &board,
        model.as_ref(),
        state.cfg.selfplay.swap2_rollout_plies,
        state.cfg.selfplay.swap2_budget_ms,
    ) {
        Ok(out) => Response::json(
            200,
            json!({
                "board": board_to_state(&out.board),
                "toMove": match out.to_move {
                    Stone::Black => "black",
                    Stone::White => "white",
                },
                "swapColors": out.swap_colors,
            }),
        ),
        Err(e) => Response::json(500, json!({"error": e.to_string()})),
    }
}
