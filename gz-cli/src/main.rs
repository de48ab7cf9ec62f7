//! gz: the gomoku-zero pipeline CLI.
//!
//! Subcommands:
//! - selfplay      Run one self-play window and flush replay samples
//! - gate          Arena-gate the candidate model against production
//! - pipeline      Run full cycles (self-play -> distill -> gate -> publish)
//! - serve         Start the inference HTTP server
//! - bestmove      One-shot position analysis for debugging

use std::path::{Path, PathBuf};
use std::process;

use gz_core::{Config, Stone};
use gz_infer::{model_fingerprint, LinearModel};
use gz_mcts::Mcts;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        print_help();
        process::exit(2);
    };
    match command.as_str() {
        "selfplay" => cmd_selfplay(&args[1..]),
        "gate" => cmd_gate(&args[1..]),
        "pipeline" => cmd_pipeline(&args[1..]),
        "serve" => cmd_serve(&args[1..]),
        "bestmove" => cmd_bestmove(&args[1..]),
        "-h" | "--help" => print_help(),
        "-V" | "--version" => println!("gz {}", env!("CARGO_PKG_VERSION")),
        other => {
            eprintln!("Unknown command: {other}");
            print_help();
            process::exit(2);
        }
    }
}

fn print_help() {
    eprintln!(
        r#"gz - gomoku-zero pipeline CLI

USAGE:
    gz <COMMAND> [OPTIONS]

COMMANDS:
    selfplay    Run one self-play window and flush replay samples
    gate        Arena-gate the candidate model against production
    pipeline    Run full cycles (self-play -> distill -> gate -> publish)
    serve       Start the inference HTTP server
    bestmove    One-shot position analysis for debugging

OPTIONS (all commands):
    --config PATH   Load YAML configuration (GZ_* env vars override)
    --seed S        Base RNG seed (default: 0)
    -h, --help      Print help
"#
    );
}

struct CommonArgs {
    config: Option<PathBuf>,
    seed: u64,
    rest: Vec<String>,
}

fn parse_common(args: &[String], usage: &str) -> CommonArgs {
    let mut out = CommonArgs {
        config: None,
        seed: 0,
        rest: Vec::new(),
    };
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!("{usage}");
                process::exit(0);
            }
            "--config" => {
                out.config = Some(PathBuf::from(expect_value(args, i, "--config")));
                i += 2;
            }
            "--seed" => {
                out.seed = expect_value(args, i, "--seed").parse().unwrap_or_else(|_| {
                    eprintln!("Invalid --seed value: {}", args[i + 1]);
                    process::exit(2);
                });
                i += 2;
            }
            _ => {
                out.rest.push(args[i].clone());
                i += 1;
            }
        }
    }
    out
}

fn expect_value<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i + 1) {
        Some(v) => v,
        None => {
            eprintln!("Missing value for {flag}");
            process::exit(2);
        }
    }
}

fn load_config(path: Option<&Path>) -> Config {
    match Config::load_with_env(path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            process::exit(2);
        }
    }
}

fn cmd_selfplay(args: &[String]) {
    let common = parse_common(
        args,
        "gz selfplay [--config PATH] [--seed S]\n\nRuns one self-play window per the configuration.",
    );
    reject_extras(&common.rest, "selfplay");
    let cfg = load_config(common.config.as_deref());

    match gz_selfplay::run_orchestrator(&cfg, common.seed) {
        Ok(report) => {
            println!(
                "self-play done: {} games, {} samples in {} files ({} crashes)",
                report.games_completed,
                report.samples_written,
                report.files_written,
                report.worker_crashes
            );
        }
        Err(e) => {
            eprintln!("self-play failed: {e}");
            process::exit(1);
        }
    }
}

fn cmd_gate(args: &[String]) {
    let common = parse_common(
        args,
        "gz gate [--config PATH] [--seed S]\n\nPlays the arena match between the candidate and production models.",
    );
    reject_extras(&common.rest, "gate");
    let cfg = load_config(common.config.as_deref());

    let candidate_dir = PathBuf::from(&cfg.paths.candidate_dir);
    let prod_dir = PathBuf::from(&cfg.paths.model_dir);
    let (candidate, prod, cand_fp, prod_fp) = match (
        LinearModel::load(&candidate_dir),
        LinearModel::load(&prod_dir),
        model_fingerprint(&candidate_dir),
        model_fingerprint(&prod_dir),
    ) {
        (Ok(c), Ok(p), Ok(cf), Ok(pf)) => (c, p, cf, pf),
        (c, p, cf, pf) => {
            for e in [
                c.err().map(|e| e.to_string()),
                p.err().map(|e| e.to_string()),
                cf.err().map(|e| e.to_string()),
                pf.err().map(|e| e.to_string()),
            ]
            .into_iter()
            .flatten()
            {
                eprintln!("gate: {e}");
            }
            process::exit(1);
        }
    };

    match gz_eval::run_arena(&cfg, &candidate, &prod, &cand_fp, &prod_fp, common.seed) {
        Ok(report) => {
            let _ = gz_eval::write_arena_result(Path::new(&cfg.paths.arena_result_path), &report);
            println!(
                "arena: {} games, candidate {} prod {} draws {} -> winrate {:.3} (threshold {:.2})",
                report.games,
                report.candidate_wins,
                report.prod_wins,
                report.draws,
                report.winrate,
                report.threshold
            );
            process::exit(if report.passed() { 0 } else { 1 });
        }
        Err(e) => {
            eprintln!("arena failed: {e}");
            process::exit(1);
        }
    }
}

fn cmd_pipeline(args: &[String]) {
    let common = parse_common(
        args,
        "gz pipeline [--config PATH] [--seed S]\n\nRuns pipeline cycles until the configured count (0 = forever).",
    );
    reject_extras(&common.rest, "pipeline");
    let cfg = load_config(common.config.as_deref());
    let last = gz_controller::run_pipeline(&cfg, common.seed);
    if let Some(err) = last.error {
        eprintln!("last cycle ended with error: {err}");
        process::exit(1);
    }
}

fn cmd_serve(args: &[String]) {
    let common = parse_common(
        args,
        "gz serve [--config PATH]\n\nServes POST /get-move, GET /health and the Swap2 helpers.",
    );
    reject_extras(&common.rest, "serve");
    let cfg = load_config(common.config.as_deref());
    let bind = cfg.server.bind.clone();

    match gz_server::Server::start(cfg, bind.as_str()) {
        Ok(server) => {
            println!("serving on http://{}", server.addr());
            // Foreground process: park until killed.
            loop {
                std::thread::sleep(std::time::Duration::from_secs(3600));
            }
        }
        Err(e) => {
            eprintln!("server failed to start: {e}");
            process::exit(1);
        }
    }
}

fn cmd_bestmove(args: &[String]) {
    let usage = "gz bestmove --board KEY --player black|white [--think MS] [--config PATH]\n\n\
         KEY is rows joined by '|' using 'b'/'w'/'-'.";
    let common = parse_common(args, usage);
    let cfg = load_config(common.config.as_deref());

    let mut board_key: Option<String> = None;
    let mut player = Stone::Black;
    let mut think_ms: u64 = 2_000;
    let rest = common.rest;
    let mut i = 0;
    while i < rest.len() {
        match rest[i].as_str() {
            "--board" => {
                board_key = Some(expect_value(&rest, i, "--board").to_string());
                i += 2;
            }
            "--player" => {
                player = match expect_value(&rest, i, "--player") {
                    "black" => Stone::Black,
                    "white" => Stone::White,
                    other => {
                        eprintln!("Invalid --player value: {other}");
                        process::exit(2);
                    }
                };
                i += 2;
            }
            "--think" => {
                think_ms = expect_value(&rest, i, "--think").parse().unwrap_or(2_000);
                i += 2;
            }
            other => {
                eprintln!("Unknown option for `gz bestmove`: {other}");
                process::exit(2);
            }
        }
    }

    let board = match board_key.as_deref().and_then(gz_core::Board::from_key) {
        Some(b) => b,
        None => {
            eprintln!("--board is required and must be a valid board key");
            process::exit(2);
        }
    };

    let model = match LinearModel::load(&cfg.paths.model_dir) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("failed to load model from {}: {e}", cfg.paths.model_dir);
            process::exit(1);
        }
    };
    let mut mcts = Mcts::new(
        cfg.mcts.clone(),
        cfg.tactics.clone(),
        cfg.mcts.prediction_cache_capacity,
        common.seed,
    );
    match mcts.find_best_move(&board, player, think_ms, &model) {
        Ok(result) => {
            println!(
                "{}",
                serde_json::json!({
                    "move": [result.best.row, result.best.col],
                    "value": result.root_value,
                    "source": format!("{:?}", result.source),
                    "simulations": result.stats.simulations,
                })
            );
        }
        Err(e) => {
            eprintln!("search failed: {e}");
            process::exit(1);
        }
    }
}

fn reject_extras(rest: &[String], cmd: &str) {
    if let Some(extra) = rest.first() {
        eprintln!("Unknown option for `gz {cmd}`: {extra}");
        eprintln!("Run `gz {cmd} --help` for usage.");
        process::exit(2);
    }
}
