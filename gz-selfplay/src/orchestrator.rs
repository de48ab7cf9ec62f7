//! The orchestrator: spawn the worker pool, collect sample batches, flush
//! the replay buffer on a timer, stop at the duration bound.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError};
use gz_core::Config;
use gz_infer::{InferError, LinearModel};
use gz_logging::{now_ms, NdjsonWriter, SelfplayFlushEventV1};
use gz_mcts::Mcts;
use gz_replay::{ReplayError, ReplayWriter};
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use thiserror::Error;

use crate::hub::ModelHub;
use crate::worker::{play_one_game, WorkerMsg};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("inference: {0}")]
    Infer(#[from] InferError),
    #[error("replay: {0}")]
    Replay(#[from] ReplayError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Default, Clone)]
pub struct OrchestratorReport {
    pub games_completed: u64,
    pub samples_written: u64,
    pub files_written: u64,
    pub worker_crashes: u64,
    pub model_reloads: u64,
}

/// Run the self-play window: `cfg.selfplay.duration_ms` of games across
/// `cfg.selfplay.num_workers` workers. Bootstraps a fresh random model when
/// the production directory is empty.
pub fn run_orchestrator(cfg: &Config, seed: u64) -> Result<OrchestratorReport, OrchestratorError> {
    let model_dir = Path::new(&cfg.paths.model_dir);
    if !model_dir.join(gz_infer::model::MANIFEST_NAME).exists() {
        LinearModel::create_random(model_dir, cfg.board.size, seed)?;
    }
    let hub = Arc::new(ModelHub::new(
        model_dir,
        Path::new(&cfg.paths.past_models_dir),
        cfg.selfplay.past_model_probability,
    )?);

    let mut writer = ReplayWriter::new(&cfg.paths.replay_dir, seed)?;
    let mut events =
        NdjsonWriter::open_append(format!("{}.events.ndjson", cfg.paths.replay_dir)).ok();

    let stop = Arc::new(AtomicBool::new(false));
    let (tx, rx) = bounded::<WorkerMsg>(cfg.selfplay.num_workers * 2);

    let mut handles = Vec::new();
    for worker_id in 0..cfg.selfplay.num_workers {
        let cfg = cfg.clone();
        let hub = hub.clone();
        let stop = stop.clone();
        let tx = tx.clone();
        let worker_seed = seed ^ ((worker_id as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
        handles.push(std::thread::spawn(move || {
            worker_loop(worker_id, &cfg, &hub, &stop, worker_seed, &tx);
        }));
    }
    drop(tx);

    let started = Instant::now();
    let run_for = Duration::from_millis(cfg.selfplay.duration_ms);
    let flush_every = Duration::from_millis(cfg.selfplay.save_interval_ms.max(1));
    let mut last_flush = Instant::now();
    let mut flush_failures = 0u32;
    let mut report = OrchestratorReport::default();

    loop {
        if started.elapsed() >= run_for {
            stop.store(true, Ordering::Relaxed);
        }

        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(WorkerMsg::GameFinished {
                samples, ..
            }) => {
                report.games_completed += 1;
                writer.extend(samples);
            }
            Ok(WorkerMsg::Crashed { worker_id, error }) => {
                // No respawn: a crashed worker is reduced throughput.
                report.worker_crashes += 1;
                eprintln!("self-play worker {worker_id} crashed: {error}");
            }
            Ok(WorkerMsg::Stopped { .. }) => {}
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if last_flush.elapsed() >= flush_every {
            // A transient flush failure keeps the samples buffered for the
            // next interval; a persistent one fails the window.
            match flush(&mut writer, &mut events, &mut report) {
                Ok(()) => flush_failures = 0,
                Err(e) => {
                    flush_failures += 1;
                    eprintln!("replay flush failed ({flush_failures}x): {e}");
                    if flush_failures >= 3 {
                        // Workers notice the dropped receiver and wind down.
                        stop.store(true, Ordering::Relaxed);
                        return Err(e.into());
                    }
                }
            }
            last_flush = Instant::now();
            if hub.refresh().unwrap_or(false) {
                report.model_reloads += 1;
            }
        }

        if stop.load(Ordering::Relaxed) && rx.is_empty() {
            // Workers finish their running game and exit; the channel
            // disconnect ends the loop.
            let all_done = handles.iter().all(|h| h.is_finished());
            if all_done {
                break;
            }
        }
    }

    for h in handles {
        let _ = h.join();
    }
    // Drain anything that arrived while joining.
    while let Ok(msg) = rx.try_recv() {
        if let WorkerMsg::GameFinished { samples, .. } = msg {
            report.games_completed += 1;
            writer.extend(samples);
        }
    }
    flush(&mut writer, &mut events, &mut report)?;
    Ok(report)
}

fn flush(
    writer: &mut ReplayWriter,
    events: &mut Option<NdjsonWriter>,
    report: &mut OrchestratorReport,
) -> Result<(), ReplayError> {
    let buffered = writer.pending();
    if let Some((path, count)) = writer.flush(now_ms())? {
        report.samples_written += count as u64;
        report.files_written += 1;
        if let Some(ev) = events {
            let _ = ev.write_event(&SelfplayFlushEventV1 {
                event: "selfplay_flush_v1",
                ts_ms: now_ms(),
                file: path.display().to_string(),
                samples: count,
                games_completed: report.games_completed,
                buffered_before: buffered,
            });
            let _ = ev.flush();
        }
    }
    Ok(())
}

fn worker_loop(
    worker_id: usize,
    cfg: &Config,
    hub: &ModelHub,
    stop: &AtomicBool,
    seed: u64,
    tx: &crossbeam_channel::Sender<WorkerMsg>,
) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut mcts = Mcts::new(
        cfg.mcts.clone(),
        cfg.tactics.clone(),
        cfg.mcts.prediction_cache_capacity,
        seed,
    );
    let mut roots = NdjsonWriter::open_append_with_flush(
        format!("{}.roots.w{worker_id}.ndjson", cfg.paths.replay_dir),
        64,
    )
    .ok();
    let mut game_counter = 0u64;

    while !stop.load(Ordering::Relaxed) {
        let own = hub.production();
        let opp = hub.opponent_for(&mut rng);
        let game_id = format!("w{worker_id}-{game_counter:06}");
        game_counter += 1;

        match play_one_game(
            cfg,
            &mut mcts,
            own.as_ref(),
            opp.as_ref(),
            &mut rng,
            &game_id,
            worker_id,
            roots.as_mut(),
        ) {
            Ok(record) => {
                let msg = WorkerMsg::GameFinished {
                    worker_id,
                    game_id,
                    moves: record.moves,
                    winner: record.winner,
                    samples: record.samples,
                };
                if tx.send(msg).is_err() {
                    return;
                }
            }
            Err(e) => {
                let _ = tx.send(WorkerMsg::Crashed {
                    worker_id,
                    error: e.to_string(),
                });
                return;
            }
        }
    }
    let _ = tx.send(WorkerMsg::Stopped { worker_id });
}
