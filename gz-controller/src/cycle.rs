//! One pipeline cycle, and the outer loop that repeats it.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use gz_core::Config;
use gz_eval::{promote_candidate, run_arena, write_arena_result, ArenaReport};
use gz_infer::{model_fingerprint, LinearModel};
use gz_logging::{now_ms, update_status, CycleStageEventV1, NdjsonWriter, Phase};
use gz_selfplay::run_orchestrator;
use serde_json::json;

use crate::tuning::{apply_tuning, arena_feedback, load_tuning, save_tuning};

#[derive(Debug, Default, Clone)]
pub struct CycleOutcome {
    pub cycle: u32,
    pub games_completed: u64,
    pub samples_written: u64,
    pub arena: Option<ArenaReport>,
    pub promoted: bool,
    /// First error recorded this cycle, if any.
    pub error: Option<String>,
}

struct StageLog {
    status_path: PathBuf,
    events: Option<NdjsonWriter>,
    webhook_url: Option<String>,
    cycle: u32,
}

impl StageLog {
    fn new(cfg: &Config, cycle: u32) -> StageLog {
        let status_path = PathBuf::from(&cfg.paths.status_path);
        let events_path = status_path.with_extension("events.ndjson");
        StageLog {
            status_path,
            events: NdjsonWriter::open_append(events_path).ok(),
            webhook_url: cfg.pipeline.webhook_url.clone(),
            cycle,
        }
    }

    fn phase(&mut self, phase: Phase) {
        let _ = update_status(
            &self.status_path,
            json!({"phase": phase.as_str(), "cycle": self.cycle}),
        );
        self.emit(phase.as_str(), "start", None);
    }

    fn stage_done(&mut self, stage: &str, detail: Option<String>) {
        self.emit(stage, "ok", detail);
    }

    fn stage_error(&mut self, stage: &str, error: &str, outcome: &mut CycleOutcome) {
        let _ = update_status(
            &self.status_path,
            json!({"error": format!("{stage}: {error}")}),
        );
        if outcome.error.is_none() {
            outcome.error = Some(format!("{stage}: {error}"));
        }
        self.emit(stage, "error", Some(error.to_string()));
    }

    fn emit(&mut self, stage: &str, outcome: &str, detail: Option<String>) {
        let ev = CycleStageEventV1 {
            event: "cycle_stage_v1",
            ts_ms: now_ms(),
            cycle: self.cycle,
            stage: stage.to_string(),
            outcome: outcome.to_string(),
            detail: detail.clone(),
        };
        if let Some(w) = &mut self.events {
            let _ = w.write_event(&ev);
            let _ = w.flush();
        }
        if let Some(url) = &self.webhook_url {
            // Best effort; a dead webhook must not stall the pipeline.
            let _ = ureq::post(url)
                .timeout(Duration::from_secs(5))
                .send_json(json!({
                    "cycle": self.cycle,
                    "stage": stage,
                    "outcome": outcome,
                    "detail": detail,
                }));
        }
    }
}

/// Run one full cycle. Errors are recorded and isolated per stage.
pub fn run_cycle(cfg: &Config, cycle: u32, seed: u64) -> CycleOutcome {
    let mut outcome = CycleOutcome {
        cycle,
        ..CycleOutcome::default()
    };
    let mut log = StageLog::new(cfg, cycle);

    // Persisted tuning from earlier cycles feeds this one's searches.
    let tuning_path = PathBuf::from(&cfg.paths.tuning_path);
    let mut tuning = load_tuning(&tuning_path);
    let mut cfg = cfg.clone();
    apply_tuning(&mut cfg, &tuning);

    // Stage 1: self-play.
    log.phase(Phase::SelfPlay);
    match run_orchestrator(&cfg, seed) {
        Ok(report) => {
            outcome.games_completed = report.games_completed;
            outcome.samples_written = report.samples_written;
            let _ = update_status(
                &log.status_path,
                json!({"self_play": {
                    "games": report.games_completed,
                    "samples": report.samples_written,
                    "files": report.files_written,
                    "worker_crashes": report.worker_crashes,
                }}),
            );
            log.stage_done("self_play", Some(format!("{} games", report.games_completed)));
        }
        Err(e) => log.stage_error("self_play", &e.to_string(), &mut outcome),
    }

    // Stage 2: external distillation driver.
    log.phase(Phase::Distill);
    if cfg.pipeline.distill_command.is_empty() {
        log.stage_done("distill", Some("skipped (no command configured)".into()));
    } else {
        match run_command(&cfg.pipeline.distill_command) {
            Ok(()) => log.stage_done("distill", None),
            Err(e) => log.stage_error("distill", &e, &mut outcome),
        }
    }

    // Stage 3: arena gate. A missing candidate model prevents this stage.
    log.phase(Phase::Arena);
    let candidate_dir = PathBuf::from(&cfg.paths.candidate_dir);
    if !candidate_dir.join(gz_infer::model::MANIFEST_NAME).exists() {
        log.stage_error("arena", "no candidate model to gate", &mut outcome);
    } else {
        match gate_candidate(&cfg, seed, &candidate_dir) {
            Ok(mut report) => {
                let passed = report.winrate >= cfg.arena.threshold && report.games > 0;
                if passed && cfg.arena.promote {
                    match promote_candidate(
                        &candidate_dir,
                        Path::new(&cfg.paths.model_dir),
                        Path::new(&cfg.paths.past_models_dir),
                        now_ms(),
                    ) {
                        Ok(_) => {
                            report.promoted = true;
                            outcome.promoted = true;
                        }
                        Err(e) => log.stage_error("promote", &e.to_string(), &mut outcome),
                    }
                }
                let _ = write_arena_result(Path::new(&cfg.paths.arena_result_path), &report);
                let _ = update_status(
                    &log.status_path,
                    json!({"arena": {
                        "games": report.games,
                        "candidate_wins": report.candidate_wins,
                        "prod_wins": report.prod_wins,
                        "draws": report.draws,
                        "winrate": report.winrate,
                        "promoted": report.promoted,
                    }}),
                );
                log.stage_done(
                    "arena",
                    Some(format!("winrate {:.3} promoted={}", report.winrate, report.promoted)),
                );

                // Tuning feedback follows every completed arena.
                arena_feedback(
                    &mut tuning,
                    report.winrate,
                    cfg.arena.threshold,
                    cfg.pipeline.tuning_step,
                );
                if let Err(e) = save_tuning(&tuning_path, &tuning) {
                    log.stage_error("tuning", &e.to_string(), &mut outcome);
                }

                outcome.arena = Some(report);
            }
            Err(e) => log.stage_error("arena", &e.to_string(), &mut outcome),
        }
    }

    // Stage 4: upload after promotion only.
    log.phase(Phase::Upload);
    if !outcome.promoted {
        log.stage_done("upload", Some("skipped (no promotion)".into()));
    } else if cfg.pipeline.upload_command.is_empty() {
        log.stage_done("upload", Some("skipped (no command configured)".into()));
    } else {
        match run_command(&cfg.pipeline.upload_command) {
            Ok(()) => {
                let _ = update_status(&log.status_path, json!({"upload": {"ok": true}}));
                log.stage_done("upload", None);
            }
            Err(e) => log.stage_error("upload", &e, &mut outcome),
        }
    }

    // Stage 5: opening-book build/import. Failures are logged, not fatal.
    log.phase(Phase::BookImport);
    if cfg.pipeline.book_command.is_empty() {
        log.stage_done("book_import", Some("skipped (no command configured)".into()));
    } else {
        match run_command(&cfg.pipeline.book_command) {
            Ok(()) => {
                let _ = update_status(&log.status_path, json!({"book_import": {"ok": true}}));
                log.stage_done("book_import", None);
            }
            Err(e) => {
                // Non-fatal by contract: note it without touching the
                // cycle error.
                let _ = update_status(
                    &log.status_path,
                    json!({"book_import": {"ok": false, "error": e}}),
                );
                log.emit("book_import", "error", Some(e));
            }
        }
    }

    let final_phase = if outcome.error.is_some() {
        Phase::Error
    } else {
        Phase::Done
    };
    log.phase(final_phase);
    outcome
}

fn gate_candidate(
    cfg: &Config,
    seed: u64,
    candidate_dir: &Path,
) -> Result<ArenaReport, Box<dyn std::error::Error>> {
    let prod_dir = PathBuf::from(&cfg.paths.model_dir);
    let candidate = LinearModel::load(candidate_dir)?;
    let prod = LinearModel::load(&prod_dir)?;
    let cand_fp = model_fingerprint(candidate_dir)?;
    let prod_fp = model_fingerprint(&prod_dir)?;
    Ok(run_arena(cfg, &candidate, &prod, &cand_fp, &prod_fp, seed)?)
}

fn run_command(cmd: &[String]) -> Result<(), String> {
    let (program, args) = cmd.split_first().ok_or("empty command")?;
    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|e| format!("failed to spawn {program}: {e}"))?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("{program} exited with {status}"))
    }
}

/// The outer loop: run cycles until the configured count, sleeping between
/// them (longer after an error). `cycles == 0` or `forever` loops
/// indefinitely; stage errors never exit the process.
pub fn run_pipeline(cfg: &Config, seed: u64) -> CycleOutcome {
    let mut cycle = 0u32;
    loop {
        let outcome = run_cycle(cfg, cycle, seed.wrapping_add(cycle as u64));
        cycle += 1;

        let forever = cfg.pipeline.forever || cfg.pipeline.cycles == 0;
        if !forever && cycle >= cfg.pipeline.cycles {
            return outcome;
        }

        let delay = if outcome.error.is_some() {
            cfg.pipeline.on_error_delay_ms
        } else {
            cfg.pipeline.interval_ms
        };
        if delay > 0 {
            let _ = update_status(
                Path::new(&cfg.paths.status_path),
                json!({"phase": Phase::Sleeping.as_str()}),
            );
            std::thread::sleep(Duration::from_millis(delay));
        }
    }
}
