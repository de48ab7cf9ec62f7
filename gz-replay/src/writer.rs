//! Buffered JSONL flushes into the replay directory.

use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use thiserror::Error;

use crate::sample::TrainingSample;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Accumulates samples in memory and flushes them as one immutable JSONL
/// file per flush. File names sort lexicographically in creation order
/// (millisecond timestamp, then a random run suffix, then a counter), so no
/// two writers target the same file.
pub struct ReplayWriter {
    dir: PathBuf,
    buf: Vec<TrainingSample>,
    suffix: u16,
    counter: u32,
}

impl ReplayWriter {
    pub fn new(dir: impl AsRef<Path>, seed: u64) -> Result<ReplayWriter, ReplayError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        // Best-effort cleanup after any prior crash.
        let _ = cleanup_tmp_files(&dir);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Ok(ReplayWriter {
            dir,
            buf: Vec::new(),
            suffix: rng.gen(),
            counter: 0,
        })
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn push(&mut self, sample: TrainingSample) {
        self.buf.push(sample);
    }

    pub fn extend<I: IntoIterator<Item = TrainingSample>>(&mut self, it: I) {
        self.buf.extend(it);
    }

    /// Flush the buffer into a fresh file. Returns the path and sample
    /// count, or `None` when there was nothing to write. On failure the
    /// buffer is retained for the next interval.
    pub fn flush(&mut self, now_ms: u64) -> Result<Option<(PathBuf, usize)>, ReplayError> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        let name = format!(
            "samples_{now_ms:013}_{:04x}_{:06}.jsonl",
            self.suffix, self.counter
        );
        let path = self.dir.join(&name);
        let tmp = self.dir.join(format!("{name}.tmp"));

        let mut out = Vec::new();
        for sample in &self.buf {
            serde_json::to_writer(&mut out, sample)?;
            out.push(b'\n');
        }
        fs::write(&tmp, &out)?;
        fs::rename(&tmp, &path)?;

        let count = self.buf.len();
        self.buf.clear();
        self.counter += 1;
        Ok(Some((path, count)))
    }
}

/// Remove stale `.tmp` flush files left behind by a crash.
pub fn cleanup_tmp_files(dir: &Path) -> Result<(), ReplayError> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let p = entry?.path();
        if p.extension().and_then(|e| e.to_str()) == Some("tmp") {
            let _ = fs::remove_file(&p);
        }
    }
    Ok(())
}
