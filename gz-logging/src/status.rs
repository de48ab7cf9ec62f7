//! The cycle status document: one JSON file updated by atomic deep-merge
//! writes. Partial updates may touch any subset of nested fields without
//! erasing their siblings.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::ndjson::NdjsonError;

/// Pipeline phase as reflected in the status document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    SelfPlay,
    Distill,
    Arena,
    Upload,
    BookImport,
    Sleeping,
    Done,
    Error,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::SelfPlay => "self_play",
            Phase::Distill => "distill",
            Phase::Arena => "arena",
            Phase::Upload => "upload",
            Phase::BookImport => "book_import",
            Phase::Sleeping => "sleeping",
            Phase::Done => "done",
            Phase::Error => "error",
        }
    }
}

/// Recursively merge `patch` into `dest`. Objects merge key-wise; every
/// other value (including null) replaces the destination.
pub fn deep_merge(dest: &mut Value, patch: &Value) {
    match (dest, patch) {
        (Value::Object(d), Value::Object(p)) => {
            for (k, v) in p {
                match d.get_mut(k) {
                    Some(slot) => deep_merge(slot, v),
                    None => {
                        d.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (dest, patch) => *dest = patch.clone(),
    }
}

/// Read the status document, or an empty object if the file is missing or
/// unparsable (a torn write loses one update, not the pipeline).
pub fn read_status(path: &Path) -> Value {
    fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_else(|| Value::Object(Map::new()))
}

/// Read-modify-write the status document with deep-merge semantics. The
/// write is atomic (temp file + rename). A `ts_ms` field is stamped on
/// every update.
pub fn update_status(path: &Path, patch: Value) -> Result<(), NdjsonError> {
    let mut doc = read_status(path);
    deep_merge(&mut doc, &patch);
    if let Value::Object(m) = &mut doc {
        m.insert("ts_ms".into(), Value::from(crate::now_ms()));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(&doc)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
