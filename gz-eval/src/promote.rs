//! Promotion: snapshot the reigning model, then swap in the candidate.
//!
//! Directory replacement tolerates transient busy errors (open handles)
//! with bounded retries. A failed promotion leaves the prior production
//! model in place.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

const RETRIES: u32 = 10;
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Snapshot `prod_dir` into `past_dir/prod_<ts>` and replace it with a copy
/// of `candidate_dir`. Returns the snapshot path.
pub fn promote_candidate(
    candidate_dir: &Path,
    prod_dir: &Path,
    past_dir: &Path,
    now_ms: u64,
) -> io::Result<std::path::PathBuf> {
    fs::create_dir_all(past_dir)?;
    let snapshot = past_dir.join(format!("prod_{now_ms:013}"));
    copy_dir(prod_dir, &snapshot)?;

    // Stage the candidate next to prod so the final step is a rename.
    let staged = sibling(prod_dir, ".staged")?;
    let _ = fs::remove_dir_all(&staged);
    copy_dir(candidate_dir, &staged)?;

    let displaced = sibling(prod_dir, ".old")?;
    let _ = fs::remove_dir_all(&displaced);
    if let Err(e) = rename_with_retry(prod_dir, &displaced) {
        let _ = fs::remove_dir_all(&staged);
        return Err(e);
    }
    if let Err(e) = rename_with_retry(&staged, prod_dir) {
        // Roll the old production model back before giving up.
        let _ = rename_with_retry(&displaced, prod_dir);
        let _ = fs::remove_dir_all(&staged);
        return Err(e);
    }
    let _ = fs::remove_dir_all(&displaced);
    Ok(snapshot)
}

fn sibling(dir: &Path, suffix: &str) -> io::Result<std::path::PathBuf> {
    let name = dir
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "model dir has no name"))?;
    Ok(dir.with_file_name(format!("{name}{suffix}")))
}

fn rename_with_retry(from: &Path, to: &Path) -> io::Result<()> {
    let mut last = None;
    for attempt in 0..RETRIES {
        match fs::rename(from, to) {
            Ok(()) => return Ok(()),
            Err(e) => {
                last = Some(e);
                if attempt + 1 < RETRIES {
                    std::thread::sleep(RETRY_DELAY);
                }
            }
        }
    }
    Err(last.unwrap_or_else(|| io::Error::other("rename failed")))
}

fn copy_dir(from: &Path, to: &Path) -> io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let src = entry.path();
        let dst = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&src, &dst)?;
        } else {
            fs::copy(&src, &dst)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_model(dir: &Path, tag: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("model.json"), format!("{{\"tag\":\"{tag}\"}}")).unwrap();
        fs::write(dir.join("weights.safetensors"), tag.as_bytes()).unwrap();
    }

    #[test]
    fn promotion_swaps_and_snapshots() {
        let root = tempfile::tempdir().unwrap();
        let cand = root.path().join("candidate");
        let prod = root.path().join("prod");
        let past = root.path().join("past");
        write_model(&cand, "cand");
        write_model(&prod, "old-prod");

        let snapshot = promote_candidate(&cand, &prod, &past, 42).unwrap();

        let now = fs::read_to_string(prod.join("model.json")).unwrap();
        assert!(now.contains("cand"));
        let snap = fs::read_to_string(snapshot.join("model.json")).unwrap();
        assert!(snap.contains("old-prod"));
        // The candidate directory is left intact for bookkeeping.
        assert!(cand.join("model.json").exists());
        // No stray staging directories remain.
        assert!(!root.path().join("prod.staged").exists());
        assert!(!root.path().join("prod.old").exists());
    }

    #[test]
    fn snapshot_names_carry_the_timestamp() {
        let root = tempfile::tempdir().unwrap();
        let cand = root.path().join("candidate");
        let prod = root.path().join("prod");
        let past = root.path().join("past");
        write_model(&cand, "cand");
        write_model(&prod, "prod");

        let snapshot = promote_candidate(&cand, &prod, &past, 1234).unwrap();
        let name = snapshot.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("prod_"));
        assert!(name.contains("1234"));
    }
}
