use crate::errors::VcrError;
use std::fs;
use std::path::{Path, PathBuf};

pub const LOG_EXTENSION: &str = "jsonl";

/// Deletes the oldest `.jsonl` files in `dir` until their combined size fits
/// in `budget_bytes`. Other files, fixtures included, are never touched.
pub fn enforce_log_budget(dir: &Path, budget_bytes: u64) -> Result<Vec<PathBuf>, VcrError> {
    let mut logs = fs::read_dir(dir)
        .map_err(|e| VcrError::Storage(format!("list {}: {e}", dir.display())))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some(LOG_EXTENSION)
        })
        .filter_map(|path| {
            let meta = fs::metadata(&path).ok()?;
            Some((meta.modified().ok(), meta.len(), path))
        })
        .collect::<Vec<_>>();
    logs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut total = logs.iter().map(|(_, len, _)| *len).sum::<u64>();
    let mut deleted = Vec::new();
    for (_, len, path) in logs {
        if total <= budget_bytes {
            break;
        }
        fs::remove_file(&path)
            .map_err(|e| VcrError::Storage(format!("remove {}: {e}", path.display())))?;
        total = total.saturating_sub(len);
        deleted.push(path);
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::enforce_log_budget;
    use std::fs;

    #[test]
    fn prunes_oldest_logs_and_keeps_fixtures() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("get_aa_0.vcr"), vec![0u8; 400]).expect("fixture");
        fs::write(dir.path().join("a.jsonl"), vec![0u8; 40]).expect("a");
        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::write(dir.path().join("b.jsonl"), vec![0u8; 40]).expect("b");

        let deleted = enforce_log_budget(dir.path(), 50).expect("pruned");
        assert_eq!(deleted.len(), 1);
        assert!(deleted[0].ends_with("a.jsonl"));
        assert!(dir.path().join("get_aa_0.vcr").exists());
        assert!(dir.path().join("b.jsonl").exists());
    }
}
