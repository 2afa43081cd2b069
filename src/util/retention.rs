//! Pruning of old archives in the backup directory.
//!
//! The retention count is signed: `keep >= 0` keeps the newest `keep`
//! files, `keep < 0` keeps the oldest `|keep|` files instead, an inverted
//! policy for archival-style use where the earliest backups are the
//! valuable ones.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use derive_more::{Display, Error};

/// Retention count applied when none is configured.
pub const DEFAULT_KEEP: i64 = 7;

#[derive(Debug, Display, Error)]
pub enum PurgeError {
    #[display("backup directory does not exist: {}", _0.display())]
    Missing(#[error(ignore)] PathBuf),
    #[display("not a directory: {}", _0.display())]
    NotADirectory(#[error(ignore)] PathBuf),
    #[display("backup directory is not writable: {}", _0.display())]
    NotWritable(#[error(ignore)] PathBuf),
    #[display("backup directory is not readable: {error}")]
    Unreadable { error: io::Error },
}

/// What one purge pass did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PurgeOutcome {
    pub examined: usize,
    pub kept: usize,
    pub removed: usize,
}

/// Deletes backup files beyond the retention count.
///
/// Candidates are the direct regular entries of `dir`, dotfiles excluded.
/// Having no more candidates than the count is a success no-op. Individual
/// deletions are best-effort: one stuck file does not stop the purge of the
/// remaining files.
pub fn purge(dir: &Path, keep: Option<i64>) -> Result<PurgeOutcome, PurgeError> {
    let keep = keep.unwrap_or(DEFAULT_KEEP);
    if keep == 0 {
        log::warn!(target: "retention", "Retention count 0 keeps no previous backups");
    }

    let metadata = fs::metadata(dir).map_err(|_| PurgeError::Missing(dir.to_path_buf()))?;
    if !metadata.is_dir() {
        return Err(PurgeError::NotADirectory(dir.to_path_buf()));
    }
    if metadata.permissions().readonly() {
        return Err(PurgeError::NotWritable(dir.to_path_buf()));
    }

    let entries = fs::read_dir(dir).map_err(|error| PurgeError::Unreadable { error })?;
    let mut candidates: Vec<(PathBuf, SystemTime)> = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                log::warn!(target: "retention", "Skipping unreadable directory entry: {error}");
                continue;
            }
        };
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }
        let modified = match entry.metadata().and_then(|metadata| metadata.modified()) {
            Ok(modified) => modified,
            Err(error) => {
                log::warn!(
                    target: "retention",
                    "No modification time for {}, skipping: {error}",
                    entry.path().display()
                );
                continue;
            }
        };
        candidates.push((entry.path(), modified));
    }

    let examined = candidates.len();
    let (kept, doomed) = split_retained(candidates, keep);
    log::debug!(
        target: "retention",
        "{examined} candidate(s), keeping {}, removing {}",
        kept.len(),
        doomed.len()
    );

    let mut removed = 0;
    for path in &doomed {
        match fs::remove_file(path) {
            Ok(()) => {
                log::info!(target: "retention", "Removed old backup {}", path.display());
                removed += 1;
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                log::info!(
                    target: "retention",
                    "{} disappeared before removal",
                    path.display()
                );
            }
            Err(error) => {
                log::error!(
                    target: "retention",
                    "Unable to remove {}: {error}",
                    path.display()
                );
            }
        }
    }

    Ok(PurgeOutcome {
        examined,
        kept: kept.len(),
        removed,
    })
}

/// Splits candidates into survivors and files to delete. Sorting is
/// oldest-first by modification time before the split.
fn split_retained(
    mut candidates: Vec<(PathBuf, SystemTime)>,
    keep: i64,
) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let limit = keep.unsigned_abs() as usize;
    if candidates.len() <= limit {
        let kept = candidates.into_iter().map(|(path, _)| path).collect();
        return (kept, Vec::new());
    }

    candidates.sort_by_key(|(_, modified)| *modified);
    let paths: Vec<PathBuf> = candidates.into_iter().map(|(path, _)| path).collect();

    if keep < 0 {
        // inverted policy: the oldest |keep| files survive
        let doomed = paths[limit..].to_vec();
        (paths[..limit].to_vec(), doomed)
    } else {
        let split = paths.len() - limit;
        (paths[split..].to_vec(), paths[..split].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs::File;
    use std::time::Duration;

    fn candidates(ages: &[u64]) -> Vec<(PathBuf, SystemTime)> {
        // larger age = older = smaller mtime
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        ages.iter()
            .map(|age| {
                (
                    PathBuf::from(format!("age-{age}")),
                    now - Duration::from_secs(*age),
                )
            })
            .collect()
    }

    #[test]
    fn below_threshold_deletes_nothing() {
        let (kept, doomed) = split_retained(candidates(&[1, 2, 3]), 7);
        assert_eq!(kept.len(), 3);
        assert!(doomed.is_empty());

        let (kept, doomed) = split_retained(candidates(&[1, 2, 3]), -7);
        assert_eq!(kept.len(), 3);
        assert!(doomed.is_empty());
    }

    #[test]
    fn positive_keep_retains_the_newest() {
        // 10 files of strictly increasing age, keep 7: the 3 oldest go
        let ages: Vec<u64> = (1..=10).collect();
        let (kept, doomed) = split_retained(candidates(&ages), 7);

        assert_eq!(kept.len(), 7);
        assert_eq!(doomed.len(), 3);
        for age in 8..=10 {
            assert!(doomed.contains(&PathBuf::from(format!("age-{age}"))));
        }
        assert!(kept.contains(&PathBuf::from("age-1")));
    }

    #[test]
    fn negative_keep_retains_the_oldest() {
        let ages: Vec<u64> = (1..=10).collect();
        let (kept, doomed) = split_retained(candidates(&ages), -3);

        assert_eq!(kept.len(), 3);
        assert_eq!(doomed.len(), 7);
        for age in 8..=10 {
            assert!(kept.contains(&PathBuf::from(format!("age-{age}"))));
        }
        for age in 1..=7 {
            assert!(doomed.contains(&PathBuf::from(format!("age-{age}"))));
        }
    }

    #[test]
    fn keep_zero_deletes_everything() {
        let (kept, doomed) = split_retained(candidates(&[1, 2, 3]), 0);
        assert!(kept.is_empty());
        assert_eq!(doomed.len(), 3);
    }

    #[test]
    fn purge_removes_only_beyond_the_count() {
        let dir = tempfile::tempdir().unwrap();
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        for index in 0..10u64 {
            let path = dir.path().join(format!("backup-{index}.tar.gz"));
            let file = File::create(&path).unwrap();
            file.set_modified(base + Duration::from_secs(index * 60))
                .unwrap();
        }

        let outcome = purge(dir.path(), Some(7)).unwrap();
        assert_eq!(
            outcome,
            PurgeOutcome {
                examined: 10,
                kept: 7,
                removed: 3,
            }
        );

        // the three oldest are gone
        for index in 0..3u64 {
            assert!(!dir.path().join(format!("backup-{index}.tar.gz")).exists());
        }
        for index in 3..10u64 {
            assert!(dir.path().join(format!("backup-{index}.tar.gz")).exists());
        }
    }

    #[test]
    fn dotfiles_and_directories_are_not_candidates() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join(".hidden")).unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();
        File::create(dir.path().join("backup.tar.gz")).unwrap();

        let outcome = purge(dir.path(), Some(0)).unwrap();
        assert_eq!(outcome.examined, 1);
        assert!(dir.path().join(".hidden").exists());
        assert!(dir.path().join("subdir").is_dir());
        assert!(!dir.path().join("backup.tar.gz").exists());
    }

    #[test]
    fn missing_directory_is_a_precondition_failure() {
        let result = purge(Path::new("/nonexistent/mybackup-backups"), None);
        assert!(matches!(result, Err(PurgeError::Missing(_))));
    }

    #[test]
    fn a_plain_file_is_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        File::create(&file).unwrap();

        let result = purge(&file, None);
        assert!(matches!(result, Err(PurgeError::NotADirectory(_))));
    }

    #[test]
    fn absent_keep_defaults_to_seven() {
        let dir = tempfile::tempdir().unwrap();
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        for index in 0..9u64 {
            let path = dir.path().join(format!("backup-{index}.tar.gz"));
            let file = File::create(&path).unwrap();
            file.set_modified(base + Duration::from_secs(index * 60))
                .unwrap();
        }

        let outcome = purge(dir.path(), None).unwrap();
        assert_eq!(outcome.kept, 7);
        assert_eq!(outcome.removed, 2);
    }
}
