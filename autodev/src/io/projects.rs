//! Lookup of projects under the project root.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Immediate subdirectory of `root` with the newest modification time.
///
/// `None` if the root is missing, unreadable or has no subdirectories.
pub fn latest_project_dir(root: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(root).ok()?;
    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let meta = entry.metadata().ok()?;
            if !meta.is_dir() {
                return None;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            Some((modified, entry.path()))
        })
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, path)| path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn missing_root_has_no_latest() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert_eq!(latest_project_dir(&temp.path().join("absent")), None);
    }

    #[test]
    fn ignores_plain_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("notes.txt"), "x").expect("write");
        assert_eq!(latest_project_dir(temp.path()), None);
    }

    #[test]
    fn picks_newest_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let old = temp.path().join("old");
        let new = temp.path().join("new");
        fs::create_dir(&old).expect("mkdir");
        fs::create_dir(&new).expect("mkdir");
        let past = SystemTime::now() - Duration::from_secs(3600);
        fs::File::open(&old)
            .expect("open")
            .set_modified(past)
            .expect("set mtime");
        assert_eq!(latest_project_dir(temp.path()), Some(new));
    }
}
