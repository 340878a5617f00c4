//! Allocation of fresh `generated_project_<N>` directories.
//!
//! Serials are `max(existing) + 1`, never a reuse of a gap. Concurrent
//! allocations (in this process or another one sharing the workspace) are
//! serialized with an exclusive lock on a lock file in the workspace, and the
//! directory itself is created with `create_dir` so an unexpected collision
//! moves on to the next serial instead of sharing a directory.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::OnceLock;

use fs2::FileExt;
use regex::Regex;

use super::{ProjectRoot, SandboxError, SandboxResult};

/// Directory name prefix of every project root.
pub const ROOT_PREFIX: &str = "generated_project_";

const LOCK_FILE: &str = ".generated_project.lock";

fn serial_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^generated_project_([0-9]+)$").expect("serial pattern is valid")
    })
}

/// Parse the serial out of a project root directory name.
pub(super) fn parse_serial(name: &str) -> Option<u64> {
    serial_pattern()
        .captures(name)
        .and_then(|caps| caps[1].parse().ok())
        .filter(|serial| *serial > 0)
}

/// Next serial to allocate under `base`: one past the largest existing one.
pub fn next_serial(base: &Path) -> SandboxResult<u64> {
    let mut max = 0;
    for entry in std::fs::read_dir(base)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(serial) = entry.file_name().to_str().and_then(parse_serial) {
            max = max.max(serial);
        }
    }
    Ok(max + 1)
}

fn create_next_root(base: &Path) -> SandboxResult<ProjectRoot> {
    let mut serial = next_serial(base)?;
    loop {
        let dir = base.join(format!("{ROOT_PREFIX}{serial}"));
        match std::fs::create_dir(&dir) {
            Ok(()) => return ProjectRoot::open(&dir),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => serial += 1,
            Err(e) => return Err(SandboxError::Io(e)),
        }
    }
}

fn allocate_locked(base: &Path) -> SandboxResult<ProjectRoot> {
    std::fs::create_dir_all(base)?;
    let lock = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(base.join(LOCK_FILE))?;
    lock.lock_exclusive()?;

    let result = create_next_root(base);

    FileExt::unlock(&lock)?;
    result
}

/// Create a fresh project root under `base`.
pub async fn allocate_root(base: &Path) -> SandboxResult<ProjectRoot> {
    let base = base.to_path_buf();
    let root = tokio::task::spawn_blocking(move || allocate_locked(&base))
        .await
        .map_err(|e| SandboxError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;
    tracing::info!("Allocated project root {}", root.path().display());
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_only_positive_serials() {
        assert_eq!(parse_serial("generated_project_12"), Some(12));
        assert_eq!(parse_serial("generated_project_0"), None);
        assert_eq!(parse_serial("generated_project_x"), None);
        assert_eq!(parse_serial("generated_project_3_old"), None);
        assert_eq!(parse_serial("other_7"), None);
    }

    #[tokio::test]
    async fn first_allocation_is_one() {
        let base = TempDir::new().unwrap();
        let root = allocate_root(base.path()).await.unwrap();
        assert_eq!(root.serial(), Some(1));
        assert!(root.path().is_dir());
    }

    #[tokio::test]
    async fn next_serial_skips_gaps() {
        let base = TempDir::new().unwrap();
        for serial in [1, 2, 4] {
            std::fs::create_dir(base.path().join(format!("{ROOT_PREFIX}{serial}"))).unwrap();
        }
        // Files and unrelated directories do not count.
        std::fs::write(base.path().join("generated_project_99"), "").unwrap();
        std::fs::create_dir(base.path().join("notes")).unwrap();

        assert_eq!(next_serial(base.path()).unwrap(), 5);
        let root = allocate_root(base.path()).await.unwrap();
        assert_eq!(root.serial(), Some(5));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_allocations_get_distinct_serials() {
        let base = TempDir::new().unwrap();
        let allocations = (0..8).map(|_| {
            let base = base.path().to_path_buf();
            tokio::spawn(async move { allocate_root(&base).await })
        });
        let mut serials: Vec<u64> = futures::future::join_all(allocations)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap().serial().unwrap())
            .collect();
        serials.sort_unstable();
        assert_eq!(serials, (1..=8).collect::<Vec<_>>());
    }
}
