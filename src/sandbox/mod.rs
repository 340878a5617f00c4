//! Sandboxed file store.
//!
//! Every filesystem access made on behalf of a pipeline run goes through a
//! [`ProjectRoot`]. The handle is passed explicitly to whoever needs it, so
//! concurrent runs never share an ambient "current directory".
//!
//! Relative paths are resolved against the root component by component,
//! following symlinks as they are encountered, and the result must stay the
//! root itself or one of its descendants.

mod allocate;
mod command;

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

pub use allocate::{allocate_root, next_serial, ROOT_PREFIX};
pub use command::CommandOutput;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Path escapes the project root: {0}")]
    PathEscape(String),

    #[error("Project root not initialized: {0}")]
    RootNotInitialized(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Command timed out after {0} seconds")]
    Timeout(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SandboxResult<T> = Result<T, SandboxError>;

/// Handle to the sandbox directory of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRoot {
    path: PathBuf,
    serial: Option<u64>,
}

impl ProjectRoot {
    /// Bind to an existing directory.
    ///
    /// The path is canonicalized so that later containment checks compare
    /// like with like.
    pub fn open(path: impl AsRef<Path>) -> SandboxResult<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(SandboxError::RootNotInitialized(path.to_path_buf()));
        }
        let path = path.canonicalize()?;
        let serial = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(allocate::parse_serial);
        Ok(Self { path, serial })
    }

    /// Absolute, canonical path of the root directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serial number taken from a `generated_project_<N>` directory name.
    pub fn serial(&self) -> Option<u64> {
        self.serial
    }

    fn ensure_live(&self) -> SandboxResult<()> {
        if self.path.is_dir() {
            Ok(())
        } else {
            Err(SandboxError::RootNotInitialized(self.path.clone()))
        }
    }

    /// Resolve a root-relative path to an absolute path inside the root.
    ///
    /// Leading `/` (and drive prefixes on Windows) are ignored: every input is
    /// treated as relative to the root. Only the final result must lie inside
    /// the root, so `../<root name>/x` is accepted. Fails with
    /// [`SandboxError::PathEscape`] before any I/O happens on the target.
    pub fn resolve(&self, relative: &str) -> SandboxResult<PathBuf> {
        self.ensure_live()?;

        let mut current = self.path.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
                Component::ParentDir => {
                    current.pop();
                }
                Component::Normal(part) => {
                    current.push(part);
                    // Follow symlinks for whatever already exists on disk;
                    // the remainder of a not-yet-created path stays lexical.
                    if current.symlink_metadata().is_ok() {
                        current = follow_links(current)?;
                    }
                }
            }
        }

        if current.starts_with(&self.path) {
            Ok(current)
        } else {
            Err(SandboxError::PathEscape(relative.to_string()))
        }
    }

    /// Write UTF-8 text, creating parent directories. Overwrites.
    pub async fn write(&self, relative: &str, content: &str) -> SandboxResult<PathBuf> {
        let full = self.resolve(relative)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, content).await?;
        tracing::debug!("Wrote {} ({} bytes)", full.display(), content.len());
        Ok(full)
    }

    /// Read a file; a missing file reads as the empty string.
    pub async fn read(&self, relative: &str) -> SandboxResult<String> {
        let full = self.resolve(relative)?;
        match tokio::fs::read_to_string(&full).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether `relative` names an existing regular file inside the root.
    pub async fn is_file(&self, relative: &str) -> SandboxResult<bool> {
        let full = self.resolve(relative)?;
        Ok(tokio::fs::metadata(&full)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false))
    }

    /// Recursively list files (not directories) under `directory`.
    ///
    /// Paths are relative to the root, `/`-separated and sorted.
    pub async fn list(&self, directory: &str) -> SandboxResult<Vec<String>> {
        let target = self.resolve(directory)?;
        if !target.is_dir() {
            return Err(SandboxError::NotADirectory(directory.to_string()));
        }
        let root = self.path.clone();
        tokio::task::spawn_blocking(move || list_files_sync(&root, &target))
            .await
            .map_err(|e| SandboxError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }

    /// Run a shell command with the root (or a subdirectory of it) as cwd.
    pub async fn run_command(
        &self,
        cmd: &str,
        cwd: Option<&str>,
        timeout_secs: u64,
    ) -> SandboxResult<CommandOutput> {
        let dir = match cwd {
            Some(rel) => {
                let dir = self.resolve(rel)?;
                if !dir.is_dir() {
                    return Err(SandboxError::NotADirectory(rel.to_string()));
                }
                dir
            }
            None => {
                self.ensure_live()?;
                self.path.clone()
            }
        };
        command::run(cmd, &dir, timeout_secs).await
    }
}

/// Canonicalize an existing entry. A dangling symlink resolves lexically to
/// its target so the containment check still sees where it points.
fn follow_links(path: PathBuf) -> SandboxResult<PathBuf> {
    match path.canonicalize() {
        Ok(canonical) => Ok(canonical),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let target = std::fs::read_link(&path)?;
            let mut resolved = path.parent().map(Path::to_path_buf).unwrap_or_default();
            for component in target.components() {
                match component {
                    Component::Prefix(_) | Component::RootDir => {
                        resolved = PathBuf::from(component.as_os_str())
                    }
                    Component::CurDir => {}
                    Component::ParentDir => {
                        resolved.pop();
                    }
                    Component::Normal(part) => resolved.push(part),
                }
            }
            Ok(resolved)
        }
        Err(e) => Err(e.into()),
    }
}

fn list_files_sync(root: &Path, target: &Path) -> SandboxResult<Vec<String>> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(target).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            SandboxError::Io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::Other, "filesystem loop detected")
            }))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(root) {
            let parts: Vec<String> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            files.push(parts.join("/"));
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn root() -> (TempDir, ProjectRoot) {
        let dir = TempDir::new().unwrap();
        let root = ProjectRoot::open(dir.path()).unwrap();
        (dir, root)
    }

    #[test]
    fn rejects_parent_traversal() {
        let (_dir, root) = root();
        assert!(matches!(
            root.resolve("../../etc/passwd"),
            Err(SandboxError::PathEscape(_))
        ));
        assert!(matches!(
            root.resolve("a/../../outside.txt"),
            Err(SandboxError::PathEscape(_))
        ));
    }

    #[test]
    fn reentering_the_root_is_allowed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("generated_project_7");
        std::fs::create_dir(&path).unwrap();
        let root = ProjectRoot::open(&path).unwrap();

        let resolved = root.resolve("../generated_project_7/index.html").unwrap();
        assert_eq!(resolved, root.path().join("index.html"));
        assert!(matches!(
            root.resolve("../generated_project_8/index.html"),
            Err(SandboxError::PathEscape(_))
        ));
    }

    #[test]
    fn absolute_paths_are_rooted() {
        let (_dir, root) = root();
        let resolved = root.resolve("/etc/passwd").unwrap();
        assert_eq!(resolved, root.path().join("etc").join("passwd"));
    }

    #[test]
    fn inner_parent_segments_stay_inside() {
        let (_dir, root) = root();
        let resolved = root.resolve("css/../js/./app.js").unwrap();
        assert_eq!(resolved, root.path().join("js").join("app.js"));
        assert_eq!(root.resolve(".").unwrap(), root.path());
    }

    #[cfg(unix)]
    #[test]
    fn rejects_symlink_escape() {
        let (_dir, root) = root();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("link")).unwrap();
        assert!(matches!(
            root.resolve("link/secret.txt"),
            Err(SandboxError::PathEscape(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dangling_symlinks_resolve_to_their_target() {
        let (_dir, root) = root();
        std::os::unix::fs::symlink("missing.html", root.path().join("inside")).unwrap();
        std::os::unix::fs::symlink("/nonexistent/secret", root.path().join("outside")).unwrap();

        assert_eq!(root.read("inside").await.unwrap(), "");
        assert_eq!(root.resolve("inside").unwrap(), root.path().join("missing.html"));
        assert!(matches!(
            root.read("outside").await,
            Err(SandboxError::PathEscape(_))
        ));
    }

    #[tokio::test]
    async fn read_of_absent_file_is_empty() {
        let (_dir, root) = root();
        assert_eq!(root.read("nonexistent.txt").await.unwrap(), "");
    }

    #[tokio::test]
    async fn write_then_read() {
        let (_dir, root) = root();
        let written = root.write("a/b.txt", "hello").await.unwrap();
        assert!(written.starts_with(root.path()));
        assert_eq!(root.read("a/b.txt").await.unwrap(), "hello");

        root.write("a/b.txt", "again").await.unwrap();
        assert_eq!(root.read("a/b.txt").await.unwrap(), "again");
    }

    #[tokio::test]
    async fn write_outside_root_is_rejected_before_io() {
        let (dir, root) = root();
        let err = root.write("../escaped.txt", "x").await.unwrap_err();
        assert!(matches!(err, SandboxError::PathEscape(_)));
        assert!(!dir.path().parent().unwrap().join("escaped.txt").exists());
    }

    #[tokio::test]
    async fn list_is_recursive_and_relative() {
        let (_dir, root) = root();
        root.write("index.html", "<html></html>").await.unwrap();
        root.write("css/styles.css", "body {}").await.unwrap();
        root.write("js/app/main.js", "").await.unwrap();

        assert_eq!(
            root.list(".").await.unwrap(),
            vec!["css/styles.css", "index.html", "js/app/main.js"]
        );
        assert_eq!(root.list("js").await.unwrap(), vec!["js/app/main.js"]);
    }

    #[tokio::test]
    async fn list_of_file_is_not_a_directory() {
        let (_dir, root) = root();
        root.write("index.html", "").await.unwrap();
        assert!(matches!(
            root.list("index.html").await,
            Err(SandboxError::NotADirectory(_))
        ));
    }

    #[tokio::test]
    async fn deleted_root_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("generated_project_3");
        std::fs::create_dir(&path).unwrap();
        let root = ProjectRoot::open(&path).unwrap();
        assert_eq!(root.serial(), Some(3));

        std::fs::remove_dir_all(&path).unwrap();
        assert!(matches!(
            root.read("index.html").await,
            Err(SandboxError::RootNotInitialized(_))
        ));
        assert!(matches!(
            ProjectRoot::open(&path),
            Err(SandboxError::RootNotInitialized(_))
        ));
    }
}
