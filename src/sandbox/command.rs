//! Shell escape hatch: run a command inside a project root.
//!
//! The command text is not inspected. Only the working directory is confined.

use std::path::Path;
use std::process::Stdio;

use serde::Serialize;
use tokio::process::Command;

use super::{SandboxError, SandboxResult};

/// Result of a finished shell command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

pub(super) async fn run(cmd: &str, cwd: &Path, timeout_secs: u64) -> SandboxResult<CommandOutput> {
    tracing::info!("Executing command in {}: {}", cwd.display(), cmd);

    let (shell, shell_arg) = if cfg!(target_os = "windows") {
        ("cmd", "/C")
    } else {
        ("sh", "-c")
    };

    let child = Command::new(shell)
        .arg(shell_arg)
        .arg(cmd)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let output = tokio::time::timeout(
        std::time::Duration::from_secs(timeout_secs),
        child.wait_with_output(),
    )
    .await
    .map_err(|_| SandboxError::Timeout(timeout_secs))??;

    Ok(CommandOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use crate::sandbox::{ProjectRoot, SandboxError};
    use tempfile::TempDir;

    #[tokio::test]
    async fn runs_in_root_and_captures_output() {
        let dir = TempDir::new().unwrap();
        let root = ProjectRoot::open(dir.path()).unwrap();
        root.write("hello.txt", "hi").await.unwrap();

        let out = root
            .run_command("cat hello.txt; echo oops >&2; exit 3", None, 10)
            .await
            .unwrap();
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stdout, "hi");
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn cwd_must_stay_inside_root() {
        let dir = TempDir::new().unwrap();
        let root = ProjectRoot::open(dir.path()).unwrap();
        assert!(matches!(
            root.run_command("pwd", Some(".."), 10).await,
            Err(SandboxError::PathEscape(_))
        ));
    }

    #[tokio::test]
    async fn times_out() {
        let dir = TempDir::new().unwrap();
        let root = ProjectRoot::open(dir.path()).unwrap();
        assert!(matches!(
            root.run_command("sleep 5", None, 1).await,
            Err(SandboxError::Timeout(1))
        ));
    }
}
