//! Child process plumbing shared by the out-of-process backends

use rater_application::CalculationError;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Run a command to completion, killing it if it outlives `timeout`.
///
/// The child is killed on drop, so an elapsed timeout (or a cancelled
/// caller) never leaves it running.
pub async fn run(mut cmd: Command, timeout: Duration) -> Result<Output, CalculationError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Linux: request kernel to send SIGTERM to child when parent dies.
    #[cfg(target_os = "linux")]
    unsafe {
        cmd.pre_exec(|| {
            libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
            Ok(())
        });
    }

    debug!("Spawning {:?}", cmd.as_std());
    let child = cmd
        .spawn()
        .map_err(|e| CalculationError::Process(format!("failed to start {:?}: {e}", cmd.as_std().get_program())))?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| CalculationError::Process(e.to_string())),
        Err(_) => Err(CalculationError::Timeout(timeout.as_secs())),
    }
}

/// Require a zero exit status; the error carries the tail of stderr
pub fn check_status(what: &str, output: &Output) -> Result<(), CalculationError> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    let tail: String = stderr
        .chars()
        .rev()
        .take(500)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    Err(CalculationError::Process(format!(
        "{what} exited with {}{}",
        output.status,
        if tail.is_empty() { String::new() } else { format!(": {tail}") }
    )))
}

/// An executable given by path or resolved on PATH
pub fn resolve_program(program: &str) -> Option<PathBuf> {
    let path = Path::new(program);
    if path.components().count() > 1 {
        return path.is_file().then(|| path.to_path_buf());
    }
    which::which(program).ok()
}

pub async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), CalculationError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| CalculationError::Io(format!("{}: {e}", path.display())))
}

pub async fn read_file(path: &Path) -> Result<Vec<u8>, CalculationError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| CalculationError::Io(format!("{}: {e}", path.display())))
}

pub fn temp_dir() -> Result<tempfile::TempDir, CalculationError> {
    tempfile::Builder::new()
        .prefix("ims-rater-")
        .tempdir()
        .map_err(|e| CalculationError::Io(e.to_string()))
}
