use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Locate an external tool, preferring the configured command over `default`.
pub(crate) fn discover(configured: Option<&str>, default: &str) -> Result<PathBuf> {
    let command = configured.unwrap_or(default);
    match which::which(command) {
        Ok(path) => {
            tracing::debug!(tool = %path.display(), "External tool found");
            Ok(path)
        },
        Err(_) => {
            tracing::info!(tool = command, "External tool not found in PATH");
            exn::bail!(ErrorKind::ToolNotFound(command.to_string()))
        },
    }
}

/// Run `program` to completion, failing on a non-zero exit.
pub(crate) async fn run<I, S>(program: &Path, args: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let name = program.file_name().map_or_else(|| program.display().to_string(), |n| n.to_string_lossy().into_owned());
    let output = tokio::process::Command::new(program)
        .args(args)
        .output()
        .await
        .or_raise(|| ErrorKind::ToolFailed(name.clone()))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::debug!(tool = %name, status = %output.status, stderr = %stderr.trim(), "External tool exited unsuccessfully");
        exn::bail!(ErrorKind::ToolFailed(name));
    }
    Ok(())
}
