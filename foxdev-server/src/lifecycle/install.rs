//! Dependency installation before a dev server launch

use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

use super::DevServerError;
use super::output::tail_chars;
use crate::defaults::OUTPUT_TAIL_CHARS;
use crate::projects::ProjectHandle;

/// Run `command` in the project directory and wait for it to finish.
pub async fn install_dependencies(
    command: &str,
    project: &ProjectHandle,
) -> Result<(), DevServerError> {
    tracing::info!(project = %project.id, command = %command, "Installing dependencies");

    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(&project.dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            DevServerError::DependencyInstall(format!(
                "failed to run '{}' in {}: {}",
                command,
                project.dir.display(),
                e
            ))
        })?;

    if !output.status.success() {
        return Err(DevServerError::DependencyInstall(format_process_failure(
            &format!("'{command}' failed"),
            output.status,
            &output.stdout,
            &output.stderr,
        )));
    }

    Ok(())
}

fn format_process_failure(
    context: &str,
    status: ExitStatus,
    stdout: &[u8],
    stderr: &[u8],
) -> String {
    let status_text = match status.code() {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    };

    let stderr_text = String::from_utf8_lossy(stderr).trim().to_string();
    let stdout_text = String::from_utf8_lossy(stdout).trim().to_string();
    let detail = if !stderr_text.is_empty() {
        stderr_text
    } else {
        stdout_text
    };

    if detail.is_empty() {
        return format!("{context} ({status_text})");
    }
    format!(
        "{context} ({status_text}): {}",
        tail_chars(&detail, OUTPUT_TAIL_CHARS)
    )
}
