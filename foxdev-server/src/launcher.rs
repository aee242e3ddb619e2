//! Process launcher - starts dev servers as detached background processes
//!
//! The command runs through `sh -c` in its own process group, so it keeps
//! running after the HTTP request that started it returns and so that a single
//! group signal reaches everything the command spawned. Both output pipes are
//! pumped chunk by chunk into one channel as soon as bytes arrive; the
//! launcher never looks at the content.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

const OUTPUT_CHANNEL_CAPACITY: usize = 256;
const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Exit codes `sh` uses when the command itself could not be run.
const SHELL_NOT_EXECUTABLE: i32 = 126;
const SHELL_NOT_FOUND: i32 = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStream::Stdout => write!(f, "stdout"),
            OutputStream::Stderr => write!(f, "stderr"),
        }
    }
}

/// Output exactly as read from one pipe; may hold partial lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub stream: OutputStream,
    pub text: String,
}

/// A freshly spawned process and its merged output
pub struct LaunchedProcess {
    pub pid: u32,
    pub child: Child,
    /// Chunks from stdout and stderr in arrival order. Closed once both pipes
    /// reach EOF.
    pub output: mpsc::Receiver<OutputChunk>,
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("working directory {} does not exist", .0.display())]
    MissingWorkingDir(PathBuf),

    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` could not be executed (exit code {code}){}", describe_shell_output(.output))]
    CommandUnavailable {
        command: String,
        code: i32,
        output: String,
    },
}

impl LaunchError {
    /// Classify an exit that happened before the command produced anything
    /// useful. `sh` reports a missing or non-executable program with 127 or
    /// 126; those are launch failures, not crashes of a running server.
    pub fn from_shell_exit(command: &str, code: Option<i32>, output: &str) -> Option<Self> {
        match code {
            Some(code @ (SHELL_NOT_EXECUTABLE | SHELL_NOT_FOUND)) => {
                Some(LaunchError::CommandUnavailable {
                    command: command.to_string(),
                    code,
                    output: output.to_string(),
                })
            }
            _ => None,
        }
    }
}

fn describe_shell_output(output: &str) -> String {
    if output.is_empty() {
        String::new()
    } else {
        format!(": {output}")
    }
}

/// Spawn `command` in `cwd` without waiting for it.
///
/// Must be called from within a tokio runtime; the output pumps run as tasks.
/// `scope` labels the debug log lines produced for this process.
pub fn launch(command: &str, cwd: &Path, scope: &str) -> Result<LaunchedProcess, LaunchError> {
    if !cwd.is_dir() {
        return Err(LaunchError::MissingWorkingDir(cwd.to_path_buf()));
    }

    let mut std_cmd = std::process::Command::new("sh");
    std_cmd
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        std_cmd.process_group(0);
    }

    let mut cmd = Command::from(std_cmd);
    cmd.kill_on_drop(false);

    let mut child = cmd.spawn().map_err(|source| LaunchError::Spawn {
        command: command.to_string(),
        source,
    })?;

    // tokio only forgets the pid once the child has been reaped.
    let Some(pid) = child.id() else {
        return Err(LaunchError::Spawn {
            command: command.to_string(),
            source: io::Error::other("process was reaped before its pid could be read"),
        });
    };

    tracing::debug!(scope = %scope, pid, command = %command, "Launched process");

    let (tx, rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
    if let Some(stdout) = child.stdout.take() {
        let tx = tx.clone();
        let scope = scope.to_string();
        tokio::spawn(async move { pump_output(stdout, OutputStream::Stdout, tx, scope).await });
    }
    if let Some(stderr) = child.stderr.take() {
        let scope = scope.to_string();
        tokio::spawn(async move { pump_output(stderr, OutputStream::Stderr, tx, scope).await });
    }

    Ok(LaunchedProcess {
        pid,
        child,
        output: rx,
    })
}

/// Forward chunks to `tx` while anyone listens, then keep draining so the
/// process never blocks on a full pipe.
async fn pump_output<R>(mut r: R, stream: OutputStream, tx: mpsc::Sender<OutputChunk>, scope: String)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK_BYTES];
    let mut pending = Vec::new();
    let mut forward = true;

    loop {
        let n = match r.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(scope = %scope, stream = %stream, error = %e, "Output pump stopped");
                break;
            }
        };

        pending.extend_from_slice(&buf[..n]);
        let text = take_utf8(&mut pending);
        if text.is_empty() {
            continue;
        }
        tracing::debug!(scope = %scope, stream = %stream, "{}", text.trim_end());

        if forward && tx.send(OutputChunk { stream, text }).await.is_err() {
            forward = false;
        }
    }

    if !pending.is_empty() && forward {
        let text = String::from_utf8_lossy(&pending).into_owned();
        let _ = tx.send(OutputChunk { stream, text }).await;
    }
}

/// Decode the longest prefix of `pending` that is text, leaving an incomplete
/// trailing UTF-8 sequence for the next read.
fn take_utf8(pending: &mut Vec<u8>) -> String {
    let keep = match std::str::from_utf8(pending) {
        Ok(_) => 0,
        Err(e) if e.error_len().is_none() => pending.len() - e.valid_up_to(),
        Err(_) => 0,
    };
    let tail = pending.split_off(pending.len() - keep);
    let text = String::from_utf8_lossy(pending).into_owned();
    *pending = tail;
    text
}
