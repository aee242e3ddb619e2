//! Watches a freshly launched dev server until it announces its URL, exits,
//! or runs out of time.
//!
//! Output is sniffed after every chunk. A match that runs up to the very end
//! of the output may still be growing (`http://localhost:51` + `73/`), so it is
//! only accepted once whitespace follows it or the output has been quiet for
//! a moment.

use std::time::Duration;
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::output::OutputBuffer;
use crate::launcher::OutputChunk;
use crate::sniff::sniff;

/// How long to keep collecting output after the process exits.
const EXIT_DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

/// Quiet period after which a match at the end of the output is accepted.
const URL_SETTLE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    Ready(String),
    Exited(Option<i32>),
    TimedOut,
}

#[derive(Debug)]
pub struct DetectionResult {
    pub detection: Detection,
    pub output: OutputBuffer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchState {
    AwaitingUrl,
    Resolved,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Progress {
    Waiting,
    /// A URL matched but the output stops right after it.
    Unsettled,
    Resolved(String),
}

/// Output accumulator that resolves at most once.
#[derive(Debug)]
struct Dispatcher {
    state: DispatchState,
    output: OutputBuffer,
}

impl Dispatcher {
    fn new() -> Self {
        Self {
            state: DispatchState::AwaitingUrl,
            output: OutputBuffer::new(),
        }
    }

    fn on_chunk(&mut self, chunk: &OutputChunk) -> Progress {
        self.output.push_str(&chunk.text);
        if self.state != DispatchState::AwaitingUrl {
            return Progress::Waiting;
        }
        let Some(url) = sniff(self.output.as_str()) else {
            return Progress::Waiting;
        };
        if !self.output.as_str().ends_with(char::is_whitespace) {
            return Progress::Unsettled;
        }
        self.state = DispatchState::Resolved;
        Progress::Resolved(url)
    }

    /// Accept whatever currently matches; called once output went quiet.
    fn settle(&mut self) -> Option<String> {
        if self.state != DispatchState::AwaitingUrl {
            return None;
        }
        let url = sniff(self.output.as_str())?;
        self.state = DispatchState::Resolved;
        Some(url)
    }

    fn finish(mut self, detection: Detection) -> DetectionResult {
        if !matches!(detection, Detection::Ready(_)) {
            self.state = DispatchState::Failed;
        }
        tracing::debug!(state = ?self.state, "URL detection finished");
        DetectionResult {
            detection,
            output: self.output,
        }
    }

    /// A matched URL only counts while the process is still alive.
    fn confirm(self, child: &mut Child, url: String) -> DetectionResult {
        match child.try_wait() {
            Ok(None) => self.finish(Detection::Ready(url)),
            Ok(Some(status)) => self.finish(Detection::Exited(status.code())),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to poll dev server process");
                self.finish(Detection::Exited(None))
            }
        }
    }
}

/// Drive detection for one launched process.
pub async fn await_url(
    child: &mut Child,
    output: &mut mpsc::Receiver<OutputChunk>,
    timeout: Duration,
) -> DetectionResult {
    let mut dispatcher = Dispatcher::new();
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    let mut output_open = true;
    let mut settle_at: Option<Instant> = None;

    loop {
        tokio::select! {
            biased;

            chunk = output.recv(), if output_open => {
                let Some(chunk) = chunk else {
                    output_open = false;
                    continue;
                };
                match dispatcher.on_chunk(&chunk) {
                    Progress::Waiting => {}
                    Progress::Unsettled => settle_at = Some(Instant::now() + URL_SETTLE_DELAY),
                    Progress::Resolved(url) => return dispatcher.confirm(child, url),
                }
            }

            _ = tokio::time::sleep_until(settle_at.unwrap_or_else(Instant::now)), if settle_at.is_some() => {
                settle_at = None;
                if let Some(url) = dispatcher.settle() {
                    return dispatcher.confirm(child, url);
                }
            }

            status = child.wait() => {
                let code = match status {
                    Ok(status) => status.code(),
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to wait for dev server process");
                        None
                    }
                };
                if output_open {
                    drain_remaining(&mut dispatcher, output).await;
                }
                return dispatcher.finish(Detection::Exited(code));
            }

            _ = &mut deadline => {
                return dispatcher.finish(Detection::TimedOut);
            }
        }
    }
}

async fn drain_remaining(dispatcher: &mut Dispatcher, output: &mut mpsc::Receiver<OutputChunk>) {
    let drain = async {
        while let Some(chunk) = output.recv().await {
            dispatcher.output.push_str(&chunk.text);
        }
    };
    let _ = tokio::time::timeout(EXIT_DRAIN_TIMEOUT, drain).await;
}
