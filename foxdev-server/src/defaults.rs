use std::time::Duration;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:4780";

pub const DEFAULT_INSTALL_COMMAND: &str = "bun install";
pub const DEFAULT_RUN_COMMAND: &str = "bun dev";
pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(30);

/// File whose presence marks a directory as a runnable project.
pub const PROJECT_MANIFEST: &str = "package.json";

/// Characters of captured output kept for error messages.
pub const OUTPUT_TAIL_CHARS: usize = 400;
/// Upper bound on output buffered while waiting for the listening URL.
pub const OUTPUT_BUFFER_BYTES: usize = 64 * 1024;

/// Grace period after SIGKILL when reaping a failed start.
pub const REAP_TIMEOUT: Duration = Duration::from_secs(5);
