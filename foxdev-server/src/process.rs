//! OS process probing and signalling
//!
//! Dev servers are launched as process-group leaders, so signals go to the
//! whole group first (the `sh -c` wrapper plus whatever it started) and fall
//! back to the single pid when no such group exists.
//!
//! Liveness is checked with `kill(pid, 0)`. PIDs can be reused by the OS, so a
//! long-dead server could in theory be reported alive if an unrelated process
//! picked up its pid. That is acceptable for a single-user local tool whose
//! sessions are short-lived.

use std::io;

/// Signal sent to a dev server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// SIGTERM, used for explicit stops.
    Terminate,
    /// SIGKILL, used when a start attempt is abandoned.
    Kill,
}

impl Signal {
    fn as_raw(self) -> libc::c_int {
        match self {
            Signal::Terminate => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
        }
    }
}

/// Result of a successful signal call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The process no longer existed.
    AlreadyGone,
}

/// Process capabilities the lifecycle controller depends on
pub trait ProcessControl: Send + Sync {
    /// Non-destructive existence check.
    fn is_alive(&self, pid: u32) -> bool;

    /// Deliver `signal` to the process group led by `pid`, or to `pid` alone.
    fn signal(&self, pid: u32, signal: Signal) -> io::Result<Delivery>;
}

/// `ProcessControl` backed by real POSIX signals
#[derive(Debug, Default, Clone, Copy)]
pub struct OsProcessControl;

impl ProcessControl for OsProcessControl {
    fn is_alive(&self, pid: u32) -> bool {
        pid_exists(pid)
    }

    fn signal(&self, pid: u32, signal: Signal) -> io::Result<Delivery> {
        let Some(raw_pid) = checked_pid(pid) else {
            return Ok(Delivery::AlreadyGone);
        };

        match send(-raw_pid, signal) {
            Ok(()) => return Ok(Delivery::Delivered),
            Err(e) if e.raw_os_error() == Some(libc::ESRCH) => {}
            Err(e) => return Err(e),
        }

        match send(raw_pid, signal) {
            Ok(()) => Ok(Delivery::Delivered),
            Err(e) if e.raw_os_error() == Some(libc::ESRCH) => Ok(Delivery::AlreadyGone),
            Err(e) => Err(e),
        }
    }
}

/// `kill(pid, 0)` existence check.
///
/// Returns true if the process exists, including when it exists but belongs to
/// another user (EPERM).
pub fn pid_exists(pid: u32) -> bool {
    let Some(raw_pid) = checked_pid(pid) else {
        return false;
    };
    // SAFETY: signal 0 performs permission and existence checks only.
    let r = unsafe { libc::kill(raw_pid, 0) };
    if r == 0 {
        return true;
    }
    matches!(
        io::Error::last_os_error().raw_os_error(),
        Some(code) if code == libc::EPERM
    )
}

// pid 0 and negative values address process groups, never a single server.
fn checked_pid(pid: u32) -> Option<libc::pid_t> {
    libc::pid_t::try_from(pid).ok().filter(|p| *p > 0)
}

fn send(target: libc::pid_t, signal: Signal) -> io::Result<()> {
    // SAFETY: plain signal delivery; `target` is never 0 or -1.
    let r = unsafe { libc::kill(target, signal.as_raw()) };
    if r == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};

    #[test]
    fn current_process_is_alive() {
        assert!(pid_exists(std::process::id()));
    }

    #[test]
    fn reserved_pids_are_never_alive() {
        assert!(!pid_exists(0));
        assert!(!pid_exists(u32::MAX));
    }

    #[test]
    fn signalling_reserved_pid_is_a_noop() {
        let control = OsProcessControl;
        assert_eq!(
            control.signal(0, Signal::Terminate).unwrap(),
            Delivery::AlreadyGone
        );
    }

    #[test]
    fn kill_then_reap_reports_gone() {
        let mut child = Command::new("sleep")
            .arg("30")
            .stdout(Stdio::null())
            .spawn()
            .unwrap();
        let pid = child.id();
        let control = OsProcessControl;
        assert!(control.is_alive(pid));

        assert_eq!(control.signal(pid, Signal::Kill).unwrap(), Delivery::Delivered);
        child.wait().unwrap();

        assert!(!control.is_alive(pid));
        assert_eq!(
            control.signal(pid, Signal::Terminate).unwrap(),
            Delivery::AlreadyGone
        );
    }
}
