use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

/// Prints a URL like Vite does and then stays up.
#[allow(dead_code)]
pub const VITE_LIKE: &str =
    "echo '  VITE v5.0.0  ready in 120 ms'; echo '  ➜  Local:   http://localhost:5173/'; exec sleep 60";

pub fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn pick_unused_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("failed to bind to ephemeral port")
        .local_addr()
        .expect("failed to read local addr")
        .port()
}

pub fn wait_for<F>(timeout: Duration, mut f: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if f() {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    false
}

#[allow(dead_code)]
pub fn pid_exists(pid: u32) -> bool {
    let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[allow(dead_code)]
pub fn kill_group(pid: u32) {
    unsafe {
        libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
    }
}

pub fn write_project(projects_dir: &Path, id: &str) -> PathBuf {
    let dir = projects_dir.join(id);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("package.json"),
        r#"{"name":"preview-app","scripts":{"dev":"vite"}}"#,
    )
    .unwrap();
    dir
}

pub struct TestServer {
    child: Option<Child>,
    pub port: u16,
    pub projects_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    pub fn start(run_command: &str) -> Self {
        Self::start_with(run_command, 5, &[])
    }

    pub fn start_with(run_command: &str, start_timeout_secs: u64, extra_args: &[&str]) -> Self {
        let projects_dir = TempDir::new().unwrap();
        let port = pick_unused_port();

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_foxdev-server"));
        cmd.args([
            "--listen",
            &format!("127.0.0.1:{port}"),
            "--projects-dir",
            projects_dir.path().to_string_lossy().as_ref(),
            "--skip-install",
            "--run-command",
            run_command,
            "--start-timeout-secs",
            &start_timeout_secs.to_string(),
        ])
        .args(extra_args)
        .env("RUST_LOG", "warn")
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
        let mut child = cmd.spawn().expect("failed to start foxdev-server");

        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if let Ok(Some(status)) = child.try_wait() {
                panic!("foxdev-server exited early: {status}");
            }
            if TcpStream::connect(("127.0.0.1", port)).is_ok() {
                return Self {
                    child: Some(child),
                    port,
                    projects_dir,
                };
            }
            thread::sleep(Duration::from_millis(50));
        }

        let _ = child.kill();
        let _ = child.wait();
        panic!("foxdev-server never started listening on port {port}");
    }

    pub fn project(&self, id: &str) -> PathBuf {
        write_project(self.projects_dir.path(), id)
    }

    /// Send one HTTP/1.1 request and return the status code and JSON body.
    pub fn request(&self, method: &str, path: &str, body: Option<&str>) -> (u16, serde_json::Value) {
        let mut stream = TcpStream::connect(("127.0.0.1", self.port)).expect("connect http");
        stream.set_read_timeout(Some(Duration::from_secs(30))).ok();

        let body = body.unwrap_or("");
        let request = format!(
            "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(request.as_bytes()).unwrap();

        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).unwrap();
        let raw = String::from_utf8_lossy(&buf).to_string();

        let (head, payload) = raw
            .split_once("\r\n\r\n")
            .unwrap_or_else(|| panic!("malformed response: {raw}"));
        let status = head
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .unwrap_or_else(|| panic!("malformed status line: {head}"));
        let json = serde_json::from_str(payload)
            .unwrap_or_else(|e| panic!("response body is not JSON ({e}): {payload}"));
        (status, json)
    }

    pub fn start_project(&self, id: &str) -> (u16, serde_json::Value) {
        let body = format!(r#"{{"projectId":"{id}"}}"#);
        self.request("POST", "/dev-server", Some(&body))
    }

    pub fn status(&self, id: &str) -> serde_json::Value {
        self.request("GET", &format!("/dev-server?projectId={id}"), None).1
    }

    pub fn stop_project(&self, id: &str) -> (u16, serde_json::Value) {
        self.request("DELETE", &format!("/dev-server?projectId={id}"), None)
    }

    /// SIGTERM the daemon and wait for it to exit.
    pub fn terminate(&mut self) -> Option<ExitStatus> {
        let mut child = self.child.take()?;
        unsafe {
            libc::kill(child.id() as libc::pid_t, libc::SIGTERM);
        }
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if let Ok(Some(status)) = child.try_wait() {
                return Some(status);
            }
            thread::sleep(Duration::from_millis(50));
        }
        let _ = child.kill();
        child.wait().ok()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
