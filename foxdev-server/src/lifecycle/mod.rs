//! Dev server lifecycle management
//!
//! Starts, stops and reports on one dev server per project. The registry is
//! the only shared state; everything else here is per-request.

mod dispatch;
mod install;
mod output;

use crate::defaults::{
    DEFAULT_INSTALL_COMMAND, DEFAULT_RUN_COMMAND, DEFAULT_START_TIMEOUT, REAP_TIMEOUT,
};
use crate::launcher::{self, LaunchError, LaunchedProcess};
use crate::process::{Delivery, ProcessControl, Signal};
use crate::projects::{ProjectError, Projects, default_projects_dir, validate_project_id};
use crate::registry::{DevServerRecord, DevServerRegistry};
use dispatch::Detection;
use foxdev_core::StatusResponse;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Child;

/// Controller configuration
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Directory holding one subdirectory per project
    pub projects_dir: PathBuf,
    /// Run to completion before every fresh start; `None` skips the step
    pub install_command: Option<String>,
    /// Long-running dev server command
    pub run_command: String,
    /// How long a fresh start may take to print its URL
    pub start_timeout: Duration,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            projects_dir: default_projects_dir(),
            install_command: Some(DEFAULT_INSTALL_COMMAND.to_string()),
            run_command: DEFAULT_RUN_COMMAND.to_string(),
            start_timeout: DEFAULT_START_TIMEOUT,
        }
    }
}

#[derive(Debug, Error)]
pub enum DevServerError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("No package.json found in project {0}")]
    NoManifest(String),

    #[error("No dev server running for project {0}")]
    NotRunning(String),

    #[error("Dev server for project {0} is already starting")]
    StartInProgress(String),

    #[error("Failed to install dependencies: {0}")]
    DependencyInstall(String),

    #[error("Failed to start dev server: {0}")]
    Spawn(#[from] LaunchError),

    #[error("Dev server {} before printing a URL{}", describe_exit(.code), describe_output(.output))]
    PrematureExit { code: Option<i32>, output: String },

    #[error(
        "Dev server (pid {pid}) did not print a URL within {}s{}",
        describe_timeout(.timeout),
        describe_output(.output)
    )]
    StartTimeout {
        pid: u32,
        timeout: Duration,
        output: String,
    },

    #[error("Failed to stop dev server (pid {pid}): {source}")]
    Signal {
        pid: u32,
        #[source]
        source: io::Error,
    },
}

impl From<ProjectError> for DevServerError {
    fn from(err: ProjectError) -> Self {
        match err {
            ProjectError::InvalidId(msg) => DevServerError::InvalidInput(msg),
            ProjectError::NotFound(id) => DevServerError::ProjectNotFound(id),
            ProjectError::NoManifest(id) => DevServerError::NoManifest(id),
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {code}"),
        None => "was terminated by a signal".to_string(),
    }
}

fn describe_timeout(timeout: &Duration) -> String {
    timeout.as_secs_f64().to_string()
}

fn describe_output(output: &str) -> String {
    if output.is_empty() {
        String::new()
    } else {
        format!(". Output: {output}")
    }
}

/// Result of a successful start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOutcome {
    pub pid: u32,
    pub url: String,
    /// The server was already running; nothing was spawned.
    pub cached: bool,
}

/// Owns the start/stop/status policy for all projects
pub struct LifecycleController {
    config: DevServerConfig,
    projects: Projects,
    registry: Arc<DevServerRegistry>,
    processes: Arc<dyn ProcessControl>,
    /// Project ids with a start in flight
    starting: Mutex<HashSet<String>>,
}

impl LifecycleController {
    pub fn new(
        config: DevServerConfig,
        registry: Arc<DevServerRegistry>,
        processes: Arc<dyn ProcessControl>,
    ) -> Self {
        let projects = Projects::new(config.projects_dir.clone());
        Self {
            config,
            projects,
            registry,
            processes,
            starting: Mutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &DevServerConfig {
        &self.config
    }

    /// Start the dev server for `project_id`, or return the running one.
    pub async fn start(&self, project_id: &str) -> Result<StartOutcome, DevServerError> {
        validate_project_id(project_id)?;

        if let Some(outcome) = self.cached(project_id) {
            return Ok(outcome);
        }

        let _guard = self.begin_start(project_id)?;

        // A start that finished between the lookup above and taking the guard
        // has already registered its server.
        if let Some(outcome) = self.cached(project_id) {
            return Ok(outcome);
        }

        let project = self.projects.resolve(project_id)?;
        project.require_manifest()?;

        if let Some(command) = &self.config.install_command {
            install::install_dependencies(command, &project).await?;
        }

        tracing::info!(
            project = %project_id,
            command = %self.config.run_command,
            "Starting dev server"
        );
        let LaunchedProcess {
            pid,
            mut child,
            mut output,
        } = launcher::launch(&self.config.run_command, &project.dir, project_id)?;

        let result = dispatch::await_url(&mut child, &mut output, self.config.start_timeout).await;
        drop(output);

        match result.detection {
            Detection::Ready(url) => {
                self.registry
                    .set(DevServerRecord::running(project_id, pid, url.clone()));
                watch_exit(project_id.to_string(), pid, child);
                tracing::info!(project = %project_id, pid, url = %url, "Dev server running");
                Ok(StartOutcome {
                    pid,
                    url,
                    cached: false,
                })
            }
            Detection::Exited(code) => {
                self.abandon(project_id, pid, child).await;
                let output = result.output.tail();
                if let Some(err) =
                    LaunchError::from_shell_exit(&self.config.run_command, code, &output)
                {
                    tracing::warn!(project = %project_id, pid, error = %err, "Dev server command could not run");
                    return Err(err.into());
                }
                tracing::warn!(project = %project_id, pid, code = ?code, "Dev server exited during startup");
                Err(DevServerError::PrematureExit { code, output })
            }
            Detection::TimedOut => {
                self.abandon(project_id, pid, child).await;
                tracing::warn!(
                    project = %project_id,
                    pid,
                    timeout_secs = self.config.start_timeout.as_secs_f64(),
                    "Dev server did not print a URL in time"
                );
                Err(DevServerError::StartTimeout {
                    pid,
                    timeout: self.config.start_timeout,
                    output: result.output.tail(),
                })
            }
        }
    }

    /// Signal the project's dev server to terminate and forget it.
    pub fn stop(&self, project_id: &str) -> Result<DevServerRecord, DevServerError> {
        validate_project_id(project_id)?;

        let record = self
            .registry
            .get(project_id)
            .ok_or_else(|| DevServerError::NotRunning(project_id.to_string()))?;

        let delivery = self.processes.signal(record.pid, Signal::Terminate);
        self.registry.delete(project_id);

        match delivery {
            Ok(Delivery::Delivered) => {
                tracing::info!(project = %project_id, pid = record.pid, "Dev server stopped");
            }
            Ok(Delivery::AlreadyGone) => {
                tracing::info!(project = %project_id, pid = record.pid, "Dev server had already exited");
            }
            Err(source) => {
                return Err(DevServerError::Signal {
                    pid: record.pid,
                    source,
                });
            }
        }

        Ok(record)
    }

    /// Current state of the project's dev server.
    ///
    /// A record whose process has died is removed before answering.
    pub fn status(&self, project_id: &str) -> Result<StatusResponse, DevServerError> {
        validate_project_id(project_id)?;

        match self.live_record(project_id) {
            Some(record) => Ok(StatusResponse::running(
                record.url.unwrap_or_default(),
                record.pid,
            )),
            None if self.starting.lock().contains(project_id) => Ok(StatusResponse::starting()),
            None => Ok(StatusResponse::idle()),
        }
    }

    /// Every dev server that is still alive, sorted by project id.
    pub fn list(&self) -> Vec<DevServerRecord> {
        self.registry
            .list()
            .into_iter()
            .filter_map(|record| self.live_record(&record.project_id))
            .collect()
    }

    /// Stop every registered dev server. Returns how many were stopped.
    pub fn stop_all(&self) -> usize {
        let mut stopped = 0;
        for record in self.registry.list() {
            match self.stop(&record.project_id) {
                Ok(_) => stopped += 1,
                Err(e) => {
                    tracing::warn!(project = %record.project_id, error = %e, "Failed to stop dev server");
                }
            }
        }
        stopped
    }

    /// The project's record, if its process is still alive. Dead records are
    /// deleted.
    fn live_record(&self, project_id: &str) -> Option<DevServerRecord> {
        let record = self.registry.get(project_id)?;
        if self.processes.is_alive(record.pid) {
            return Some(record);
        }

        if self.registry.delete_if_pid(project_id, record.pid) {
            tracing::info!(project = %project_id, pid = record.pid, "Dev server is no longer running");
        }
        None
    }

    fn cached(&self, project_id: &str) -> Option<StartOutcome> {
        let record = self.live_record(project_id)?;
        tracing::debug!(project = %project_id, pid = record.pid, "Dev server already running");
        Some(StartOutcome {
            pid: record.pid,
            url: record.url.unwrap_or_default(),
            cached: true,
        })
    }

    fn begin_start(&self, project_id: &str) -> Result<StartGuard<'_>, DevServerError> {
        let mut starting = self.starting.lock();
        if !starting.insert(project_id.to_string()) {
            return Err(DevServerError::StartInProgress(project_id.to_string()));
        }
        Ok(StartGuard {
            starting: &self.starting,
            project_id: project_id.to_string(),
        })
    }

    /// Kill a process that failed to start and wait for it to be reaped.
    async fn abandon(&self, project_id: &str, pid: u32, mut child: Child) {
        if let Err(e) = self.processes.signal(pid, Signal::Kill) {
            tracing::warn!(project = %project_id, pid, error = %e, "Failed to kill dev server process group");
        }
        let _ = child.start_kill();

        match tokio::time::timeout(REAP_TIMEOUT, child.wait()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                tracing::warn!(project = %project_id, pid, error = %e, "Failed to reap dev server");
            }
            Err(_) => {
                tracing::warn!(project = %project_id, pid, "Timed out reaping dev server");
            }
        }
    }
}

/// Marks a project as starting until dropped
struct StartGuard<'a> {
    starting: &'a Mutex<HashSet<String>>,
    project_id: String,
}

impl Drop for StartGuard<'_> {
    fn drop(&mut self) {
        self.starting.lock().remove(&self.project_id);
    }
}

/// Reap the dev server when it exits and log how it went.
fn watch_exit(project_id: String, pid: u32, mut child: Child) {
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => {
                tracing::info!(project = %project_id, pid, status = %status, "Dev server exited");
            }
            Err(e) => {
                tracing::warn!(project = %project_id, pid, error = %e, "Failed to wait for dev server");
            }
        }
    });
}
