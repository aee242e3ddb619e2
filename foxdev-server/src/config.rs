//! Command-line and environment configuration

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::defaults::{DEFAULT_INSTALL_COMMAND, DEFAULT_LISTEN, DEFAULT_RUN_COMMAND};
use crate::lifecycle::DevServerConfig;
use crate::projects::default_projects_dir;

/// foxdev - starts and tracks project dev servers for the preview pane
#[derive(Debug, Parser)]
#[command(name = "foxdev-server")]
#[command(version)]
#[command(about = "Starts, tracks and stops project dev servers for the codefox preview pane")]
pub struct Args {
    /// Address the HTTP API listens on
    #[arg(long, env = "FOXDEV_LISTEN", default_value = DEFAULT_LISTEN)]
    pub listen: SocketAddr,

    /// Directory containing one subdirectory per project
    /// (default: ~/.codefox-local/projects)
    #[arg(long, env = "FOXDEV_PROJECTS_DIR")]
    pub projects_dir: Option<PathBuf>,

    /// Command run in the project directory before every fresh start
    #[arg(long, env = "FOXDEV_INSTALL_COMMAND", default_value = DEFAULT_INSTALL_COMMAND)]
    pub install_command: String,

    /// Skip the dependency install step
    #[arg(long)]
    pub skip_install: bool,

    /// Dev server command
    #[arg(long, env = "FOXDEV_RUN_COMMAND", default_value = DEFAULT_RUN_COMMAND)]
    pub run_command: String,

    /// Seconds a dev server has to print its URL
    #[arg(long, env = "FOXDEV_START_TIMEOUT_SECS", default_value_t = 30)]
    pub start_timeout_secs: u64,

    /// Stop every running dev server when the daemon shuts down
    #[arg(long)]
    pub stop_on_exit: bool,
}

impl Args {
    pub fn dev_server_config(&self) -> DevServerConfig {
        DevServerConfig {
            projects_dir: self
                .projects_dir
                .clone()
                .unwrap_or_else(default_projects_dir),
            install_command: (!self.skip_install).then(|| self.install_command.clone()),
            run_command: self.run_command.clone(),
            start_timeout: Duration::from_secs(self.start_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_bun_workflow() {
        let args = Args::try_parse_from(["foxdev-server"]).unwrap();
        assert_eq!(args.listen, DEFAULT_LISTEN.parse::<SocketAddr>().unwrap());
        assert!(!args.stop_on_exit);

        let config = args.dev_server_config();
        assert_eq!(config.install_command.as_deref(), Some("bun install"));
        assert_eq!(config.run_command, "bun dev");
        assert_eq!(config.start_timeout, Duration::from_secs(30));
        assert!(config.projects_dir.ends_with(".codefox-local/projects"));
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "foxdev-server",
            "--listen",
            "127.0.0.1:9000",
            "--projects-dir",
            "/tmp/projects",
            "--run-command",
            "npm run dev",
            "--skip-install",
            "--start-timeout-secs",
            "5",
            "--stop-on-exit",
        ])
        .unwrap();
        assert!(args.stop_on_exit);

        let config = args.dev_server_config();
        assert_eq!(config.projects_dir, PathBuf::from("/tmp/projects"));
        assert_eq!(config.install_command, None);
        assert_eq!(config.run_command, "npm run dev");
        assert_eq!(config.start_timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_malformed_listen_address() {
        assert!(Args::try_parse_from(["foxdev-server", "--listen", "localhost"]).is_err());
    }
}
