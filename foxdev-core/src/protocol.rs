//! Dev-server protocol types for the daemon's HTTP surface
//!
//! Field names are camelCase on the wire because the only consumer is a
//! browser UI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a project's dev server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevServerStatus {
    /// No dev server is tracked for the project.
    Idle,
    /// A start request is in flight.
    Starting,
    Running,
    /// The most recent start attempt failed.
    Error,
}

impl std::fmt::Display for DevServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DevServerStatus::Idle => write!(f, "idle"),
            DevServerStatus::Starting => write!(f, "starting"),
            DevServerStatus::Running => write!(f, "running"),
            DevServerStatus::Error => write!(f, "error"),
        }
    }
}

/// Body of `POST /dev-server`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    #[serde(default)]
    pub project_id: Option<String>,
}

/// Successful start (fresh or cached)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub url: String,
    pub pid: u32,
    pub status: DevServerStatus,
    /// True when an already running server was returned without spawning.
    pub cached: bool,
}

/// Successful stop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopResponse {
    pub success: bool,
    pub message: String,
}

/// Answer to `GET /dev-server?projectId=...`
///
/// `url` and `pid` are only set while the server is running.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: DevServerStatus,
    pub url: Option<String>,
    pub pid: Option<u32>,
}

impl StatusResponse {
    pub fn idle() -> Self {
        Self {
            status: DevServerStatus::Idle,
            url: None,
            pid: None,
        }
    }

    pub fn starting() -> Self {
        Self {
            status: DevServerStatus::Starting,
            url: None,
            pid: None,
        }
    }

    pub fn running(url: impl Into<String>, pid: u32) -> Self {
        Self {
            status: DevServerStatus::Running,
            url: Some(url.into()),
            pid: Some(pid),
        }
    }
}

/// One running dev server in `GET /dev-servers`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevServerInfo {
    pub project_id: String,
    pub url: String,
    pub pid: u32,
    pub status: DevServerStatus,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub servers: Vec<DevServerInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloResponse {
    pub server_version: String,
    pub projects_dir: String,
}

/// Error body returned with every non-2xx response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    /// Set to `error` for failed start attempts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DevServerStatus>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            status: None,
        }
    }

    pub fn start_failed(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            status: Some(DevServerStatus::Error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&DevServerStatus::Running).unwrap();
        assert_eq!(json, r#""running""#);
        assert_eq!(DevServerStatus::Idle.to_string(), "idle");
        assert_eq!(DevServerStatus::Starting.to_string(), "starting");
    }

    #[test]
    fn test_start_request_uses_camel_case() {
        let req: StartRequest = serde_json::from_str(r#"{"projectId":"project-1"}"#).unwrap();
        assert_eq!(req.project_id.as_deref(), Some("project-1"));
    }

    #[test]
    fn test_start_request_without_project_id() {
        let req: StartRequest = serde_json::from_str("{}").unwrap();
        assert!(req.project_id.is_none());
    }

    #[test]
    fn test_idle_status_serializes_nulls() {
        let json = serde_json::to_value(StatusResponse::idle()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "idle", "url": null, "pid": null})
        );
    }

    #[test]
    fn test_start_response_shape() {
        let resp = StartResponse {
            url: "http://localhost:5173".to_string(),
            pid: 42,
            status: DevServerStatus::Running,
            cached: true,
        };
        let json = serde_json::to_value(resp).unwrap();
        assert_eq!(json["status"], "running");
        assert_eq!(json["cached"], true);
        assert_eq!(json["pid"], 42);
    }

    #[test]
    fn test_error_body_omits_status_unless_start_failed() {
        let plain = serde_json::to_string(&ErrorBody::new("nope")).unwrap();
        assert_eq!(plain, r#"{"error":"nope"}"#);

        let failed = serde_json::to_value(ErrorBody::start_failed("boom")).unwrap();
        assert_eq!(failed["status"], "error");
    }

    #[test]
    fn test_dev_server_info_uses_camel_case() {
        let info = DevServerInfo {
            project_id: "p".to_string(),
            url: "http://localhost:3000".to_string(),
            pid: 7,
            status: DevServerStatus::Running,
            started_at: Utc::now(),
        };
        let json = serde_json::to_value(info).unwrap();
        assert!(json.get("projectId").is_some());
        assert!(json.get("startedAt").is_some());
    }
}
