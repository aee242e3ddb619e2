//! Project directory resolution
//!
//! Projects are scaffolded elsewhere into `<projects-dir>/<project-id>`; this
//! module only maps ids onto those directories and checks they are runnable.

use std::path::PathBuf;
use thiserror::Error;

use crate::defaults::PROJECT_MANIFEST;

const MAX_PROJECT_ID_LEN: usize = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectError {
    #[error("Invalid project id: {0}")]
    InvalidId(String),

    #[error("Project not found: {0}")]
    NotFound(String),

    #[error("No package.json found in project {0}")]
    NoManifest(String),
}

/// A resolved project: its id and working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectHandle {
    pub id: String,
    pub dir: PathBuf,
}

impl ProjectHandle {
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(PROJECT_MANIFEST)
    }

    pub fn require_manifest(&self) -> Result<(), ProjectError> {
        if self.manifest_path().is_file() {
            Ok(())
        } else {
            Err(ProjectError::NoManifest(self.id.clone()))
        }
    }
}

/// Maps project ids to directories under a single root
#[derive(Debug, Clone)]
pub struct Projects {
    root: PathBuf,
}

impl Projects {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve an id to an existing project directory.
    pub fn resolve(&self, project_id: &str) -> Result<ProjectHandle, ProjectError> {
        validate_project_id(project_id)?;
        let dir = self.root.join(project_id);
        if !dir.is_dir() {
            return Err(ProjectError::NotFound(project_id.to_string()));
        }
        Ok(ProjectHandle {
            id: project_id.to_string(),
            dir,
        })
    }
}

/// Project ids must be a single plain path segment so they can never address
/// anything outside the projects root.
pub fn validate_project_id(project_id: &str) -> Result<(), ProjectError> {
    let invalid = |reason: &str| Err(ProjectError::InvalidId(format!("{project_id:?} {reason}")));

    if project_id.trim().is_empty() {
        return Err(ProjectError::InvalidId("projectId is required".to_string()));
    }
    if project_id.len() > MAX_PROJECT_ID_LEN {
        return invalid("is too long");
    }
    if project_id.starts_with('.') {
        return invalid("must not start with '.'");
    }
    if project_id
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_control())
    {
        return invalid("must not contain path separators or control characters");
    }
    Ok(())
}

/// `$HOME/.codefox-local/projects`, or relative to the working directory when
/// no home directory is known.
pub fn default_projects_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".codefox-local")
        .join("projects")
}
