use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::domain::value_objects::{Environment, ProjectId};

/// What to do to the target environments of a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ResolutionAction {
    /// Propagate the source environment's value to every target.
    Copy,
    /// Remove the key from every target.
    Delete,
}

impl ResolutionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionAction::Copy => "copy",
            ResolutionAction::Delete => "delete",
        }
    }
}

impl fmt::Display for ResolutionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionAction {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "copy" => Ok(ResolutionAction::Copy),
            "delete" => Ok(ResolutionAction::Delete),
            _ => Err(ResolveError::UnknownAction(s.to_string())),
        }
    }
}

impl TryFrom<String> for ResolutionAction {
    type Error = ResolveError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Outcome recorded for one target environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionTaken {
    Created,
    Updated,
    Deleted,
    /// Nothing was written; `error` says why.
    Skipped,
}

impl ActionTaken {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionTaken::Created => "created",
            ActionTaken::Updated => "updated",
            ActionTaken::Deleted => "deleted",
            ActionTaken::Skipped => "skipped",
        }
    }
}

/// A request to resolve one conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub project_id: ProjectId,
    pub key_name: String,
    /// Required for `copy`, ignored for `delete`.
    #[serde(default)]
    pub source_environment: Option<Environment>,
    pub target_environments: Vec<Environment>,
    pub action: ResolutionAction,
}

impl ResolveRequest {
    /// Reject malformed requests before anything is read or written.
    pub fn validate(&self) -> Result<(), ResolveError> {
        if self.project_id.0.trim().is_empty() {
            return Err(ResolveError::InvalidRequest(
                "project_id must not be empty".into(),
            ));
        }
        if self.key_name.trim().is_empty() {
            return Err(ResolveError::InvalidRequest(
                "key_name must not be empty".into(),
            ));
        }
        if self.target_environments.is_empty() {
            return Err(ResolveError::InvalidRequest(
                "target_environments must contain at least one environment".into(),
            ));
        }
        let mut seen = BTreeSet::new();
        for &env in &self.target_environments {
            if !seen.insert(env) {
                let reason = format!("{} is listed more than once in target_environments", env);
                return Err(ResolveError::InvalidRequest(reason));
            }
        }
        if self.action == ResolutionAction::Copy && self.source_environment.is_none() {
            return Err(ResolveError::InvalidRequest(
                "source_environment is required for copy".into(),
            ));
        }
        Ok(())
    }
}

/// Per-target slot of a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionResult {
    pub environment: Environment,
    pub action_taken: ActionTaken,
    /// `None` on success, otherwise the rendered error chain.
    pub error: Option<String>,
}

impl ResolutionResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Response of a resolution. `success` means the request itself was
/// well-formed and ran; individual targets may still carry errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionReport {
    pub success: bool,
    pub results: Vec<ResolutionResult>,
}

impl ResolutionReport {
    pub fn new(results: Vec<ResolutionResult>) -> Self {
        Self {
            success: true,
            results,
        }
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.is_ok()).count()
    }
}

/// Whole-request failures. Per-target failures never surface here.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Malformed request; nothing was touched.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unsupported action `{0}` (expected copy or delete)")]
    UnknownAction(String),

    /// The copy source does not exist; no target was touched.
    #[error("source not found: {key_name} in {environment}")]
    SourceNotFound {
        key_name: String,
        environment: Environment,
    },

    /// The copy source could not be decrypted; no target was touched.
    #[error("failed to decrypt source value: {0}")]
    SourceDecrypt(String),

    /// Store or setup failure outside the per-target loop.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}
