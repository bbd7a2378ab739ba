//! Error types for the Cluster Storage Operator
//!
//! Provides structured error types for all operator components including
//! the client plane, controllers, asset rendering and the starters.

use std::time::Duration;
use thiserror::Error;

/// Unified error type for the operator
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Kubernetes Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Resource not found: {kind}/{name}")]
    ResourceNotFound { kind: String, name: String },

    #[error("Resource already exists: {kind}/{name}")]
    ResourceExists { kind: String, name: String },

    #[error("Operation cannot be fulfilled on {kind}/{name}: the object has been modified")]
    Conflict { kind: String, name: String },

    #[error("No REST mapping for {group}/{version}, Kind={kind}")]
    NoMatch {
        group: String,
        version: String,
        kind: String,
    },

    // =========================================================================
    // Asset Errors
    // =========================================================================
    #[error("Asset not found: {name}")]
    AssetNotFound { name: String },

    #[error("Failed to decode asset {name}: {reason}")]
    AssetDecode { name: String, reason: String },

    // =========================================================================
    // Driver Errors
    // =========================================================================
    #[error(
        "Unable to install the CSI driver operator {driver}: a CSIDriver {driver} that is not \
         managed by this operator is already installed. Remove the CSIDriver object and the \
         driver that installed it"
    )]
    ForeignDriver { driver: String },

    #[error("Timed out after {0:?} waiting for the initial FeatureGate observation")]
    FeatureGateTimeout(Duration),

    #[error("Leader election lost")]
    LeadershipLost,

    #[error("{}", format_aggregate(.0))]
    Aggregate(Vec<Error>),

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // =========================================================================
    // Metrics / IO Errors
    // =========================================================================
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_aggregate(errors: &[Error]) -> String {
    match errors {
        [] => String::new(),
        [single] => single.to_string(),
        many => format!(
            "[{}]",
            many.iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// Action to take on error during reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Requeue with exponential backoff
    RequeueWithBackoff,
    /// Requeue after specific duration
    RequeueAfter(Duration),
    /// Don't requeue, wait for changes
    NoRequeue,
}

impl Error {
    /// Determine what action to take for this error
    pub fn action(&self) -> ErrorAction {
        match self {
            // Transient errors - retry with backoff
            Error::Kube(_) | Error::Conflict { .. } => ErrorAction::RequeueWithBackoff,

            // The mapper cache was reset; the next sync rediscovers.
            Error::NoMatch { .. } => ErrorAction::RequeueAfter(Duration::from_secs(10)),

            // Configuration errors - don't retry until inputs change
            Error::Configuration(_) | Error::ForeignDriver { .. } => ErrorAction::NoRequeue,

            // The most urgent member decides
            Error::Aggregate(errors) => errors
                .iter()
                .map(Error::action)
                .find(|a| *a == ErrorAction::RequeueWithBackoff)
                .or_else(|| errors.iter().map(Error::action).find(|a| *a != ErrorAction::NoRequeue))
                .unwrap_or(ErrorAction::NoRequeue),

            // All other errors - retry with backoff
            _ => ErrorAction::RequeueWithBackoff,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        !matches!(self.action(), ErrorAction::NoRequeue)
    }

    /// Check if this error is transient
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Kube(_) | Error::Conflict { .. })
    }

    /// True when the API server (or the fake) reported 404
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::ResourceNotFound { .. } => true,
            Error::Kube(kube::Error::Api(ae)) => ae.code == 404,
            _ => false,
        }
    }

    /// True when the error (or any aggregated member) is a missing REST mapping
    pub fn is_no_match(&self) -> bool {
        match self {
            Error::NoMatch { .. } => true,
            Error::Aggregate(errors) => errors.iter().any(Error::is_no_match),
            _ => false,
        }
    }

    /// Collapse a list of errors into `Ok` or a single (possibly aggregated) error
    pub fn aggregate(mut errors: Vec<Error>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Error::Aggregate(errors)),
        }
    }
}

/// Result type alias for the operator
pub type Result<T> = std::result::Result<T, Error>;
