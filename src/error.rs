//! Error types for the PodSvc operator

use std::fmt;

use thiserror::Error;

/// Result type alias for operator operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Step of a reconciliation pass
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Fetch,
    Sync,
    Reclaim,
    Status,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Fetch => "fetch",
            Phase::Sync => "sync",
            Phase::Reclaim => "reclaim",
            Phase::Status => "status",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during operator operation
#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("PodSvc {0} has no uid")]
    MissingUid(String),

    #[error("Service {service} is already controlled by {owner}")]
    AlreadyOwned { service: String, owner: String },

    #[error("reconciliation aborted during {phase}: {source}")]
    PassAborted {
        phase: Phase,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap an error with the pass step it interrupted.
    pub fn during(phase: Phase) -> impl FnOnce(Error) -> Error {
        move |source| Error::PassAborted {
            phase,
            source: Box::new(source),
        }
    }

    /// Check if this error is retriable
    ///
    /// Every failure is requeued; retriable ones come back sooner.
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::KubeError(_) => true,
            Error::AlreadyOwned { .. } => true,
            Error::ConfigError(_) | Error::MissingUid(_) => false,
            Error::PassAborted { source, .. } => source.is_retriable(),
        }
    }

    /// Short label used for the error counter
    pub fn metric_label(&self) -> &'static str {
        match self {
            Error::PassAborted { phase, .. } => phase.as_str(),
            Error::KubeError(_) => "kube",
            Error::ConfigError(_) => "config",
            Error::MissingUid(_) => "missing_uid",
            Error::AlreadyOwned { .. } => "already_owned",
        }
    }

    /// The pass step that failed, if this error came out of a reconciliation pass
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Error::PassAborted { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}
