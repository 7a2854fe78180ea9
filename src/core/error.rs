use std::fmt;
use thiserror::Error;

/// Which optimistic entry point a rejected mutation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOp {
    Create,
    Update,
    Delete,
    CycleStatus,
}

impl fmt::Display for MutationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::CycleStatus => "cycle_status",
        };
        write!(f, "{label}")
    }
}

/// Opaque failure reported by a persistence backend.
///
/// Network, validation and authorization failures all land here; the sync
/// engine treats every rejection the same way (rollback, then re-raise).
#[derive(Error, Debug)]
#[error("{message}")]
pub struct PersistenceError {
    message: String,
    #[source]
    source: Option<anyhow::Error>,
}

impl PersistenceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<anyhow::Error> for PersistenceError {
    fn from(err: anyhow::Error) -> Self {
        Self {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

pub type PersistResult<T> = std::result::Result<T, PersistenceError>;

/// A configuration or wire value that names no known variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("{op} of '{id}' was rejected: {source}")]
    Rejected {
        op: MutationOp,
        id: String,
        #[source]
        source: PersistenceError,
    },

    #[error("Entity '{0}' not found in local store")]
    NotFound(String),

    #[error("View is unmounted")]
    Unmounted,

    #[error("Change channel error: {0}")]
    Channel(String),

    #[error("Full reload failed: {0}")]
    Reload(#[source] PersistenceError),
}

impl SyncError {
    /// True when the backend refused the write (as opposed to a local misuse).
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
