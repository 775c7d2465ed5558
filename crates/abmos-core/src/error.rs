//! Error Types
//!
//! One error enum for the whole engine. Variants fall into the kinds the
//! simulation clock cares about: recoverable ones are skipped and counted at
//! the phase boundary, fatal ones abort the step.

use std::path::PathBuf;

use thiserror::Error;

use crate::components::agent::AgentId;

pub type Result<T> = std::result::Result<T, AbmError>;

/// Coarse classification used for diagnostics and the abort decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Configuration,
    Format,
    Capacity,
    Fatal,
    Io,
}

#[derive(Debug, Error)]
pub enum AbmError {
    #[error("node {node} not found in layer '{layer}'")]
    NodeNotFound { layer: String, node: usize },

    #[error("no edge {from} -> {to} in layer '{layer}'")]
    EdgeNotFound { layer: String, from: usize, to: usize },

    #[error("agent {0} not found")]
    AgentNotFound(AgentId),

    #[error("layer '{0}' not found")]
    LayerNotFound(String),

    #[error("agent {agent} is a member of layer '{layer}' but has no social weighting for it")]
    MissingWeighting { agent: AgentId, layer: String },

    #[error("unknown personality '{0}'")]
    UnknownPersonality(String),

    #[error("space kind '{0}' is not supported")]
    UnsupportedSpace(String),

    #[error("layer '{0}' already exists")]
    DuplicateLayer(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("malformed layer file {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("cell ({x}, {y}) is full")]
    CellFull { x: i32, y: i32 },

    #[error("position ({x}, {y}) is outside the grid")]
    OutOfBounds { x: i32, y: i32 },

    #[error("agent id {0} is already registered")]
    DuplicateAgent(AgentId),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("iteration {iteration} aborted: {source}")]
    Aborted {
        iteration: u64,
        #[source]
        source: Box<AbmError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl AbmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AbmError::NodeNotFound { .. }
            | AbmError::EdgeNotFound { .. }
            | AbmError::AgentNotFound(_)
            | AbmError::LayerNotFound(_) => ErrorKind::NotFound,
            AbmError::MissingWeighting { .. }
            | AbmError::UnknownPersonality(_)
            | AbmError::UnsupportedSpace(_)
            | AbmError::DuplicateLayer(_)
            | AbmError::InvalidConfig(_)
            | AbmError::TomlDe(_)
            | AbmError::TomlSer(_) => ErrorKind::Configuration,
            AbmError::Format { .. } | AbmError::Json(_) => ErrorKind::Format,
            AbmError::CellFull { .. } => ErrorKind::Capacity,
            AbmError::OutOfBounds { .. }
            | AbmError::DuplicateAgent(_)
            | AbmError::Invariant(_)
            | AbmError::Aborted { .. } => ErrorKind::Fatal,
            AbmError::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether this error must stop a running simulation
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }

    pub(crate) fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        AbmError::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
