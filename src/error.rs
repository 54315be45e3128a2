use std::fmt;
use thiserror::Error;

/// One parameter whose stored shape disagrees with the shape the architecture
/// requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeMismatchEntry {
    pub key: String,
    /// Shape found in the artifact (or in the parameter set being loaded).
    pub artifact_shape: Vec<usize>,
    /// Shape the freshly built model expects for `key`.
    pub model_shape: Vec<usize>,
}

impl fmt::Display for ShapeMismatchEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: checkpoint {:?} vs model {:?}",
            self.key, self.artifact_shape, self.model_shape
        )
    }
}

/// Everything that can go wrong while writing, reading or restoring a checkpoint.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// The artifact could not be parsed into an architecture and a parameter set.
    #[error("corrupt checkpoint artifact: {reason}")]
    CorruptArtifact { reason: String },

    /// Keys present on both sides whose shapes differ.
    #[error("size mismatch for {} parameter(s): {}", .mismatches.len(), join_entries(.mismatches))]
    ShapeMismatch { mismatches: Vec<ShapeMismatchEntry> },

    /// Keys the architecture requires but the artifact lacks.
    #[error("missing parameter key(s): {}", .keys.join(", "))]
    MissingKey { keys: Vec<String> },

    /// Keys the artifact carries that the architecture does not know about.
    #[error("unexpected parameter key(s): {}", .keys.join(", "))]
    UnexpectedKey { keys: Vec<String> },

    #[error("checkpoint I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A descriptor that cannot describe a network (zero-sized layer).
    #[error("invalid architecture: {reason}")]
    InvalidArchitecture { reason: String },

    #[error("input has {actual} features, network expects {expected}")]
    InputSize { expected: usize, actual: usize },

    /// NaN or infinity in a tensor bound for the JSON format, which cannot
    /// represent them.
    #[error("parameter {key} has non-finite value at index {index}; use the binary format")]
    NonFiniteValue { key: String, index: usize },
}

impl CheckpointError {
    pub fn corrupt(reason: impl Into<String>) -> Self {
        CheckpointError::CorruptArtifact { reason: reason.into() }
    }

    pub fn invalid_architecture(reason: impl Into<String>) -> Self {
        CheckpointError::InvalidArchitecture { reason: reason.into() }
    }

    /// True for the failures that describe a structurally bad artifact, as
    /// opposed to storage problems. Retrying these cannot succeed.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            CheckpointError::CorruptArtifact { .. }
                | CheckpointError::ShapeMismatch { .. }
                | CheckpointError::MissingKey { .. }
                | CheckpointError::UnexpectedKey { .. }
        )
    }
}

impl From<serde_json::Error> for CheckpointError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            CheckpointError::Io(err.into())
        } else {
            CheckpointError::corrupt(err.to_string())
        }
    }
}

fn join_entries(entries: &[ShapeMismatchEntry]) -> String {
    entries.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ")
}

pub type Result<T> = std::result::Result<T, CheckpointError>;
