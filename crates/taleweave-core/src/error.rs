//! Error types for taleweave
//!
//! Only infrastructure and configuration failures are errors. Protocol
//! violations from clients (off-turn submissions, grammar mismatches,
//! unknown rooms) are ignored by the engine and never reach this module.

use crate::types::RoomId;

/// Main taleweave error type
#[derive(Debug, thiserror::Error)]
pub enum TaleweaveError {
    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Artifact persistence failed
    #[error("persistence failed: {0}")]
    Persist(#[from] PersistError),

    /// The orchestrator task is gone
    #[error("orchestrator stopped")]
    OrchestratorStopped,
}

impl TaleweaveError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Persist(e) => e.is_retryable(),
            Self::Config(_) | Self::OrchestratorStopped => false,
        }
    }
}

/// Failures reported by an artifact sink
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistError {
    /// The sink could not be reached or refused the write for now
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    /// The sink wrote nothing because of an I/O failure
    #[error("i/o failure: {0}")]
    Io(String),

    /// The record could not be encoded
    #[error("encoding failed: {0}")]
    Encoding(String),

    /// Every attempt failed; the artifact was dropped
    #[error("room {room}: gave up after {attempts} attempts: {last}")]
    Exhausted {
        /// Room whose artifact was lost
        room: RoomId,
        /// Attempts made
        attempts: u32,
        /// Message of the final failure
        last: String,
    },
}

impl PersistError {
    /// Check if another attempt could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }
}

impl From<std::io::Error> for PersistError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encoding(value.to_string())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Rooms need at least one seat
    #[error("room capacity must be at least 1")]
    ZeroCapacity,

    /// At least one save attempt is required
    #[error("persist_attempts must be at least 1")]
    ZeroAttempts,

    /// A phase or grace duration of zero would fire immediately
    #[error("{field} must be greater than zero")]
    ZeroDuration {
        /// Offending field name
        field: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persist_error_display() {
        let err = PersistError::Unavailable("connection refused".to_string());
        assert!(err.to_string().contains("sink unavailable"));
    }

    #[test]
    fn persist_error_is_retryable() {
        assert!(PersistError::Unavailable("x".to_string()).is_retryable());
        assert!(PersistError::Io("x".to_string()).is_retryable());
        assert!(!PersistError::Encoding("x".to_string()).is_retryable());

        let exhausted = PersistError::Exhausted {
            room: RoomId::new(),
            attempts: 3,
            last: "x".to_string(),
        };
        assert!(!exhausted.is_retryable());
    }

    #[test]
    fn taleweave_error_classification() {
        let err = TaleweaveError::from(PersistError::Io("disk".to_string()));
        assert!(err.is_retryable());
        assert!(!TaleweaveError::from(ConfigError::ZeroCapacity).is_retryable());
        assert!(!TaleweaveError::OrchestratorStopped.is_retryable());
    }

    #[test]
    fn config_error_names_field() {
        let err = ConfigError::ZeroDuration { field: "grace_ms" };
        assert_eq!(err.to_string(), "grace_ms must be greater than zero");
    }
}
