use thiserror::Error;

/// Error taxonomy for a reconciliation run.
///
/// Only `Parse` (and a failed feed fetch, surfaced as `Transport` before any
/// group work starts) is fatal to a whole run. Everything else is caught at
/// the group-task boundary and recorded in the run's stats.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The feed markup is not well-formed. Nothing is processed.
    #[error("feed parse error: {0}")]
    Parse(String),

    /// A remote response did not match any recognized shape.
    #[error("unrecognized response shape: {0}")]
    ResponseFormat(String),

    /// The remote mutation reported field-level errors.
    #[error("mutation rejected{}: {message}", .field.as_deref().map(|f| format!(" ({f})")).unwrap_or_default())]
    Mutation {
        field: Option<String>,
        message: String,
    },

    /// Network or transport failure, after retries were exhausted.
    #[error("transport error: {0}")]
    Transport(String),

    /// Local validation failed; no remote call was attempted.
    #[error("validation error: {0}")]
    Validation(String),
}

impl SyncError {
    pub(crate) fn transport(err: impl std::fmt::Display) -> Self {
        SyncError::Transport(err.to_string())
    }

    /// Transport errors are the only retryable class.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutation_error_displays_field() {
        let err = SyncError::Mutation {
            field: Some("title".into()),
            message: "Title can't be blank".into(),
        };
        assert_eq!(err.to_string(), "mutation rejected (title): Title can't be blank");
    }

    #[test]
    fn only_transport_is_retryable() {
        assert!(SyncError::Transport("timeout".into()).is_retryable());
        assert!(!SyncError::Validation("price".into()).is_retryable());
        assert!(!SyncError::Mutation { field: None, message: "x".into() }.is_retryable());
    }
}
