use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InputError(String),

    #[error("{0}")]
    DiscoveryError(String),

    #[error("Command execution error: {0}")]
    ExecutionError(String),

    #[error("K8s API error: {0}")]
    K8sApiError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Helper for mapping any unknown error into internal error
pub fn internal_error<E: ToString>(err: E) -> AppError {
    AppError::InternalError(err.to_string())
}

impl AppError {
    /// Process exit status reported for this error.
    pub fn exit_status(&self) -> u8 {
        match self {
            AppError::InputError(_) => 2,
            AppError::DiscoveryError(_)
            | AppError::ExecutionError(_)
            | AppError::K8sApiError(_)
            | AppError::InternalError(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_error_is_reported_verbatim() {
        let err = AppError::DiscoveryError("fatal: not a git repository".into());
        assert_eq!(err.to_string(), "fatal: not a git repository");
    }

    #[test]
    fn test_internal_error_helper() {
        let err = internal_error("boom");
        assert!(matches!(err, AppError::InternalError(ref m) if m == "boom"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(AppError::InputError("x".into()).exit_status(), 2);
        assert_eq!(AppError::ExecutionError("x".into()).exit_status(), 1);
    }
}
