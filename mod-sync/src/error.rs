use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured error codes for engine results
/// These allow callers to distinguish between failure classes
/// (retry later, abort the scan, show a configuration hint)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorCode {
    /// Input or data shape validation failed (bad path, missing schema file, malformed row)
    ValidationFailed,
    /// Resource not found (game installation, archive, project, project language)
    NotFound,
    /// External pack tool missing or misconfigured
    ExternalToolUnavailable,
    /// External pack tool ran but failed (non-zero exit, unreadable output)
    ExternalToolFailure,
    /// External tool or remote request ran out of time
    Timeout,
    /// Operation was cancelled by the caller
    Cancelled,
    /// SQLite read or write failed
    DatabaseError,
    /// Schema could not be created or upgraded
    MigrationFailed,
    /// Network-related error (remote catalog unreachable)
    NetworkError,
    Internal,
}

impl fmt::Display for ApiErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorCode::ValidationFailed => write!(f, "validation_failed"),
            ApiErrorCode::NotFound => write!(f, "not_found"),
            ApiErrorCode::ExternalToolUnavailable => write!(f, "external_tool_unavailable"),
            ApiErrorCode::ExternalToolFailure => write!(f, "external_tool_failure"),
            ApiErrorCode::Timeout => write!(f, "timeout"),
            ApiErrorCode::Cancelled => write!(f, "cancelled"),
            ApiErrorCode::DatabaseError => write!(f, "database_error"),
            ApiErrorCode::MigrationFailed => write!(f, "migration_failed"),
            ApiErrorCode::NetworkError => write!(f, "network_error"),
            ApiErrorCode::Internal => write!(f, "internal"),
        }
    }
}

/// Error value returned by every fallible engine operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    /// Optional additional details (archive path, tool stderr, etc.)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        code: ApiErrorCode,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            details: Some(details.into()),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::ValidationFailed, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::NotFound, message)
    }

    /// Pack tool binary or its schema cannot be located
    pub fn tool_unavailable(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::ExternalToolUnavailable, message)
    }

    pub fn tool_failure(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::ExternalToolFailure, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::Timeout, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::Cancelled, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::DatabaseError, message)
    }

    pub fn migration_failed(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::MigrationFailed, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::NetworkError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::Internal, message)
    }

    pub fn is_cancelled(&self) -> bool {
        self.code == ApiErrorCode::Cancelled
    }

    /// Whether a later scan can reasonably expect a different outcome
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code,
            ApiErrorCode::Timeout
                | ApiErrorCode::ExternalToolFailure
                | ApiErrorCode::NetworkError
                | ApiErrorCode::DatabaseError
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.details {
            Some(details) => write!(f, "[{}] {} ({})", self.code, self.message, details),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => ApiErrorCode::NotFound,
            std::io::ErrorKind::TimedOut => ApiErrorCode::Timeout,
            std::io::ErrorKind::InvalidData => ApiErrorCode::ValidationFailed,
            _ => ApiErrorCode::Internal,
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        // Keep typed errors that were wrapped with context
        if let Some(api_err) = err.downcast_ref::<ApiError>() {
            return api_err.clone();
        }

        let message = format!("{:#}", err);
        let lower = message.to_lowercase();

        if lower.contains("cancelled") || lower.contains("canceled") {
            return ApiError::cancelled(message);
        }

        if lower.contains("timed out") || lower.contains("timeout") {
            return ApiError::timeout(message);
        }

        if lower.contains("not found") || lower.contains("does not exist") {
            return ApiError::not_found(message);
        }

        if lower.contains("malformed") || lower.contains("invalid format") {
            return ApiError::validation(message);
        }

        ApiError::internal(message)
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(err: sea_orm::DbErr) -> Self {
        ApiError::database(err.to_string())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ApiError::timeout(format!("Remote request timed out: {}", err));
        }
        ApiError::network(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = ApiError::validation("Invalid path");
        assert_eq!(err.code, ApiErrorCode::ValidationFailed);
        assert_eq!(err.message, "Invalid path");
        assert!(err.details.is_none());
    }

    #[test]
    fn test_error_with_details() {
        let err = ApiError::with_details(
            ApiErrorCode::ExternalToolFailure,
            "rpfm_cli exited with status 1",
            "/mods/5/x.pack",
        );
        assert_eq!(err.code, ApiErrorCode::ExternalToolFailure);
        assert_eq!(err.details, Some("/mods/5/x.pack".to_string()));
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::new(ApiErrorCode::Internal, "Something went wrong");
        let display = format!("{}", err);
        assert!(display.contains("internal"));
        assert!(display.contains("Something went wrong"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let api_err: ApiError = io_err.into();
        assert_eq!(api_err.code, ApiErrorCode::NotFound);
    }

    #[test]
    fn test_serialization() {
        let err = ApiError::tool_unavailable("rpfm_cli not configured");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("external_tool_unavailable"));
        assert!(json.contains("rpfm_cli not configured"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ApiError::timeout("slow").is_retryable());
        assert!(ApiError::tool_failure("exit 2").is_retryable());
        assert!(ApiError::database("locked").is_retryable());
        assert!(!ApiError::tool_unavailable("missing").is_retryable());
        assert!(!ApiError::cancelled("stop").is_retryable());
        assert!(ApiError::cancelled("stop").is_cancelled());
    }

    #[test]
    fn test_db_error_conversion() {
        let db_err = sea_orm::DbErr::Custom("disk I/O error".to_string());
        let api_err: ApiError = db_err.into();
        assert_eq!(api_err.code, ApiErrorCode::DatabaseError);
    }

    #[test]
    fn test_anyhow_error_conversion() {
        let api_err: ApiError = anyhow::anyhow!("Extraction cancelled by user").into();
        assert_eq!(api_err.code, ApiErrorCode::Cancelled);

        let api_err: ApiError = anyhow::anyhow!("rpfm_cli timed out after 60s").into();
        assert_eq!(api_err.code, ApiErrorCode::Timeout);

        let api_err: ApiError = anyhow::anyhow!("Pack file not found").into();
        assert_eq!(api_err.code, ApiErrorCode::NotFound);

        let api_err: ApiError = anyhow::anyhow!("Some unknown error occurred").into();
        assert_eq!(api_err.code, ApiErrorCode::Internal);

        // Typed errors survive a round trip through anyhow
        let wrapped = anyhow::Error::new(ApiError::tool_unavailable("no binary"));
        let api_err: ApiError = wrapped.into();
        assert_eq!(api_err.code, ApiErrorCode::ExternalToolUnavailable);
    }
}
