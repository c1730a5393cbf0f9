//! Error types for the Immich provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Immich provider errors
#[derive(Error, Debug)]
pub enum ImmichError {
    /// API request returned a non-success status
    #[error("Immich API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// The search response carried a page token that is not a page number
    #[error("Invalid page token: {0}")]
    InvalidPageToken(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Result type for Immich operations
pub type Result<T> = std::result::Result<T, ImmichError>;

impl From<ImmichError> for BridgeError {
    fn from(error: ImmichError) -> Self {
        match error {
            ImmichError::ApiError {
                status_code,
                message,
            } => BridgeError::OperationFailed(format!(
                "API error (status {}): {}",
                status_code, message
            )),
            ImmichError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            ImmichError::InvalidPageToken(token) => {
                BridgeError::OperationFailed(format!("Invalid page token: {}", token))
            }
            ImmichError::Bridge(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ImmichError::ApiError {
            status_code: 401,
            message: "Invalid API key".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Immich API error (status 401): Invalid API key"
        );
    }

    #[test]
    fn test_error_conversion_keeps_status() {
        let bridge_error: BridgeError = ImmichError::ApiError {
            status_code: 500,
            message: "boom".to_string(),
        }
        .into();

        match bridge_error {
            BridgeError::OperationFailed(msg) => assert!(msg.contains("status 500")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_bridge_error_passes_through() {
        let bridge_error: BridgeError =
            ImmichError::Bridge(BridgeError::Timeout("30s".to_string())).into();
        assert!(matches!(bridge_error, BridgeError::Timeout(_)));
    }
}
