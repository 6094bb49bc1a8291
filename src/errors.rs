//! Application error model with MCP error mapping
//!
//! Only failures that stop a request live here. Data anomalies (unparseable
//! dates, missing headers, oversized bodies, malformed selection entries) are
//! absorbed by the pipeline and never reach this type.

use rmcp::model::ErrorData;
use serde_json::json;
use thiserror::Error;

/// Application error type
///
/// Each variant maps to an MCP error code in [`ErrorData`].
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid user input (validation failed, malformed request)
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Resource not found (account, mailbox, message)
    #[error("not found: {0}")]
    NotFound(String),
    /// Authentication failure (bad credentials, account disabled)
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    /// Operation timeout (TCP connect, TLS handshake, IMAP response)
    #[error("operation timed out: {0}")]
    Timeout(String),
    /// Message store could not serve a search or fetch
    #[error("message store unavailable: {0}")]
    StoreUnavailable(String),
    /// Internal error (unexpected failure, external crate error)
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Convenience constructor for `InvalidInput`
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Convenience constructor for `StoreUnavailable`
    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Convert to MCP `ErrorData`
    ///
    /// # Mappings
    ///
    /// - `InvalidInput` → `invalid_params`
    /// - `NotFound` → `resource_not_found`
    /// - `AuthFailed` → `invalid_request`
    /// - `Timeout` → `internal_error`
    /// - `StoreUnavailable` → `internal_error`
    /// - `Internal` → `internal_error`
    pub fn to_error_data(&self) -> ErrorData {
        match self {
            Self::InvalidInput(msg) => {
                ErrorData::invalid_params(msg.clone(), Some(json!({ "code": "invalid_input" })))
            }
            Self::NotFound(msg) => {
                ErrorData::resource_not_found(msg.clone(), Some(json!({ "code": "not_found" })))
            }
            Self::AuthFailed(msg) => {
                ErrorData::invalid_request(msg.clone(), Some(json!({ "code": "auth_failed" })))
            }
            Self::Timeout(msg) => {
                ErrorData::internal_error(msg.clone(), Some(json!({ "code": "timeout" })))
            }
            Self::StoreUnavailable(msg) => ErrorData::internal_error(
                msg.clone(),
                Some(json!({ "code": "store_unavailable" })),
            ),
            Self::Internal(msg) => {
                ErrorData::internal_error(msg.clone(), Some(json!({ "code": "internal" })))
            }
        }
    }
}

/// Type alias for fallible return values
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::AppError;

    #[test]
    fn store_unavailable_carries_structured_code() {
        let data = AppError::store("uid search failed: connection reset").to_error_data();
        let code = data
            .data
            .as_ref()
            .and_then(|d| d.get("code"))
            .and_then(|c| c.as_str());
        assert_eq!(code, Some("store_unavailable"));
        assert!(data.message.contains("connection reset"));
    }

    #[test]
    fn display_prefixes_variant_kind() {
        let err = AppError::invalid("mailbox must be 1..256 characters");
        assert_eq!(
            err.to_string(),
            "invalid input: mailbox must be 1..256 characters"
        );
    }
}
