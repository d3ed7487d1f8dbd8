//! # Error Taxonomy
//!
//! `MortarError` is the single error type returned by the public client API.
//! Module-level failures (`ConfigError`, `StoreError`, `TokenStoreError`) are
//! wrapped with `#[from]` so `?` works across module boundaries.

use thiserror::Error;
use tonic::{Code, Status};

use crate::configs::config_client::ConfigError;
use crate::connections::db_sqlite::StoreError;
use crate::retrieve::token_store::TokenStoreError;

/// Errors surfaced by the Mortar client.
#[derive(Debug, Error)]
pub enum MortarError {
    /// Bad credentials or an unreachable auth endpoint at login time.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The transport reported that the current token is stale.
    #[error("Credential token expired: {}", .0.message())]
    AuthExpired(Status),

    /// The service answered a unary call with a non-empty error field.
    #[error("Remote query error: {0}")]
    RemoteQuery(String),

    /// The service ended a stream with a non-empty error field.
    #[error("Remote stream error: {0}")]
    RemoteStream(String),

    /// Any transport failure that is not an auth expiry. Never retried.
    #[error("Transport error ({code:?}): {message}", code = .0.code(), message = .0.message())]
    Transport(Status),

    /// A streamed record violated the record contract.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// The request was rejected locally before any network traffic.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    TokenStore(#[from] TokenStoreError),

    /// Channel setup failed (bad address, unreadable certificate, TLS config).
    #[error("Channel setup failed: {0}")]
    Channel(String),

    #[error("I/O error occurred: {0}")]
    Io(#[from] std::io::Error),
}

impl MortarError {
    /// Classifies a gRPC status. `UNAUTHENTICATED` is the token-expiry signal;
    /// everything else passes through as a transport error.
    pub fn from_status(status: Status) -> Self {
        match status.code() {
            Code::Unauthenticated => MortarError::AuthExpired(status),
            _ => MortarError::Transport(status),
        }
    }

    /// True when the RetryingInvoker should renew the token and retry.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, MortarError::AuthExpired(_))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MortarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthenticated_status_is_auth_expired() {
        let err = MortarError::from_status(Status::unauthenticated("token is expired"));
        assert!(err.is_auth_expired());
    }

    #[test]
    fn other_status_codes_are_transport_errors() {
        for status in [
            Status::unavailable("connection refused"),
            Status::permission_denied("nope"),
            Status::internal("token is expired"),
        ] {
            let err = MortarError::from_status(status);
            assert!(!err.is_auth_expired());
            assert!(matches!(err, MortarError::Transport(_)));
        }
    }
}
