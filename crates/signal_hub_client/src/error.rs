//! crates/signal_hub_client/src/error.rs
//!
//! Defines the primary error type returned across the stores' public boundary.

use crate::config::ConfigError;
use signal_hub_core::ports::GatewayError;

/// The primary error type for all store actions.
///
/// Every expected failure mode is returned as a value; the UI layer decides
/// whether to display, retry, or ignore it.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from a gateway port.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// The action requires a signed-in identity.
    #[error("Not signed in")]
    Unauthenticated,

    /// Another operation is already in flight for the same key; the caller
    /// should wait for it to settle instead of issuing a duplicate.
    #[error("A {operation} operation is already pending for '{key}'")]
    OperationPending { operation: &'static str, key: String },

    /// Client-side rejection of a caller-supplied value, before any
    /// gateway call is made.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// A convenience type alias for `Result<T, ClientError>`.
pub type ClientResult<T> = Result<T, ClientError>;
