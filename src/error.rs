//! Error types for the Doorman service.
//!
//! The admission core has no failure modes; these cover everything around
//! it.

use thiserror::Error;

/// Main error type for Doorman operations.
#[derive(Error, Debug)]
pub enum DoormanError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// gRPC server errors
    #[error("gRPC error: {0}")]
    Grpc(#[from] tonic::transport::Error),
}

/// Result type alias for Doorman operations.
pub type Result<T> = std::result::Result<T, DoormanError>;
