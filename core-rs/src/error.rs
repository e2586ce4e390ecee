//! Error types for the storage engine.

use thiserror::Error;

/// Errors surfaced across the driver contract, the engine, and the HTTP protocol.
///
/// Not every failure mode in the design becomes a variant here:
/// `DriverUnsupported` and `NotFound` are represented structurally (an
/// `Option`/no-op) rather than as errors, per the contract in `driver::Driver`.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A key failed normalization: traversal sequence, empty segment, or
    /// embedded separator that survived `key::normalize`.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A driver was constructed without a required option (e.g. the
    /// filesystem driver's base directory).
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    /// A value could not be stringified (no serialization hook, not
    /// representable as JSON).
    #[error("serialization failed: {0}")]
    SerializationFailure(String),

    /// I/O, network, or remote-service failure from a driver.
    #[error("backend failure: {0}")]
    BackendFailure(String),

    /// The authorization hook rejected a request.
    #[error("access denied: {0}")]
    AuthDenied(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Maps an error to the HTTP status the wire protocol (spec §4.8) assigns it.
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::InvalidKey(_) => 400,
            StoreError::AuthDenied(_) => 401,
            StoreError::MissingConfig(_) => 500,
            StoreError::SerializationFailure(_) => 400,
            StoreError::BackendFailure(_) => 502,
            StoreError::Io(_) => 500,
            StoreError::Json(_) => 400,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_key_display() {
        let err = StoreError::InvalidKey("../etc/passwd".to_string());
        assert!(format!("{err}").contains("invalid key"));
    }

    #[test]
    fn status_codes_match_protocol() {
        assert_eq!(StoreError::InvalidKey("x".into()).status_code(), 400);
        assert_eq!(StoreError::AuthDenied("x".into()).status_code(), 401);
        assert_eq!(StoreError::BackendFailure("x".into()).status_code(), 502);
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let err: StoreError = io_err.into();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StoreError>();
    }
}
