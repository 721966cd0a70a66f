//! Error types for stream ingestion and relay control.
//!
//! All errors implement the `std::error::Error` trait and carry enough
//! structured context to tell a device fault from a configuration mistake.
//!
//! ## Error Categories
//!
//! - **Device Errors**: opening or reading the telemetry character device
//! - **Config Errors**: malformed configuration files or endpoint values
//! - **Decode Errors**: device byte blocks that cannot be interpreted
//! - **Encode Errors**: datagram sizes that cannot fit the packet buffer
//! - **Socket Errors**: raw socket creation or transmission failures
//!
//! Note that relay-level conditions (missing raw-socket privilege, send
//! failures, malformed enable requests) are *not* surfaced through this type.
//! They are recorded in [`RelayError`](crate::relay::RelayError) and read back
//! through the status variables, so a control request never fails at the
//! protocol level.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for stream operations.
pub type Result<T, E = StreamError> = std::result::Result<T, E>;

/// Main error type for stream ingestion and relay setup.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StreamError {
    #[error("device stream error: {path}")]
    Device {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {reason}")]
    Config {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("decode error in {context}: {details}")]
    Decode { context: String, details: String },

    #[error("datagram of {needed} bytes exceeds packet buffer capacity of {capacity}")]
    EncodeCapacity { needed: usize, capacity: usize },

    #[error("raw socket error during {operation}")]
    Socket {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

impl StreamError {
    /// Returns whether this error is potentially recoverable through retry.
    ///
    /// Device read errors are transient by contract (the reader loop retries
    /// them after a bounded backoff). Everything else indicates a condition
    /// that retrying will not fix.
    pub fn is_retryable(&self) -> bool {
        match self {
            StreamError::Device { .. } => true,
            StreamError::Config { .. } => false,
            StreamError::Decode { .. } => false,
            StreamError::EncodeCapacity { .. } => false,
            StreamError::Socket { .. } => false,
        }
    }

    /// Helper constructor for device errors with path context.
    pub fn device_error(path: PathBuf, source: std::io::Error) -> Self {
        StreamError::Device { path, source }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(reason: impl Into<String>) -> Self {
        StreamError::Config { reason: reason.into(), source: None }
    }

    /// Helper constructor for configuration errors with source.
    pub fn config_error_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        StreamError::Config { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for decode errors.
    pub fn decode_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        StreamError::Decode { context: context.into(), details: details.into() }
    }

    /// Helper constructor for raw socket errors.
    pub fn socket_error(operation: impl Into<String>, source: std::io::Error) -> Self {
        StreamError::Socket { operation: operation.into(), source }
    }
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::Device { path: PathBuf::from("<unknown>"), source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[cfg(test)]
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn error_messages_contain_their_context(
                reason in ".*",
                context in "\\w+",
                details in ".*",
                needed in 0usize..4096usize,
                capacity in 0usize..4096usize,
            ) {
                let config_err = StreamError::config_error(reason.clone());
                prop_assert!(config_err.to_string().contains(&reason));

                let decode_err = StreamError::decode_error(context.clone(), details.clone());
                let msg = decode_err.to_string();
                prop_assert!(msg.contains(&context));
                prop_assert!(msg.contains(&details));

                let encode_err = StreamError::EncodeCapacity { needed, capacity };
                let msg = encode_err.to_string();
                prop_assert!(msg.contains(&needed.to_string()));
                prop_assert!(msg.contains(&capacity.to_string()));
            }

            #[test]
            fn io_error_conversion_preserves_message(reason in ".*") {
                let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, reason.clone());
                let converted: StreamError = io_err.into();
                match converted {
                    StreamError::Device { source, .. } => {
                        prop_assert_eq!(source.to_string(), reason);
                    }
                    _ => prop_assert!(false, "Expected Device error from io::Error conversion"),
                }
            }
        }
    }

    #[test]
    fn error_constructors_validation() {
        let dev_error = StreamError::device_error(
            PathBuf::from("/dev/libera.strm0"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test"),
        );
        assert!(matches!(dev_error, StreamError::Device { .. }));

        let cfg_error = StreamError::config_error("test");
        assert!(matches!(cfg_error, StreamError::Config { .. }));

        let sock_error =
            StreamError::socket_error("sendto", std::io::Error::other("test"));
        assert!(matches!(sock_error, StreamError::Socket { .. }));
    }

    #[test]
    fn error_traits_validation() {
        // Compile-time check: StreamError must be Send + Sync + 'static
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<StreamError>();

        let error = StreamError::config_error("test");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn retryable_classification() {
        let dev = StreamError::device_error(
            PathBuf::from("/dev/libera.strm0"),
            std::io::Error::new(std::io::ErrorKind::Interrupted, "test"),
        );
        assert!(dev.is_retryable());

        assert!(!StreamError::config_error("bad endpoint").is_retryable());
        assert!(!StreamError::EncodeCapacity { needed: 300, capacity: 256 }.is_retryable());
        assert!(!StreamError::decode_error("record", "short block").is_retryable());
    }
}
