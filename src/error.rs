//! Error types for log monitoring and timer control.
//!
//! Only the transport layer produces errors that can stop the monitoring loop.
//! Everything downstream of the reader (line parsing, command classification,
//! dispatch) reports skipped or ignored input as values, never as errors.
//!
//! ## Error Categories
//!
//! - **Connection Errors**: authentication failure, transport failure, missing remote file
//! - **Reader Errors**: reading while disconnected, exhausted reconnect attempts, timeouts
//! - **Parse Errors**: malformed time strings or configuration documents
//! - **Pattern Errors**: command vocabulary entries that do not compile
//! - **File Errors**: local file access (configuration, local log tailing)
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use skitime::TimingError;
//!
//! let error = TimingError::transport_failed("mc.example.org:22", "connection reset");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for skitime operations.
pub type Result<T, E = TimingError> = std::result::Result<T, E>;

/// Main error type.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TimingError {
    #[error("Authentication failed for {username}@{host}")]
    Authentication { host: String, username: String },

    #[error("Transport failure talking to {endpoint}: {reason}")]
    Transport {
        endpoint: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Remote log file not found: {path}")]
    MissingFile { path: String },

    #[error("Log reader is not connected")]
    NotConnected,

    #[error("Reconnect failed after {attempts} attempts: {last}")]
    ReconnectExhausted { attempts: u32, last: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Invalid command pattern '{pattern}'")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Race session has shut down")]
    SessionClosed,

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TimingError {
    /// Returns whether this is one of the connection conditions reported to the operator.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            TimingError::Authentication { .. }
                | TimingError::Transport { .. }
                | TimingError::MissingFile { .. }
                | TimingError::Timeout { .. }
                | TimingError::NotConnected
        )
    }

    /// Returns whether this error is potentially recoverable through reconnecting.
    pub fn is_retryable(&self) -> bool {
        match self {
            TimingError::Authentication { .. } => true,
            TimingError::Transport { .. } => true,
            TimingError::MissingFile { .. } => true,
            TimingError::NotConnected => true,
            TimingError::Timeout { .. } => true,
            TimingError::ReconnectExhausted { .. } => false,
            TimingError::Parse { .. } => false,
            TimingError::Config { .. } => false,
            TimingError::Pattern { .. } => false,
            TimingError::SessionClosed => false,
            TimingError::File { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TimingError::Authentication { .. } => vec![
                "Check the SSH username and password",
                "Set SKITIME_SSH_PASSWORD if the password is not in the config file",
                "Verify the account is allowed to use SFTP",
            ],
            TimingError::Transport { .. } => vec![
                "Check the server host and SSH port",
                "Verify the server is reachable from this machine",
                "Wait for the game server host to come back online",
            ],
            TimingError::MissingFile { .. } => vec![
                "Check the remote log path (usually logs/latest.log)",
                "Start the game server so the log file is created",
            ],
            TimingError::NotConnected => vec!["Connect the reader before polling"],
            TimingError::ReconnectExhausted { .. } => vec![
                "Check the server status and restart monitoring",
                "Increase reader.reconnect_attempts for unstable links",
            ],
            TimingError::Timeout { .. } => vec![
                "Increase reader.io_timeout_ms",
                "Check network latency to the server",
            ],
            TimingError::Parse { .. } => vec![
                "Check the input format",
                "Times must look like MM:SS.cc or HH:MM:SS.cc",
            ],
            TimingError::Config { .. } => vec![
                "Check the configuration file against the documented sections",
                "Remove the offending key to fall back to its default",
            ],
            TimingError::Pattern { .. } => vec![
                "Fix the regular expression in the command vocabulary",
                "Escape literal brackets and dots in command phrases",
            ],
            TimingError::SessionClosed => vec!["Restart the session before sending commands"],
            TimingError::File { .. } => vec![
                "Check file exists and is readable",
                "Check file permissions",
            ],
        }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        TimingError::File { path, source }
    }

    /// Helper constructor for transport failures.
    pub fn transport_failed(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        TimingError::Transport { endpoint: endpoint.into(), reason: reason.into(), source: None }
    }

    /// Helper constructor for transport failures with source.
    pub fn transport_failed_with_source(
        endpoint: impl Into<String>,
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TimingError::Transport {
            endpoint: endpoint.into(),
            reason: reason.into(),
            source: Some(source),
        }
    }

    /// Helper constructor for a missing remote file.
    pub fn missing_file(path: impl Into<String>) -> Self {
        TimingError::MissingFile { path: path.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        TimingError::Config { reason: reason.into() }
    }

    /// Helper constructor for parse errors.
    pub fn parse(context: impl Into<String>, details: impl Into<String>) -> Self {
        TimingError::Parse { context: context.into(), details: details.into() }
    }
}

impl From<std::io::Error> for TimingError {
    fn from(err: std::io::Error) -> Self {
        TimingError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn error_messages_carry_their_context(
                endpoint in "[a-z]{1,12}\\.[a-z]{2,3}:[0-9]{2,5}",
                reason in ".*",
                path in "/[a-z/]{1,30}",
                attempts in 1u32..10u32,
                duration_ms in 1u64..60000u64,
            ) {
                let transport = TimingError::transport_failed(endpoint.clone(), reason.clone());
                prop_assert!(transport.to_string().contains(&endpoint));
                prop_assert!(transport.to_string().contains(&reason));

                let missing = TimingError::missing_file(path.clone());
                prop_assert!(missing.to_string().contains(&path));

                let exhausted = TimingError::ReconnectExhausted { attempts, last: reason.clone() };
                prop_assert!(exhausted.to_string().contains(&attempts.to_string()));

                let timeout = TimingError::Timeout { duration: Duration::from_millis(duration_ms) };
                prop_assert!(!timeout.to_string().is_empty());
            }

            #[test]
            fn io_errors_convert_to_file_errors(reason in ".*") {
                let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, reason.clone());
                let converted: TimingError = io_err.into();
                match converted {
                    TimingError::File { source, .. } => {
                        prop_assert_eq!(source.to_string(), reason);
                    }
                    _ => prop_assert!(false, "Expected File error from io::Error conversion"),
                }
            }
        }
    }

    #[test]
    fn connection_conditions_are_distinct() {
        let auth = TimingError::Authentication { host: "h".into(), username: "u".into() };
        let transport = TimingError::transport_failed("h:22", "reset");
        let missing = TimingError::missing_file("/logs/latest.log");

        assert!(auth.is_connection_error());
        assert!(transport.is_connection_error());
        assert!(missing.is_connection_error());
        assert_ne!(auth.to_string(), transport.to_string());
        assert_ne!(transport.to_string(), missing.to_string());
    }

    #[test]
    fn classification_of_retryable_errors() {
        assert!(TimingError::transport_failed("h:22", "reset").is_retryable());
        assert!(TimingError::Timeout { duration: Duration::from_secs(1) }.is_retryable());
        assert!(!TimingError::ReconnectExhausted { attempts: 3, last: "x".into() }.is_retryable());
        assert!(!TimingError::config("bad").is_retryable());
        assert!(!TimingError::config("bad").is_connection_error());
    }

    #[test]
    fn recovery_suggestions_are_descriptive() {
        let errors = [
            TimingError::Authentication { host: "h".into(), username: "u".into() },
            TimingError::transport_failed("h:22", "reset"),
            TimingError::missing_file("/logs/latest.log"),
            TimingError::NotConnected,
            TimingError::config("bad"),
            TimingError::parse("time", "bad"),
        ];
        for error in &errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty());
            for suggestion in suggestions {
                assert!(suggestion.len() > 5);
            }
        }
    }

    #[test]
    fn source_chain_is_preserved() {
        let inner = std::io::Error::other("broken pipe");
        let error = TimingError::transport_failed_with_source("h:22", "read failed", Box::new(inner));
        let source = std::error::Error::source(&error).expect("source should be kept");
        assert!(source.to_string().contains("broken pipe"));
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<TimingError>();
    }
}
