//! Error types for the DevTools harness.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use devtools_harness::{Error, Result, Session};
//!
//! async fn example(session: &Session) -> Result<()> {
//!     let title = session.evaluate("document.title").await?;
//!     println!("{title}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::Connection`], [`Error::SessionClosed`], [`Error::TargetNotFound`] |
//! | Protocol | [`Error::RemoteCommand`], [`Error::Protocol`] |
//! | Deadlines | [`Error::CommandTimeout`], [`Error::WaitTimeout`], [`Error::PollTimeout`] |
//! | Execution | [`Error::RemoteEvaluation`], [`Error::Coverage`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Http`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging. Deadline variants
/// always name the operation and the configured deadline.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when harness or session options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Debugging channel unreachable or handshake failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Operation attempted on, or interrupted by, a closed session.
    #[error("Session closed: {target}")]
    SessionClosed {
        /// Address of the debugging target.
        target: String,
    },

    /// No debugging target matched a discovery query.
    #[error("Target not found: {query}")]
    TargetNotFound {
        /// Human readable description of the query.
        query: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// The target rejected a command.
    #[error("Command {method} failed ({code}): {message}")]
    RemoteCommand {
        /// Protocol method that failed.
        method: String,
        /// Protocol error code.
        code: i64,
        /// Protocol error message.
        message: String,
    },

    /// Protocol violation or unexpected message shape.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Deadline Errors
    // ========================================================================
    /// No response arrived for a command before its deadline.
    #[error("Command {method} timed out after {timeout_ms}ms")]
    CommandTimeout {
        /// Protocol method that timed out.
        method: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// No inbound message satisfied a waiter before its deadline.
    #[error("Wait for {operation} timed out after {timeout_ms}ms")]
    WaitTimeout {
        /// Description of what was awaited.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// A polled condition never held before its deadline.
    #[error("Poll for {operation} timed out after {timeout_ms}ms")]
    PollTimeout {
        /// Description of the polled condition.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// An evaluated expression threw inside the target.
    #[error("Remote evaluation failed: {description}")]
    RemoteEvaluation {
        /// Remote exception text.
        description: String,
    },

    /// Coverage instrumentation used out of order or failed.
    #[error("Coverage error: {message}")]
    Coverage {
        /// Description of the coverage failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP error from the discovery endpoint.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a session closed error.
    #[inline]
    pub fn session_closed(target: impl Into<String>) -> Self {
        Self::SessionClosed {
            target: target.into(),
        }
    }

    /// Creates a target not found error.
    #[inline]
    pub fn target_not_found(query: impl Into<String>) -> Self {
        Self::TargetNotFound {
            query: query.into(),
        }
    }

    /// Creates a remote command error.
    #[inline]
    pub fn remote_command(method: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self::RemoteCommand {
            method: method.into(),
            code,
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a command timeout error.
    #[inline]
    pub fn command_timeout(method: impl Into<String>, timeout_ms: u64) -> Self {
        Self::CommandTimeout {
            method: method.into(),
            timeout_ms,
        }
    }

    /// Creates a wait timeout error.
    #[inline]
    pub fn wait_timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::WaitTimeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates a poll timeout error.
    #[inline]
    pub fn poll_timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::PollTimeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates a remote evaluation error.
    #[inline]
    pub fn remote_evaluation(description: impl Into<String>) -> Self {
        Self::RemoteEvaluation {
            description: description.into(),
        }
    }

    /// Creates a coverage error.
    #[inline]
    pub fn coverage(message: impl Into<String>) -> Self {
        Self::Coverage {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a deadline error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::CommandTimeout { .. } | Self::WaitTimeout { .. } | Self::PollTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::SessionClosed { .. } | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors leave the session usable; the caller decides
    /// whether to retry.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::CommandTimeout { .. }
                | Self::WaitTimeout { .. }
                | Self::PollTimeout { .. }
                | Self::RemoteCommand { .. }
                | Self::RemoteEvaluation { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::connection("handshake refused");
        assert_eq!(err.to_string(), "Connection failed: handshake refused");
    }

    #[test]
    fn test_timeouts_name_operation_and_deadline() {
        let err = Error::command_timeout("Runtime.evaluate", 50);
        assert_eq!(err.to_string(), "Command Runtime.evaluate timed out after 50ms");

        let err = Error::wait_timeout("Page.loadEventFired", 2000);
        assert_eq!(
            err.to_string(),
            "Wait for Page.loadEventFired timed out after 2000ms"
        );

        let err = Error::poll_timeout("window.scrollY > 0", 300);
        assert_eq!(err.to_string(), "Poll for window.scrollY > 0 timed out after 300ms");
    }

    #[test]
    fn test_remote_command_display() {
        let err = Error::remote_command("Profiler.enable", -32601, "'Profiler.enable' wasn't found");
        assert_eq!(
            err.to_string(),
            "Command Profiler.enable failed (-32601): 'Profiler.enable' wasn't found"
        );
    }

    #[test]
    fn test_is_timeout() {
        assert!(Error::command_timeout("x", 50).is_timeout());
        assert!(Error::wait_timeout("x", 50).is_timeout());
        assert!(Error::poll_timeout("x", 50).is_timeout());
        assert!(!Error::connection("test").is_timeout());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::connection("test").is_connection_error());
        assert!(Error::session_closed("ws://127.0.0.1:9222").is_connection_error());
        assert!(!Error::config("test").is_connection_error());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::remote_evaluation("ReferenceError: x is not defined").is_recoverable());
        assert!(Error::command_timeout("x", 10).is_recoverable());
        assert!(!Error::session_closed("ws://").is_recoverable());
        assert!(!Error::config("test").is_recoverable());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
