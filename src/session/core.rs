//! Core Session struct and accessors.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::info;

use crate::error::{Error, Result};
use crate::harness::SessionOptions;
use crate::identifiers::TargetId;
use crate::protocol::Command;
use crate::transport::Connection;

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for a session.
pub(crate) struct SessionInner {
    /// Channel to the target.
    pub connection: Connection,
    /// Target id, taken from the debugger URL.
    pub target_id: TargetId,
    /// Deadlines and limits.
    pub options: SessionOptions,
}

// ============================================================================
// Session
// ============================================================================

/// A handle to one debugging target.
///
/// Clones share the same channel. The session stays open until
/// [`Session::close`] is called; dropping handles never closes it.
#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("target_id", &self.inner.target_id)
            .field("url", &self.inner.connection.target())
            .field("closed", &self.inner.connection.is_closed())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Opens a session to a target's WebSocket debugger URL.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `options` are invalid
    /// - [`Error::Connection`] if the target is unreachable
    pub async fn open(url: &str, options: SessionOptions) -> Result<Self> {
        options.validate().map_err(Error::config)?;

        let connection = Connection::open_with_limit(url, options.max_pending).await?;
        let session = Self::from_connection(connection, options);

        info!(target_id = %session.inner.target_id, "Session opened");
        Ok(session)
    }

    /// Wraps an open connection.
    pub(crate) fn from_connection(connection: Connection, options: SessionOptions) -> Self {
        let target_id = TargetId::from_debugger_url(connection.target());
        Self {
            inner: Arc::new(SessionInner {
                connection,
                target_id,
                options,
            }),
        }
    }

    /// Closes the session.
    ///
    /// Every pending command and armed wait is rejected with
    /// [`Error::SessionClosed`]. Calling this more than once has no effect.
    pub fn close(&self) {
        if !self.inner.connection.is_closed() {
            info!(target_id = %self.inner.target_id, "Closing session");
        }
        self.inner.connection.close();
    }
}

// ============================================================================
// Session - Accessors
// ============================================================================

impl Session {
    /// Returns the target id.
    #[inline]
    #[must_use]
    pub fn target_id(&self) -> &TargetId {
        &self.inner.target_id
    }

    /// Returns the WebSocket debugger URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        self.inner.connection.target()
    }

    /// Returns the session options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    /// Returns the underlying connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.inner.connection
    }

    /// Returns `true` once the session has been closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.connection.is_closed()
    }
}

// ============================================================================
// Session - Commands
// ============================================================================

impl Session {
    /// Sends a raw protocol command with the default command deadline.
    ///
    /// # Errors
    ///
    /// Same as [`Connection::call`].
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.call_with_timeout(method, params, self.inner.options.command_timeout)
            .await
    }

    /// Sends a raw protocol command with an explicit deadline.
    ///
    /// # Errors
    ///
    /// Same as [`Connection::call`].
    pub async fn call_with_timeout(&self, method: &str, params: Value, timeout: Duration) -> Result<Value> {
        self.inner.connection.call(method, params, timeout).await
    }

    /// Sends a typed command with the default command deadline.
    ///
    /// # Errors
    ///
    /// Same as [`Connection::call`].
    pub async fn send_command(&self, command: impl Into<Command>) -> Result<Value> {
        self.inner
            .connection
            .call_command(command, self.inner.options.command_timeout)
            .await
    }
}

// ============================================================================
// Tests
// ============================================================================
