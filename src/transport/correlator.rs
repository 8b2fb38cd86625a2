//! Request/response correlation.
//!
//! Each command gets the next id from its session's counter and a one-shot
//! responder in the pending map. The event loop resolves the responder whose
//! id matches an inbound response; the caller removes its own entry when the
//! deadline passes or when its future is dropped. Whichever happens first
//! wins, and the entry is gone afterwards either way.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use rustc_hash::FxHashMap;
use serde_json::{Value, to_string};
use tokio::sync::oneshot;
use tokio::time::{Instant, timeout};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::CommandId;
use crate::protocol::{Command, Request, Response};

use super::Connection;
use super::connection::SharedState;

// ============================================================================
// Types
// ============================================================================

/// Responder handed back to the caller of `call`.
type Responder = oneshot::Sender<Result<Value>>;

/// A single in-flight command.
pub(crate) struct PendingCommand {
    /// Method name, for error reporting.
    method: String,
    /// Resolves the caller.
    responder: Responder,
    /// When the caller gives up.
    deadline: Instant,
}

/// In-flight commands by id.
#[derive(Default)]
pub(crate) struct PendingMap {
    entries: FxHashMap<CommandId, PendingCommand>,
}

impl PendingMap {
    /// Number of in-flight commands.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Registers a command.
    pub(crate) fn insert(&mut self, id: CommandId, method: &str, responder: Responder, deadline: Instant) {
        self.entries.insert(
            id,
            PendingCommand {
                method: method.to_string(),
                responder,
                deadline,
            },
        );
    }

    /// Removes a command without resolving it.
    pub(crate) fn remove(&mut self, id: CommandId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Resolves the command matching a response.
    ///
    /// Returns `false` if no command with this id is pending.
    pub(crate) fn resolve(&mut self, response: Response) -> bool {
        let Some(pending) = self.entries.remove(&response.id) else {
            return false;
        };

        let late_by = Instant::now().saturating_duration_since(pending.deadline);
        if !late_by.is_zero() {
            debug!(id = %response.id, method = %pending.method, ?late_by, "Response arrived after deadline");
        }
        if response.is_error() {
            debug!(id = %response.id, method = %pending.method, "Command rejected by target");
        }

        let result = response.into_result(&pending.method);
        let _ = pending.responder.send(result);
        true
    }

    /// Rejects one command.
    pub(crate) fn reject(&mut self, id: CommandId, error: Error) {
        if let Some(pending) = self.entries.remove(&id) {
            let _ = pending.responder.send(Err(error));
        }
    }

    /// Rejects every command. Returns how many were rejected.
    pub(crate) fn reject_all(&mut self, error: impl Fn() -> Error) -> usize {
        let count = self.entries.len();
        for (_, pending) in self.entries.drain() {
            let _ = pending.responder.send(Err(error()));
        }
        count
    }
}

// ============================================================================
// PendingGuard
// ============================================================================

/// Removes a command's pending entry when the caller stops waiting.
///
/// Covers the deadline, a closed channel, and a caller future dropped
/// mid-flight (an outer timeout, `select!`, or an abandoned poll check).
struct PendingGuard<'a> {
    state: &'a SharedState,
    id: CommandId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.state.lock().pending.remove(self.id) {
            trace!(id = %self.id, "Pending command released");
        }
    }
}

// ============================================================================
// Connection - Commands
// ============================================================================

impl Connection {
    /// Sends a command and waits for its response.
    ///
    /// # Arguments
    ///
    /// * `method` - Protocol method, e.g. `Runtime.evaluate`
    /// * `params` - Params object (`null` is sent as `{}`)
    /// * `deadline` - Maximum time to wait for the response
    ///
    /// # Errors
    ///
    /// - [`Error::SessionClosed`] if the session is or becomes closed
    /// - [`Error::RemoteCommand`] if the target rejects the command
    /// - [`Error::CommandTimeout`] if no response arrives in time
    /// - [`Error::Protocol`] if too many commands are pending
    pub async fn call(&self, method: &str, params: Value, deadline: Duration) -> Result<Value> {
        let id = self.ids.next_command();
        let text = to_string(&Request::new(id, method, params))?;

        let response_rx = {
            let mut state = self.state.lock();

            if state.closed {
                return Err(Error::session_closed(self.target()));
            }

            if state.pending.len() >= self.max_pending {
                warn!(
                    pending = state.pending.len(),
                    max = self.max_pending,
                    "Too many pending commands"
                );
                return Err(Error::protocol(format!(
                    "Too many pending commands: {}/{}",
                    state.pending.len(),
                    self.max_pending
                )));
            }

            let (response_tx, response_rx) = oneshot::channel();
            state
                .pending
                .insert(id, method, response_tx, Instant::now() + deadline);
            response_rx
        };

        let _registration = PendingGuard {
            state: &self.state,
            id,
        };

        if self.enqueue(Some(id), text).is_err() {
            return Err(Error::session_closed(self.target()));
        }

        debug!(%id, method, "Command sent");

        match timeout(deadline, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::session_closed(self.target())),
            Err(_) => {
                warn!(%id, method, timeout_ms = deadline.as_millis() as u64, "Command timed out");
                Err(Error::command_timeout(method, deadline.as_millis() as u64))
            }
        }
    }

    /// Sends a typed command and waits for its response.
    ///
    /// # Errors
    ///
    /// Same as [`Connection::call`].
    pub async fn call_command(&self, command: impl Into<Command>, deadline: Duration) -> Result<Value> {
        let (method, params) = command.into().into_parts()?;
        self.call(&method, params, deadline).await
    }

    /// Returns the number of in-flight commands.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::protocol::PageCommand;
    use crate::transport::connection::tests::{connected_pair, next_json, push_json};

    #[tokio::test]
    async fn test_call_resolves_with_result() {
        let (connection, mut remote) = connected_pair().await;

        let call = tokio::spawn({
            let connection = connection.clone();
            async move {
                connection
                    .call("Browser.getVersion", json!({}), Duration::from_secs(2))
                    .await
            }
        });

        let request = next_json(&mut remote).await;
        assert_eq!(request["id"], 1);
        assert_eq!(request["method"], "Browser.getVersion");
        assert_eq!(request["params"], json!({}));

        push_json(&mut remote, json!({ "id": 1, "result": { "product": "Chrome/126" } })).await;

        let result = call.await.expect("join").expect("call");
        assert_eq!(result["product"], "Chrome/126");
        assert_eq!(connection.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_call_surfaces_remote_error() {
        let (connection, mut remote) = connected_pair().await;

        let call = tokio::spawn({
            let connection = connection.clone();
            async move {
                connection
                    .call("Nope.nothing", json!({}), Duration::from_secs(2))
                    .await
            }
        });

        let request = next_json(&mut remote).await;
        push_json(
            &mut remote,
            json!({ "id": request["id"], "error": { "code": -32601, "message": "'Nope.nothing' wasn't found" } }),
        )
        .await;

        match call.await.expect("join") {
            Err(Error::RemoteCommand { method, code, .. }) => {
                assert_eq!(method, "Nope.nothing");
                assert_eq!(code, -32601);
            }
            other => panic!("expected RemoteCommand, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_removes_pending_entry() {
        let (connection, _remote) = connected_pair().await;

        let err = connection
            .call("x", json!({}), Duration::from_millis(50))
            .await
            .unwrap_err();

        match err {
            Error::CommandTimeout { method, timeout_ms } => {
                assert_eq!(method, "x");
                assert_eq!(timeout_ms, 50);
            }
            other => panic!("expected CommandTimeout, got {other:?}"),
        }
        assert_eq!(connection.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_call_releases_pending_entry() {
        let (connection, mut remote) = connected_pair().await;

        let abandoned = timeout(
            Duration::from_millis(5),
            connection.call("Slow.method", json!({}), Duration::from_secs(5)),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(connection.pending_count(), 0);

        // A late response for the abandoned id is dropped quietly.
        let request = next_json(&mut remote).await;
        push_json(&mut remote, json!({ "id": request["id"], "result": {} })).await;
        assert_eq!(connection.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_calls_do_not_exhaust_pending_limit() {
        let (connection, _remote) = connected_pair().await;

        for _ in 0..8 {
            let _ = timeout(
                Duration::from_millis(5),
                connection.call("Slow.method", json!({}), Duration::from_secs(5)),
            )
            .await;
        }
        assert_eq!(connection.pending_count(), 0);

        let err = connection
            .call("Next.method", json!({}), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CommandTimeout { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_call_after_close_fails_fast() {
        let (connection, _remote) = connected_pair().await;
        connection.close();

        let err = connection
            .call("Page.enable", json!({}), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionClosed { .. }));
    }

    #[tokio::test]
    async fn test_close_rejects_in_flight_call() {
        let (connection, mut remote) = connected_pair().await;

        let call = tokio::spawn({
            let connection = connection.clone();
            async move {
                connection
                    .call("Page.enable", json!({}), Duration::from_secs(5))
                    .await
            }
        });

        let _ = next_json(&mut remote).await;
        connection.close();

        let err = call.await.expect("join").unwrap_err();
        assert!(matches!(err, Error::SessionClosed { .. }));
    }

    #[tokio::test]
    async fn test_pending_limit() {
        let (connection, _remote) = connected_pair().await;

        let mut calls = Vec::new();
        for _ in 0..8 {
            let connection = connection.clone();
            calls.push(tokio::spawn(async move {
                connection
                    .call("Slow.method", json!({}), Duration::from_secs(5))
                    .await
            }));
        }

        while connection.pending_count() < 8 {
            tokio::task::yield_now().await;
        }

        let err = connection
            .call("One.tooMany", json!({}), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));

        connection.close();
        for call in calls {
            assert!(call.await.expect("join").is_err());
        }
    }

    #[tokio::test]
    async fn test_call_command_uses_typed_method() {
        let (connection, mut remote) = connected_pair().await;

        let call = tokio::spawn({
            let connection = connection.clone();
            async move {
                connection
                    .call_command(PageCommand::BringToFront, Duration::from_secs(2))
                    .await
            }
        });

        let request = next_json(&mut remote).await;
        assert_eq!(request["method"], "Page.bringToFront");
        push_json(&mut remote, json!({ "id": request["id"], "result": {} })).await;

        assert_eq!(call.await.expect("join").expect("call"), json!({}));
    }
}
