//! Predicate waiters over the inbound message stream.
//!
//! A waiter is registered synchronously, so anything the caller does after
//! arming is observed. The event loop offers every inbound message to every
//! waiter; the first match removes the waiter and resolves it, so a later
//! equally-matching message has no effect.
//!
//! # Example
//!
//! ```ignore
//! // Arm first...
//! let loaded = connection.prepare_wait(
//!     "Page.loadEventFired",
//!     |m| m["method"] == "Page.loadEventFired",
//!     Duration::from_secs(5),
//! )?;
//!
//! // ...then trigger, then await.
//! connection.call("Page.reload", json!({}), Duration::from_secs(5)).await?;
//! let event = loaded.wait().await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::WaiterId;

use super::Connection;
use super::connection::SessionState;

// ============================================================================
// Types
// ============================================================================

/// Predicate over one inbound message.
///
/// Predicates run on the event loop while the session lock is held; they
/// must be pure and must not call back into the session.
pub type Predicate = Box<dyn Fn(&Value) -> bool + Send + Sync>;

/// A registered waiter.
struct WaiterEntry {
    id: WaiterId,
    operation: String,
    predicate: Predicate,
    responder: oneshot::Sender<Result<Value>>,
}

/// Active waiters in registration order.
#[derive(Default)]
pub(crate) struct WaiterList {
    entries: Vec<WaiterEntry>,
}

impl WaiterList {
    /// Number of active waiters.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn register(
        &mut self,
        id: WaiterId,
        operation: String,
        predicate: Predicate,
        responder: oneshot::Sender<Result<Value>>,
    ) {
        self.entries.push(WaiterEntry {
            id,
            operation,
            predicate,
            responder,
        });
    }

    /// Removes a waiter. Returns `false` if it was already gone.
    pub(crate) fn remove(&mut self, id: WaiterId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        before != self.entries.len()
    }

    /// Offers a message to every waiter, resolving and removing each match.
    ///
    /// Waiters whose receiver is gone are pruned. Returns the number resolved.
    pub(crate) fn offer(&mut self, message: &Value) -> usize {
        let mut resolved = 0;
        let mut index = 0;

        while index < self.entries.len() {
            let entry = &self.entries[index];

            if entry.responder.is_closed() {
                self.entries.remove(index);
                continue;
            }

            if (entry.predicate)(message) {
                let entry = self.entries.remove(index);
                trace!(id = %entry.id, operation = %entry.operation, "Waiter matched");
                let _ = entry.responder.send(Ok(message.clone()));
                resolved += 1;
            } else {
                index += 1;
            }
        }

        resolved
    }

    /// Rejects every waiter. Returns how many were rejected.
    pub(crate) fn reject_all(&mut self, error: impl Fn() -> Error) -> usize {
        let count = self.entries.len();
        for entry in self.entries.drain(..) {
            let _ = entry.responder.send(Err(error()));
        }
        count
    }
}

// ============================================================================
// PreparedWait
// ============================================================================

/// An armed waiter that has not been awaited yet.
///
/// Created by [`Connection::prepare_wait`]. The deadline starts when the
/// waiter is armed. Dropping an unresolved `PreparedWait` deregisters it.
#[must_use = "an armed wait does nothing unless awaited"]
pub struct PreparedWait {
    id: WaiterId,
    operation: String,
    timeout: Duration,
    deadline: Instant,
    target: String,
    receiver: Option<oneshot::Receiver<Result<Value>>>,
    state: Weak<Mutex<SessionState>>,
}

impl fmt::Debug for PreparedWait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedWait")
            .field("id", &self.id)
            .field("operation", &self.operation)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl PreparedWait {
    /// Returns the description used in timeout errors.
    #[inline]
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Returns the remaining time before the deadline.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Waits for the first matching message.
    ///
    /// # Errors
    ///
    /// - [`Error::WaitTimeout`] if nothing matched before the deadline
    /// - [`Error::SessionClosed`] if the session closed first
    pub async fn wait(mut self) -> Result<Value> {
        let Some(receiver) = self.receiver.take() else {
            return Err(Error::protocol("wait already consumed"));
        };

        match timeout_at(self.deadline, receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::session_closed(&self.target)),
            Err(_) => {
                self.deregister();
                let timeout_ms = self.timeout.as_millis() as u64;
                warn!(operation = %self.operation, timeout_ms, "Wait timed out");
                Err(Error::wait_timeout(&self.operation, timeout_ms))
            }
        }
    }

    fn deregister(&self) {
        if let Some(state) = self.state.upgrade()
            && state.lock().waiters.remove(self.id)
        {
            debug!(id = %self.id, operation = %self.operation, "Waiter removed");
        }
    }
}

impl Drop for PreparedWait {
    fn drop(&mut self) {
        self.deregister();
    }
}

// ============================================================================
// Connection - Waiters
// ============================================================================

impl Connection {
    /// Arms a waiter without awaiting it.
    ///
    /// Registration completes before this returns, so a message caused by
    /// anything the caller does afterwards cannot be missed.
    ///
    /// # Arguments
    ///
    /// * `operation` - Description used in logs and timeout errors
    /// * `predicate` - Match condition over inbound messages
    /// * `timeout` - Deadline, counted from now
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] if the session is closed.
    pub fn prepare_wait<F>(
        &self,
        operation: impl Into<String>,
        predicate: F,
        timeout: Duration,
    ) -> Result<PreparedWait>
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let operation = operation.into();
        let id = self.ids.next_waiter();
        let (responder, receiver) = oneshot::channel();

        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(Error::session_closed(self.target()));
            }
            state
                .waiters
                .register(id, operation.clone(), Box::new(predicate), responder);
        }

        debug!(%id, operation = %operation, timeout_ms = timeout.as_millis() as u64, "Waiter armed");

        Ok(PreparedWait {
            id,
            operation,
            timeout,
            deadline: Instant::now() + timeout,
            target: self.target().to_string(),
            receiver: Some(receiver),
            state: Arc::downgrade(&self.state),
        })
    }

    /// Waits for the first inbound message satisfying `predicate`.
    ///
    /// Prefer [`Connection::prepare_wait`] when the awaited message is caused
    /// by an action the caller performs.
    ///
    /// # Errors
    ///
    /// Same as [`PreparedWait::wait`].
    pub async fn wait_for<F>(
        &self,
        operation: impl Into<String>,
        predicate: F,
        timeout: Duration,
    ) -> Result<Value>
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.prepare_wait(operation, predicate, timeout)?.wait().await
    }

    /// Returns the number of active waiters.
    #[inline]
    #[must_use]
    pub fn waiter_count(&self) -> usize {
        self.state.lock().waiters.len()
    }
}

// ============================================================================
// Tests
// ============================================================================
