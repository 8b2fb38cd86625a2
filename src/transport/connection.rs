//! WebSocket connection and event loop.
//!
//! This module handles the WebSocket connection to one debugging target:
//! outbound writes, inbound fan-out, and the lifecycle shared by the
//! correlator and the waiters.
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Incoming messages from the target (responses, events)
//! - Outgoing messages from the Rust API, in send order
//! - Dispatch of each inbound message to handlers, the correlator and waiters
//! - Rejection of everything outstanding when the socket goes away

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, from_str, to_string};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, connect_async};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::{CommandId, IdCounter, SubscriptionId};
use crate::protocol::Inbound;

use super::correlator::PendingMap;
use super::waiter::WaiterList;

// ============================================================================
// Constants
// ============================================================================

/// Maximum pending commands before rejecting new ones.
pub(crate) const DEFAULT_MAX_PENDING: usize = 256;

// ============================================================================
// Types
// ============================================================================

/// Fan-out handler invoked for every inbound message.
///
/// Handlers run on the connection's event loop, in arrival order. They must
/// not block.
pub type MessageHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Registered handlers in registration order.
type HandlerList = Vec<(SubscriptionId, MessageHandler)>;

/// Session state guarded by a single lock.
///
/// The closed flag lives next to the pending map and waiter list so that a
/// registration can never slip in after the session has been drained.
pub(crate) struct SessionState {
    /// Set once by `close()` or by the event loop on remote close.
    pub closed: bool,
    /// In-flight commands by id.
    pub pending: PendingMap,
    /// Active event waiters.
    pub waiters: WaiterList,
}

impl SessionState {
    fn new() -> Self {
        Self {
            closed: false,
            pending: PendingMap::default(),
            waiters: WaiterList::default(),
        }
    }

    /// Marks the session closed and rejects everything outstanding.
    ///
    /// Returns `false` if the session was already closed.
    pub(crate) fn shut(&mut self, target: &str) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;

        let commands = self.pending.reject_all(|| Error::session_closed(target));
        let waiters = self.waiters.reject_all(|| Error::session_closed(target));

        if commands + waiters > 0 {
            debug!(target, commands, waiters, "Rejected outstanding operations on close");
        }
        true
    }
}

/// Shared handle to the session state.
pub(crate) type SharedState = Arc<Mutex<SessionState>>;

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Write one text frame. `id` is set for correlated commands.
    Send {
        id: Option<CommandId>,
        text: String,
    },
    /// Close the socket and stop.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// WebSocket connection to one debugging target.
///
/// Cloning is cheap; all clones share the same socket, id counter, pending
/// commands and waiters. The connection stays open until [`close`] is called
/// or the target goes away.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync` and can be shared across tasks.
///
/// [`close`]: Connection::close
#[derive(Clone)]
pub struct Connection {
    /// Debugger URL of the target.
    pub(crate) target: Arc<str>,
    /// Per-session id source.
    pub(crate) ids: Arc<IdCounter>,
    /// Closed flag, pending commands and waiters.
    pub(crate) state: SharedState,
    /// Fan-out handlers.
    handlers: Arc<Mutex<HandlerList>>,
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Pending command limit.
    pub(crate) max_pending: usize,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("target", &self.target)
            .field("closed", &self.is_closed())
            .field("pending", &self.pending_count())
            .field("waiters", &self.waiter_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Connection - Lifecycle
// ============================================================================

impl Connection {
    /// Opens a WebSocket connection to a debugging target.
    ///
    /// # Arguments
    ///
    /// * `url` - Debugger URL, e.g. `ws://127.0.0.1:9222/devtools/page/<id>`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the URL is not a `ws`/`wss` URL or
    /// the handshake fails.
    pub async fn open(url: &str) -> Result<Self> {
        Self::open_with_limit(url, DEFAULT_MAX_PENDING).await
    }

    /// Opens a connection with a custom pending-command limit.
    ///
    /// # Errors
    ///
    /// Same as [`Connection::open`].
    pub async fn open_with_limit(url: &str, max_pending: usize) -> Result<Self> {
        let parsed = Url::parse(url)
            .map_err(|e| Error::connection(format!("invalid debugger URL {url}: {e}")))?;

        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(Error::connection(format!(
                "debugger URL must use ws:// or wss://, got {url}"
            )));
        }

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::connection(format!("WebSocket handshake with {url} failed: {e}")))?;

        info!(target = url, "Debugger connection established");

        Ok(Self::from_stream(url, ws_stream, max_pending))
    }

    /// Creates a connection from an established WebSocket stream.
    ///
    /// Spawns the event loop task internally.
    pub(crate) fn from_stream<S>(target: &str, ws_stream: WebSocketStream<S>, max_pending: usize) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let target: Arc<str> = Arc::from(target);
        let state = Arc::new(Mutex::new(SessionState::new()));
        let handlers: Arc<Mutex<HandlerList>> = Arc::new(Mutex::new(Vec::new()));

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            Arc::clone(&target),
            Arc::clone(&state),
            Arc::clone(&handlers),
        ));

        Self {
            target,
            ids: Arc::new(IdCounter::new()),
            state,
            handlers,
            command_tx,
            max_pending,
        }
    }

    /// Closes the connection.
    ///
    /// Every pending command and waiter is rejected with
    /// [`Error::SessionClosed`]. Calling `close` again is a no-op.
    pub fn close(&self) {
        if self.state.lock().shut(&self.target) {
            let _ = self.command_tx.send(ConnectionCommand::Shutdown);
            info!(target = %self.target, "Debugger connection closed");
        }
    }

    /// Returns `true` once the connection has been closed by either side.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Returns the debugger URL of the target.
    #[inline]
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }
}

// ============================================================================
// Connection - Messaging
// ============================================================================

impl Connection {
    /// Writes one message to the target.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] if the connection is not open
    /// - [`Error::Json`] if the message cannot be serialized
    pub fn send(&self, message: &Value) -> Result<()> {
        if self.is_closed() {
            return Err(Error::connection(format!(
                "channel to {} is not open",
                self.target
            )));
        }

        let text = to_string(message)?;
        self.enqueue(None, text)
    }

    /// Hands a serialized frame to the event loop.
    pub(crate) fn enqueue(&self, id: Option<CommandId>, text: String) -> Result<()> {
        self.command_tx
            .send(ConnectionCommand::Send { id, text })
            .map_err(|_| Error::connection(format!("channel to {} is not open", self.target)))
    }

    /// Registers a fan-out handler for every inbound message.
    ///
    /// All handlers see every message; none consumes it.
    pub fn on_message<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = self.ids.next_subscription();
        self.handlers.lock().push((id, Arc::new(handler)));
        debug!(target = %self.target, %id, "Message handler registered");
        id
    }

    /// Removes a fan-out handler.
    ///
    /// Returns `false` if no handler had this id.
    pub fn remove_handler(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        before != handlers.len()
    }

    /// Returns the number of registered fan-out handlers.
    #[inline]
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.lock().len()
    }
}

// ============================================================================
// Connection - Event Loop
// ============================================================================

impl Connection {
    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop<S>(
        ws_stream: WebSocketStream<S>,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        target: Arc<str>,
        state: SharedState,
        handlers: Arc<Mutex<HandlerList>>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Incoming messages from the target
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            Self::handle_incoming_message(&text, &state, &handlers);
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!(target = %target, "WebSocket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(target = %target, error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!(target = %target, "WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Outbound messages from the Rust API
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { id, text }) => {
                            if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                                warn!(target = %target, error = %e, "Failed to write message");
                                if let Some(id) = id {
                                    state.lock().pending.reject(id, Error::connection(e.to_string()));
                                }
                                break;
                            }
                            trace!(?id, "Message sent");
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!(target = %target, "Shutdown command received");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!(target = %target, "All connection handles dropped");
                            let _ = ws_write.close().await;
                            break;
                        }
                    }
                }
            }
        }

        if state.lock().shut(&target) {
            info!(target = %target, "Debugger connection lost");
        }

        debug!(target = %target, "Event loop terminated");
    }

    /// Dispatches one inbound text frame.
    ///
    /// Order: fan-out handlers, then the pending command with the matching
    /// id, then every waiter.
    fn handle_incoming_message(
        text: &str,
        state: &SharedState,
        handlers: &Arc<Mutex<HandlerList>>,
    ) {
        let message: Value = match from_str(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, len = text.len(), "Dropping unparseable message");
                return;
            }
        };

        trace!(len = text.len(), "Message received");

        // Handlers run outside the lock so they may call back into the session
        let snapshot: Vec<MessageHandler> = handlers
            .lock()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in &snapshot {
            handler(&message);
        }

        let mut state = state.lock();

        match Inbound::classify(&message) {
            Ok(Inbound::Response(response)) => {
                let id = response.id;
                if !state.pending.resolve(response) {
                    warn!(%id, "Response for unknown command");
                }
            }
            Ok(Inbound::Event(_)) => {}
            Err(e) => match Inbound::response_id(&message) {
                Some(id) => {
                    state
                        .pending
                        .reject(id, Error::protocol(format!("malformed response: {e}")));
                }
                None if Inbound::has_id(&message) => {
                    warn!(id = %message["id"], "Dropping response with non-integer id");
                }
                None => {
                    trace!(error = %e, "Message is neither a response nor an event");
                }
            },
        }

        state.waiters.offer(&message);
    }
}

// ============================================================================
// Tests
// ============================================================================
