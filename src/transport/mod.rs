//! WebSocket transport layer.
//!
//! This module owns the duplex channel to one debugging target and the two
//! mechanisms layered directly on its inbound stream.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐                      ┌──────────────────┐
//! │  Connection (Rust)       │                      │  Debugging       │
//! │                          │      WebSocket       │  target          │
//! │  correlator: id → caller │◄────────────────────►│  (page or        │
//! │  waiter: predicate list  │  /devtools/page/<id> │   background)    │
//! │  handlers: fan-out       │                      │                  │
//! └──────────────────────────┘                      └──────────────────┘
//! ```
//!
//! Every inbound message is offered, in arrival order, to: all fan-out
//! handlers, the pending command with the matching `id` (if any), and every
//! registered waiter.
//!
//! # Connection Lifecycle
//!
//! 1. `Connection::open` - WebSocket handshake with the target
//! 2. `call` / `prepare_wait` / `on_message` - Use the session
//! 3. `Connection::close` - Reject everything outstanding, close the socket
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket connection, event loop and fan-out |
//! | `correlator` | Request/response correlation by id |
//! | `waiter` | Predicate waiters over unsolicited messages |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

/// Command correlation by per-session id.
pub mod correlator;

/// Predicate waiters with at-most-once resolution.
pub mod waiter;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, MessageHandler};
pub use waiter::{Predicate, PreparedWait};
