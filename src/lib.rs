//! DevTools Harness - Remote-debugging session client for extension tests.
//!
//! This library drives a browser extension end-to-end by talking directly to
//! the browser's DevTools remote-debugging interface.
//!
//! # Architecture
//!
//! The harness follows a client-target model:
//!
//! - **Local End (Rust)**: Sends commands, correlates responses, waits on events
//! - **Remote End (Target)**: A page or the extension's background context
//!
//! Key design principles:
//!
//! - Each [`Session`] owns: one WebSocket + one event loop + one id counter
//! - Responses and events share one stream; the presence of `id` tells them apart
//! - Every command, wait and poll carries its own deadline
//! - Observations are armed before the action that triggers them
//!
//! # Quick Start
//!
//! ```no_run
//! use devtools_harness::{Harness, Key, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Attach to a browser started with --remote-debugging-port=9222
//!     let harness = Harness::builder().port(9222).build()?;
//!     let page = harness.connect_page("localhost:8000/fixtures").await?;
//!     page.enable_runtime().await?;
//!
//!     // Arm first, then act, then await
//!     let scrolled = page.prepare_value_change("window.scrollY").await?;
//!     page.press_key(Key::Char('j')).await?;
//!     let y = scrolled.wait().await?;
//!     println!("scrolled to {y}");
//!
//!     harness.close();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`session`] | [`Session`]: evaluation, waits, polling, coverage, input |
//! | [`harness`] | [`Harness`] entry point and [`SessionOptions`] |
//! | [`discovery`] | HTTP target discovery |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire message types |
//! | [`transport`] | WebSocket connection, correlation and waiters |

// ============================================================================
// Modules
// ============================================================================

/// Target discovery over the HTTP debugging endpoint.
pub mod discovery;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Harness entry point and configuration.
///
/// Use [`Harness::builder()`] to create a configured harness.
pub mod harness;

/// Type-safe identifiers for commands, waiters and targets.
pub mod identifiers;

/// Wire message types.
pub mod protocol;

/// Debugging target sessions.
pub mod session;

/// WebSocket transport layer.
///
/// Owns the socket, the pending command map and the waiter list.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Session types
pub use session::{
    Armed, ConsoleMessage, CoverageDelta, CoverageEntry, CoverageSnapshot, CoverageTracker, Key,
    PreparedChange, RangeKey, Session, act_and_wait, delta, poll_until,
};

// Harness types
pub use harness::{Harness, HarnessBuilder, SessionOptions};

// Discovery types
pub use discovery::{BrowserVersion, Discovery, TargetInfo};

// Transport types
pub use transport::{Connection, MessageHandler, PreparedWait};

// Protocol types
pub use protocol::{Event, ParsedEvent};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{CommandId, SubscriptionId, TargetId, WaiterId};
