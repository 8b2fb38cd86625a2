//! Debugging target sessions.
//!
//! Each [`Session`] wraps one [`Connection`](crate::Connection) with default
//! deadlines and the higher-level operations tests use.
//!
//! # Module Structure
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | Session struct, lifecycle and raw commands |
//! | `evaluate` | Remote evaluation and result unwrapping |
//! | `wait` | Event waits, polling, arm-then-trigger |
//! | `coverage` | Differential precise coverage |
//! | `console` | Console capture and markers |
//! | `input` | Key presses and focus |
//! | `keyboard` | Key definitions |
//!
//! # Example
//!
//! ```ignore
//! let session = Session::open(&target.web_socket_debugger_url, SessionOptions::new()).await?;
//! session.enable_runtime().await?;
//!
//! // Evaluate
//! let title: String = session.evaluate_as("document.title").await?;
//!
//! // Arm, act, await
//! let marker = session.prepare_console_marker("HINTS_READY")?;
//! session.press_key(Key::Char('f')).await?;
//! marker.wait().await?;
//!
//! session.close();
//! ```

// ============================================================================
// Submodules
// ============================================================================

mod console;
mod core;
mod coverage;
mod evaluate;
mod input;
mod keyboard;
mod wait;

// ============================================================================
// Re-exports
// ============================================================================

pub use console::ConsoleMessage;
pub use core::Session;
pub use coverage::{CoverageDelta, CoverageEntry, CoverageSnapshot, CoverageTracker, RangeKey, delta};
pub use keyboard::Key;
pub use wait::{Armed, PreparedChange, act_and_wait, poll_until};
