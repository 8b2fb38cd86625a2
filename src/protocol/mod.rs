//! DevTools protocol message types.
//!
//! This module defines the JSON messages exchanged with a debugging target.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Shape |
//! |--------------|-----------|-------|
//! | `Request` | Local → Remote | `{id, method, params}` |
//! | `Response` | Remote → Local | `{id, result}` or `{id, error: {code, message}}` |
//! | `Event` | Remote → Local | `{method, params}` (no `id`) |
//!
//! Presence of `id` is the only thing separating a response from an
//! unsolicited event; see [`Inbound::classify`].
//!
//! # Command Naming
//!
//! Commands follow the protocol's `Domain.method` format:
//!
//! - `Runtime.evaluate`
//! - `Profiler.takePreciseCoverage`
//! - `Input.dispatchKeyEvent`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Typed command definitions by domain |
//! | `event` | Event type and typed parsing |
//! | `request` | Request, Response and inbound classification |

// ============================================================================
// Submodules
// ============================================================================

/// Command definitions organized by domain.
pub mod command;

/// Event message types.
pub mod event;

/// Request and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{Command, InputCommand, KeyEventType, PageCommand, ProfilerCommand, RuntimeCommand};
pub use event::{Event, ParsedEvent};
pub use request::{Inbound, RemoteError, Request, Response};
