//! Command definitions organized by domain.
//!
//! Commands follow the protocol's `Domain.method` format.
//!
//! # Command Domains
//!
//! | Domain | Commands |
//! |--------|----------|
//! | `Runtime` | Enable, evaluate, call on object, release object |
//! | `Profiler` | Precise coverage lifecycle |
//! | `Page` | Enable, bring to front, navigate, reload |
//! | `Input` | Key events |
//!
//! Untyped commands go through [`crate::Session::call`] directly.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ============================================================================
// Command Wrapper
// ============================================================================

/// All typed protocol commands organized by domain.
///
/// This enum wraps domain-specific command enums for unified serialization.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Command {
    /// Runtime domain commands.
    Runtime(RuntimeCommand),
    /// Profiler domain commands.
    Profiler(ProfilerCommand),
    /// Page domain commands.
    Page(PageCommand),
    /// Input domain commands.
    Input(InputCommand),
}

impl Command {
    /// Splits the command into its method name and params object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the command does not serialize to a
    /// `{method, params}` object.
    pub fn into_parts(self) -> Result<(String, Value)> {
        let value = serde_json::to_value(&self)?;
        let Value::Object(mut object) = value else {
            return Err(Error::protocol("command did not serialize to an object"));
        };

        let method = match object.remove("method") {
            Some(Value::String(method)) => method,
            _ => return Err(Error::protocol("command is missing its method name")),
        };
        let params = object
            .remove("params")
            .unwrap_or_else(|| Value::Object(Map::new()));

        Ok((method, params))
    }
}

impl From<RuntimeCommand> for Command {
    fn from(command: RuntimeCommand) -> Self {
        Self::Runtime(command)
    }
}

impl From<ProfilerCommand> for Command {
    fn from(command: ProfilerCommand) -> Self {
        Self::Profiler(command)
    }
}

impl From<PageCommand> for Command {
    fn from(command: PageCommand) -> Self {
        Self::Page(command)
    }
}

impl From<InputCommand> for Command {
    fn from(command: InputCommand) -> Self {
        Self::Input(command)
    }
}

// ============================================================================
// Runtime Commands
// ============================================================================

/// Runtime domain commands for script evaluation and console reporting.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum RuntimeCommand {
    /// Start reporting execution contexts and console calls.
    #[serde(rename = "Runtime.enable")]
    Enable,

    /// Stop reporting runtime events.
    #[serde(rename = "Runtime.disable")]
    Disable,

    /// Evaluate an expression in the target's global context.
    #[serde(rename = "Runtime.evaluate")]
    Evaluate {
        /// Expression source.
        expression: String,
        /// Wait for a returned promise to settle.
        #[serde(rename = "awaitPromise")]
        await_promise: bool,
        /// Return the value inline instead of as a remote reference.
        #[serde(rename = "returnByValue")]
        return_by_value: bool,
        /// Treat the evaluation as a user gesture.
        #[serde(rename = "userGesture")]
        user_gesture: bool,
    },

    /// Call a function with `this` bound to a remote object.
    #[serde(rename = "Runtime.callFunctionOn")]
    CallFunctionOn {
        /// Remote object the function is called on.
        #[serde(rename = "objectId")]
        object_id: String,
        /// Function source.
        #[serde(rename = "functionDeclaration")]
        function_declaration: String,
        /// Return the value inline instead of as a remote reference.
        #[serde(rename = "returnByValue")]
        return_by_value: bool,
    },

    /// Release a remote object reference.
    #[serde(rename = "Runtime.releaseObject")]
    ReleaseObject {
        /// Remote object to release.
        #[serde(rename = "objectId")]
        object_id: String,
    },
}

impl RuntimeCommand {
    /// Builds a promise-awaiting evaluation.
    ///
    /// Primitives come back inline; objects come back by reference so that
    /// values which cannot be serialized still produce a reply.
    #[inline]
    #[must_use]
    pub fn evaluate(expression: impl Into<String>) -> Self {
        Self::Evaluate {
            expression: expression.into(),
            await_promise: true,
            return_by_value: false,
            user_gesture: true,
        }
    }

    /// Builds a by-value read of a remote object.
    #[inline]
    #[must_use]
    pub fn value_of(object_id: impl Into<String>) -> Self {
        Self::CallFunctionOn {
            object_id: object_id.into(),
            function_declaration: "function() { return this; }".to_string(),
            return_by_value: true,
        }
    }
}

// ============================================================================
// Profiler Commands
// ============================================================================

/// Profiler domain commands for precise code coverage.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum ProfilerCommand {
    /// Enable the profiler.
    #[serde(rename = "Profiler.enable")]
    Enable,

    /// Disable the profiler.
    #[serde(rename = "Profiler.disable")]
    Disable,

    /// Start collecting precise coverage; resets counters.
    #[serde(rename = "Profiler.startPreciseCoverage")]
    StartPreciseCoverage {
        /// Collect call counts rather than binary coverage.
        #[serde(rename = "callCount")]
        call_count: bool,
        /// Collect block-level rather than function-level coverage.
        detailed: bool,
    },

    /// Collect coverage since the previous take; resets counters.
    #[serde(rename = "Profiler.takePreciseCoverage")]
    TakePreciseCoverage,

    /// Stop collecting precise coverage.
    #[serde(rename = "Profiler.stopPreciseCoverage")]
    StopPreciseCoverage,
}

// ============================================================================
// Page Commands
// ============================================================================

/// Page domain commands for lifecycle events and focus.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum PageCommand {
    /// Start reporting page lifecycle events.
    #[serde(rename = "Page.enable")]
    Enable,

    /// Bring the page to the front.
    #[serde(rename = "Page.bringToFront")]
    BringToFront,

    /// Navigate the page.
    #[serde(rename = "Page.navigate")]
    Navigate {
        /// Destination URL.
        url: String,
    },

    /// Reload the page.
    #[serde(rename = "Page.reload")]
    Reload {
        /// Bypass the cache.
        #[serde(rename = "ignoreCache")]
        ignore_cache: bool,
    },
}

// ============================================================================
// Input Commands
// ============================================================================

/// Key event phase for `Input.dispatchKeyEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KeyEventType {
    /// Key pressed.
    #[serde(rename = "keyDown")]
    KeyDown,
    /// Key released.
    #[serde(rename = "keyUp")]
    KeyUp,
    /// Character produced.
    #[serde(rename = "char")]
    Char,
}

/// Input domain commands for synthetic keyboard input.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum InputCommand {
    /// Dispatch one key event.
    #[serde(rename = "Input.dispatchKeyEvent")]
    DispatchKeyEvent {
        /// Event phase.
        #[serde(rename = "type")]
        event_type: KeyEventType,
        /// DOM `key` value.
        key: String,
        /// DOM `code` value.
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        /// Text produced by the key.
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        /// Windows virtual key code.
        #[serde(
            rename = "windowsVirtualKeyCode",
            skip_serializing_if = "Option::is_none"
        )]
        windows_virtual_key_code: Option<u32>,
        /// Native virtual key code.
        #[serde(
            rename = "nativeVirtualKeyCode",
            skip_serializing_if = "Option::is_none"
        )]
        native_virtual_key_code: Option<u32>,
        /// Modifier bit field (Alt=1, Ctrl=2, Meta=4, Shift=8).
        #[serde(skip_serializing_if = "Option::is_none")]
        modifiers: Option<u32>,
    },
}

// ============================================================================
// Tests
// ============================================================================
