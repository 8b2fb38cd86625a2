//! Console capture.
//!
//! Console output is the usual side channel for markers emitted by code
//! under test. Messages arrive as `Runtime.consoleAPICalled` events once the
//! Runtime domain is enabled.

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::identifiers::SubscriptionId;
use crate::protocol::{Event, ParsedEvent, RuntimeCommand};
use crate::transport::PreparedWait;

use super::Session;

// ============================================================================
// ConsoleMessage
// ============================================================================

/// One `console.*` call in the target.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleMessage {
    /// Console level (`log`, `error`, `warning`, ...).
    pub level: String,
    /// Arguments rendered and joined by spaces.
    pub text: String,
    /// Remote timestamp in milliseconds.
    pub timestamp: f64,
}

impl ConsoleMessage {
    /// Parses a raw inbound message. Returns `None` for anything else.
    #[must_use]
    pub fn from_message(message: &Value) -> Option<Self> {
        match Event::from_message(message)?.parse() {
            ParsedEvent::ConsoleApiCalled {
                level,
                args,
                timestamp,
            } => Some(Self {
                level,
                text: args.iter().map(render_arg).collect::<Vec<_>>().join(" "),
                timestamp,
            }),
            _ => None,
        }
    }
}

/// Renders one remote console argument.
fn render_arg(arg: &Value) -> String {
    match arg.get("value") {
        Some(Value::String(s)) => return s.clone(),
        Some(value) => return value.to_string(),
        None => {}
    }

    ["unserializableValue", "description"]
        .iter()
        .find_map(|key| arg.get(*key).and_then(Value::as_str))
        .or_else(|| arg.get("type").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

// ============================================================================
// Session - Console
// ============================================================================

impl Session {
    /// Enables the Runtime domain so console events are reported.
    pub async fn enable_runtime(&self) -> Result<()> {
        self.send_command(RuntimeCommand::Enable).await?;
        Ok(())
    }

    /// Registers a handler for every console message.
    ///
    /// Remove it with [`Connection::remove_handler`](crate::Connection::remove_handler).
    pub fn on_console<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ConsoleMessage) + Send + Sync + 'static,
    {
        self.inner.connection.on_message(move |message| {
            if let Some(console) = ConsoleMessage::from_message(message) {
                handler(&console);
            }
        })
    }

    /// Arms a wait for a console message containing `marker`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`](crate::Error::SessionClosed) if the
    /// session is closed.
    pub fn prepare_console_marker(&self, marker: &str) -> Result<PreparedWait> {
        let needle = marker.to_string();
        debug!(target_id = %self.inner.target_id, marker, "Console marker armed");

        self.prepare_wait(format!("console marker `{marker}`"), move |message| {
            ConsoleMessage::from_message(message).is_some_and(|console| console.text.contains(&needle))
        })
    }

    /// Arms a wait for a console message matching `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`](crate::Error::SessionClosed) if the
    /// session is closed.
    pub fn prepare_console_match(&self, pattern: Regex) -> Result<PreparedWait> {
        let operation = format!("console match /{}/", pattern.as_str());

        self.prepare_wait(operation, move |message| {
            ConsoleMessage::from_message(message).is_some_and(|console| pattern.is_match(&console.text))
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
