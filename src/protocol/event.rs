//! Event message types.
//!
//! Events are unsolicited notifications from the debugging target. They carry
//! no `id` and are not correlated with any command.
//!
//! # Typed Events
//!
//! | Domain | Events |
//! |--------|--------|
//! | `Runtime` | `consoleAPICalled`, `exceptionThrown`, `executionContextCreated` |
//! | `Page` | `loadEventFired`, `domContentEventFired`, `frameNavigated` |
//!
//! Everything else parses to [`ParsedEvent::Unknown`].

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// Event
// ============================================================================

/// An unsolicited event from remote end to local end.
///
/// # Format
///
/// ```json
/// {
///   "method": "Runtime.consoleAPICalled",
///   "params": { ... }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    /// Event name in `Domain.event` format.
    pub method: String,

    /// Event-specific data.
    #[serde(default)]
    pub params: Value,

    /// Flat-mode session id, present when the event was routed through a
    /// browser-level connection.
    #[serde(default, rename = "sessionId")]
    pub session_id: Option<String>,
}

impl Event {
    /// Parses an inbound message as an event.
    ///
    /// Returns `None` for responses and for anything without a `method`.
    #[must_use]
    pub fn from_message(message: &Value) -> Option<Self> {
        if message.get("id").is_some() {
            return None;
        }
        Self::deserialize(message).ok()
    }

    /// Returns the domain name from the method.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let event = Event { method: "Page.loadEventFired".into(), .. };
    /// assert_eq!(event.domain(), "Page");
    /// ```
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        self.method.split('.').next().unwrap_or_default()
    }

    /// Returns the event name from the method.
    #[inline]
    #[must_use]
    pub fn event_name(&self) -> &str {
        self.method.split('.').nth(1).unwrap_or_default()
    }

    /// Parses the event into a typed variant.
    #[must_use]
    pub fn parse(&self) -> ParsedEvent {
        match self.method.as_str() {
            "Runtime.consoleAPICalled" => ParsedEvent::ConsoleApiCalled {
                level: self.get_string_or("type", "log"),
                args: self
                    .params
                    .get("args")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
                timestamp: self.get_f64("timestamp"),
            },

            "Runtime.exceptionThrown" => {
                let details = self.params.get("exceptionDetails");
                ParsedEvent::ExceptionThrown {
                    text: details
                        .and_then(|d| d.get("text"))
                        .and_then(Value::as_str)
                        .unwrap_or("Unknown error")
                        .to_string(),
                    description: details
                        .and_then(|d| d.get("exception"))
                        .and_then(|e| e.get("description"))
                        .and_then(Value::as_str)
                        .map(str::to_string),
                }
            }

            "Runtime.executionContextCreated" => {
                let context = self.params.get("context");
                ParsedEvent::ExecutionContextCreated {
                    context_id: context
                        .and_then(|c| c.get("id"))
                        .and_then(Value::as_u64)
                        .unwrap_or_default(),
                    origin: context
                        .and_then(|c| c.get("origin"))
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                }
            }

            "Page.loadEventFired" => ParsedEvent::LoadEventFired {
                timestamp: self.get_f64("timestamp"),
            },

            "Page.domContentEventFired" => ParsedEvent::DomContentEventFired {
                timestamp: self.get_f64("timestamp"),
            },

            "Page.frameNavigated" => {
                let frame = self.params.get("frame");
                ParsedEvent::FrameNavigated {
                    frame_id: frame
                        .and_then(|f| f.get("id"))
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    url: frame
                        .and_then(|f| f.get("url"))
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                }
            }

            _ => ParsedEvent::Unknown {
                method: self.method.clone(),
                params: self.params.clone(),
            },
        }
    }

    /// Gets a string from params with default.
    #[inline]
    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.params
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    /// Gets an f64 from params.
    #[inline]
    fn get_f64(&self, key: &str) -> f64 {
        self.params
            .get(key)
            .and_then(Value::as_f64)
            .unwrap_or_default()
    }
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Parsed event types for type-safe handling.
#[derive(Debug, Clone)]
pub enum ParsedEvent {
    /// A `console.*` call in the target.
    ConsoleApiCalled {
        /// Console level (`log`, `error`, `warning`, ...).
        level: String,
        /// Remote objects passed to the console call.
        args: Vec<Value>,
        /// Remote timestamp in milliseconds.
        timestamp: f64,
    },

    /// An uncaught exception in the target.
    ExceptionThrown {
        /// Exception summary text.
        text: String,
        /// Exception description (usually includes the stack).
        description: Option<String>,
    },

    /// A new execution context appeared.
    ExecutionContextCreated {
        /// Context id.
        context_id: u64,
        /// Context origin.
        origin: String,
    },

    /// Page `load` fired.
    LoadEventFired {
        /// Monotonic timestamp in seconds.
        timestamp: f64,
    },

    /// Page `DOMContentLoaded` fired.
    DomContentEventFired {
        /// Monotonic timestamp in seconds.
        timestamp: f64,
    },

    /// A frame committed a navigation.
    FrameNavigated {
        /// Frame id.
        frame_id: String,
        /// New frame URL.
        url: String,
    },

    /// Unknown event type.
    Unknown {
        /// Event method.
        method: String,
        /// Event params.
        params: Value,
    },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_domain_and_name() {
        let event = Event::from_message(&json!({
            "method": "Page.loadEventFired",
            "params": { "timestamp": 12.5 }
        }))
        .expect("event");

        assert_eq!(event.domain(), "Page");
        assert_eq!(event.event_name(), "loadEventFired");
        match event.parse() {
            ParsedEvent::LoadEventFired { timestamp } => assert_eq!(timestamp, 12.5),
            other => panic!("unexpected parsed event: {other:?}"),
        }
    }

    #[test]
    fn test_responses_are_not_events() {
        assert!(Event::from_message(&json!({ "id": 1, "result": {} })).is_none());
        assert!(Event::from_message(&json!({ "params": {} })).is_none());
    }

    #[test]
    fn test_console_parsing() {
        let event = Event::from_message(&json!({
            "method": "Runtime.consoleAPICalled",
            "params": {
                "type": "warning",
                "args": [{ "type": "string", "value": "hints shown" }],
                "timestamp": 1700000000000.0
            }
        }))
        .expect("event");

        match event.parse() {
            ParsedEvent::ConsoleApiCalled { level, args, .. } => {
                assert_eq!(level, "warning");
                assert_eq!(args.len(), 1);
            }
            other => panic!("unexpected parsed event: {other:?}"),
        }
    }

    #[test]
    fn test_exception_parsing() {
        let event = Event::from_message(&json!({
            "method": "Runtime.exceptionThrown",
            "params": {
                "exceptionDetails": {
                    "text": "Uncaught",
                    "exception": { "description": "TypeError: x is undefined" }
                }
            }
        }))
        .expect("event");

        match event.parse() {
            ParsedEvent::ExceptionThrown { text, description } => {
                assert_eq!(text, "Uncaught");
                assert_eq!(description.as_deref(), Some("TypeError: x is undefined"));
            }
            other => panic!("unexpected parsed event: {other:?}"),
        }
    }

    #[test]
    fn test_frame_navigated_parsing() {
        let event = Event::from_message(&json!({
            "method": "Page.frameNavigated",
            "params": { "frame": { "id": "F1", "url": "http://127.0.0.1:9873/scroll.html" } }
        }))
        .expect("event");

        match event.parse() {
            ParsedEvent::FrameNavigated { frame_id, url } => {
                assert_eq!(frame_id, "F1");
                assert!(url.ends_with("scroll.html"));
            }
            other => panic!("unexpected parsed event: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event() {
        let event = Event::from_message(&json!({
            "method": "Custom.thing",
            "params": { "foo": "bar" }
        }))
        .expect("event");

        match event.parse() {
            ParsedEvent::Unknown { method, params } => {
                assert_eq!(method, "Custom.thing");
                assert_eq!(params["foo"], "bar");
            }
            other => panic!("expected Unknown variant, got {other:?}"),
        }
    }
}
