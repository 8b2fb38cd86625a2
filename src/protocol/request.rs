//! Request and Response message types.
//!
//! Defines the wire format for command requests and their responses, and the
//! classification of inbound messages into responses and events.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::CommandId;

use super::Event;

// ============================================================================
// Request
// ============================================================================

/// A command request from local end to remote end.
///
/// # Format
///
/// ```json
/// {
///   "id": 7,
///   "method": "Runtime.evaluate",
///   "params": { "expression": "1 + 1" }
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Per-session correlation identifier.
    pub id: CommandId,

    /// Method in `Domain.method` format.
    pub method: String,

    /// Method parameters (an object, possibly empty).
    pub params: Value,
}

impl Request {
    /// Creates a new request.
    #[inline]
    #[must_use]
    pub fn new(id: CommandId, method: impl Into<String>, params: Value) -> Self {
        Self {
            id,
            method: method.into(),
            params: normalize_params(params),
        }
    }
}

/// Replaces `null` params with an empty object.
fn normalize_params(params: Value) -> Value {
    if params.is_null() {
        Value::Object(Default::default())
    } else {
        params
    }
}

// ============================================================================
// Response
// ============================================================================

/// A response from remote end to local end.
///
/// # Format
///
/// Success:
/// ```json
/// { "id": 7, "result": { ... } }
/// ```
///
/// Error:
/// ```json
/// { "id": 7, "error": { "code": -32000, "message": "..." } }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Matches the request `id`.
    pub id: CommandId,

    /// Result payload (if success).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error object (if the command was rejected).
    #[serde(default)]
    pub error: Option<RemoteError>,
}

impl Response {
    /// Returns `true` if the target rejected the command.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Extracts the result payload.
    ///
    /// A missing `result` resolves to `null`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteCommand`] naming `method` if the response
    /// carries an error object.
    pub fn into_result(self, method: &str) -> Result<Value> {
        match self.error {
            Some(error) => Err(Error::remote_command(method, error.code, error.message)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Error object carried by a rejected command's response.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RemoteError {
    /// Protocol error code.
    #[serde(default)]
    pub code: i64,

    /// Protocol error message.
    #[serde(default)]
    pub message: String,
}

// ============================================================================
// Inbound
// ============================================================================

/// An inbound message, split by the presence of `id`.
#[derive(Debug, Clone)]
pub enum Inbound {
    /// Correlated response to a command.
    Response(Response),
    /// Unsolicited event.
    Event(Event),
}

impl Inbound {
    /// Classifies a parsed inbound message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the message has an `id` but is not a valid
    /// response, or lacks an `id` and is not a valid event.
    pub fn classify(message: &Value) -> Result<Self> {
        if Self::has_id(message) {
            let response = Response::deserialize(message)?;
            Ok(Self::Response(response))
        } else {
            let event = Event::deserialize(message)?;
            Ok(Self::Event(event))
        }
    }

    /// Returns the correlation id of a response message without a full parse.
    ///
    /// `None` both for events and for an `id` that is not an unsigned
    /// integer; see [`Inbound::has_id`] to tell those apart.
    #[inline]
    #[must_use]
    pub fn response_id(message: &Value) -> Option<CommandId> {
        message.get("id").and_then(Value::as_u64).map(CommandId::new)
    }

    /// Returns `true` if the message carries an `id` of any type.
    #[inline]
    #[must_use]
    pub fn has_id(message: &Value) -> bool {
        message.get("id").is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = Request::new(
            CommandId::new(3),
            "Runtime.evaluate",
            json!({ "expression": "1 + 1" }),
        );
        let value = serde_json::to_value(&request).expect("serialize");

        assert_eq!(value["id"], 3);
        assert_eq!(value["method"], "Runtime.evaluate");
        assert_eq!(value["params"]["expression"], "1 + 1");
    }

    #[test]
    fn test_request_null_params_become_object() {
        let request = Request::new(CommandId::new(1), "Page.bringToFront", Value::Null);
        assert_eq!(request.params, json!({}));
    }

    #[test]
    fn test_success_response() {
        let response: Response =
            serde_json::from_value(json!({ "id": 2, "result": { "value": 42 } })).expect("parse");

        assert!(!response.is_error());
        let result = response.into_result("Runtime.evaluate").expect("success");
        assert_eq!(result["value"], 42);
    }

    #[test]
    fn test_missing_result_is_null() {
        let response: Response = serde_json::from_value(json!({ "id": 2 })).expect("parse");
        assert_eq!(response.into_result("Page.enable").expect("success"), Value::Null);
    }

    #[test]
    fn test_error_response() {
        let response: Response = serde_json::from_value(json!({
            "id": 5,
            "error": { "code": -32601, "message": "'Foo.bar' wasn't found" }
        }))
        .expect("parse");

        assert!(response.is_error());
        match response.into_result("Foo.bar") {
            Err(Error::RemoteCommand {
                method,
                code,
                message,
            }) => {
                assert_eq!(method, "Foo.bar");
                assert_eq!(code, -32601);
                assert_eq!(message, "'Foo.bar' wasn't found");
            }
            other => panic!("expected RemoteCommand, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_by_id_presence() {
        let response = json!({ "id": 1, "result": {} });
        let event = json!({ "method": "Page.loadEventFired", "params": { "timestamp": 1.5 } });

        assert!(matches!(
            Inbound::classify(&response).expect("classify"),
            Inbound::Response(_)
        ));
        assert!(matches!(
            Inbound::classify(&event).expect("classify"),
            Inbound::Event(_)
        ));
    }

    #[test]
    fn test_classify_rejects_garbage() {
        assert!(Inbound::classify(&json!({ "params": {} })).is_err());
        assert!(Inbound::classify(&json!({ "id": "not-a-number" })).is_err());
    }

    #[test]
    fn test_response_id() {
        assert_eq!(
            Inbound::response_id(&json!({ "id": 9, "result": {} })),
            Some(CommandId::new(9))
        );
        assert_eq!(Inbound::response_id(&json!({ "method": "x" })), None);
    }

    #[test]
    fn test_non_integer_id_is_still_an_id() {
        for message in [json!({ "id": "9", "result": {} }), json!({ "id": 1.5 }), json!({ "id": -3 })] {
            assert!(Inbound::has_id(&message));
            assert_eq!(Inbound::response_id(&message), None);
            assert!(Inbound::classify(&message).is_err());
        }
    }
}
