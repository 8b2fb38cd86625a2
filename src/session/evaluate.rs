//! Remote expression evaluation.
//!
//! Every read or mutation of target state goes through `Runtime.evaluate`
//! with promise awaiting. The reply is unwrapped here into a plain JSON
//! value or a [`Error::RemoteEvaluation`].
//!
//! Objects come back by reference. They are then read by value with
//! `Runtime.callFunctionOn`, which never re-runs the expression; if the
//! object cannot be serialized (cyclic, too deep, a DOM node) the
//! description from the first reply is used. The reference is released
//! either way.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::protocol::RuntimeCommand;

use super::Session;

// ============================================================================
// Session - Evaluation
// ============================================================================

impl Session {
    /// Evaluates an expression with the default command deadline.
    ///
    /// Promises are awaited. Values that cannot be returned inline resolve
    /// to a description object rather than failing.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let y = session.evaluate("window.scrollY").await?;
    /// let ok = session.evaluate("fetch('/ping').then(r => r.ok)").await?;
    /// ```
    ///
    /// # Errors
    ///
    /// - [`Error::RemoteEvaluation`] if the expression threw or rejected
    /// - any error from [`Session::call`]
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        self.evaluate_with_timeout(expression, self.inner.options.command_timeout)
            .await
    }

    /// Evaluates an expression with an explicit deadline.
    ///
    /// # Errors
    ///
    /// Same as [`Session::evaluate`].
    pub async fn evaluate_with_timeout(&self, expression: &str, timeout: Duration) -> Result<Value> {
        debug!(
            target_id = %self.inner.target_id,
            expression_len = expression.len(),
            "Evaluating expression"
        );

        let reply = self
            .inner
            .connection
            .call_command(RuntimeCommand::evaluate(expression), timeout)
            .await?;

        let described = unwrap_evaluation(&reply)?;
        let Some(object_id) = remote_object_id(&reply) else {
            return Ok(described);
        };

        let value = if is_serializable(&reply) {
            self.value_of_remote(object_id, timeout).await
        } else {
            None
        };
        self.release_remote(object_id, timeout).await;

        Ok(value.unwrap_or(described))
    }

    /// Evaluates an expression and deserializes the result.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the value does not match `T`
    /// - same as [`Session::evaluate`] otherwise
    pub async fn evaluate_as<T: DeserializeOwned>(&self, expression: &str) -> Result<T> {
        let value = self.evaluate(expression).await?;
        Ok(serde_json::from_value(value)?)
    }
}

// ============================================================================
// Session - Remote Objects
// ============================================================================

impl Session {
    /// Reads a remote object by value. `None` if it cannot be serialized.
    async fn value_of_remote(&self, object_id: &str, timeout: Duration) -> Option<Value> {
        let read = self
            .inner
            .connection
            .call_command(RuntimeCommand::value_of(object_id), timeout)
            .await
            .and_then(|reply| unwrap_evaluation(&reply));

        match read {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(object_id, error = %e, "Remote object not serializable, using description");
                None
            }
        }
    }

    /// Releases a remote object reference, ignoring failures.
    async fn release_remote(&self, object_id: &str, timeout: Duration) {
        let released = self
            .inner
            .connection
            .call_command(
                RuntimeCommand::ReleaseObject {
                    object_id: object_id.to_string(),
                },
                timeout,
            )
            .await;

        if let Err(e) = released {
            trace!(object_id, error = %e, "Release of remote object failed");
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Returns the object id of a by-reference result.
fn remote_object_id(reply: &Value) -> Option<&str> {
    let remote = reply.get("result")?;
    if remote.get("value").is_some() {
        return None;
    }
    remote.get("objectId").and_then(Value::as_str)
}

/// DOM nodes serialize to `{}`; their description is more useful.
fn is_serializable(reply: &Value) -> bool {
    reply["result"].get("subtype").and_then(Value::as_str) != Some("node")
}

/// Unwraps a `Runtime.evaluate` reply into a value.
pub(crate) fn unwrap_evaluation(reply: &Value) -> Result<Value> {
    if let Some(details) = reply.get("exceptionDetails") {
        return Err(Error::remote_evaluation(exception_description(details)));
    }

    let Some(remote) = reply.get("result") else {
        return Err(Error::protocol("Runtime.evaluate reply has no result"));
    };

    if let Some(value) = remote.get("value") {
        return Ok(value.clone());
    }

    if let Some(unserializable) = remote.get("unserializableValue").and_then(Value::as_str) {
        return Ok(Value::String(unserializable.to_string()));
    }

    if remote.get("type").and_then(Value::as_str) == Some("undefined") {
        return Ok(Value::Null);
    }

    Ok(describe_remote_object(remote))
}

/// Picks the most useful text from `exceptionDetails`.
fn exception_description(details: &Value) -> String {
    details
        .get("exception")
        .and_then(|e| e.get("description"))
        .and_then(Value::as_str)
        .or_else(|| {
            details
                .get("exception")
                .and_then(|e| e.get("value"))
                .and_then(Value::as_str)
        })
        .or_else(|| details.get("text").and_then(Value::as_str))
        .unwrap_or("Uncaught exception")
        .to_string()
}

/// Best-effort structural description of a by-reference remote object.
fn describe_remote_object(remote: &Value) -> Value {
    let mut description = Map::new();
    for key in ["type", "subtype", "className", "description"] {
        if let Some(field) = remote.get(key) {
            description.insert(key.to_string(), field.clone());
        }
    }
    if description.is_empty() {
        return json!({ "type": "unknown" });
    }
    Value::Object(description)
}

// ============================================================================
// Tests
// ============================================================================
