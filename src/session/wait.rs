//! Condition polling and arm-then-trigger waits.
//!
//! Two strategies are offered. Polling re-reads a value until it satisfies a
//! condition; it is simple but can miss transient states and adds up to one
//! interval of latency. Arm-then-trigger registers the observation before
//! the caller performs the action, so an effect that completes immediately
//! is still seen. Prefer the latter wherever an action causes the awaited
//! change.
//!
//! # Example
//!
//! ```ignore
//! // Arm, act, await.
//! let loaded = session.prepare_event("Page.loadEventFired", |_| true)?;
//! session.send_command(PageCommand::Reload { ignore_cache: false }).await?;
//! loaded.wait().await?;
//!
//! // Or with the composition helper.
//! let scrolled = session.prepare_value_change("window.scrollY").await?;
//! let (_, y) = act_and_wait(scrolled, session.press_key(Key::Char('j'))).await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::protocol::Event;
use crate::transport::PreparedWait;

use super::Session;

// ============================================================================
// Polling
// ============================================================================

/// Calls `check` until it yields `Some`, sleeping `interval` between tries.
///
/// `check` runs at least once. An error from `check` ends the poll
/// immediately. A `check` still running at the deadline is abandoned.
///
/// # Errors
///
/// - [`Error::PollTimeout`] if the deadline passes first
/// - any error returned by `check`
pub async fn poll_until<T, F, Fut>(
    operation: &str,
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + timeout;
    let timed_out = || Error::poll_timeout(operation, timeout.as_millis() as u64);
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match timeout_at(deadline, check()).await {
            Ok(Ok(Some(value))) => {
                trace!(operation, attempts, "Poll satisfied");
                return Ok(value);
            }
            Ok(Ok(None)) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(timed_out()),
        }

        let now = Instant::now();
        if now >= deadline {
            debug!(operation, attempts, "Poll timed out");
            return Err(timed_out());
        }
        sleep(interval.min(deadline - now)).await;
    }
}

// ============================================================================
// Armed
// ============================================================================

/// An observation registered ahead of the action that satisfies it.
pub trait Armed {
    /// What the observation resolves to.
    type Output;

    /// Awaits the observation.
    fn wait(self) -> impl Future<Output = Result<Self::Output>> + Send;
}

impl Armed for PreparedWait {
    type Output = Value;

    fn wait(self) -> impl Future<Output = Result<Value>> + Send {
        PreparedWait::wait(self)
    }
}

/// Runs `action` after `armed` is registered, then awaits `armed`.
///
/// If the action fails the observation is dropped, which deregisters it.
///
/// # Errors
///
/// Returns the action's error, or the observation's.
pub async fn act_and_wait<W, A, Fut>(armed: W, action: Fut) -> Result<(A, W::Output)>
where
    W: Armed,
    Fut: Future<Output = Result<A>>,
{
    let acted = action.await?;
    let observed = armed.wait().await?;
    Ok((acted, observed))
}

// ============================================================================
// PreparedChange
// ============================================================================

/// A baseline read awaiting a change in an expression's value.
///
/// Created by [`Session::prepare_value_change`]. The deadline starts when
/// the baseline is taken.
#[must_use = "a prepared change does nothing unless awaited"]
#[derive(Debug)]
pub struct PreparedChange {
    session: Session,
    expression: String,
    baseline: Value,
    timeout: Duration,
    interval: Duration,
    deadline: Instant,
}

impl PreparedChange {
    /// Returns the value read when the change was armed.
    #[inline]
    #[must_use]
    pub fn baseline(&self) -> &Value {
        &self.baseline
    }

    /// Polls until the expression's value differs from the baseline.
    ///
    /// # Errors
    ///
    /// - [`Error::PollTimeout`] if the value never changed
    /// - any evaluation error
    pub async fn wait(self) -> Result<Value> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        let session = &self.session;
        let expression = self.expression.as_str();
        let baseline = &self.baseline;

        let operation = format!("change of `{expression}`");
        poll_until(&operation, remaining, self.interval, move || async move {
            let current = session.evaluate(expression).await?;
            Ok((current != *baseline).then_some(current))
        })
        .await
        .map_err(|e| match e {
            Error::PollTimeout { operation, .. } => {
                Error::poll_timeout(operation, self.timeout.as_millis() as u64)
            }
            other => other,
        })
    }
}

impl Armed for PreparedChange {
    type Output = Value;

    fn wait(self) -> impl Future<Output = Result<Value>> + Send {
        PreparedChange::wait(self)
    }
}

// ============================================================================
// Session - Event Waits
// ============================================================================

impl Session {
    /// Arms a waiter over raw inbound messages with the default deadline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] if the session is closed.
    pub fn prepare_wait<F>(&self, operation: impl Into<String>, predicate: F) -> Result<PreparedWait>
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.inner
            .connection
            .prepare_wait(operation, predicate, self.inner.options.wait_timeout)
    }

    /// Waits for the first raw inbound message satisfying `predicate`.
    ///
    /// # Errors
    ///
    /// Same as [`PreparedWait::wait`].
    pub async fn wait_for<F>(&self, operation: impl Into<String>, predicate: F, timeout: Duration) -> Result<Value>
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.inner
            .connection
            .wait_for(operation, predicate, timeout)
            .await
    }

    /// Arms a waiter for an event by method name and params predicate.
    ///
    /// Responses never match, even if they carry a `method` field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionClosed`] if the session is closed.
    pub fn prepare_event<F>(&self, method: &str, params_predicate: F) -> Result<PreparedWait>
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.prepare_event_with_timeout(method, params_predicate, self.inner.options.wait_timeout)
    }

    fn prepare_event_with_timeout<F>(
        &self,
        method: &str,
        params_predicate: F,
        timeout: Duration,
    ) -> Result<PreparedWait>
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let expected = method.to_string();
        self.inner.connection.prepare_wait(
            method,
            move |message| {
                message.get("id").is_none()
                    && message.get("method").and_then(Value::as_str) == Some(expected.as_str())
                    && params_predicate(message.get("params").unwrap_or(&Value::Null))
            },
            timeout,
        )
    }

    /// Waits for the next event with the given method whose params satisfy
    /// `params_predicate`.
    ///
    /// # Errors
    ///
    /// Same as [`PreparedWait::wait`].
    pub async fn wait_for_event<F>(&self, method: &str, params_predicate: F, timeout: Duration) -> Result<Event>
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let message = self
            .prepare_event_with_timeout(method, params_predicate, timeout)?
            .wait()
            .await?;
        Event::from_message(&message).ok_or_else(|| Error::protocol(format!("{method} matched a non-event")))
    }
}

// ============================================================================
// Session - Polling
// ============================================================================

impl Session {
    /// Polls an expression until its value satisfies `condition`.
    ///
    /// # Errors
    ///
    /// - [`Error::PollTimeout`] if the condition never held
    /// - any evaluation error
    pub async fn poll_expression<F>(
        &self,
        expression: &str,
        condition: F,
        timeout: Duration,
        interval: Duration,
    ) -> Result<Value>
    where
        F: Fn(&Value) -> bool,
    {
        let condition = &condition;
        poll_until(expression, timeout, interval, move || async move {
            let value = self.evaluate(expression).await?;
            Ok(condition(&value).then_some(value))
        })
        .await
    }

    /// Polls an expression until it is truthy, with the default deadline
    /// and interval.
    ///
    /// # Errors
    ///
    /// Same as [`Session::poll_expression`].
    pub async fn wait_until(&self, expression: &str) -> Result<Value> {
        self.poll_expression(
            expression,
            is_truthy,
            self.inner.options.wait_timeout,
            self.inner.options.poll_interval,
        )
        .await
    }

    /// Reads an expression's current value and arms a poll for a change.
    ///
    /// Call this before the action that changes the value.
    ///
    /// # Errors
    ///
    /// Returns any error from the baseline evaluation.
    pub async fn prepare_value_change(&self, expression: &str) -> Result<PreparedChange> {
        let timeout = self.inner.options.wait_timeout;
        let deadline = Instant::now() + timeout;
        let baseline = self.evaluate(expression).await?;

        debug!(target_id = %self.inner.target_id, expression, %baseline, "Value change armed");

        Ok(PreparedChange {
            session: self.clone(),
            expression: expression.to_string(),
            baseline,
            timeout,
            interval: self.inner.options.poll_interval,
            deadline,
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// JavaScript truthiness for JSON values.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ============================================================================
// Tests
// ============================================================================
