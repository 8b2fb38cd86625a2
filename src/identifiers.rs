//! Type-safe identifiers for session entities.
//!
//! Newtype wrappers keep command ids, waiter ids, handler subscriptions and
//! target ids from being mixed up at compile time.
//!
//! | Type | Scope | Source |
//! |------|-------|--------|
//! | [`CommandId`] | One session | Per-session counter, starts at 1 |
//! | [`WaiterId`] | One session | Per-session counter |
//! | [`SubscriptionId`] | One session | Per-session counter |
//! | [`TargetId`] | Browser | DevTools discovery endpoint |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ============================================================================
// CommandId
// ============================================================================

/// Correlation identifier linking an outbound command to its response.
///
/// Allocated from the owning session's [`IdCounter`]; never process-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(u64);

impl CommandId {
    /// Wraps a raw protocol id.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw protocol id.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// WaiterId
// ============================================================================

/// Identifies one registered event waiter within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaiterId(u64);

impl fmt::Display for WaiterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "waiter-{}", self.0)
    }
}

// ============================================================================
// SubscriptionId
// ============================================================================

/// Identifies one fan-out message handler within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

// ============================================================================
// TargetId
// ============================================================================

/// Debugging target identifier as reported by the discovery endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    /// Creates a target id.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derives a target id from a debugger URL.
    ///
    /// Uses the last path segment (`ws://host/devtools/page/<id>`), falling
    /// back to the whole URL.
    #[must_use]
    pub fn from_debugger_url(url: &str) -> Self {
        let id = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .unwrap_or(url);
        Self(id.to_string())
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// IdCounter
// ============================================================================

/// Monotonic per-session id source.
///
/// Ids start at 1 and are never reused within the counter's lifetime.
#[derive(Debug)]
pub(crate) struct IdCounter(AtomicU64);

impl IdCounter {
    /// Creates a counter whose first id is 1.
    pub(crate) const fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    /// Allocates the next command id.
    pub(crate) fn next_command(&self) -> CommandId {
        CommandId(self.next())
    }

    /// Allocates the next waiter id.
    pub(crate) fn next_waiter(&self) -> WaiterId {
        WaiterId(self.next())
    }

    /// Allocates the next subscription id.
    pub(crate) fn next_subscription(&self) -> SubscriptionId {
        SubscriptionId(self.next())
    }
}

// ============================================================================
// Tests
// ============================================================================
