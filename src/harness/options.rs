//! Session timing and resource options.
//!
//! Provides a type-safe interface for the deadlines and limits every session
//! opened by a [`Harness`](super::Harness) shares.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use devtools_harness::SessionOptions;
//!
//! let options = SessionOptions::new()
//!     .with_command_timeout(Duration::from_secs(5))
//!     .with_poll_interval(Duration::from_millis(20))
//!     .with_coverage_dir("target/coverage");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use crate::transport::connection::DEFAULT_MAX_PENDING;

// ============================================================================
// Constants
// ============================================================================

/// Default deadline for one command.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Default deadline for event waits and polls.
const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default sleep between poll attempts.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default directory for persisted coverage deltas.
const DEFAULT_COVERAGE_DIR: &str = "target/coverage";

// ============================================================================
// SessionOptions
// ============================================================================

/// Deadlines and limits applied by a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Deadline for one command when none is given explicitly.
    pub command_timeout: Duration,

    /// Deadline for event waits and polls when none is given explicitly.
    pub wait_timeout: Duration,

    /// Sleep between poll attempts.
    pub poll_interval: Duration,

    /// Maximum in-flight commands per session.
    pub max_pending: usize,

    /// Directory coverage deltas are written to.
    pub coverage_dir: PathBuf,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl SessionOptions {
    /// Creates options with the default deadlines.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_pending: DEFAULT_MAX_PENDING,
            coverage_dir: PathBuf::from(DEFAULT_COVERAGE_DIR),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl SessionOptions {
    /// Sets the default command deadline.
    #[inline]
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Sets the default wait and poll deadline.
    #[inline]
    #[must_use]
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Sets the sleep between poll attempts.
    #[inline]
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the in-flight command limit.
    #[inline]
    #[must_use]
    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    /// Sets the coverage output directory.
    #[inline]
    #[must_use]
    pub fn with_coverage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.coverage_dir = dir.into();
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl SessionOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns an error message if a deadline or limit is zero, or the poll
    /// interval exceeds the wait deadline.
    pub fn validate(&self) -> Result<(), String> {
        if self.command_timeout.is_zero() {
            return Err("Command timeout must be greater than zero".to_string());
        }
        if self.wait_timeout.is_zero() {
            return Err("Wait timeout must be greater than zero".to_string());
        }
        if self.poll_interval.is_zero() {
            return Err("Poll interval must be greater than zero".to_string());
        }
        if self.poll_interval > self.wait_timeout {
            return Err("Poll interval must not exceed the wait timeout".to_string());
        }
        if self.max_pending == 0 {
            return Err("Pending command limit must be greater than zero".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
