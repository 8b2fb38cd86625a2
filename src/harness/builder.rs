//! Builder pattern for harness configuration.
//!
//! Provides a fluent API for configuring and creating [`Harness`] instances.
//!
//! # Example
//!
//! ```ignore
//! use devtools_harness::{Harness, SessionOptions};
//!
//! let harness = Harness::builder()
//!     .port(9333)
//!     .extension_id("dbepggeogbaibhgnhhndojpepiihcmeb")
//!     .options(SessionOptions::new().with_coverage_dir("target/coverage"))
//!     .build()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use crate::error::{Error, Result};

use super::core::Harness;
use super::options::SessionOptions;

// ============================================================================
// Constants
// ============================================================================

/// Default debugging host.
const DEFAULT_HOST: &str = "127.0.0.1";

/// Default debugging port.
const DEFAULT_PORT: u16 = 9222;

// ============================================================================
// HarnessBuilder
// ============================================================================

/// Builder for configuring a [`Harness`] instance.
///
/// Use [`Harness::builder()`] to create a new builder.
#[derive(Debug, Clone)]
pub struct HarnessBuilder {
    /// Debugging endpoint host.
    host: String,
    /// Debugging endpoint port.
    port: u16,
    /// Extension whose background context to attach to.
    extension_id: Option<String>,
    /// Options for every session.
    options: SessionOptions,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            extension_id: None,
            options: SessionOptions::default(),
        }
    }
}

// ============================================================================
// HarnessBuilder Implementation
// ============================================================================

impl HarnessBuilder {
    /// Creates a builder for `127.0.0.1:9222` with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the debugging endpoint host.
    #[inline]
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the debugging endpoint port.
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Restricts background lookup to one extension.
    #[inline]
    #[must_use]
    pub fn extension_id(mut self, id: impl Into<String>) -> Self {
        self.extension_id = Some(id.into());
        self
    }

    /// Sets the options for every session.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the harness with validation.
    ///
    /// No connection is made until a session is requested.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the address or options are invalid.
    pub fn build(self) -> Result<Harness> {
        self.validate()?;
        Harness::new(&self.host, self.port, self.extension_id, self.options)
    }
}

// ============================================================================
// Validation
// ============================================================================

impl HarnessBuilder {
    fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::config(
                "Debugging host must not be empty. Use .host() to set it.",
            ));
        }
        if self.port == 0 {
            return Err(Error::config(
                "Debugging port must not be 0.\n\
                 Start the browser with --remote-debugging-port=<port> and pass it to .port().",
            ));
        }
        self.options.validate().map_err(Error::config)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    #[test]
    fn test_default_address() {
        let builder = HarnessBuilder::new();
        assert_eq!(builder.host, "127.0.0.1");
        assert_eq!(builder.port, 9222);
        assert!(builder.extension_id.is_none());
    }

    #[test]
    fn test_setters() {
        let builder = HarnessBuilder::new()
            .host("localhost")
            .port(9333)
            .extension_id("abc");
        assert_eq!(builder.host, "localhost");
        assert_eq!(builder.port, 9333);
        assert_eq!(builder.extension_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_build_rejects_port_zero() {
        let err = HarnessBuilder::new().port(0).build().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_build_rejects_invalid_options() {
        let options = SessionOptions::new().with_wait_timeout(Duration::ZERO);
        let err = HarnessBuilder::new().options(options).build().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_build_succeeds_without_browser() {
        let harness = HarnessBuilder::new().port(9444).build().unwrap();
        assert_eq!(harness.discovery().base_url().as_str(), "http://127.0.0.1:9444/");
    }
}
