//! Harness implementation.
//!
//! The harness resolves targets through [`Discovery`] and opens
//! [`Session`]s on them with shared options. It keeps every session it
//! opened so [`Harness::close`] can tear them all down.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::discovery::{Discovery, TargetInfo};
use crate::error::Result;
use crate::session::Session;

use super::builder::HarnessBuilder;
use super::options::SessionOptions;

// ============================================================================
// Harness
// ============================================================================

/// Internal shared state for the harness.
struct HarnessInner {
    /// HTTP discovery client.
    discovery: Discovery,
    /// Extension whose background context is wanted.
    extension_id: Option<String>,
    /// Options for every session.
    options: SessionOptions,
    /// Sessions opened through this harness.
    sessions: Mutex<Vec<Session>>,
}

/// Entry point for attaching to a running browser.
///
/// Cloning is cheap; clones share the session list.
#[derive(Clone)]
pub struct Harness {
    inner: Arc<HarnessInner>,
}

impl fmt::Debug for Harness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Harness")
            .field("endpoint", &self.inner.discovery.base_url().as_str())
            .field("extension_id", &self.inner.extension_id)
            .field("session_count", &self.session_count())
            .finish_non_exhaustive()
    }
}

impl Harness {
    /// Creates a harness. Use [`Harness::builder`] instead.
    pub(crate) fn new(
        host: &str,
        port: u16,
        extension_id: Option<String>,
        options: SessionOptions,
    ) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(HarnessInner {
                discovery: Discovery::new(host, port)?,
                extension_id,
                options,
                sessions: Mutex::new(Vec::new()),
            }),
        })
    }
}

// ============================================================================
// Harness - Public API
// ============================================================================

impl Harness {
    /// Creates a configuration builder for the harness.
    #[inline]
    #[must_use]
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::new()
    }

    /// Returns the discovery client.
    #[inline]
    #[must_use]
    pub fn discovery(&self) -> &Discovery {
        &self.inner.discovery
    }

    /// Returns the session options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    /// Opens a session on a discovered target.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`](crate::Error::Connection) if the target
    /// is not attachable or unreachable.
    pub async fn connect(&self, target: &TargetInfo) -> Result<Session> {
        let session = Session::open(target.debugger_url()?, self.inner.options.clone()).await?;

        let mut sessions = self.inner.sessions.lock();
        sessions.retain(|existing| !existing.is_closed());
        sessions.push(session.clone());
        debug!(target_id = %target.id, kind = %target.target_type, open = sessions.len(), "Session tracked");

        Ok(session)
    }

    /// Opens a session on the extension's background context.
    ///
    /// # Errors
    ///
    /// - [`Error::TargetNotFound`](crate::Error::TargetNotFound) if no
    ///   background context is listed
    /// - same as [`Harness::connect`] otherwise
    pub async fn connect_background(&self) -> Result<Session> {
        let target = self
            .inner
            .discovery
            .find_extension_background(self.inner.extension_id.as_deref())
            .await?;
        info!(target_id = %target.id, url = %target.url, "Attaching to extension background");
        self.connect(&target).await
    }

    /// Opens a session on the first page whose URL contains `url_substring`.
    ///
    /// # Errors
    ///
    /// - [`Error::TargetNotFound`](crate::Error::TargetNotFound) if no page
    ///   matches
    /// - same as [`Harness::connect`] otherwise
    pub async fn connect_page(&self, url_substring: &str) -> Result<Session> {
        let target = self.inner.discovery.find_page(url_substring).await?;
        info!(target_id = %target.id, url = %target.url, "Attaching to page");
        self.connect(&target).await
    }

    /// Opens a new page at `url` and a session on it.
    ///
    /// # Errors
    ///
    /// Same as [`Discovery::new_page`] and [`Harness::connect`].
    pub async fn open_page(&self, url: &str) -> Result<Session> {
        let target = self.inner.discovery.new_page(url).await?;
        self.connect(&target).await
    }

    /// Returns the number of open sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.inner
            .sessions
            .lock()
            .iter()
            .filter(|session| !session.is_closed())
            .count()
    }

    /// Closes every session opened through this harness.
    pub fn close(&self) {
        let sessions: Vec<Session> = self.inner.sessions.lock().drain(..).collect();
        info!(count = sessions.len(), "Closing all sessions");

        for session in sessions {
            session.close();
        }
    }
}
