//! Target discovery over the HTTP debugging endpoint.
//!
//! The browser lists its debugging targets at `http://<host>:<port>/json/list`.
//! Each entry carries the WebSocket URL a [`Session`](crate::Session) opens.
//!
//! # Example
//!
//! ```ignore
//! let discovery = Discovery::new("127.0.0.1", 9222)?;
//!
//! let background = discovery.find_extension_background(None).await?;
//! let page = discovery.find_page("localhost:8000/fixtures").await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use reqwest::{Client, Method, Response};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::TargetId;

// ============================================================================
// Constants
// ============================================================================

/// Deadline for one discovery request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// URL scheme of extension contexts.
const EXTENSION_SCHEME: &str = "chrome-extension://";

// ============================================================================
// Types
// ============================================================================

/// One entry of `/json/list`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    /// Target id.
    pub id: TargetId,
    /// Target type (`page`, `background_page`, `service_worker`, ...).
    #[serde(rename = "type")]
    pub target_type: String,
    /// Title.
    #[serde(default)]
    pub title: String,
    /// Current URL.
    #[serde(default)]
    pub url: String,
    /// WebSocket debugger URL. Absent while another client is attached.
    #[serde(default)]
    pub web_socket_debugger_url: Option<String>,
}

impl TargetInfo {
    /// Returns `true` for regular pages.
    #[inline]
    #[must_use]
    pub fn is_page(&self) -> bool {
        self.target_type == "page"
    }

    /// Returns `true` for an extension's background page or service worker.
    #[must_use]
    pub fn is_extension_background(&self) -> bool {
        matches!(self.target_type.as_str(), "background_page" | "service_worker")
            && self.url.starts_with(EXTENSION_SCHEME)
    }

    /// Returns the extension id for targets under `chrome-extension://`.
    #[must_use]
    pub fn extension_id(&self) -> Option<&str> {
        self.url
            .strip_prefix(EXTENSION_SCHEME)?
            .split('/')
            .next()
            .filter(|id| !id.is_empty())
    }

    /// Returns the WebSocket debugger URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the target is not attachable.
    pub fn debugger_url(&self) -> Result<&str> {
        self.web_socket_debugger_url
            .as_deref()
            .ok_or_else(|| Error::connection(format!("target {} has no debugger URL", self.id)))
    }
}

/// Response of `/json/version`.
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserVersion {
    /// Product and version, e.g. `Chrome/126.0.6478.126`.
    #[serde(rename = "Browser")]
    pub browser: String,
    /// Protocol version.
    #[serde(rename = "Protocol-Version", default)]
    pub protocol_version: String,
    /// User agent.
    #[serde(rename = "User-Agent", default)]
    pub user_agent: String,
    /// Browser-level WebSocket debugger URL.
    #[serde(rename = "webSocketDebuggerUrl", default)]
    pub web_socket_debugger_url: Option<String>,
}

// ============================================================================
// Discovery
// ============================================================================

/// Client for the HTTP debugging endpoint.
#[derive(Debug, Clone)]
pub struct Discovery {
    client: Client,
    base: Url,
}

impl Discovery {
    /// Creates a client for `http://<host>:<port>/`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the address does not form a URL.
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let base = Url::parse(&format!("http://{host}:{port}/"))
            .map_err(|e| Error::config(format!("invalid debugging address {host}:{port}: {e}")))?;

        let client = Client::builder()
            .no_proxy()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("HTTP client: {e}")))?;

        Ok(Self { client, base })
    }

    /// Returns the endpoint's base URL.
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Lists every debugging target.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] if the endpoint is unreachable
    /// - [`Error::Http`] if the listing cannot be decoded
    pub async fn list_targets(&self) -> Result<Vec<TargetInfo>> {
        let targets: Vec<TargetInfo> = self.request(Method::GET, "json/list").await?.json().await?;
        debug!(count = targets.len(), "Listed targets");
        Ok(targets)
    }

    /// Fetches browser version information.
    ///
    /// # Errors
    ///
    /// Same as [`Discovery::list_targets`].
    pub async fn version(&self) -> Result<BrowserVersion> {
        Ok(self.request(Method::GET, "json/version").await?.json().await?)
    }

    /// Finds the first page whose URL contains `url_substring`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TargetNotFound`] if no page matches.
    pub async fn find_page(&self, url_substring: &str) -> Result<TargetInfo> {
        select_page(self.list_targets().await?, url_substring)
    }

    /// Finds an extension's background context.
    ///
    /// With `extension_id` unset, the first extension background found wins.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TargetNotFound`] if no background context matches.
    pub async fn find_extension_background(&self, extension_id: Option<&str>) -> Result<TargetInfo> {
        select_background(self.list_targets().await?, extension_id)
    }

    /// Opens a new page at `url`.
    ///
    /// # Errors
    ///
    /// Same as [`Discovery::list_targets`].
    pub async fn new_page(&self, url: &str) -> Result<TargetInfo> {
        let path = format!("json/new?{}", urlencoding::encode(url));
        let target: TargetInfo = self.request(Method::PUT, &path).await?.json().await?;
        info!(target_id = %target.id, url, "Page opened");
        Ok(target)
    }

    /// Brings a target to the foreground.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the endpoint refuses.
    pub async fn activate(&self, id: &TargetId) -> Result<()> {
        self.request(Method::GET, &format!("json/activate/{id}")).await?;
        debug!(target_id = %id, "Target activated");
        Ok(())
    }

    /// Closes a target.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the endpoint refuses.
    pub async fn close_target(&self, id: &TargetId) -> Result<()> {
        self.request(Method::GET, &format!("json/close/{id}")).await?;
        info!(target_id = %id, "Target closed");
        Ok(())
    }

    /// Sends one request and checks the status.
    async fn request(&self, method: Method, path: &str) -> Result<Response> {
        let url = self
            .base
            .join(path)
            .map_err(|e| Error::config(format!("invalid endpoint path {path}: {e}")))?;

        let response = self
            .client
            .request(method, url.clone())
            .send()
            .await
            .map_err(|e| Error::connection(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::connection(format!("{url}: HTTP {status}")));
        }
        Ok(response)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn select_page(targets: Vec<TargetInfo>, url_substring: &str) -> Result<TargetInfo> {
    targets
        .into_iter()
        .find(|target| target.is_page() && target.url.contains(url_substring))
        .ok_or_else(|| Error::target_not_found(format!("page matching `{url_substring}`")))
}

fn select_background(targets: Vec<TargetInfo>, extension_id: Option<&str>) -> Result<TargetInfo> {
    targets
        .into_iter()
        .filter(TargetInfo::is_extension_background)
        .find(|target| extension_id.is_none_or(|id| target.extension_id() == Some(id)))
        .ok_or_else(|| {
            Error::target_not_found(match extension_id {
                Some(id) => format!("background of extension {id}"),
                None => "extension background".to_string(),
            })
        })
}

// ============================================================================
// Tests
// ============================================================================
