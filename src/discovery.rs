//! HTTP endpoint discovery.
//!
//! Remote debugging agents expose a well-known HTTP path describing how to
//! reach the actual message socket. Given a base discovery URL such as
//! `http://127.0.0.1:9222`, this module performs one GET against
//! `/json/version` and extracts the `webSocketDebuggerUrl` field from the
//! JSON response.
//!
//! Every failure on this path — unreachable host, non-success status,
//! non-JSON body, missing field — is reported as
//! [`Error::Discovery`](crate::Error::Discovery) naming the discovery URL
//! attempted, so an operator pointing at the wrong host or port can tell
//! immediately from the message alone.

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Well-known discovery path, absolute against the base URL.
const DISCOVERY_PATH: &str = "/json/version";

// ============================================================================
// VersionManifest
// ============================================================================

/// The subset of the discovery response this layer consumes.
#[derive(Debug, Deserialize)]
struct VersionManifest {
    /// WebSocket endpoint of the browser-level debugging target.
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: Option<String>,
}

// ============================================================================
// EndpointResolver
// ============================================================================

/// Resolves a discovery URL into a WebSocket endpoint URL.
///
/// # Example
///
/// ```ignore
/// use cdp_connect::EndpointResolver;
///
/// let resolver = EndpointResolver::new();
/// let ws_url = resolver.resolve("http://127.0.0.1:9222").await?;
/// // "ws://127.0.0.1:9222/devtools/browser/<uuid>"
/// ```
pub struct EndpointResolver {
    /// HTTP client used for the single discovery GET.
    client: reqwest::Client,
}

impl EndpointResolver {
    /// Creates a resolver with a default HTTP client.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Creates a resolver reusing an existing HTTP client.
    #[inline]
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Resolves `discovery_url` to the socket endpoint it advertises.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Discovery`] if the URL is invalid, the GET fails,
    /// the status is not 2xx, the body is not JSON, or the body lacks a
    /// `webSocketDebuggerUrl` field. The error message always contains
    /// `discovery_url`.
    pub async fn resolve(&self, discovery_url: &str) -> Result<String> {
        let base = Url::parse(discovery_url)
            .map_err(|e| Error::discovery(discovery_url, format!("invalid discovery URL: {e}")))?;
        let endpoint = base
            .join(DISCOVERY_PATH)
            .map_err(|e| Error::discovery(discovery_url, format!("invalid discovery URL: {e}")))?;

        debug!(endpoint = %endpoint, "Fetching version manifest");

        let response = self
            .client
            .get(endpoint)
            .send()
            .await
            .map_err(|e| Error::discovery(discovery_url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::discovery(discovery_url, format!("HTTP {status}")));
        }

        let manifest: VersionManifest = response
            .json()
            .await
            .map_err(|e| Error::discovery(discovery_url, format!("invalid response body: {e}")))?;

        manifest.web_socket_debugger_url.ok_or_else(|| {
            Error::discovery(
                discovery_url,
                "response body has no webSocketDebuggerUrl field",
            )
        })
    }
}

impl Default for EndpointResolver {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
