//! Bootstrap negotiation and the final browser handle.
//!
//! Once a [`Connection`] is live, two classification calls decide what we
//! are talking to before any real work begins:
//!
//! 1. `Browser.getVersion` — the product string decides the
//!    [`ProductFamily`]
//! 2. `Target.getBrowserContexts` — the isolated browsing contexts known at
//!    connect time
//!
//! Both results land in [`RemoteEndpointInfo`], computed once and never
//! mutated afterwards. The negotiator then assembles the [`BrowserHandle`]
//! the automation object model above this crate consumes.
//!
//! A failed classification call propagates unmodified and leaves the
//! connection open — whether to tear it down is the caller's decision, and
//! no partial handle is ever returned.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde_json::Value;
use tracing::{debug, info};

use crate::connection::Connection;
use crate::error::Result;
use crate::options::{TargetFilter, Viewport};
use crate::protocol::{
    BROWSER_CLOSE, BROWSER_GET_VERSION, BrowserContexts, TARGET_GET_BROWSER_CONTEXTS, VersionInfo,
};

// ============================================================================
// ProductFamily
// ============================================================================

/// Product family of the remote endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductFamily {
    /// Chromium-derived remote (the default classification).
    Chrome,
    /// Firefox remote.
    Firefox,
}

impl ProductFamily {
    /// Classifies a free-form product string.
    ///
    /// The rule is a case-insensitive substring match: any product string
    /// containing `firefox` classifies as [`Firefox`](Self::Firefox),
    /// everything else defaults to [`Chrome`](Self::Chrome). Remote agents
    /// report arbitrary strings here, so this is a weak signal by
    /// construction — a product whose name merely contains "firefox"
    /// elsewhere would misclassify. Known limitation, kept as-is.
    #[must_use]
    pub fn classify(product: &str) -> Self {
        if product.to_ascii_lowercase().contains("firefox") {
            Self::Firefox
        } else {
            Self::Chrome
        }
    }

    /// Returns the lowercase family name.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Firefox => "firefox",
        }
    }
}

impl fmt::Display for ProductFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// RemoteEndpointInfo
// ============================================================================

/// What bootstrap learned about the remote endpoint.
///
/// Computed once during negotiation; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct RemoteEndpointInfo {
    /// Classified product family.
    pub product: ProductFamily,

    /// Full version report the classification was derived from.
    pub version: VersionInfo,

    /// Isolated browsing contexts the remote reported at connect time.
    pub browser_context_ids: Vec<String>,
}

// ============================================================================
// BrowserHandle
// ============================================================================

/// The ready-to-use connection handle produced by a successful connect.
///
/// Owns the live [`Connection`] and carries everything the automation
/// object model above this crate needs to take over: the endpoint
/// classification, the caller's page defaults, and the target predicate
/// passed through unchanged.
pub struct BrowserHandle {
    /// Endpoint classification derived at connect time.
    info: RemoteEndpointInfo,
    /// The live connection; exclusively owned by this handle.
    connection: Connection,
    /// Whether the layer above should ignore TLS certificate errors.
    ignore_certificate_errors: bool,
    /// Viewport the layer above applies to each page.
    default_viewport: Option<Viewport>,
    /// Opaque target predicate, not interpreted here.
    target_filter: Option<TargetFilter>,
}

impl fmt::Debug for BrowserHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserHandle")
            .field("product", &self.info.product)
            .field("contexts", &self.info.browser_context_ids.len())
            .field("endpoint", &self.connection.endpoint())
            .finish_non_exhaustive()
    }
}

impl BrowserHandle {
    /// Returns the classified product family.
    #[inline]
    #[must_use]
    pub fn product(&self) -> ProductFamily {
        self.info.product
    }

    /// Returns everything bootstrap learned about the remote.
    #[inline]
    #[must_use]
    pub fn info(&self) -> &RemoteEndpointInfo {
        &self.info
    }

    /// Returns the browsing contexts reported at connect time.
    #[inline]
    #[must_use]
    pub fn browser_context_ids(&self) -> &[String] {
        &self.info.browser_context_ids
    }

    /// Returns the live connection.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Returns whether TLS certificate errors should be ignored.
    #[inline]
    #[must_use]
    pub fn ignore_certificate_errors(&self) -> bool {
        self.ignore_certificate_errors
    }

    /// Returns the viewport the layer above applies to each page.
    #[inline]
    #[must_use]
    pub fn default_viewport(&self) -> Option<Viewport> {
        self.default_viewport
    }

    /// Returns the opaque target predicate, if the caller supplied one.
    #[inline]
    #[must_use]
    pub fn target_filter(&self) -> Option<&TargetFilter> {
        self.target_filter.as_ref()
    }

    /// Closes the handle: notifies the remote, then closes the connection.
    ///
    /// The remote notification is advisory — failure to deliver it is not
    /// an error, it is logged and swallowed. The local connection always
    /// closes. Repeated calls are harmless.
    pub async fn close(&self) {
        if let Err(error) = self.connection.send(BROWSER_CLOSE, Value::Null).await {
            debug!(error = %error, "Remote close notification failed");
        }
        self.connection.close();
    }
}

// ============================================================================
// Negotiation
// ============================================================================

/// Classifies the remote endpoint and assembles the final handle.
///
/// # Errors
///
/// A failure in either classification call propagates unmodified
/// ([`Error::CommandFailed`](crate::Error::CommandFailed) or
/// [`Error::ConnectionClosed`](crate::Error::ConnectionClosed)). The
/// connection is left open; no partial handle is returned.
pub(crate) async fn negotiate(
    connection: Connection,
    ignore_certificate_errors: bool,
    default_viewport: Option<Viewport>,
    target_filter: Option<TargetFilter>,
) -> Result<BrowserHandle> {
    let version: VersionInfo =
        serde_json::from_value(connection.send(BROWSER_GET_VERSION, Value::Null).await?)?;
    let product = ProductFamily::classify(&version.product);
    debug!(product = %product, reported = %version.product, "Remote product classified");

    let contexts: BrowserContexts = serde_json::from_value(
        connection
            .send(TARGET_GET_BROWSER_CONTEXTS, Value::Null)
            .await?,
    )?;

    info!(
        product = %product,
        contexts = contexts.browser_context_ids.len(),
        endpoint = %connection.endpoint(),
        "Remote endpoint negotiated"
    );

    Ok(BrowserHandle {
        info: RemoteEndpointInfo {
            product,
            version,
            browser_context_ids: contexts.browser_context_ids,
        },
        connection,
        ignore_certificate_errors,
        default_viewport,
        target_filter,
    })
}

// ============================================================================
// Tests
// ============================================================================
