//! Connect options and target selection.
//!
//! Provides a type-safe interface for describing how to reach a remote
//! debugging endpoint: a direct WebSocket endpoint, an HTTP discovery URL,
//! or a pre-built transport — exactly one of the three.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use cdp_connect::ConnectOptions;
//!
//! let options = ConnectOptions::builder()
//!     .discovery_url("http://127.0.0.1:9222")
//!     .slow_mo(Duration::from_millis(50))
//!     .header("x-connect-token", "s3cret")
//!     .build()?;
//! ```
//!
//! The selected strategy lives in [`ConnectTarget`], a sum type: once an
//! options value exists, an invalid combination of strategies cannot be
//! represented. The builder is where the exactly-one rule is enforced, at
//! the earliest possible point and before any I/O.

// ============================================================================
// Imports
// ============================================================================

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::transport::Transport;

// ============================================================================
// Viewport
// ============================================================================

/// Viewport dimensions applied to each page by the layer above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Viewport {
    /// Creates a viewport with the given dimensions.
    #[inline]
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    /// The conventional 800×600 debugging viewport.
    fn default() -> Self {
        Self::new(800, 600)
    }
}

// ============================================================================
// TargetFilter
// ============================================================================

/// Opaque predicate deciding whether to attach to a given target.
///
/// Passed through to the layer above unchanged; this crate never calls it.
pub type TargetFilter = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

// ============================================================================
// ConnectTarget
// ============================================================================

/// The one connection strategy selected by the caller.
pub enum ConnectTarget {
    /// Connect a WebSocket transport directly to this endpoint URL.
    SocketEndpoint(String),

    /// Resolve the actual socket endpoint through HTTP discovery first.
    DiscoveryUrl(String),

    /// Use a transport the caller established out-of-band.
    ///
    /// No discovery and no handshake happen on this path; the transport is
    /// wrapped as-is and treated like any network transport from then on.
    Transport(Box<dyn Transport>),
}

impl fmt::Debug for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SocketEndpoint(url) => f.debug_tuple("SocketEndpoint").field(url).finish(),
            Self::DiscoveryUrl(url) => f.debug_tuple("DiscoveryUrl").field(url).finish(),
            Self::Transport(_) => f.write_str("Transport(..)"),
        }
    }
}

// ============================================================================
// ConnectOptions
// ============================================================================

/// Full configuration for one connect attempt.
///
/// Build via [`ConnectOptions::builder`], or use the one-argument
/// constructors when the defaults fit.
pub struct ConnectOptions {
    /// Selected connection strategy.
    pub target: ConnectTarget,

    /// Whether the layer above should ignore TLS certificate errors.
    pub ignore_certificate_errors: bool,

    /// Viewport applied to each page by the layer above; `None` disables it.
    pub default_viewport: Option<Viewport>,

    /// Artificial latency applied to inbound protocol traffic, to aid
    /// debugging. Zero disables it.
    pub slow_mo: Duration,

    /// Per-call timeout stored for the session layer. Not enforced here.
    pub protocol_timeout: Option<Duration>,

    /// Extra headers for the WebSocket handshake request.
    pub headers: HashMap<String, String>,

    /// Optional target predicate, passed through unchanged.
    pub target_filter: Option<TargetFilter>,
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("target", &self.target)
            .field("ignore_certificate_errors", &self.ignore_certificate_errors)
            .field("default_viewport", &self.default_viewport)
            .field("slow_mo", &self.slow_mo)
            .field("protocol_timeout", &self.protocol_timeout)
            .field("headers", &self.headers)
            .field("has_target_filter", &self.target_filter.is_some())
            .finish()
    }
}

// ============================================================================
// ConnectOptions - Constructors
// ============================================================================

impl ConnectOptions {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ConnectOptionsBuilder {
        ConnectOptionsBuilder::new()
    }

    /// Options connecting directly to a WebSocket endpoint, with defaults.
    #[inline]
    #[must_use]
    pub fn socket_endpoint(url: impl Into<String>) -> Self {
        Self::with_target(ConnectTarget::SocketEndpoint(url.into()))
    }

    /// Options resolving the endpoint through HTTP discovery, with defaults.
    #[inline]
    #[must_use]
    pub fn discovery_url(url: impl Into<String>) -> Self {
        Self::with_target(ConnectTarget::DiscoveryUrl(url.into()))
    }

    /// Options wrapping a pre-built transport, with defaults.
    #[inline]
    #[must_use]
    pub fn transport(transport: Box<dyn Transport>) -> Self {
        Self::with_target(ConnectTarget::Transport(transport))
    }

    fn with_target(target: ConnectTarget) -> Self {
        Self {
            target,
            ignore_certificate_errors: false,
            default_viewport: Some(Viewport::default()),
            slow_mo: Duration::ZERO,
            protocol_timeout: None,
            headers: HashMap::new(),
            target_filter: None,
        }
    }
}

// ============================================================================
// ConnectOptionsBuilder
// ============================================================================

/// Builder for [`ConnectOptions`].
///
/// All three strategy fields are settable; [`build`](Self::build) enforces
/// that exactly one was supplied and fails with
/// [`Error::InvalidConnectOptions`] otherwise, performing no I/O.
#[derive(Default)]
pub struct ConnectOptionsBuilder {
    socket_endpoint: Option<String>,
    discovery_url: Option<String>,
    transport: Option<Box<dyn Transport>>,
    ignore_certificate_errors: bool,
    default_viewport: Option<Option<Viewport>>,
    slow_mo: Duration,
    protocol_timeout: Option<Duration>,
    headers: HashMap<String, String>,
    target_filter: Option<TargetFilter>,
}

impl ConnectOptionsBuilder {
    /// Creates a new builder with no strategy selected.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the direct WebSocket endpoint URL.
    #[inline]
    #[must_use]
    pub fn socket_endpoint(mut self, url: impl Into<String>) -> Self {
        self.socket_endpoint = Some(url.into());
        self
    }

    /// Sets the HTTP discovery URL.
    #[inline]
    #[must_use]
    pub fn discovery_url(mut self, url: impl Into<String>) -> Self {
        self.discovery_url = Some(url.into());
        self
    }

    /// Sets a pre-built transport.
    #[inline]
    #[must_use]
    pub fn transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Instructs the layer above to ignore TLS certificate errors.
    #[inline]
    #[must_use]
    pub fn ignore_certificate_errors(mut self, ignore: bool) -> Self {
        self.ignore_certificate_errors = ignore;
        self
    }

    /// Sets the default viewport dimensions.
    #[inline]
    #[must_use]
    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.default_viewport = Some(Some(Viewport::new(width, height)));
        self
    }

    /// Disables the default viewport entirely.
    #[inline]
    #[must_use]
    pub fn no_viewport(mut self) -> Self {
        self.default_viewport = Some(None);
        self
    }

    /// Sets the artificial latency applied to inbound protocol traffic.
    #[inline]
    #[must_use]
    pub fn slow_mo(mut self, delay: Duration) -> Self {
        self.slow_mo = delay;
        self
    }

    /// Stores a per-call timeout for the session layer.
    #[inline]
    #[must_use]
    pub fn protocol_timeout(mut self, timeout: Duration) -> Self {
        self.protocol_timeout = Some(timeout);
        self
    }

    /// Adds one header to the WebSocket handshake request.
    #[inline]
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the opaque target predicate passed through to the layer above.
    #[inline]
    #[must_use]
    pub fn target_filter(mut self, filter: TargetFilter) -> Self {
        self.target_filter = Some(filter);
        self
    }

    /// Builds the options, enforcing that exactly one strategy was set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConnectOptions`] if zero or more than one of
    /// `socket_endpoint`, `discovery_url` and `transport` was supplied.
    pub fn build(self) -> Result<ConnectOptions> {
        let supplied = usize::from(self.socket_endpoint.is_some())
            + usize::from(self.discovery_url.is_some())
            + usize::from(self.transport.is_some());
        if supplied != 1 {
            return Err(Error::invalid_options(format!(
                "exactly one of socket_endpoint, discovery_url or transport \
                 must be supplied (got {supplied})"
            )));
        }

        let target = if let Some(url) = self.socket_endpoint {
            ConnectTarget::SocketEndpoint(url)
        } else if let Some(url) = self.discovery_url {
            ConnectTarget::DiscoveryUrl(url)
        } else if let Some(transport) = self.transport {
            ConnectTarget::Transport(transport)
        } else {
            unreachable!("supplied == 1 guarantees one branch matches")
        };

        Ok(ConnectOptions {
            target,
            ignore_certificate_errors: self.ignore_certificate_errors,
            default_viewport: self.default_viewport.unwrap_or(Some(Viewport::default())),
            slow_mo: self.slow_mo,
            protocol_timeout: self.protocol_timeout,
            headers: self.headers,
            target_filter: self.target_filter,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
