//! Connection bootstrap for Chrome DevTools Protocol endpoints.
//!
//! This library establishes exactly one live, validated, message-capable
//! connection to a remote browser-automation endpoint, negotiating which
//! transport to use before any higher-level protocol traffic flows.
//!
//! # Architecture
//!
//! One connect call reconciles three mutually exclusive strategies:
//!
//! - **Socket endpoint**: dial a WebSocket endpoint URL directly
//! - **Discovery URL**: ask an HTTP discovery endpoint (`/json/version`)
//!   where the socket lives, then dial that
//! - **Pre-built transport**: wrap a channel the caller established
//!   out-of-band
//!
//! Whichever strategy is selected, the result is the same: a [`Transport`]
//! wrapped in a [`Connection`], classified by two bootstrap calls
//! (`Browser.getVersion`, `Target.getBrowserContexts`) and handed back as a
//! [`BrowserHandle`] — or a precise diagnosis of what went wrong.
//!
//! This crate deliberately stops there. Command multiplexing, per-target
//! sessions and the browser/page object model are the session layer's
//! business; it receives the handle and takes over.
//!
//! # Quick Start
//!
//! ```no_run
//! use cdp_connect::{connect, ConnectOptions, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Discover the socket endpoint of a browser listening on 9222
//!     let options = ConnectOptions::discovery_url("http://127.0.0.1:9222");
//!     let browser = connect(options).await?;
//!
//!     println!(
//!         "connected to {} with {} contexts",
//!         browser.product(),
//!         browser.browser_context_ids().len()
//!     );
//!
//!     browser.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bootstrap`] | Endpoint classification and [`BrowserHandle`] |
//! | [`connection`] | [`Connection`]: call correlation over a transport |
//! | [`connector`] | [`Connector`] and the [`connect`] entry point |
//! | [`discovery`] | HTTP endpoint discovery |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`options`] | [`ConnectOptions`] and strategy selection |
//! | [`protocol`] | Wire message types (internal) |
//! | [`transport`] | Transport trait and implementations |
//!
//! # Failure Surface
//!
//! Every fatal error preserves enough context (URL, HTTP status, underlying
//! socket error) to tell a misconfigured endpoint from an unreachable host
//! from an incompatible remote. Socket errors after the handshake are
//! logged and swallowed by design — the close event is the signal the
//! session layer acts on.

// ============================================================================
// Modules
// ============================================================================

/// Endpoint classification and the final browser handle.
///
/// [`negotiate`](bootstrap) runs the two bootstrap calls and assembles the
/// [`BrowserHandle`] handed to the session layer.
pub mod bootstrap;

/// Protocol connection and call correlation.
///
/// [`Connection`] owns one transport and the plumbing the bootstrap calls
/// ride on.
pub mod connection;

/// Connection builder and entry point.
///
/// Use [`connect`] or a custom [`Connector`].
pub mod connector;

/// HTTP endpoint discovery.
///
/// Resolves a discovery URL into the WebSocket endpoint it advertises.
pub mod discovery;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Connect options and target selection.
///
/// [`ConnectTarget`] makes the three strategies mutually exclusive by
/// construction.
pub mod options;

/// Wire message types for the bootstrap calls.
///
/// Internal module defining the JSON shapes on the socket.
pub mod protocol;

/// Message transport layer.
///
/// The [`Transport`] trait plus WebSocket and in-process implementations.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bootstrap types
pub use bootstrap::{BrowserHandle, ProductFamily, RemoteEndpointInfo};

// Connection types
pub use connection::Connection;

// Connector types
pub use connector::{Connector, connect};

// Discovery types
pub use discovery::EndpointResolver;

// Error types
pub use error::{Error, Result};

// Options types
pub use options::{ConnectOptions, ConnectOptionsBuilder, ConnectTarget, TargetFilter, Viewport};

// Protocol types
pub use protocol::{BrowserContexts, RemoteError, VersionInfo};

// Transport types
pub use transport::{
    CloseHandler, ErrorObserver, MessageHandler, PipeTransport, Transport, TransportFactory,
    TransportState, WebSocketTransport, WebSocketTransportFactory,
};
