//! Connection builder and entry point.
//!
//! The [`Connector`] turns validated [`ConnectOptions`] into a negotiated
//! [`BrowserHandle`]: it picks the strategy the options selected, obtains a
//! transport (directly, via discovery, or from the caller), wraps it in a
//! [`Connection`], and runs bootstrap negotiation over it.
//!
//! The transport factory is injected rather than hard-wired, so the whole
//! connect path can run against a fake transport in tests. The default
//! factory creates WebSocket transports.
//!
//! # Example
//!
//! ```ignore
//! use cdp_connect::{connect, ConnectOptions};
//!
//! let browser = connect(ConnectOptions::discovery_url("http://127.0.0.1:9222")).await?;
//! println!("connected to {}", browser.product());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tracing::debug;

use crate::bootstrap::{self, BrowserHandle};
use crate::connection::Connection;
use crate::discovery::EndpointResolver;
use crate::error::Result;
use crate::options::{ConnectOptions, ConnectTarget};
use crate::transport::{TransportFactory, WebSocketTransportFactory};

// ============================================================================
// Connector
// ============================================================================

/// Builds negotiated connections out of [`ConnectOptions`].
pub struct Connector {
    /// Resolver for the discovery-URL strategy.
    resolver: EndpointResolver,
    /// Capability-injected transport factory.
    factory: Arc<dyn TransportFactory>,
}

impl Connector {
    /// Creates a connector with the default WebSocket transport factory.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_factory(Arc::new(WebSocketTransportFactory))
    }

    /// Creates a connector with a custom transport factory.
    #[inline]
    #[must_use]
    pub fn with_factory(factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            resolver: EndpointResolver::new(),
            factory,
        }
    }

    /// Connects according to `options` and negotiates the remote endpoint.
    ///
    /// The three strategies are mutually exclusive by construction
    /// ([`ConnectTarget`] is a sum type):
    ///
    /// - a pre-built transport is wrapped as-is — no discovery, no
    ///   handshake, the factory is never invoked
    /// - a socket endpoint goes straight to the factory
    /// - a discovery URL is resolved first, then handed to the factory
    ///
    /// A failed attempt leaves no live transport behind: discovery failures
    /// happen before any socket exists, and a handshake failure means the
    /// socket never opened.
    ///
    /// # Errors
    ///
    /// - [`Error::Discovery`](crate::Error::Discovery) if endpoint
    ///   resolution fails
    /// - [`Error::Handshake`](crate::Error::Handshake) if the transport
    ///   never reaches the open state
    /// - [`Error::CommandFailed`](crate::Error::CommandFailed) /
    ///   [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if a
    ///   bootstrap call fails — the connection is then left open for the
    ///   caller to clean up
    pub async fn connect(&self, options: ConnectOptions) -> Result<BrowserHandle> {
        let ConnectOptions {
            target,
            ignore_certificate_errors,
            default_viewport,
            slow_mo,
            protocol_timeout,
            headers,
            target_filter,
        } = options;

        let connection = match target {
            ConnectTarget::Transport(transport) => {
                debug!("Wrapping pre-built transport");
                Connection::new("", transport, slow_mo, protocol_timeout)
            }

            ConnectTarget::SocketEndpoint(endpoint) => {
                let transport = self.factory.create(&endpoint, &headers).await?;
                Connection::new(endpoint, transport, slow_mo, protocol_timeout)
            }

            ConnectTarget::DiscoveryUrl(url) => {
                let endpoint = self.resolver.resolve(&url).await?;
                debug!(
                    discovery_url = %url,
                    endpoint = %endpoint,
                    "Discovery resolved socket endpoint"
                );
                let transport = self.factory.create(&endpoint, &headers).await?;
                Connection::new(endpoint, transport, slow_mo, protocol_timeout)
            }
        };

        bootstrap::negotiate(
            connection,
            ignore_certificate_errors,
            default_viewport,
            target_filter,
        )
        .await
    }
}

impl Default for Connector {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// connect
// ============================================================================

/// Connects to a remote debugging endpoint with the default connector.
///
/// Equivalent to `Connector::new().connect(options)`.
///
/// # Errors
///
/// See [`Connector::connect`].
pub async fn connect(options: ConnectOptions) -> Result<BrowserHandle> {
    Connector::new().connect(options).await
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use tokio::time::timeout;

    use crate::bootstrap::ProductFamily;
    use crate::error::Error;
    use crate::transport::{PipeTransport, Transport};

    const WAIT: Duration = Duration::from_secs(5);

    /// Wires a pipe remote half to answer the bootstrap calls.
    fn serve_bootstrap(remote: PipeTransport, product: &'static str) {
        let remote = Arc::new(remote);
        let responder = Arc::clone(&remote);
        remote.set_message_handler(Box::new(move |raw| {
            let call: Value = serde_json::from_str(raw).expect("valid call json");
            let id = call["id"].as_u64().expect("call id");
            let result = match call["method"].as_str().expect("method") {
                "Browser.getVersion" => json!({ "product": product }),
                "Target.getBrowserContexts" => json!({ "browserContextIds": ["ctx-1"] }),
                _ => json!({}),
            };
            responder.send(&json!({ "id": id, "result": result }).to_string());
        }));
    }

    /// Factory handing out scripted pipe transports, counting invocations.
    struct CountingPipeFactory {
        calls: AtomicUsize,
        endpoints: Mutex<Vec<String>>,
    }

    impl CountingPipeFactory {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                endpoints: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TransportFactory for CountingPipeFactory {
        async fn create(
            &self,
            endpoint: &str,
            _headers: &HashMap<String, String>,
        ) -> Result<Box<dyn Transport>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.endpoints.lock().push(endpoint.to_owned());

            let (local, remote) = PipeTransport::pair();
            serve_bootstrap(remote, "HeadlessChrome/115.0");
            Ok(Box::new(local))
        }
    }

    #[tokio::test]
    async fn test_prebuilt_transport_skips_factory_and_discovery() {
        let factory = Arc::new(CountingPipeFactory::new());
        let connector = Connector::with_factory(Arc::clone(&factory) as Arc<dyn TransportFactory>);

        let (local, remote) = PipeTransport::pair();
        serve_bootstrap(remote, "Firefox/115.0");

        let options = ConnectOptions::transport(Box::new(local));
        let handle = timeout(WAIT, connector.connect(options))
            .await
            .expect("connect within deadline")
            .expect("connect succeeds");

        assert_eq!(handle.product(), ProductFamily::Firefox);
        assert_eq!(handle.connection().endpoint(), "");
        assert_eq!(factory.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_socket_endpoint_goes_through_factory() {
        let factory = Arc::new(CountingPipeFactory::new());
        let connector = Connector::with_factory(Arc::clone(&factory) as Arc<dyn TransportFactory>);

        let endpoint = "ws://127.0.0.1:9222/devtools/browser/abc";
        let options = ConnectOptions::socket_endpoint(endpoint);
        let handle = timeout(WAIT, connector.connect(options))
            .await
            .expect("connect within deadline")
            .expect("connect succeeds");

        assert_eq!(handle.product(), ProductFamily::Chrome);
        assert_eq!(handle.connection().endpoint(), endpoint);
        assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
        assert_eq!(factory.endpoints.lock().as_slice(), [endpoint.to_owned()]);
    }

    #[tokio::test]
    async fn test_discovery_failure_never_reaches_factory() {
        let factory = Arc::new(CountingPipeFactory::new());
        let connector = Connector::with_factory(Arc::clone(&factory) as Arc<dyn TransportFactory>);

        // Nothing listens on this URL's port.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);

        let options = ConnectOptions::discovery_url(format!("http://127.0.0.1:{port}"));
        let err = timeout(WAIT, connector.connect(options))
            .await
            .expect("failure within deadline")
            .err()
            .expect("connect must fail");

        assert!(matches!(err, Error::Discovery { .. }));
        assert_eq!(factory.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_connection_carries_timing_configuration() {
        let factory = Arc::new(CountingPipeFactory::new());
        let connector = Connector::with_factory(Arc::clone(&factory) as Arc<dyn TransportFactory>);

        let options = ConnectOptions::builder()
            .socket_endpoint("ws://127.0.0.1:9222/devtools/browser/abc")
            .slow_mo(Duration::from_millis(5))
            .protocol_timeout(Duration::from_secs(180))
            .build()
            .expect("valid options");

        let handle = timeout(WAIT, connector.connect(options))
            .await
            .expect("connect within deadline")
            .expect("connect succeeds");

        assert_eq!(handle.connection().slow_mo(), Duration::from_millis(5));
        assert_eq!(
            handle.connection().protocol_timeout(),
            Some(Duration::from_secs(180))
        );
    }
}
