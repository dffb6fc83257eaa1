//! WebSocket client transport.
//!
//! This module implements [`Transport`] over an outbound WebSocket
//! connection to a remote debugging endpoint.
//!
//! # Connection Flow
//!
//! 1. [`WebSocketTransport::create`] performs the upgrade handshake against
//!    the endpoint URL, with optional caller-supplied request headers
//! 2. On success the transport is `Open` and an event loop task owns the
//!    socket
//! 3. Inbound text frames reach the registered message handler in arrival
//!    order; the close handler fires exactly once when the socket goes away
//!
//! No timeout is imposed here — a hung handshake suspends the caller until
//! the caller's own deadline machinery intervenes.

// ============================================================================
// Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};

use super::{
    CloseHandler, ErrorObserver, MessageHandler, StateCell, Transport, TransportFactory,
    TransportHandlers, TransportState,
};

// ============================================================================
// SocketCommand
// ============================================================================

/// Owner requests forwarded to the event loop.
enum SocketCommand {
    /// Enqueue a text frame.
    Send(String),
    /// Shut the socket down.
    Close,
}

// ============================================================================
// WebSocketTransport
// ============================================================================

/// [`Transport`] implementation over an outbound WebSocket connection.
///
/// The socket itself lives in a spawned event loop task; this handle only
/// holds the command channel, the shared state cell and the callback
/// registry.
pub struct WebSocketTransport {
    /// Channel for forwarding send/close requests to the event loop.
    command_tx: mpsc::UnboundedSender<SocketCommand>,
    /// Lifecycle state, shared with the event loop.
    state: Arc<StateCell>,
    /// Callback registry, shared with the event loop.
    handlers: Arc<TransportHandlers>,
}

impl WebSocketTransport {
    /// Connects to `endpoint` and completes the WebSocket handshake.
    ///
    /// Caller-supplied `headers` are added to the upgrade request, which is
    /// how authentication tokens reach proxied debugging endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Handshake`] if the endpoint URL is not a valid
    /// client request, a header is malformed, or the socket reports an
    /// error before reaching the open state. The failure is terminal: the
    /// transport never existed and there is nothing to clean up.
    pub async fn create(endpoint: &str, headers: &HashMap<String, String>) -> Result<Self> {
        let state = Arc::new(StateCell::new(TransportState::Connecting));

        let mut request = endpoint.into_client_request().map_err(|e| {
            state.transition(TransportState::Failed);
            Error::handshake(endpoint, e.to_string())
        })?;

        {
            let request_headers = request.headers_mut();
            for (name, value) in headers {
                let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                    state.transition(TransportState::Failed);
                    Error::handshake(endpoint, format!("invalid header name {name:?}: {e}"))
                })?;
                let value = HeaderValue::from_str(value).map_err(|e| {
                    state.transition(TransportState::Failed);
                    Error::handshake(endpoint, format!("invalid header value for {name}: {e}"))
                })?;
                request_headers.insert(name, value);
            }
        }

        let (ws_stream, _response) = connect_async(request).await.map_err(|e| {
            state.transition(TransportState::Failed);
            Error::handshake(endpoint, e.to_string())
        })?;

        state.transition(TransportState::Open);
        debug!(endpoint = %endpoint, "WebSocket handshake completed");

        Ok(Self::from_stream(ws_stream, state))
    }

    /// Wraps an already-open socket stream and spawns the event loop.
    fn from_stream(
        ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
        state: Arc<StateCell>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let handlers = Arc::new(TransportHandlers::new());

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            Arc::clone(&handlers),
            Arc::clone(&state),
        ));

        Self {
            command_tx,
            state,
            handlers,
        }
    }

    /// Event loop that owns the socket.
    ///
    /// Frames are delivered in arrival order from a single task, so the
    /// message handler is never re-entered concurrently. Every exit path
    /// ends in `fire_close`, which drains the callback registry and releases
    /// whatever the owner captured in its handlers.
    async fn run_event_loop(
        ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
        mut command_rx: mpsc::UnboundedReceiver<SocketCommand>,
        handlers: Arc<TransportHandlers>,
        state: Arc<StateCell>,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Inbound frames from the remote
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            handlers.deliver_message(&text);
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("WebSocket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            // Post-handshake socket errors are observed and
                            // swallowed; the close event below is the owner's
                            // signal that the channel is gone.
                            error!(error = %e, "WebSocket error");
                            handlers.observe_error(&e.to_string());
                            break;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Requests from the owning Connection
                command = command_rx.recv() => {
                    match command {
                        Some(SocketCommand::Send(text)) => {
                            if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                                warn!(error = %e, "Failed to send frame");
                                handlers.observe_error(&e.to_string());
                                break;
                            }
                        }

                        Some(SocketCommand::Close) => {
                            debug!("Close requested by owner");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        state.transition(TransportState::Closed);
        handlers.fire_close();
        debug!("Transport event loop terminated");
    }
}

// ============================================================================
// Transport Implementation
// ============================================================================

impl Transport for WebSocketTransport {
    fn send(&self, message: &str) {
        if self
            .command_tx
            .send(SocketCommand::Send(message.to_owned()))
            .is_err()
        {
            trace!("frame dropped: event loop already terminated");
        }
    }

    fn close(&self) {
        // Idempotent: a second close finds the loop gone and is ignored.
        let _ = self.command_tx.send(SocketCommand::Close);
    }

    fn state(&self) -> TransportState {
        self.state.get()
    }

    fn set_message_handler(&self, handler: MessageHandler) {
        *self.handlers.on_message.lock() = Some(handler);
    }

    fn set_close_handler(&self, handler: CloseHandler) {
        *self.handlers.on_close.lock() = Some(handler);
    }

    fn set_error_observer(&self, observer: ErrorObserver) {
        *self.handlers.on_error.lock() = Some(observer);
    }
}

// ============================================================================
// WebSocketTransportFactory
// ============================================================================

/// Default [`TransportFactory`] creating [`WebSocketTransport`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketTransportFactory;

#[async_trait::async_trait]
impl TransportFactory for WebSocketTransportFactory {
    async fn create(
        &self,
        endpoint: &str,
        headers: &HashMap<String, String>,
    ) -> Result<Box<dyn Transport>> {
        Ok(Box::new(WebSocketTransport::create(endpoint, headers).await?))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::handshake::server::{
        Request as UpgradeRequest, Response as UpgradeResponse,
    };

    const WAIT: Duration = Duration::from_secs(5);

    /// Binds a local listener and returns its ws:// URL plus the listener.
    async fn bind_local() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        (listener, format!("ws://127.0.0.1:{port}"))
    }

    #[tokio::test]
    async fn test_frames_delivered_in_order() {
        let (listener, url) = bind_local().await;

        // Server waits for a go signal, sends five frames, then closes.
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(stream).await.expect("upgrade");

            let go = ws.next().await.expect("go frame").expect("go frame ok");
            assert!(matches!(go, Message::Text(ref t) if t.as_str() == "go"));

            for i in 1..=5 {
                ws.send(Message::Text(format!("frame-{i}").into()))
                    .await
                    .expect("send frame");
            }
            let _ = ws.close(None).await;
        });

        let transport = WebSocketTransport::create(&url, &HashMap::new())
            .await
            .expect("handshake should succeed");
        assert_eq!(transport.state(), TransportState::Open);

        let (frame_tx, mut frame_rx) = mpsc::unbounded_channel();
        transport.set_message_handler(Box::new(move |m| {
            let _ = frame_tx.send(m.to_owned());
        }));
        let (close_tx, close_rx) = oneshot::channel();
        transport.set_close_handler(Box::new(move || {
            let _ = close_tx.send(());
        }));

        transport.send("go");

        let mut received = Vec::new();
        for _ in 0..5 {
            let frame = timeout(WAIT, frame_rx.recv())
                .await
                .expect("frame within deadline")
                .expect("channel open");
            received.push(frame);
        }
        assert_eq!(
            received,
            vec!["frame-1", "frame-2", "frame-3", "frame-4", "frame-5"]
        );

        timeout(WAIT, close_rx).await.expect("close within deadline").expect("close fired");
        assert_eq!(transport.state(), TransportState::Closed);
        assert!(frame_rx.recv().await.is_none(), "no frame after close");

        server.await.expect("server task");
    }

    #[tokio::test]
    async fn test_handshake_failure_is_terminal() {
        // Grab a port with nothing listening on it.
        let (listener, url) = bind_local().await;
        drop(listener);

        let result = WebSocketTransport::create(&url, &HashMap::new()).await;
        let err = result.err().expect("handshake must fail");
        assert!(matches!(err, Error::Handshake { .. }));
        assert!(err.to_string().contains(&url));
    }

    #[tokio::test]
    async fn test_invalid_endpoint_is_handshake_error() {
        let result = WebSocketTransport::create("not a url", &HashMap::new()).await;
        assert!(matches!(result, Err(Error::Handshake { .. })));
    }

    #[tokio::test]
    async fn test_handshake_headers_forwarded() {
        let (listener, url) = bind_local().await;
        let (header_tx, header_rx) = oneshot::channel();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let ws = tokio_tungstenite::accept_hdr_async(
                stream,
                move |req: &UpgradeRequest, resp: UpgradeResponse| {
                    let token = req
                        .headers()
                        .get("x-connect-token")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_owned);
                    let _ = header_tx.send(token);
                    Ok(resp)
                },
            )
            .await
            .expect("upgrade");
            drop(ws);
        });

        let mut headers = HashMap::new();
        headers.insert("x-connect-token".to_owned(), "s3cret".to_owned());

        let _transport = WebSocketTransport::create(&url, &headers)
            .await
            .expect("handshake should succeed");

        let token = timeout(WAIT, header_rx)
            .await
            .expect("header within deadline")
            .expect("callback ran");
        assert_eq!(token.as_deref(), Some("s3cret"));

        server.await.expect("server task");
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (listener, url) = bind_local().await;

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(stream).await.expect("upgrade");
            // Drain until the client goes away.
            while let Some(Ok(_)) = ws.next().await {}
        });

        let transport = WebSocketTransport::create(&url, &HashMap::new())
            .await
            .expect("handshake should succeed");

        let (close_tx, close_rx) = oneshot::channel();
        transport.set_close_handler(Box::new(move || {
            let _ = close_tx.send(());
        }));

        transport.close();
        transport.close();

        timeout(WAIT, close_rx).await.expect("close within deadline").expect("close fired");
        assert_eq!(transport.state(), TransportState::Closed);

        // Send after close is silently dropped.
        transport.send("late frame");

        server.await.expect("server task");
    }
}
