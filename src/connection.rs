//! Protocol connection and call correlation.
//!
//! A [`Connection`] exclusively owns one [`Transport`] and adds the plumbing
//! the bootstrap calls need: a monotonically increasing call-id counter,
//! a pending-call correlation map, an order-preserving inbound dispatch
//! task, and the configured artificial latency.
//!
//! # Dispatch
//!
//! The transport delivers frames from its event loop; the connection
//! forwards them through an unbounded channel into one dispatch task, which
//! applies the configured latency and routes each response to the caller
//! suspended on it. One task, one channel: arrival order is preserved and
//! no frame is delivered twice.
//!
//! Frames without a call id are protocol events. Session multiplexing lives
//! above this layer, so they are traced and dropped here.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::{CallMessage, InboundMessage};
use crate::transport::Transport;

// ============================================================================
// Types
// ============================================================================

/// One call awaiting its correlated response.
struct PendingCall {
    /// Method name, kept for error reporting.
    method: String,
    /// Channel the caller is suspended on.
    tx: oneshot::Sender<Result<Value>>,
}

/// Map of call ids to suspended callers.
type PendingMap = FxHashMap<u64, PendingCall>;

// ============================================================================
// Connection
// ============================================================================

/// A transport plus call correlation and timing configuration.
///
/// Cheap to clone; all clones share the same underlying channel. Closing
/// any clone closes the transport and fails every pending call.
///
/// There is no automatic shutdown on drop — the owner of the final handle
/// decides when the channel dies.
pub struct Connection {
    /// Shared state.
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    /// Resolved endpoint URL, kept for diagnostics. Empty for pre-built
    /// transports.
    endpoint: String,
    /// Exclusively owned transport; nothing else may send or close on it.
    transport: Box<dyn Transport>,
    /// Artificial latency applied before routing each inbound frame.
    slow_mo: Duration,
    /// Per-call timeout stored for the session layer. Not enforced here.
    protocol_timeout: Option<Duration>,
    /// Next call id; starts at 1 and only grows.
    next_id: AtomicU64,
    /// Calls awaiting responses.
    pending: Arc<Mutex<PendingMap>>,
    /// Set once the channel is gone, by either side.
    closed: Arc<AtomicBool>,
}

impl Clone for Connection {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.inner.endpoint)
            .field("closed", &self.is_closed())
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Connection - Construction
// ============================================================================

impl Connection {
    /// Wraps a transport, taking exclusive ownership of it.
    ///
    /// Registers both transport callbacks and spawns the dispatch task.
    /// From this point on, only the connection may send or close on the
    /// transport.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        transport: Box<dyn Transport>,
        slow_mo: Duration,
        protocol_timeout: Option<Duration>,
    ) -> Self {
        let pending: Arc<Mutex<PendingMap>> = Arc::new(Mutex::new(FxHashMap::default()));
        let closed = Arc::new(AtomicBool::new(false));

        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<String>();
        transport.set_message_handler(Box::new(move |raw| {
            let _ = raw_tx.send(raw.to_owned());
        }));

        {
            let pending = Arc::clone(&pending);
            let closed = Arc::clone(&closed);
            transport.set_close_handler(Box::new(move || {
                closed.store(true, Ordering::SeqCst);
                fail_pending(&pending);
            }));
        }

        {
            let pending = Arc::clone(&pending);
            tokio::spawn(async move {
                while let Some(raw) = raw_rx.recv().await {
                    if !slow_mo.is_zero() {
                        tokio::time::sleep(slow_mo).await;
                    }
                    route_frame(&raw, &pending);
                }
                trace!("dispatch loop terminated");
            });
        }

        Self {
            inner: Arc::new(ConnectionInner {
                endpoint: endpoint.into(),
                transport,
                slow_mo,
                protocol_timeout,
                next_id: AtomicU64::new(1),
                pending,
                closed,
            }),
        }
    }
}

// ============================================================================
// Connection - Calls
// ============================================================================

impl Connection {
    /// Sends a protocol call and suspends until its correlated response.
    ///
    /// No timeout is imposed here; deadline enforcement belongs to the
    /// session layer (see [`protocol_timeout`](Self::protocol_timeout)).
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the channel is gone, now or while
    ///   the call is pending
    /// - [`Error::CommandFailed`] if the remote answers with an error
    ///   response
    /// - [`Error::Json`] if `params` cannot be serialized
    pub async fn send(&self, method: &str, params: Value) -> Result<Value> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let message = serde_json::to_string(&CallMessage {
            id,
            method,
            params: &params,
        })?;

        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().insert(
            id,
            PendingCall {
                method: method.to_owned(),
                tx,
            },
        );

        self.inner.transport.send(&message);
        trace!(id, method, "call dispatched");

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::ConnectionClosed),
        }
    }
}

// ============================================================================
// Connection - Accessors
// ============================================================================

impl Connection {
    /// Returns the resolved endpoint URL this connection was built against.
    ///
    /// Empty for connections wrapping a pre-built transport.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// Returns the configured artificial latency.
    #[inline]
    #[must_use]
    pub fn slow_mo(&self) -> Duration {
        self.inner.slow_mo
    }

    /// Returns the stored per-call timeout for the session layer.
    #[inline]
    #[must_use]
    pub fn protocol_timeout(&self) -> Option<Duration> {
        self.inner.protocol_timeout
    }

    /// Returns `true` once the channel is gone, by either side's doing.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Returns the number of calls awaiting responses.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }
}

// ============================================================================
// Connection - Shutdown
// ============================================================================

impl Connection {
    /// Closes the connection and the transport it owns.
    ///
    /// Idempotent: repeated calls are no-ops. Every pending call fails with
    /// [`Error::ConnectionClosed`].
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(endpoint = %self.inner.endpoint, "Closing connection");
        self.inner.transport.close();
        fail_pending(&self.inner.pending);
    }
}

// ============================================================================
// Routing
// ============================================================================

/// Routes one inbound frame to the caller suspended on its id.
fn route_frame(raw: &str, pending: &Arc<Mutex<PendingMap>>) {
    let message = match serde_json::from_str::<InboundMessage>(raw) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "Failed to parse inbound frame");
            return;
        }
    };

    let Some(id) = message.id else {
        // Event frame; the session layer owns these.
        trace!(method = message.method.as_deref().unwrap_or(""), "event frame dropped");
        return;
    };

    let Some(call) = pending.lock().remove(&id) else {
        warn!(id, "response for unknown call");
        return;
    };

    let outcome = match message.error {
        Some(error) => Err(Error::command_failed(call.method, error.message)),
        None => Ok(message.result.unwrap_or(Value::Null)),
    };
    let _ = call.tx.send(outcome);
}

/// Fails every pending call with [`Error::ConnectionClosed`].
fn fail_pending(pending: &Arc<Mutex<PendingMap>>) {
    let drained: Vec<_> = {
        let mut map = pending.lock();
        map.drain().collect()
    };
    let count = drained.len();

    for (_, call) in drained {
        let _ = call.tx.send(Err(Error::ConnectionClosed));
    }

    if count > 0 {
        debug!(count, "Failed pending calls on close");
    }
}

// ============================================================================
// Tests
// ============================================================================
