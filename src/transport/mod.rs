//! Message transport layer.
//!
//! This module defines the minimal send/receive/close abstraction over one
//! duplex socket, plus the two concrete implementations shipped with the
//! crate.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │ Connection      │                              │  Remote agent   │
//! │ (Rust)          │         WebSocket            │  (DevTools      │
//! │                 │◄────────────────────────────►│   endpoint)     │
//! │ Box<dyn         │      ws://host:port/...      │                 │
//! │   Transport>    │                              │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Lifecycle
//!
//! A transport moves through [`TransportState`]:
//!
//! 1. `Connecting` — handshake in flight
//! 2. `Open` — frames flow; message handler fires once per frame, in order
//! 3. `Closed` — close event delivered exactly once, no further messages
//! 4. `Failed` — handshake error; terminal, `Open` is never reached
//!
//! Socket errors after the handshake are observed only (logged, and reported
//! to the optional error observer) — no recovery action is defined at this
//! layer, so nothing is raised and nothing reaches the message or close
//! handlers. The close event that eventually follows is the owner's signal.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | WebSocket client transport (tokio-tungstenite) |
//! | `pipe` | In-process duplex pair for out-of-band transports and tests |

// ============================================================================
// Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// In-process duplex transport pair.
pub mod pipe;

/// WebSocket client transport.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use pipe::PipeTransport;
pub use websocket::{WebSocketTransport, WebSocketTransportFactory};

// ============================================================================
// Handler Types
// ============================================================================

/// Inbound message callback.
///
/// Fires once per received text frame, in arrival order, never concurrently
/// re-entered. Set once by the transport's owner.
pub type MessageHandler = Box<dyn Fn(&str) + Send + Sync>;

/// Close callback.
///
/// Fires exactly once, after which no further message callback fires.
pub type CloseHandler = Box<dyn FnOnce() + Send>;

/// Diagnostic observer for post-handshake socket errors.
///
/// Observe-only: registering one does not change transport behavior. Errors
/// are still swallowed; this hook exists so implementers and tests can
/// assert the swallow path fired.
pub type ErrorObserver = Box<dyn Fn(&str) + Send + Sync>;

// ============================================================================
// TransportState
// ============================================================================

/// Lifecycle state of a transport's underlying socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransportState {
    /// Handshake in flight; no frames yet.
    Connecting = 0,
    /// Socket open; frames flow in both directions.
    Open = 1,
    /// Socket closed after having been open. Terminal.
    Closed = 2,
    /// Handshake failed; the socket never opened. Terminal.
    Failed = 3,
}

impl TransportState {
    /// Returns `true` if no further transition is possible.
    #[inline]
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }

    /// Returns `true` if `next` is a legal transition from this state.
    ///
    /// Legal transitions: `Connecting → Open`, `Connecting → Failed`,
    /// `Connecting → Closed` (closed before the handshake finished) and
    /// `Open → Closed`. Terminal states have no outgoing transitions.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (Self::Connecting, Self::Open | Self::Failed | Self::Closed) => true,
            (Self::Open, Self::Closed) => true,
            _ => false,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closed,
            _ => Self::Failed,
        }
    }
}

// ============================================================================
// StateCell
// ============================================================================

/// Shared state holder enforcing the transport state machine.
///
/// Illegal transitions are ignored rather than panicking: the event loop and
/// the owner may race a close, and the first terminal state wins.
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(initial: TransportState) -> Self {
        Self(AtomicU8::new(initial as u8))
    }

    pub(crate) fn get(&self) -> TransportState {
        TransportState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Applies `next` if the state machine allows it. Returns `true` on
    /// success.
    pub(crate) fn transition(&self, next: TransportState) -> bool {
        let current = self.get();
        if current.can_transition_to(next) {
            // A concurrent transition may have won; only swap from `current`.
            self.0
                .compare_exchange(
                    current as u8,
                    next as u8,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
        } else {
            false
        }
    }
}

// ============================================================================
// TransportHandlers
// ============================================================================

/// Callback registry shared between a transport handle and its event loop.
///
/// Handlers are registered once by the owning Connection and invoked from
/// the event loop task for the socket's remaining lifetime. On loop exit the
/// registry is drained so captured resources are released.
pub(crate) struct TransportHandlers {
    pub(crate) on_message: Mutex<Option<MessageHandler>>,
    pub(crate) on_close: Mutex<Option<CloseHandler>>,
    pub(crate) on_error: Mutex<Option<ErrorObserver>>,
}

impl TransportHandlers {
    pub(crate) fn new() -> Self {
        Self {
            on_message: Mutex::new(None),
            on_close: Mutex::new(None),
            on_error: Mutex::new(None),
        }
    }

    /// Delivers one inbound frame to the registered message handler.
    pub(crate) fn deliver_message(&self, text: &str) {
        let guard = self.on_message.lock();
        if let Some(handler) = guard.as_ref() {
            handler(text);
        }
    }

    /// Reports a post-handshake socket error to the observer, if any.
    pub(crate) fn observe_error(&self, description: &str) {
        let guard = self.on_error.lock();
        if let Some(observer) = guard.as_ref() {
            observer(description);
        }
    }

    /// Fires the close handler and drains the registry.
    ///
    /// The close handler is `FnOnce` behind `Option::take`, so a second call
    /// is a no-op and no message handler can fire afterwards.
    pub(crate) fn fire_close(&self) {
        self.on_message.lock().take();
        self.on_error.lock().take();
        let handler = self.on_close.lock().take();
        if let Some(handler) = handler {
            handler();
        }
    }
}

// ============================================================================
// Transport Trait
// ============================================================================

/// Minimal send/receive/close abstraction over one duplex socket.
///
/// A transport is exclusively owned by the [`Connection`](crate::Connection)
/// that wraps it; no other component calls `send` or `close` directly.
///
/// # Contract
///
/// - [`send`](Transport::send) enqueues a text frame, fire-and-forget.
///   Socket errors during send are logged, never surfaced.
/// - [`close`](Transport::close) requests shutdown and is idempotent.
/// - The message handler fires once per received frame, in arrival order.
/// - The close handler fires exactly once; no message fires afterwards.
pub trait Transport: Send + Sync + 'static {
    /// Enqueues a text frame on the underlying socket.
    fn send(&self, message: &str);

    /// Requests socket shutdown. Repeated calls are not an error.
    fn close(&self);

    /// Returns the current lifecycle state.
    fn state(&self) -> TransportState;

    /// Registers the inbound message callback. Set once by the owner.
    fn set_message_handler(&self, handler: MessageHandler);

    /// Registers the close callback. Set once by the owner.
    fn set_close_handler(&self, handler: CloseHandler);

    /// Registers the diagnostic observer for swallowed socket errors.
    fn set_error_observer(&self, observer: ErrorObserver);
}

// ============================================================================
// TransportFactory
// ============================================================================

/// Capability-injected factory used by the connector to create transports.
///
/// Injecting the factory (instead of branching on the environment inside the
/// connector) keeps the connect path testable with a fake transport.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Creates a transport connected to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Handshake`](crate::Error::Handshake) if the socket
    /// never reaches the open state.
    async fn create(
        &self,
        endpoint: &str,
        headers: &HashMap<String, String>,
    ) -> Result<Box<dyn Transport>>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_connecting_transitions() {
        let state = TransportState::Connecting;
        assert!(state.can_transition_to(TransportState::Open));
        assert!(state.can_transition_to(TransportState::Failed));
        assert!(state.can_transition_to(TransportState::Closed));
        assert!(!state.is_terminal());
    }

    #[test]
    fn test_open_transitions() {
        let state = TransportState::Open;
        assert!(state.can_transition_to(TransportState::Closed));
        assert!(!state.can_transition_to(TransportState::Failed));
        assert!(!state.can_transition_to(TransportState::Connecting));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for terminal in [TransportState::Closed, TransportState::Failed] {
            assert!(terminal.is_terminal());
            for next in [
                TransportState::Connecting,
                TransportState::Open,
                TransportState::Closed,
                TransportState::Failed,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_failed_never_reaches_open() {
        let cell = StateCell::new(TransportState::Connecting);
        assert!(cell.transition(TransportState::Failed));
        assert!(!cell.transition(TransportState::Open));
        assert_eq!(cell.get(), TransportState::Failed);
    }

    #[test]
    fn test_state_cell_ignores_illegal_transition() {
        let cell = StateCell::new(TransportState::Open);
        assert!(!cell.transition(TransportState::Failed));
        assert_eq!(cell.get(), TransportState::Open);
        assert!(cell.transition(TransportState::Closed));
        assert_eq!(cell.get(), TransportState::Closed);
    }

    #[test]
    fn test_fire_close_is_once() {
        let handlers = TransportHandlers::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let fired_clone = Arc::clone(&fired);
        *handlers.on_close.lock() = Some(Box::new(move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        }));

        handlers.fire_close();
        handlers.fire_close();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_message_after_close() {
        let handlers = TransportHandlers::new();
        let received = Arc::new(AtomicUsize::new(0));

        let received_clone = Arc::clone(&received);
        *handlers.on_message.lock() = Some(Box::new(move |_| {
            received_clone.fetch_add(1, Ordering::SeqCst);
        }));

        handlers.deliver_message("before");
        handlers.fire_close();
        handlers.deliver_message("after");
        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_error_observer_is_observe_only() {
        let handlers = TransportHandlers::new();
        let observed = Arc::new(AtomicUsize::new(0));

        let observed_clone = Arc::clone(&observed);
        *handlers.on_error.lock() = Some(Box::new(move |_| {
            observed_clone.fetch_add(1, Ordering::SeqCst);
        }));

        handlers.observe_error("simulated socket error");
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }
}
