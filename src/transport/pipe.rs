//! In-process duplex transport pair.
//!
//! A [`PipeTransport`] pair connects two endpoints inside the same process
//! with the same contract as a network transport: ordered text frames, a
//! single close event, fire-and-forget sends. It backs the pre-built
//! transport connect path (callers that established a channel out-of-band,
//! e.g. over a launched process's stdio) and the crate's own test suite,
//! where one half plays the remote endpoint.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::{
    CloseHandler, ErrorObserver, MessageHandler, StateCell, Transport, TransportHandlers,
    TransportState,
};

// ============================================================================
// PipeFrame
// ============================================================================

/// Frames travelling between the two halves.
enum PipeFrame {
    /// One text message.
    Text(String),
    /// Shutdown marker; everything queued before it is still delivered.
    Close,
}

// ============================================================================
// PipeTransport
// ============================================================================

/// One half of an in-process duplex transport pair.
///
/// Both halves are born `Open` — there is no handshake to fail. Frames sent
/// on one half arrive on the other in order. Closing either half fires the
/// close event on both.
pub struct PipeTransport {
    /// Sender feeding the peer half's inbound loop.
    peer_tx: mpsc::UnboundedSender<PipeFrame>,
    /// Sender feeding this half's own inbound loop (used to unwind it on close).
    self_tx: mpsc::UnboundedSender<PipeFrame>,
    /// Lifecycle state, shared with the inbound loop.
    state: Arc<StateCell>,
    /// Callback registry, shared with the inbound loop.
    handlers: Arc<TransportHandlers>,
}

impl PipeTransport {
    /// Creates a connected pair of transports.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (tx_ab, rx_ab) = mpsc::unbounded_channel();
        let (tx_ba, rx_ba) = mpsc::unbounded_channel();

        let a = Self::spawn_half(tx_ab.clone(), tx_ba.clone(), rx_ba);
        let b = Self::spawn_half(tx_ba, tx_ab, rx_ab);
        (a, b)
    }

    /// Builds one half and spawns its inbound delivery loop.
    fn spawn_half(
        peer_tx: mpsc::UnboundedSender<PipeFrame>,
        self_tx: mpsc::UnboundedSender<PipeFrame>,
        mut inbound_rx: mpsc::UnboundedReceiver<PipeFrame>,
    ) -> Self {
        let state = Arc::new(StateCell::new(TransportState::Open));
        let handlers = Arc::new(TransportHandlers::new());

        let loop_state = Arc::clone(&state);
        let loop_handlers = Arc::clone(&handlers);
        tokio::spawn(async move {
            while let Some(frame) = inbound_rx.recv().await {
                match frame {
                    PipeFrame::Text(text) => loop_handlers.deliver_message(&text),
                    PipeFrame::Close => break,
                }
            }
            loop_state.transition(TransportState::Closed);
            loop_handlers.fire_close();
            debug!("Pipe delivery loop terminated");
        });

        Self {
            peer_tx,
            self_tx,
            state,
            handlers,
        }
    }
}

// ============================================================================
// Transport Implementation
// ============================================================================

impl Transport for PipeTransport {
    fn send(&self, message: &str) {
        if self
            .peer_tx
            .send(PipeFrame::Text(message.to_owned()))
            .is_err()
        {
            trace!("frame dropped: peer half already closed");
        }
    }

    fn close(&self) {
        // Both delivery loops unwind; frames queued before the marker are
        // still delivered. Send errors mean the loop is already gone.
        let _ = self.peer_tx.send(PipeFrame::Close);
        let _ = self.self_tx.send(PipeFrame::Close);
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
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::sync::oneshot;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_pair_starts_open() {
        let (a, b) = PipeTransport::pair();
        assert_eq!(a.state(), TransportState::Open);
        assert_eq!(b.state(), TransportState::Open);
    }

    #[tokio::test]
    async fn test_frames_cross_in_order() {
        let (a, b) = PipeTransport::pair();

        let (tx, mut rx) = mpsc::unbounded_channel();
        b.set_message_handler(Box::new(move |m| {
            let _ = tx.send(m.to_owned());
        }));

        for i in 1..=4 {
            a.send(&format!("m{i}"));
        }

        let mut received = Vec::new();
        for _ in 0..4 {
            received.push(
                timeout(WAIT, rx.recv())
                    .await
                    .expect("frame within deadline")
                    .expect("channel open"),
            );
        }
        assert_eq!(received, vec!["m1", "m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn test_close_fires_on_both_halves() {
        let (a, b) = PipeTransport::pair();

        let (a_tx, a_rx) = oneshot::channel();
        a.set_close_handler(Box::new(move || {
            let _ = a_tx.send(());
        }));
        let (b_tx, b_rx) = oneshot::channel();
        b.set_close_handler(Box::new(move || {
            let _ = b_tx.send(());
        }));

        a.close();

        timeout(WAIT, a_rx).await.expect("a close").expect("a fired");
        timeout(WAIT, b_rx).await.expect("b close").expect("b fired");
        assert_eq!(a.state(), TransportState::Closed);
        assert_eq!(b.state(), TransportState::Closed);
    }

    #[tokio::test]
    async fn test_frames_before_close_still_delivered() {
        let (a, b) = PipeTransport::pair();

        let (tx, mut rx) = mpsc::unbounded_channel();
        b.set_message_handler(Box::new(move |m| {
            let _ = tx.send(m.to_owned());
        }));

        a.send("last words");
        a.close();

        let frame = timeout(WAIT, rx.recv())
            .await
            .expect("frame within deadline")
            .expect("channel open");
        assert_eq!(frame, "last words");
    }

    #[tokio::test]
    async fn test_double_close_is_harmless() {
        let (a, _b) = PipeTransport::pair();
        a.close();
        a.close();
    }

    #[tokio::test]
    async fn test_send_after_close_is_dropped() {
        let (a, b) = PipeTransport::pair();

        let (b_tx, b_rx) = oneshot::channel();
        b.set_close_handler(Box::new(move || {
            let _ = b_tx.send(());
        }));

        a.close();
        timeout(WAIT, b_rx).await.expect("close").expect("fired");

        // The delivery loops are gone; this must not panic.
        a.send("into the void");
    }
}
