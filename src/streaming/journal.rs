//! T3 event forwarding: bridges the orchestrator's `on_event` callback to
//! an `mpsc` channel an HTTP handler drains into an SSE stream. Uses
//! `try_send` so a slow client never blocks the reasoning loop; a
//! dropped event is logged rather than propagated as an error.

use tokio::sync::mpsc;

use crate::types::StreamEvent;

pub struct StreamSink {
    tx: mpsc::Sender<StreamEvent>,
    emitted_terminal: bool,
}

impl StreamSink {
    pub fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self { tx, emitted_terminal: false }
    }

    /// Pushes `event` onto the channel. Enforces the ordering invariant
    /// that no event follows a terminal one for this sink's lifetime.
    pub fn emit(&mut self, event: StreamEvent) {
        if self.emitted_terminal {
            tracing::warn!("dropping stream event emitted after a terminal event");
            return;
        }
        self.emitted_terminal = event.is_terminal();

        if let Err(e) = self.tx.try_send(event) {
            tracing::debug!(error = %e, "stream sink channel full or closed, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RequestId, TokenUsage};

    #[tokio::test]
    async fn drops_events_emitted_after_terminal() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut sink = StreamSink::new(tx);
        let request_id = RequestId::new();

        sink.emit(StreamEvent::Done { request_id, usage: TokenUsage::default() });
        sink.emit(StreamEvent::Token { request_id, content: "late".into() });

        assert!(matches!(rx.try_recv().unwrap(), StreamEvent::Done { .. }));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn does_not_block_when_channel_is_full() {
        let (tx, _rx) = mpsc::channel(1);
        let mut sink = StreamSink::new(tx);
        let request_id = RequestId::new();

        sink.emit(StreamEvent::Status { request_id, stage: "a".into() });
        sink.emit(StreamEvent::Status { request_id, stage: "b".into() });
    }
}
