//! T3: Stream Protocol — the SSE-framed event sequence a request emits,
//! and the sink that bridges it from the orchestrator's callback-based
//! progress reporting into an `mpsc` channel an HTTP handler drains.

mod journal;

pub use journal::StreamSink;

use crate::types::StreamEvent;

/// Serializes one `StreamEvent` as a single SSE `data:` line, per
/// spec: one JSON object per event, newline-terminated.
pub fn to_sse_data(event: &StreamEvent) -> String {
    serde_json::to_string(event).unwrap_or_else(|_| r#"{"type":"error","code":"serialization","message":"failed to encode event"}"#.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequestId;

    #[test]
    fn encodes_event_as_single_line_json() {
        let event = StreamEvent::Status { request_id: RequestId::new(), stage: "retrieving".into() };
        let line = to_sse_data(&event);
        assert!(!line.contains('\n'));
        assert!(line.contains("\"type\":\"status\""));
    }
}
