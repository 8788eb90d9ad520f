//! Server-Sent Events support

use crate::runtime::SseEvent;
use crate::session::SessionFlags;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert broadcast stream to SSE stream
pub fn sse_stream(
    init_event: SseEvent,
    broadcast_rx: tokio::sync::broadcast::Receiver<SseEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Create stream that starts with init event then broadcasts
    let init = futures::stream::once(async move { Ok(sse_event_to_axum(init_event)) });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(event) => Some(Ok(sse_event_to_axum(event))),
        Err(_) => None, // Skip lagged messages
    });

    let combined = init.chain(broadcasts);

    Sse::new(combined).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn render_payload(kind: &str, transcript_html: &str, flags: &SessionFlags) -> serde_json::Value {
    json!({
        "type": kind,
        "transcript_html": transcript_html,
        "sending": flags.sending,
        "pending_input": flags.pending_input,
    })
}

fn sse_event_to_axum(event: SseEvent) -> Event {
    let (event_type, data) = match event {
        SseEvent::Init {
            transcript_html,
            flags,
        } => ("init", render_payload("init", &transcript_html, &flags)),
        SseEvent::Render {
            transcript_html,
            flags,
        } => ("render", render_payload("render", &transcript_html, &flags)),
        SseEvent::Error { message } => (
            "error",
            json!({
                "type": "error",
                "message": message
            }),
        ),
    };

    Event::default().event(event_type).data(data.to_string())
}
