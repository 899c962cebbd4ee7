//! # Order stream
//!
//! Server-sent events for the order dashboards. Each connection gets its own [`Subscriber`]; the response body is a
//! stream that ends when the subscriber is evicted, and dropping the body (the viewer went away) unsubscribes it.
use std::time::Duration;

use actix_web::HttpResponse;
use bytes::Bytes;
use deposit_engine::events::{BroadcastFrame, Subscriber};
use futures::stream;
use log::*;

use crate::errors::ServerError;

pub const KEEPALIVE_FRAME: &str = ": keepalive\n\n";

/// Formats one frame in the `text/event-stream` wire format.
pub fn encode_frame(frame: &BroadcastFrame) -> Result<Bytes, ServerError> {
    match frame {
        BroadcastFrame::Event(event) => {
            let json = serde_json::to_string(event)?;
            Ok(Bytes::from(format!("data: {json}\n\n")))
        },
        BroadcastFrame::Heartbeat => Ok(Bytes::from_static(KEEPALIVE_FRAME.as_bytes())),
    }
}

pub fn order_event_stream(subscriber: Subscriber, heartbeat: Duration) -> HttpResponse {
    debug!("📡️ Order stream opened for subscriber #{}", subscriber.id());
    let frames = stream::unfold(subscriber, move |mut subscriber| async move {
        let Some(frame) = subscriber.next_frame(heartbeat).await else {
            debug!("📡️ Order stream for subscriber #{} has ended", subscriber.id());
            return None;
        };
        Some((encode_frame(&frame), subscriber))
    });
    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(frames)
}
