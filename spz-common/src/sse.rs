//! Server-Sent Events (SSE) utilities
//!
//! Shared SSE plumbing for SPZ polling streams.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tracing::warn;

/// Wrap a stream of snapshots as an SSE response
///
/// Every item is serialized to JSON and sent as an event named `event_name`.
/// Items that fail to serialize are logged and skipped.
///
/// # Example
/// ```rust,ignore
/// let snapshots = realtime::poll_stream(...);
/// spz_common::sse::json_sse("UnreadCounts", snapshots)
/// ```
pub fn json_sse<S, T>(
    event_name: &'static str,
    snapshots: S,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Stream<Item = T> + Send + 'static,
    T: Serialize + Send + 'static,
{
    let stream = snapshots.filter_map(move |snapshot| async move {
        match serde_json::to_string(&snapshot) {
            Ok(json) => Some(Ok(Event::default().event(event_name).data(json))),
            Err(e) => {
                warn!("Failed to serialize {} snapshot: {}", event_name, e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
