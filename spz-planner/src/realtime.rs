//! Polling streams with push invalidation
//!
//! Each stream refetches on a fixed interval (no backoff, no jitter). An
//! [`EventBus`] event concerning the subscriber wakes the same fetch early.
//! Events never carry data to the client. A snapshot is yielded only when it
//! differs from the previous one. Dropping the stream stops polling.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use futures::Stream;
use spz_common::EventBus;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

pub fn poll_stream<T, E, F, Fut>(
    interval: Duration,
    events: &EventBus,
    user_id: String,
    mut fetch: F,
) -> impl Stream<Item = T> + Send + 'static
where
    T: PartialEq + Clone + Send + 'static,
    E: Display + Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let mut rx = events.subscribe();

    async_stream::stream! {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut push_open = true;
        let mut last: Option<T> = None;

        loop {
            let fetch_now = tokio::select! {
                _ = ticker.tick() => true,
                received = rx.recv(), if push_open => match received {
                    Ok(event) => event.concerns(&user_id),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Invalidation receiver lagged");
                        true
                    }
                    Err(RecvError::Closed) => {
                        push_open = false;
                        false
                    }
                },
            };
            if !fetch_now {
                continue;
            }

            match fetch().await {
                Ok(snapshot) => {
                    if last.as_ref() != Some(&snapshot) {
                        last = Some(snapshot.clone());
                        yield snapshot;
                    }
                }
                Err(e) => warn!(user_id = %user_id, "Poll fetch failed: {}", e),
            }
        }
    }
}
