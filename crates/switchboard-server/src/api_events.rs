//! SSE stream of domain events.

use crate::AppState;
use axum::{
    extract::Extension,
    response::{sse::Event, Sse},
};
use futures_util::Stream;
use std::{convert::Infallible, sync::Arc};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Handler for `GET /events/stream`.
///
/// One `data:` frame per committed mutation, carrying the JSON-serialized
/// [`switchboard_types::DomainEvent`]. Subscribers see only events
/// published after they connect; there is no replay. A subscriber that
/// falls behind the channel capacity loses the lagged range and the
/// stream continues.
pub async fn get_event_stream_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe();
    let stream = BroadcastStream::new(rx);

    let mapped_stream = stream.filter_map(|result| match result {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(data) => Some(Ok(Event::default().data(data))),
            Err(e) => {
                tracing::error!(
                    event = event.event_type(),
                    error = %e,
                    "failed to serialize domain event"
                );
                None
            }
        },
        Err(broadcast_error) => {
            tracing::warn!(
                error = %broadcast_error,
                "event stream lagged; events were dropped for this subscriber"
            );
            None
        }
    });

    Sse::new(mapped_stream).keep_alive(axum::response::sse::KeepAlive::default())
}
