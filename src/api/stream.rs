//! Live viewer stream over Server-Sent Events
//!
//! `GET /api/stream?channels=run-status,incident-log` opens one viewer
//! stream. Omitting `channels` subscribes to every channel.

use super::response::ApiError;
use crate::server::app::StreamSettings;
use axum::{
    extract::{Extension, Query},
    response::sse::{Event, Sse},
    routing::get,
    Router,
};
use convoy_core::{viewer_stream, Channel, EventBus, Frame};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use tracing::warn;

/// Query parameters for the viewer stream
#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    pub channels: Option<String>,
}

/// Create stream routes
pub fn stream_routes() -> Router {
    Router::new().route("/api/stream", get(open_stream))
}

async fn open_stream(
    Extension(bus): Extension<EventBus>,
    Extension(settings): Extension<StreamSettings>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let channels = Channel::parse_list(query.channels.as_deref()).map_err(ApiError::validation)?;

    let shutdown = settings.shutdown.clone();
    let events = viewer_stream(&bus, channels, settings.heartbeat)
        .take_until(async move { shutdown.cancelled().await })
        .filter_map(|frame| async move { sse_event(&frame).map(Ok) });

    Ok(Sse::new(events))
}

/// Render one frame; heartbeats are SSE comments, everything else JSON data
fn sse_event(frame: &Frame) -> Option<Event> {
    if frame.is_heartbeat() {
        return Some(Event::default().comment("heartbeat"));
    }
    match Event::default().json_data(frame) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, "Dropping frame that failed to serialize");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use chrono::Utc;

    async fn render(frame: &Frame) -> String {
        let event = sse_event(frame).unwrap();
        let response = Sse::new(futures_util::stream::iter([Ok::<_, Infallible>(event)])).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_heartbeat_is_comment() {
        let frame = Frame::Heartbeat {
            timestamp: Utc::now(),
        };
        assert_eq!(render(&frame).await, ": heartbeat\n\n");
    }

    #[tokio::test]
    async fn test_frame_is_single_data_line() {
        let frame = Frame::Connected {
            viewer_id: 7,
            channels: vec![Channel::RunStatus],
            timestamp: Utc::now(),
        };
        let expected = format!("data: {}\n\n", serde_json::to_string(&frame).unwrap());
        assert_eq!(render(&frame).await, expected);
    }
}
