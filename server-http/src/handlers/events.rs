use crate::state::AppState;
use axum::{
    extract::State,
    http::Uri,
    response::sse::{Event, KeepAlive, Sse},
};
use darkroom::events::PreviewCacheEvent;
use darkroom::ImageId;
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;

#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    event_type: Vec<String>,
    image_id: Vec<ImageId>,
}

impl EventFilter {
    /// Parse query string with CSV support for multiple values
    /// Example: ?type=miss,stored&image_id=<uuid>
    fn from_query_string(query: &str) -> Self {
        let mut event_type = Vec::new();
        let mut image_id = Vec::new();

        for pair in query.split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let values = value.split(',').map(str::trim).filter(|s| !s.is_empty());
            match key {
                "type" => event_type.extend(values.map(str::to_string)),
                "image_id" => {
                    for raw in values {
                        match raw.parse() {
                            Ok(id) => image_id.push(id),
                            Err(_) => tracing::warn!("Ignoring invalid image_id filter '{}'", raw),
                        }
                    }
                }
                _ => {}
            }
        }

        Self {
            event_type,
            image_id,
        }
    }

    fn accepts(&self, event: &PreviewCacheEvent) -> bool {
        let type_matches =
            self.event_type.is_empty() || self.event_type.iter().any(|t| t == event.kind());
        // Cache-wide events carry no id and reach every subscriber
        let id_matches = self.image_id.is_empty()
            || event
                .image_id()
                .map_or(true, |id| self.image_id.contains(id));
        type_matches && id_matches
    }
}

/// SSE endpoint that streams preview cache events to clients
pub async fn stream_events(
    State(state): State<AppState>,
    uri: Uri,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let filter = uri
        .query()
        .map(EventFilter::from_query_string)
        .unwrap_or_default();

    tracing::info!(
        "New SSE client connected. Filters: type={:?}, image_id={:?}",
        filter.event_type,
        filter.image_id
    );

    let rx = state.event_channel.subscribe();
    let stream = BroadcastStream::new(rx);

    let filtered_stream = stream.filter_map(move |result| {
        let filter = filter.clone();
        async move {
            match result {
                Ok(event) if filter.accepts(&event) => Some(Ok(to_sse_event(&event))),
                Ok(_) => None,
                Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(n)) => {
                    Some(Ok(Event::default()
                        .event("error")
                        .data(format!("Lagged by {} events", n))))
                }
            }
        }
    });

    Sse::new(filtered_stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Convert a PreviewCacheEvent to an SSE Event
fn to_sse_event(event: &PreviewCacheEvent) -> Event {
    let name = format!("preview.{}", event.kind());
    match Event::default().event(&name).json_data(event) {
        Ok(sse) => sse,
        Err(e) => Event::default()
            .event("error")
            .data(format!("Failed to serialize {} event: {}", name, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_accepts_everything() {
        let filter = EventFilter::default();
        assert!(filter.accepts(&PreviewCacheEvent::hit(ImageId::new())));
        assert!(filter.accepts(&PreviewCacheEvent::cleared(0)));
    }

    #[test]
    fn filter_parses_csv_types() {
        let filter = EventFilter::from_query_string("type=miss, stored&other=1");
        assert!(filter.accepts(&PreviewCacheEvent::miss(ImageId::new())));
        assert!(filter.accepts(&PreviewCacheEvent::stored(ImageId::new(), 1, "image/png")));
        assert!(!filter.accepts(&PreviewCacheEvent::hit(ImageId::new())));
    }

    #[test]
    fn filter_by_image_id_keeps_cache_wide_events() {
        let watched = ImageId::new();
        let filter = EventFilter::from_query_string(&format!("image_id={}&type=hit,cleared", watched));
        assert!(filter.accepts(&PreviewCacheEvent::hit(watched)));
        assert!(!filter.accepts(&PreviewCacheEvent::hit(ImageId::new())));
        assert!(!filter.accepts(&PreviewCacheEvent::miss(watched)));
        assert!(filter.accepts(&PreviewCacheEvent::cleared(3)));
    }

    #[test]
    fn invalid_image_id_filter_is_ignored() {
        let filter = EventFilter::from_query_string("image_id=not-a-uuid");
        assert!(filter.accepts(&PreviewCacheEvent::evicted(ImageId::new())));
    }
}
