//! Server-sent event stream of a project's lock and document events

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;

use super::PlatformState;
use crate::error::LockResult;

pub fn routes(state: PlatformState) -> Router {
    Router::new()
        .route("/projects/{project_id}/events", get(stream_events))
        .with_state(state)
}

async fn stream_events(
    State(state): State<PlatformState>,
    Path(project_id): Path<String>,
) -> LockResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    state.projects.get_project(&project_id).await?;
    let mut receiver = state.events.subscribe();

    let stream = async_stream::stream! {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if event.project_id() != project_id {
                        continue;
                    }
                    let data = serde_json::to_string(&event).unwrap_or_default();
                    yield Ok(Event::default().event(event.event_type()).data(data));
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(project_id = %project_id, "SSE event stream lagged by {} messages", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(10))
            .text("ping"),
    ))
}
