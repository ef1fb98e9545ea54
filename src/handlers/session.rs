use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::Json;
use serde::Serialize;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tokio_stream::StreamExt;

use crate::services::screens::{self, NavFlags, Screen};
use crate::session::SessionSnapshot;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ViewResponse {
    #[serde(flatten)]
    pub screen: Screen,
    pub session: SessionSnapshot,
    pub nav: NavFlags,
}

fn current_view(state: &AppState) -> ViewResponse {
    let session = state.session.snapshot();
    let nav = *state.nav.lock().unwrap();
    ViewResponse {
        screen: screens::resolve(&session, &nav),
        session,
        nav,
    }
}

// GET /api/session
pub async fn get_session(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot())
}

// GET /api/view
pub async fn get_view(State(state): State<Arc<AppState>>) -> Json<ViewResponse> {
    Json(current_view(&state))
}

// POST /api/nav
pub async fn update_nav(
    State(state): State<Arc<AppState>>,
    Json(flags): Json<NavFlags>,
) -> Json<ViewResponse> {
    *state.nav.lock().unwrap() = flags;
    Json(current_view(&state))
}

fn session_event(snapshot: &SessionSnapshot) -> Event {
    let data = serde_json::to_string(snapshot).unwrap_or_default();
    Event::default().data(data).event("session")
}

// GET /api/session/events - SSE stream
pub async fn events_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.session.subscribe();
    let current = session_event(&state.session.snapshot());

    let initial = tokio_stream::iter(std::iter::once(Ok::<_, Infallible>(current)));

    let live_stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(snapshot) => Some(Ok(session_event(&snapshot))),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::debug!(skipped, "session stream lagged");
            None
        }
    });

    let keepalive_stream = StreamExt::map(
        IntervalStream::new(tokio::time::interval(Duration::from_secs(30))),
        |_| Ok(Event::default().comment("keepalive")),
    );

    Sse::new(StreamExt::merge(initial.chain(live_stream), keepalive_stream))
}
