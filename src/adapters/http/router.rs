//! Router construction for the recordings server.

use crate::adapters::http::handlers;
use crate::ports::RecordingStore;
use crate::usecases::{NoteService, RecordingsService};
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub recordings: Arc<RecordingsService>,
    pub notes: Arc<NoteService>,
    pub store: Arc<dyn RecordingStore>,
}

/// Build the full axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/recordings/by-contact",
            post(handlers::recordings_by_contact),
        )
        .route("/recordings/all", post(handlers::all_recordings))
        .route("/contacts", get(handlers::list_contacts))
        .route("/notes", post(handlers::create_note))
        .route("/media/:token", get(handlers::recording_media))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
