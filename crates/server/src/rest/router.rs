use axum::routing::{get, post};
use axum::Router;

use super::{health, metrics, notes, reminders};
use crate::coordinator::Coordinator;
use crate::store::{Note, Reminder, ResourceStore};

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Coordinator,
    pub reminders: ResourceStore<Reminder>,
    pub notes: ResourceStore<Note>,
    pub jwt_secret: Vec<u8>,
}

impl AppState {
    pub fn new(coordinator: Coordinator, jwt_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            coordinator,
            reminders: ResourceStore::new(),
            notes: ResourceStore::new(),
            jwt_secret: jwt_secret.into(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/ready", get(health::ready))
        .route("/metrics", get(metrics::metrics))
        .route(
            "/v1/reminders",
            get(reminders::list_reminders).post(reminders::create_reminder),
        )
        .route("/v1/reminders/{id}", get(reminders::get_reminder))
        .route("/v1/notes", post(notes::create_note))
        .with_state(state)
}
