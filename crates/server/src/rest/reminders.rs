use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use idemgate_common::time::now_ms;

use super::auth::Caller;
use super::extract::Idempotent;
use super::response::ApiError;
use super::router::AppState;
use crate::coordinator::{CoordinatorError, Outcome};
use crate::store::{Reminder, ResponseSnapshot};

#[derive(Deserialize)]
pub struct CreateReminderRequest {
    pub title: String,
    pub due_at_ms: Option<i64>,
}

pub async fn list_reminders(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Json<Vec<Reminder>> {
    Json(state.reminders.list(&caller))
}

pub async fn get_reminder(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Json<Reminder>, ApiError> {
    state
        .reminders
        .get(&caller, &id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("reminder"))
}

pub async fn create_reminder(
    State(state): State<AppState>,
    idem: Idempotent,
) -> Result<Outcome, CoordinatorError> {
    let Idempotent {
        caller,
        request,
        body,
    } = idem;
    let reminders = state.reminders.clone();

    state
        .coordinator
        .execute(&request, move || async move {
            let input: CreateReminderRequest = match serde_json::from_slice(&body) {
                Ok(input) => input,
                Err(e) => return ResponseSnapshot::error(400, "invalid_body", &e.to_string()),
            };
            let title = input.title.trim();
            if title.is_empty() {
                return ResponseSnapshot::error(422, "invalid_title", "title must not be empty");
            }

            let reminder = Reminder {
                id: uuid::Uuid::new_v4().to_string(),
                owner: caller,
                title: title.to_string(),
                due_at_ms: input.due_at_ms,
                created_at_ms: now_ms(),
            };
            reminders.insert(reminder.clone());
            tracing::info!(id = %reminder.id, owner = %reminder.owner, "reminder created");

            ResponseSnapshot::json(201, &reminder)
                .with_header("location", format!("/v1/reminders/{}", reminder.id))
        })
        .await
}
