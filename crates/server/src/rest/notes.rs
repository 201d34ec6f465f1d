use axum::extract::State;
use serde::Deserialize;

use idemgate_common::time::now_ms;

use super::extract::Idempotent;
use super::router::AppState;
use crate::coordinator::{CoordinatorError, Outcome};
use crate::store::{Note, ResponseSnapshot};

#[derive(Deserialize)]
pub struct CreateNoteRequest {
    pub body: String,
}

pub async fn create_note(
    State(state): State<AppState>,
    idem: Idempotent,
) -> Result<Outcome, CoordinatorError> {
    let Idempotent {
        caller,
        request,
        body,
    } = idem;
    let notes = state.notes.clone();

    state
        .coordinator
        .execute(&request, move || async move {
            let input: CreateNoteRequest = match serde_json::from_slice(&body) {
                Ok(input) => input,
                Err(e) => return ResponseSnapshot::error(400, "invalid_body", &e.to_string()),
            };
            let note = Note {
                id: uuid::Uuid::new_v4().to_string(),
                owner: caller,
                body: input.body,
                created_at_ms: now_ms(),
            };
            notes.insert(note.clone());
            ResponseSnapshot::json(201, &note)
        })
        .await
}
