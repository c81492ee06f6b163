//! Route handlers. Thin: parse the request, call a use case, wrap the result.

use crate::adapters::http::error::AppError;
use crate::adapters::http::router::AppState;
use crate::domain::{AllRecordings, Contact, ContactLookup, DomainError, NoteResponse};
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByContactRequest {
    #[serde(default)]
    pub contact_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub location_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRequest {
    #[serde(default)]
    pub location_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRequest {
    #[serde(default)]
    pub contact_id: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AllRecordingsResponse {
    pub recordings: AllRecordings,
}

#[derive(Debug, Serialize)]
pub struct ContactsResponse {
    pub contacts: Vec<Contact>,
}

/// Request body as `T`. A request without a JSON body reads as `T::default()`; a malformed
/// JSON body is a 400 in the usual `{error}` shape.
fn json_body<T: Default>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    match payload {
        Ok(Json(req)) => Ok(req),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        Err(rejection) => Err(AppError(DomainError::InvalidInput(rejection.body_text()))),
    }
}

/// POST /recordings/by-contact
pub async fn recordings_by_contact(
    State(state): State<AppState>,
    payload: Result<Json<ByContactRequest>, JsonRejection>,
) -> Result<Json<ContactLookup>, AppError> {
    let req = json_body(payload)?;
    let contact_id = req.contact_id.unwrap_or_default();
    let lookup = state
        .recordings
        .fetch_recordings_for_contact(
            &contact_id,
            req.email.as_deref(),
            req.location_id.as_deref(),
        )
        .await?;
    Ok(Json(lookup))
}

/// POST /recordings/all. The JSON body is optional.
pub async fn all_recordings(
    State(state): State<AppState>,
    payload: Result<Json<LocationRequest>, JsonRejection>,
) -> Result<Json<AllRecordingsResponse>, AppError> {
    let req = json_body(payload)?;
    let recordings = state
        .recordings
        .fetch_all_recordings(req.location_id.as_deref())
        .await?;
    Ok(Json(AllRecordingsResponse { recordings }))
}

/// GET /contacts?locationId=
pub async fn list_contacts(
    State(state): State<AppState>,
    Query(query): Query<LocationRequest>,
) -> Result<Json<ContactsResponse>, AppError> {
    let contacts = state
        .recordings
        .list_contacts(query.location_id.as_deref())
        .await?;
    Ok(Json(ContactsResponse { contacts }))
}

/// POST /notes
pub async fn create_note(
    State(state): State<AppState>,
    payload: Result<Json<NoteRequest>, JsonRejection>,
) -> Result<Json<NoteResponse>, AppError> {
    let req = json_body(payload)?;
    let contact_id = req.contact_id.unwrap_or_default();
    let body = req.body.unwrap_or_default();
    let response = state.notes.create_note(&contact_id, &body).await?;
    Ok(Json(response))
}

/// GET /media/:token. Streams stored recording bytes until the link expires.
pub async fn recording_media(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    let Some(stored) = state.store.get(&token).await? else {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Recording not found or expired" })),
        )
            .into_response());
    };

    let recording = stored.recording;
    let content_type = recording
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let disposition = format!(
        "inline; filename=\"{}\"",
        sanitize_filename(&recording.filename)
    );

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        recording.bytes,
    )
        .into_response())
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Keep filenames safe inside a quoted header value.
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    if cleaned.is_empty() {
        crate::domain::DEFAULT_RECORDING_FILENAME.to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("call \"1\".wav"), "call 1.wav");
        assert_eq!(sanitize_filename("\"\n"), "recording.wav");
    }
}
