//! `POST /api/v1/attendance/device-push`

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use timekeep_core::{DevicePushHandler, PushOutcome};
use timekeep_domain::constants::API_KEY_HEADER;
use timekeep_domain::{AttendanceError, DevicePush, EntryId};
use tracing::{error, warn};

#[derive(Debug, Serialize)]
pub struct PushAccepted {
    pub entry_id: EntryId,
    pub duplicate: bool,
}

#[derive(Debug, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

pub async fn handle(
    State(handler): State<Arc<DevicePushHandler>>,
    headers: HeaderMap,
    body: Result<Json<DevicePush>, JsonRejection>,
) -> Response {
    let api_key = headers.get(API_KEY_HEADER).and_then(|value| value.to_str().ok());

    let Json(payload) = match body {
        Ok(body) => body,
        Err(rejection) => {
            // Unauthenticated callers learn nothing about the payload shape
            if api_key.is_none() {
                return StatusCode::UNAUTHORIZED.into_response();
            }
            let field = FieldError { field: "body".into(), message: rejection.body_text() };
            return (StatusCode::UNPROCESSABLE_ENTITY, Json(field)).into_response();
        }
    };

    match handler.accept(api_key, payload).await {
        Ok(PushOutcome::Accepted(outcome)) => (
            StatusCode::ACCEPTED,
            Json(PushAccepted { entry_id: outcome.entry.id, duplicate: outcome.duplicate }),
        )
            .into_response(),
        Ok(PushOutcome::Unauthorized) => StatusCode::UNAUTHORIZED.into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: AttendanceError) -> Response {
    match err {
        AttendanceError::Validation { field, message } => {
            (StatusCode::UNPROCESSABLE_ENTITY, Json(FieldError { field, message })).into_response()
        }
        AttendanceError::AmbiguousShiftAssignment { .. } => {
            warn!(error = %err, "device_push.unschedulable");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(FieldError { field: "bio_id".into(), message: err.to_string() }),
            )
                .into_response()
        }
        AttendanceError::TransientSync(_) | AttendanceError::Database(_) => {
            warn!(error = %err, "device_push.unavailable");
            body(StatusCode::SERVICE_UNAVAILABLE, "unavailable", &err)
        }
        AttendanceError::IntegrityConflict(_) => body(StatusCode::CONFLICT, "conflict", &err),
        AttendanceError::NotFound(_) => body(StatusCode::NOT_FOUND, "not_found", &err),
        // Unassigned users get a timing-less sheet, so this never escapes ingestion.
        AttendanceError::NoShiftAssigned { .. } | AttendanceError::Config(_) | AttendanceError::Internal(_) => {
            error!(error = %err, "device_push.failed");
            body(StatusCode::INTERNAL_SERVER_ERROR, "internal", &err)
        }
    }
}

fn body(status: StatusCode, error: &'static str, err: &AttendanceError) -> Response {
    (status, Json(ErrorBody { error, message: err.to_string() })).into_response()
}
