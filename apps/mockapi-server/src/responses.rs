use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// `{ "message": ... }` body used for every failure the server reports.
pub fn message(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (status, Json(json!({ "message": message.into() }))).into_response()
}
