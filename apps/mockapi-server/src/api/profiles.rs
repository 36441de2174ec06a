use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use mockapi_core::{Profile, ProfileError};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::{responses, AppState};

/// Body field and query parameter naming the profile to switch to.
pub const NEWLY_ACTIVE_PROFILE: &str = "newlyActiveProfile";

pub const MISSING_BODY_PARAMETER: &str =
    "Could not set active profile. Was expecting body with parameter newlyActiveProfile";
pub const MISSING_QUERY_PARAMETER: &str =
    "Could not set active profile. Was expecting URI parameter newlyActiveProfile";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveProfileResponse {
    pub active_profile: Option<String>,
}

pub async fn profiles_list(State(state): State<AppState>) -> Json<BTreeMap<String, Profile>> {
    Json(state.registry().profiles())
}

pub async fn active_profile_get(State(state): State<AppState>) -> Json<ActiveProfileResponse> {
    Json(ActiveProfileResponse {
        active_profile: state.registry().active_profile(),
    })
}

/// Profile name carried by a JSON body. Only an absent field (or a body that
/// is not a JSON object) counts as missing; any other value is looked up by
/// its JSON text, so `null` or `5` name profiles that do not exist.
fn requested_from_body(body: &[u8]) -> Option<String> {
    let value = serde_json::from_slice::<Value>(body).ok()?;
    match value.get(NEWLY_ACTIVE_PROFILE)? {
        Value::String(name) => Some(name.clone()),
        other => Some(other.to_string()),
    }
}

/// Profile name carried by the query string. A repeated parameter is joined
/// with commas and will not match a registered profile.
fn requested_from_query(pairs: &[(String, String)]) -> Option<String> {
    let values: Vec<&str> = pairs
        .iter()
        .filter(|(key, _)| key == NEWLY_ACTIVE_PROFILE)
        .map(|(_, value)| value.as_str())
        .collect();
    (!values.is_empty()).then(|| values.join(","))
}

/// `POST /activeProfile` with `{"newlyActiveProfile": "<name>"}`.
pub async fn active_profile_post(State(state): State<AppState>, body: Bytes) -> Response {
    match requested_from_body(&body) {
        Some(name) => switch_profile(&state, name),
        None => responses::message(StatusCode::BAD_REQUEST, MISSING_BODY_PARAMETER),
    }
}

/// `GET /setActiveProfile?newlyActiveProfile=<name>`.
pub async fn set_active_profile_query(
    State(state): State<AppState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Response {
    let requested = match query {
        Ok(Query(pairs)) => requested_from_query(&pairs),
        Err(rejection) => {
            warn!(error = %rejection, "unreadable query string");
            None
        }
    };
    match requested {
        Some(name) => switch_profile(&state, name),
        None => responses::message(StatusCode::BAD_REQUEST, MISSING_QUERY_PARAMETER),
    }
}

fn switch_profile(state: &AppState, name: String) -> Response {
    match state.registry().set_active_profile(&name) {
        Ok(()) => Json(ActiveProfileResponse {
            active_profile: Some(name),
        })
        .into_response(),
        Err(err @ ProfileError::UnknownProfile(_)) => {
            warn!(profile = %name, "rejected switch to unknown profile");
            responses::message(StatusCode::NOT_FOUND, err.to_string())
        }
        Err(err) => {
            error!(profile = %name, error = %err, "profile switch failed");
            responses::message(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

/// Management paths never fall through to response files, whatever the method.
pub async fn management_not_found(method: Method, uri: Uri) -> Response {
    responses::message(
        StatusCode::NOT_FOUND,
        format!("Cannot {} {}", method, uri.path()),
    )
}
