use axum::{routing::get, Router};

use crate::{api, AppState};

/// Paths answered by the server itself rather than by response files.
pub mod paths {
    pub const PROFILES: &str = "/profiles";
    pub const ACTIVE_PROFILE: &str = "/activeProfile";
    pub const SET_ACTIVE_PROFILE: &str = "/setActiveProfile";

    pub const MANAGEMENT: [&str; 3] = [PROFILES, ACTIVE_PROFILE, SET_ACTIVE_PROFILE];
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            paths::PROFILES,
            get(api::profiles::profiles_list).fallback(api::profiles::management_not_found),
        )
        .route(
            paths::ACTIVE_PROFILE,
            get(api::profiles::active_profile_get)
                .post(api::profiles::active_profile_post)
                .fallback(api::profiles::management_not_found),
        )
        .route(
            paths::SET_ACTIVE_PROFILE,
            get(api::profiles::set_active_profile_query)
                .fallback(api::profiles::management_not_found),
        )
        .fallback(api::mock::mock_response)
        .with_state(state)
}
