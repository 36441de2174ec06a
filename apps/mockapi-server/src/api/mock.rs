use std::path::PathBuf;

use axum::{
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use mockapi_core::ResolvedResponse;
use tracing::{error, warn};

use crate::{responses, AppState};

/// Response extension naming the file a mock response was read from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServedFile(pub PathBuf);

/// Fallback for every request that is not a management endpoint.
pub async fn mock_response(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    let base_dir = state.registry().active_base_dir();
    match state
        .resolver()
        .resolve(method.as_str(), uri.path(), &base_dir)
        .await
    {
        Ok(resolved) => into_http(resolved),
        Err(err) if err.is_not_found() => {
            warn!(%method, path = %uri.path(), error = %err, "no mock response");
            responses::message(StatusCode::NOT_FOUND, err.to_string())
        }
        Err(err) => {
            error!(%method, path = %uri.path(), error = %err, "failed to serve mock response");
            responses::message(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

fn into_http(resolved: ResolvedResponse) -> Response {
    match StatusCode::from_u16(resolved.status) {
        Ok(status) => {
            let mut response = (
                status,
                [(header::CONTENT_TYPE, resolved.content_type())],
                resolved.body,
            )
                .into_response();
            response
                .extensions_mut()
                .insert(ServedFile(resolved.source));
            response
        }
        Err(err) => responses::message(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use mockapi_core::{MemoryStorage, MockServerConfig, SiblingMatch};
    use serde_json::json;

    use super::ServedFile;
    use crate::api::test_support::{body_bytes, body_json, empty, json, router_with, send};

    const METHODS: [&str; 6] = ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"];

    fn config() -> MockServerConfig {
        MockServerConfig::default()
            .with_profile("default", "./resources/default")
            .with_profile("conf_profile_1", "./resources/profile_1")
            .with_profile("conf_profile_2", "./path/to/some/distant/profile_2")
            .with_initial_active_profile("default")
    }

    #[tokio::test]
    async fn serves_file_for_each_method_with_its_status() {
        let storage = Arc::new(MemoryStorage::new());
        let router = router_with(config(), storage.clone()).await;
        for method in METHODS {
            for status in [200u16, 201, 301, 400, 502] {
                storage.clear();
                storage.insert_file(
                    format!("resources/default/one/two/{method}.{status}.json"),
                    r#"{"testBaseResponse": "passed"}"#,
                );
                let response = send(&router, empty(method, "/one/two")).await;
                assert_eq!(response.status().as_u16(), status, "{method}");
                assert_eq!(
                    body_json(response).await,
                    json!({"testBaseResponse": "passed"})
                );
            }
        }
    }

    #[tokio::test]
    async fn missing_file_is_not_found_with_directory_and_method() {
        let router = router_with(config(), Arc::new(MemoryStorage::new())).await;
        for method in METHODS {
            let response = send(&router, empty(method, "/one/two")).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            assert_eq!(
                body_json(response).await,
                json!({"message": format!(
                    "No possible responses found in directory: \"resources/default/one/two\" for method: {method}"
                )})
            );
        }
    }

    #[tokio::test]
    async fn read_failure_is_internal_error_with_raw_message() {
        let storage = Arc::new(MemoryStorage::new());
        storage.fail_read("resources/default/POST.200.json", "some generic error");
        let router = router_with(config(), storage).await;
        let response = send(&router, json("POST", "/", &json!({}))).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({"message": "some generic error"})
        );
    }

    #[tokio::test]
    async fn malformed_json_fixture_is_internal_error() {
        let storage = Arc::new(MemoryStorage::new().with_file("resources/default/GET.200.json", "{oops"));
        let router = router_with(config(), storage).await;
        let response = send(&router, empty("GET", "/")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn query_string_does_not_change_resolution() {
        let storage = Arc::new(
            MemoryStorage::new()
                .with_file("resources/default/ping/GET.200.json", r#"{"message": "pong"}"#),
        );
        let router = router_with(config(), storage).await;
        for uri in ["/ping", "/ping?x=1", "/ping?newlyActiveProfile=conf_profile_1"] {
            let response = send(&router, empty("GET", uri)).await;
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
            assert_eq!(body_json(response).await, json!({"message": "pong"}));
        }
    }

    #[tokio::test]
    async fn content_type_follows_extension() {
        let xml = "<?xml version='1.0' encoding='UTF-8'?>\n<someTag>someValue</someTag>";
        let storage = Arc::new(
            MemoryStorage::new()
                .with_file("resources/default/ping/GET.200.json", r#"{"message": "pong"}"#)
                .with_file("resources/default/api/feed/GET.200.xml", xml),
        );
        let router = router_with(config(), storage).await;

        let response = send(&router, empty("GET", "/ping")).await;
        assert_eq!(
            response.headers()[axum::http::header::CONTENT_TYPE],
            "application/json; charset=utf-8"
        );

        let response = send(&router, empty("GET", "/api/feed")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[axum::http::header::CONTENT_TYPE],
            "application/xml; charset=utf-8"
        );
        assert_eq!(body_bytes(response).await, xml.as_bytes());
    }

    #[tokio::test]
    async fn switching_profiles_changes_the_searched_directory() {
        let storage = Arc::new(
            MemoryStorage::new()
                .with_file("resources/default/GET.200.json", r#"{"from": "default"}"#)
                .with_file("resources/profile_1/GET.200.json", r#"{"from": "p1"}"#)
                .with_file(
                    "path/to/some/distant/profile_2/GET.200.json",
                    r#"{"from": "p2"}"#,
                ),
        );
        let router = router_with(config(), storage).await;

        let response = send(&router, empty("GET", "/")).await;
        assert_eq!(body_json(response).await, json!({"from": "default"}));

        for (profile, expected) in [
            ("conf_profile_1", "p1"),
            ("default", "default"),
            ("conf_profile_2", "p2"),
        ] {
            let switch = send(
                &router,
                json(
                    "POST",
                    "/activeProfile",
                    &json!({"newlyActiveProfile": profile}),
                ),
            )
            .await;
            assert_eq!(switch.status(), StatusCode::OK);
            let response = send(&router, empty("GET", "/")).await;
            assert_eq!(body_json(response).await, json!({"from": expected}));
        }
    }

    #[tokio::test]
    async fn without_active_profile_the_fallback_directory_is_searched() {
        let storage = Arc::new(
            MemoryStorage::new().with_file("fixtures/GET.200.json", r#"{"from": "fallback"}"#),
        );
        let config = MockServerConfig {
            fallback_base_dir: "./fixtures".into(),
            ..MockServerConfig::default()
        };
        let router = router_with(config, storage).await;
        let response = send(&router, empty("GET", "/")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"from": "fallback"}));
    }

    #[tokio::test]
    async fn root_files_do_not_shadow_single_segment_endpoints() {
        let storage = Arc::new(
            MemoryStorage::new()
                .with_file("resources/default/GET.200.json", r#"{"root": true}"#)
                .with_file("resources/default/ping.GET.json", r#"{"message": "pong"}"#)
                .with_file("resources/default/users/POST.201.json", r#"{"id": 2}"#),
        );
        let router = router_with(config(), storage.clone()).await;

        let response = send(&router, json("POST", "/users", &json!({"name": "x"}))).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.extensions().get::<ServedFile>(),
            Some(&ServedFile("resources/default/users/POST.201.json".into()))
        );
        assert_eq!(body_json(response).await, json!({"id": 2}));

        let response = send(&router, empty("GET", "/")).await;
        assert_eq!(body_json(response).await, json!({"root": true}));

        let response = send(&router, empty("GET", "/ping")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let strict = MockServerConfig {
            sibling_match: SiblingMatch::Strict,
            ..config()
        };
        let router = router_with(strict, storage).await;
        let response = send(&router, empty("GET", "/ping")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"message": "pong"}));
    }

    #[tokio::test]
    async fn json_bodies_keep_key_order() {
        let storage = Arc::new(MemoryStorage::new().with_file(
            "resources/default/order/GET.200.json",
            r#"{"zeta": 1, "alpha": 2}"#,
        ));
        let router = router_with(config(), storage).await;
        let response = send(&router, empty("GET", "/order")).await;
        assert_eq!(body_bytes(response).await, br#"{"zeta":1,"alpha":2}"#);
    }
}
