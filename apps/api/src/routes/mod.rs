pub mod health;

use anyhow::{Context, Result};
use axum::{
    http::HeaderValue,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::invitations::handlers as invitations;
use crate::state::AppState;
use crate::swipe::handlers as stacks;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Stack sessions
        .route("/api/v1/stacks", post(stacks::handle_open_stack))
        .route(
            "/api/v1/stacks/:id",
            get(stacks::handle_get_stack).delete(stacks::handle_close_stack),
        )
        .route("/api/v1/stacks/:id/navigate", post(stacks::handle_navigate))
        .route("/api/v1/stacks/:id/commit", post(stacks::handle_commit))
        .route("/api/v1/stacks/:id/apply", post(stacks::handle_apply))
        .route("/api/v1/stacks/:id/ask", post(stacks::handle_open_ask))
        .route(
            "/api/v1/stacks/:id/ask/confirm",
            post(stacks::handle_confirm_ask),
        )
        .route(
            "/api/v1/stacks/:id/ask/cancel",
            post(stacks::handle_cancel_ask),
        )
        .route("/api/v1/stacks/:id/keys", post(stacks::handle_key))
        .route(
            "/api/v1/stacks/:id/notices",
            delete(stacks::handle_dismiss_notices),
        )
        // Invitations
        .route(
            "/api/v1/invitations/pending",
            get(invitations::handle_pending),
        )
        .route(
            "/api/v1/invitations/sent",
            get(invitations::handle_sent),
        )
        .route(
            "/api/v1/invitations/:id/respond",
            post(invitations::handle_respond),
        )
        .route("/api/v1/badges", get(invitations::handle_badges))
        .route(
            "/api/v1/matches/:candidate_id/:job_id",
            get(invitations::handle_match_state),
        )
        .with_state(state)
}

/// CORS for the web front-end. An empty list allows any origin.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    if origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).with_context(|| format!("invalid CORS origin '{origin}'"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any))
}

#[cfg(test)]
pub mod testing {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::build_router;
    use crate::backend::memory::InMemoryBackend;
    use crate::config::Config;
    use crate::state::AppState;

    pub fn app_with(backend: Arc<InMemoryBackend>) -> (Router, Arc<InMemoryBackend>) {
        let state = AppState::new(Config::default(), backend.clone());
        (build_router(state), backend)
    }

    /// Sends one request and decodes the JSON body (`Value::Null` when empty).
    pub async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};

    use super::testing::{app_with, send};
    use crate::backend::memory::InMemoryBackend;

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app_with(Default::default());
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "matchdeck");
        assert_eq!(body["open_stacks"], 0);
    }

    #[tokio::test]
    async fn test_cors_only_echoes_listed_origins() {
        use axum::body::Body;
        use axum::http::{header, Request};
        use tower::ServiceExt;

        let (app, _) = app_with(Default::default());
        let app = app.layer(super::cors_layer(&["https://app.example.com".to_string()]).unwrap());

        let preflight = |origin: &str| {
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/health")
                .header(header::ORIGIN, origin)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap()
        };

        let allowed = app
            .clone()
            .oneshot(preflight("https://app.example.com"))
            .await
            .unwrap();
        assert_eq!(
            allowed.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example.com"
        );

        let denied = app.oneshot(preflight("https://evil.example")).await.unwrap();
        assert!(!denied
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[test]
    fn test_cors_rejects_malformed_origin() {
        let err = super::cors_layer(&["bad\norigin".to_string()]).unwrap_err();
        assert!(err.to_string().contains("invalid CORS origin"));
    }

    #[tokio::test]
    async fn test_unknown_stack_is_not_found() {
        let (app, _) = app_with(std::sync::Arc::new(InMemoryBackend::default()));
        let (status, body) = send(
            &app,
            Method::GET,
            "/api/v1/stacks/00000000-0000-0000-0000-000000000000",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }
}
