use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::match_state::ActorRole;
use crate::models::recommendation::SubjectId;
use crate::state::AppState;
use crate::swipe::keys::KeyEvent;
use crate::swipe::session::{SessionContext, StackView, SwipeSession};
use crate::swipe::stack::{NavDirection, SwipeDirection};

#[derive(Deserialize)]
pub struct OpenStackRequest {
    pub role: ActorRole,
    pub actor_id: SubjectId,
    #[serde(default)]
    pub job_id: Option<SubjectId>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct NavigateRequest {
    pub direction: NavDirection,
}

#[derive(Deserialize)]
pub struct CommitRequest {
    pub direction: SwipeDirection,
}

#[derive(Deserialize)]
pub struct ConfirmAskRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Serialize)]
pub struct KeyPressResponse {
    pub handled: bool,
}

async fn session(state: &AppState, id: Uuid) -> Result<Arc<SwipeSession>, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Stack {id} not found")))
}

/// POST /api/v1/stacks
pub async fn handle_open_stack(
    State(state): State<AppState>,
    Json(req): Json<OpenStackRequest>,
) -> Result<(StatusCode, Json<StackView>), AppError> {
    let context = SessionContext::new(
        req.role,
        req.actor_id,
        req.job_id,
        req.limit.unwrap_or(state.config.recommendation_limit),
    )?;
    let session =
        SwipeSession::open(context, Arc::clone(&state.backend), state.config.settle_delay).await?;
    let view = session.view().await;
    state.sessions.insert(session).await;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/v1/stacks/:id
pub async fn handle_get_stack(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StackView>, AppError> {
    Ok(Json(session(&state, id).await?.view().await))
}

/// DELETE /api/v1/stacks/:id
pub async fn handle_close_stack(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.sessions.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Stack {id} not found")))
    }
}

/// POST /api/v1/stacks/:id/navigate
pub async fn handle_navigate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<NavigateRequest>,
) -> Result<Json<StackView>, AppError> {
    Ok(Json(session(&state, id).await?.navigate(req.direction).await))
}

/// POST /api/v1/stacks/:id/commit
pub async fn handle_commit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CommitRequest>,
) -> Result<(StatusCode, Json<StackView>), AppError> {
    let view = session(&state, id).await?.commit(req.direction).await?;
    Ok((StatusCode::ACCEPTED, Json(view)))
}

/// POST /api/v1/stacks/:id/apply
pub async fn handle_apply(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<StackView>), AppError> {
    let view = session(&state, id).await?.apply().await?;
    Ok((StatusCode::ACCEPTED, Json(view)))
}

/// POST /api/v1/stacks/:id/ask
pub async fn handle_open_ask(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StackView>, AppError> {
    Ok(Json(session(&state, id).await?.open_ask().await?))
}

/// POST /api/v1/stacks/:id/ask/confirm
pub async fn handle_confirm_ask(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ConfirmAskRequest>,
) -> Result<(StatusCode, Json<StackView>), AppError> {
    let view = session(&state, id).await?.confirm_ask(req.message).await?;
    Ok((StatusCode::ACCEPTED, Json(view)))
}

/// POST /api/v1/stacks/:id/ask/cancel
pub async fn handle_cancel_ask(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StackView>, AppError> {
    Ok(Json(session(&state, id).await?.cancel_ask().await))
}

/// POST /api/v1/stacks/:id/keys
pub async fn handle_key(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(event): Json<KeyEvent>,
) -> Result<Json<KeyPressResponse>, AppError> {
    let handled = session(&state, id).await?.press_key(event);
    Ok(Json(KeyPressResponse { handled }))
}

/// DELETE /api/v1/stacks/:id/notices
pub async fn handle_dismiss_notices(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StackView>, AppError> {
    Ok(Json(session(&state, id).await?.dismiss_notices().await))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::Method;
    use serde_json::{json, Value};

    use super::*;
    use crate::backend::memory::InMemoryBackend;
    use crate::backend::MatchBackend;
    use crate::models::recommendation::fixtures::{candidate_item, job_item};
    use crate::routes::testing::{app_with, send};

    async fn backend() -> Arc<InMemoryBackend> {
        let backend = Arc::new(InMemoryBackend::default());
        backend
            .seed_job_feed(1, vec![job_item(101, 85.0), job_item(102, 64.0)])
            .await;
        backend
            .seed_candidate_feed(20, vec![candidate_item(10), candidate_item(11)])
            .await;
        backend
    }

    async fn open(app: &axum::Router, body: Value) -> Value {
        let (status, view) = send(app, Method::POST, "/api/v1/stacks", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        view
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_and_render_candidate_stack() {
        let (app, _) = app_with(backend().await);
        let view = open(&app, json!({"role": "candidate", "actor_id": 1})).await;

        assert_eq!(view["progress"], "1 / 2");
        assert_eq!(view["card"]["kind"], "job");
        assert_eq!(view["card"]["fit_label"], "STRONG MATCH");
        assert_eq!(view["empty"], false);

        let id = view["session_id"].as_str().unwrap().to_string();
        let (status, view) = send(&app, Method::GET, &format!("/api/v1/stacks/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["total"], 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recruiter_stack_without_job_is_rejected() {
        let (app, _) = app_with(backend().await);
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/stacks",
            Some(json!({"role": "recruiter", "actor_id": 5})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_then_settle_over_http() {
        let (app, _) = app_with(backend().await);
        let view = open(&app, json!({"role": "candidate", "actor_id": 1})).await;
        let base = format!("/api/v1/stacks/{}", view["session_id"].as_str().unwrap());

        let (status, view) = send(
            &app,
            Method::POST,
            &format!("{base}/commit"),
            Some(json!({"direction": "left"})),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(view["busy"], true);
        assert_eq!(view["transient_direction"], "left");

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("{base}/commit"),
            Some(json!({"direction": "right"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");

        tokio::time::sleep(Duration::from_secs(1)).await;
        let (_, view) = send(&app, Method::GET, &base, None).await;
        assert_eq!(view["total"], 1);
        assert_eq!(view["card"]["id"], 102);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigate_at_boundary_is_noop() {
        let (app, _) = app_with(backend().await);
        let view = open(&app, json!({"role": "candidate", "actor_id": 1})).await;
        let base = format!("/api/v1/stacks/{}", view["session_id"].as_str().unwrap());

        let (status, view) = send(
            &app,
            Method::POST,
            &format!("{base}/navigate"),
            Some(json!({"direction": "prev"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["position"], 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ask_draft_flow_over_http() {
        let (app, backend) = app_with(backend().await);
        let view = open(
            &app,
            json!({"role": "recruiter", "actor_id": 5, "job_id": 20}),
        )
        .await;
        let base = format!("/api/v1/stacks/{}", view["session_id"].as_str().unwrap());
        assert_eq!(view["card"]["sections"][2]["section"], "contact");
        assert_eq!(view["card"]["sections"][2]["locked"], true);

        let (status, view) = send(&app, Method::POST, &format!("{base}/ask"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["ask_draft"]["subject_id"], 10);

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("{base}/ask/confirm"),
            Some(json!({"message": "Let's talk"})),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);

        tokio::time::sleep(Duration::from_secs(1)).await;
        let pending = backend.pending_invitations(10).await.unwrap();
        assert_eq!(pending[0].message.as_deref(), Some("Let's talk"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_and_teardown() {
        let (app, _) = app_with(backend().await);
        let view = open(&app, json!({"role": "candidate", "actor_id": 1})).await;
        let base = format!("/api/v1/stacks/{}", view["session_id"].as_str().unwrap());

        let (_, body) = send(
            &app,
            Method::POST,
            &format!("{base}/keys"),
            Some(json!({"key": "ArrowRight"})),
        )
        .await;
        assert_eq!(body["handled"], true);

        let (status, _) = send(&app, Method::DELETE, &base, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) = send(&app, Method::GET, &base, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }
}
