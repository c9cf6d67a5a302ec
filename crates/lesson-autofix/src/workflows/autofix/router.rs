use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{Lesson, SkillGrouping};
use super::engine::AutoFixRequest;
use super::outbound::{AssignmentSubmitter, AutoFixNotifier, LoadingState};
use super::service::AutoFixService;
use crate::error::AppError;

/// Body shared by the preview and confirm endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoFixPayload {
    pub lesson: Lesson,
    #[serde(default)]
    pub groupings: Vec<SkillGrouping>,
    #[serde(default)]
    pub request: AutoFixRequest,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CompletionPayload {
    pub state: LoadingState,
}

/// Router builder exposing the auto-fix preview, confirm, and completion endpoints.
pub fn autofix_router<S, N>(service: Arc<AutoFixService<S, N>>) -> Router
where
    S: AssignmentSubmitter + 'static,
    N: AutoFixNotifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/lessons/autofix/preview",
            post(preview_handler::<S, N>),
        )
        .route(
            "/api/v1/lessons/autofix/confirm",
            post(confirm_handler::<S, N>),
        )
        .route(
            "/api/v1/lessons/:lesson_plan_id/autofix/complete",
            post(complete_handler::<S, N>),
        )
        .with_state(service)
}

pub(crate) async fn preview_handler<S, N>(
    State(service): State<Arc<AutoFixService<S, N>>>,
    body: Bytes,
) -> Result<Response, AppError>
where
    S: AssignmentSubmitter + 'static,
    N: AutoFixNotifier + 'static,
{
    let payload: AutoFixPayload = serde_json::from_slice(&body)?;
    let plan = service.preview(&payload.lesson, &payload.groupings, &payload.request);
    Ok((StatusCode::OK, axum::Json(plan)).into_response())
}

pub(crate) async fn confirm_handler<S, N>(
    State(service): State<Arc<AutoFixService<S, N>>>,
    body: Bytes,
) -> Result<Response, AppError>
where
    S: AssignmentSubmitter + 'static,
    N: AutoFixNotifier + 'static,
{
    let payload: AutoFixPayload = serde_json::from_slice(&body)?;
    let receipt = service.confirm(&payload.lesson, &payload.groupings, &payload.request)?;

    let status = if receipt.mutation.is_some() {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    Ok((status, axum::Json(receipt)).into_response())
}

pub(crate) async fn complete_handler<S, N>(
    State(service): State<Arc<AutoFixService<S, N>>>,
    Path(lesson_plan_id): Path<String>,
    body: Bytes,
) -> Result<Response, AppError>
where
    S: AssignmentSubmitter + 'static,
    N: AutoFixNotifier + 'static,
{
    let payload: CompletionPayload = serde_json::from_slice(&body)?;
    let phase = service.complete(&lesson_plan_id, payload.state)?;

    let body = json!({
        "lessonPlanId": lesson_plan_id,
        "phase": phase,
    });
    Ok((StatusCode::OK, axum::Json(body)).into_response())
}
