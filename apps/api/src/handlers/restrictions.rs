use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use warden_core::ActorIdentity;

use crate::dto::{ApplyRestrictionRequest, ReleaseRestrictionRequest, RestrictionResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn apply_restriction_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Json(payload): Json<ApplyRestrictionRequest>,
) -> ApiResult<(StatusCode, Json<RestrictionResponse>)> {
    let restriction = state
        .restriction_service
        .apply_restriction(&actor, payload.into())
        .await?;

    Ok((StatusCode::CREATED, Json(restriction.into())))
}

pub async fn release_restriction_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(subject_id): Path<String>,
    payload: Option<Json<ReleaseRestrictionRequest>>,
) -> ApiResult<Json<RestrictionResponse>> {
    let payload = payload.map(|Json(payload)| payload).unwrap_or_default();
    let restriction = state
        .restriction_service
        .release_restriction(&actor, payload.into_input(subject_id))
        .await?;

    Ok(Json(restriction.into()))
}

pub async fn cancel_restriction_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(subject_id): Path<String>,
    payload: Option<Json<ReleaseRestrictionRequest>>,
) -> ApiResult<Json<RestrictionResponse>> {
    let payload = payload.map(|Json(payload)| payload).unwrap_or_default();
    let restriction = state
        .restriction_service
        .cancel_restriction(&actor, payload.into_input(subject_id))
        .await?;

    Ok(Json(restriction.into()))
}

pub async fn get_restriction_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(subject_id): Path<String>,
) -> ApiResult<Json<RestrictionResponse>> {
    let restriction = state
        .restriction_service
        .get_active_restriction(&actor, &subject_id)
        .await?;

    Ok(Json(restriction.into()))
}
