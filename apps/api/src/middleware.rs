use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;
use warden_core::{ActorIdentity, AppError, AppResult, GroupId};

use crate::error::ApiResult;
use crate::state::AppState;

/// Header carrying the member id the command gateway resolved for the command.
pub const ACTOR_HEADER: &str = "x-warden-actor-id";

pub async fn require_gateway_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let actor = authenticate(request.headers(), &state.gateway_secret, &state.group_id)?;

    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}

fn authenticate(
    headers: &HeaderMap,
    gateway_secret: &str,
    group_id: &GroupId,
) -> AppResult<ActorIdentity> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("gateway bearer token is required".to_owned()))?;

    if !bool::from(token.as_bytes().ct_eq(gateway_secret.as_bytes())) {
        return Err(AppError::Unauthorized("invalid gateway credentials".to_owned()));
    }

    let actor_id = headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Unauthorized(format!("{ACTOR_HEADER} header is required")))?;

    Ok(ActorIdentity::new(actor_id, group_id.clone()))
}
