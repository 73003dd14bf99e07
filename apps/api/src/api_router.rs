use std::any::Any;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::error;
use warden_core::AppError;

use crate::error::ApiError;
use crate::state::AppState;
use crate::{handlers, middleware};

pub fn build_router(app_state: AppState) -> Router {
    let restriction_routes = Router::new()
        .route(
            "/api/restrictions",
            post(handlers::restrictions::apply_restriction_handler),
        )
        .route(
            "/api/restrictions/{subject_id}",
            get(handlers::restrictions::get_restriction_handler)
                .delete(handlers::restrictions::release_restriction_handler),
        )
        .route(
            "/api/restrictions/{subject_id}/cancel",
            post(handlers::restrictions::cancel_restriction_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_gateway_auth,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(restriction_routes)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|value| (*value).to_owned()))
        .unwrap_or_else(|| "<non-string panic payload>".to_owned());
    error!(detail = %detail, "request handler panicked");

    ApiError(AppError::Internal(format!("handler panicked: {detail}"))).into_response()
}
