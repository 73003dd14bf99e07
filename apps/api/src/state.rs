use std::sync::Arc;

use sqlx::PgPool;
use warden_application::RestrictionService;
use warden_core::GroupId;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub restriction_service: RestrictionService,
    pub postgres_pool: PgPool,
    pub group_id: GroupId,
    pub gateway_secret: Arc<str>,
}
