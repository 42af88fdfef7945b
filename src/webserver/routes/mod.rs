use crate::webserver::state::AppState;
use axum::Router;
use std::sync::Arc;

pub mod metadata;
pub mod status;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(metadata::routes())
        .merge(status::routes())
        .with_state(state)
}
