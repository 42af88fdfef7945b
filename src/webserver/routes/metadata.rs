use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::logger::{self, LogTag};
use crate::types::MetadataLookup;
use crate::webserver::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/metadata/:collection/:token", get(get_metadata))
}

/// GET /metadata/:collection/:token
///
/// 202 means the collection is being fetched and the client should retry.
async fn get_metadata(
    State(state): State<Arc<AppState>>,
    Path((collection, token)): Path<(String, String)>,
) -> (StatusCode, Json<Value>) {
    match state.cache.get_metadata(&collection, &token).await {
        Ok(MetadataLookup::Found(metadata)) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "metadata": metadata })),
        ),
        Ok(MetadataLookup::Pending) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "status": "pending",
                "message": "Collection metadata is being fetched, retry later"
            })),
        ),
        Ok(MetadataLookup::Absent) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "absent", "message": "Token not found in collection" })),
        ),
        Err(e) => {
            logger::error(
                LogTag::Webserver,
                &format!("Metadata lookup for {} #{} failed: {}", collection, token, e),
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "message": e.to_string() })),
            )
        }
    }
}
