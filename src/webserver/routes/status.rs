use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::dispatcher::DispatcherStatsSnapshot;
use crate::scheduler::SkippedCollection;
use crate::webserver::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct RefreshStatus {
    pub pending: usize,
    pub in_flight: usize,
    pub skipped: Vec<SkippedCollection>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: i64,
    pub dispatcher: DispatcherStatsSnapshot,
    pub refresh: RefreshStatus,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}

/// GET /health
///
/// `status` is `degraded` while the dispatcher backlog exceeds its sixty-window allowance.
async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let status = if state.dispatcher.is_backlogged() {
        "degraded"
    } else {
        "ok"
    };
    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: (Utc::now() - state.startup_time).num_seconds(),
        dispatcher: state.dispatcher.stats(),
        refresh: RefreshStatus {
            pending: state.scheduler.pending_len(),
            in_flight: state.scheduler.in_flight_len(),
            skipped: state.scheduler.skipped_collections(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StalenessCache;
    use crate::config::{RefreshConfig, UpstreamConfig};
    use crate::dispatcher::{RateLimitedDispatcher, RequestSpec, BACKLOG_WINDOWS};
    use crate::providers::GomuProvider;
    use crate::rarity::TraitFrequencyScorer;
    use crate::scheduler::CollectionRefreshScheduler;
    use crate::store::SqliteMetadataStore;
    use crate::test_support::RoutedTransport;

    fn state(dispatcher: Arc<RateLimitedDispatcher>) -> Arc<AppState> {
        let store = Arc::new(SqliteMetadataStore::open_in_memory().unwrap());
        let provider = Arc::new(GomuProvider::new(
            &UpstreamConfig::default(),
            Arc::clone(&dispatcher),
        ));
        let scheduler = Arc::new(CollectionRefreshScheduler::new(
            provider,
            store.clone(),
            Arc::new(TraitFrequencyScorer),
            RefreshConfig::default(),
        ));
        let cache = Arc::new(StalenessCache::new(store, Arc::clone(&scheduler), 60));
        Arc::new(AppState::new(cache, scheduler, dispatcher))
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_degraded_while_dispatcher_backlogged() {
        let dispatcher =
            Arc::new(RateLimitedDispatcher::new(1, Arc::new(RoutedTransport::new())).unwrap());
        let state = state(Arc::clone(&dispatcher));

        let Json(idle) = health_check(State(Arc::clone(&state))).await;
        assert_eq!(idle.status, "ok");

        let waiting: Vec<_> = (0..BACKLOG_WINDOWS + 2)
            .map(|i| {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    dispatcher
                        .submit(RequestSpec::get(format!("https://upstream/{}", i)))
                        .await
                })
            })
            .collect();
        while !dispatcher.is_backlogged() {
            tokio::task::yield_now().await;
        }

        let Json(busy) = health_check(State(Arc::clone(&state))).await;
        assert_eq!(busy.status, "degraded");
        assert_eq!(busy.dispatcher.pending, BACKLOG_WINDOWS + 1);

        dispatcher.close();
        for task in waiting {
            let _ = task.await.unwrap();
        }
    }
}
