/// Shared state handed to every route handler
use crate::cache::StalenessCache;
use crate::dispatcher::RateLimitedDispatcher;
use crate::scheduler::CollectionRefreshScheduler;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<StalenessCache>,
    pub scheduler: Arc<CollectionRefreshScheduler>,
    pub dispatcher: Arc<RateLimitedDispatcher>,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(
        cache: Arc<StalenessCache>,
        scheduler: Arc<CollectionRefreshScheduler>,
        dispatcher: Arc<RateLimitedDispatcher>,
    ) -> Self {
        Self {
            cache,
            scheduler,
            dispatcher,
            startup_time: chrono::Utc::now(),
        }
    }
}
