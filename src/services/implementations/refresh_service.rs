use crate::logger::{self, LogTag};
use crate::scheduler::CollectionRefreshScheduler;
use crate::services::{Service, ServiceHealth};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Runs refresh passes over the collection queue
pub struct RefreshService {
    scheduler: Arc<CollectionRefreshScheduler>,
}

impl RefreshService {
    pub fn new(scheduler: Arc<CollectionRefreshScheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Service for RefreshService {
    fn name(&self) -> &'static str {
        "refresh"
    }

    fn priority(&self) -> i32 {
        20
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["dispatcher"]
    }

    async fn start(&mut self, shutdown: Arc<Notify>) -> Result<Vec<JoinHandle<()>>, String> {
        logger::info(LogTag::Scheduler, "Refresh loop started");
        Ok(vec![self.scheduler.start(shutdown)])
    }

    async fn stop(&mut self) -> Result<(), String> {
        let pending = self.scheduler.pending_len();
        if pending > 0 {
            logger::info(
                LogTag::Scheduler,
                &format!("{} queued collections dropped at shutdown", pending),
            );
        }
        Ok(())
    }

    async fn health(&self) -> ServiceHealth {
        ServiceHealth::Healthy
    }
}
