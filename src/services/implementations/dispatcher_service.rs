use crate::dispatcher::RateLimitedDispatcher;
use crate::logger::{self, LogTag};
use crate::services::{Service, ServiceHealth};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Drives the dispatcher's one-second window tick
pub struct DispatcherService {
    dispatcher: Arc<RateLimitedDispatcher>,
}

impl DispatcherService {
    pub fn new(dispatcher: Arc<RateLimitedDispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl Service for DispatcherService {
    fn name(&self) -> &'static str {
        "dispatcher"
    }

    fn priority(&self) -> i32 {
        10
    }

    async fn start(&mut self, shutdown: Arc<Notify>) -> Result<Vec<JoinHandle<()>>, String> {
        logger::info(
            LogTag::Dispatcher,
            &format!(
                "Dispatcher started ({} requests per second)",
                self.dispatcher.rate_limit()
            ),
        );
        Ok(vec![self.dispatcher.start(shutdown)])
    }

    async fn health(&self) -> ServiceHealth {
        if self.dispatcher.is_backlogged() {
            ServiceHealth::Degraded(format!(
                "{} requests waiting for a window",
                self.dispatcher.pending_len()
            ))
        } else {
            ServiceHealth::Healthy
        }
    }
}
