use crate::config::Config;
use crate::logger::{self, LogTag};
use crate::services::{Service, ServiceHealth};
use crate::webserver::{self, AppState};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

pub struct WebserverService {
    host: String,
    port: u16,
    state: AppState,
    listener: Option<TcpListener>,
}

impl WebserverService {
    pub fn new(host: impl Into<String>, port: u16, state: AppState) -> Self {
        Self {
            host: host.into(),
            port,
            state,
            listener: None,
        }
    }
}

#[async_trait]
impl Service for WebserverService {
    fn name(&self) -> &'static str {
        "webserver"
    }

    fn priority(&self) -> i32 {
        30
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["refresh"]
    }

    fn is_enabled(&self, config: &Config) -> bool {
        config.webserver.enabled
    }

    /// Bind before anything is spawned so a taken port fails startup
    async fn initialize(&mut self) -> Result<(), String> {
        let listener = webserver::bind(&self.host, self.port)
            .await
            .map_err(|e| e.to_string())?;
        self.listener = Some(listener);
        Ok(())
    }

    async fn start(&mut self, shutdown: Arc<Notify>) -> Result<Vec<JoinHandle<()>>, String> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| "Webserver listener was not bound".to_string())?;
        let state = self.state.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = webserver::serve(listener, state, shutdown).await {
                logger::error(LogTag::Webserver, &format!("Webserver failed: {}", e));
            }
        });

        Ok(vec![handle])
    }

    async fn health(&self) -> ServiceHealth {
        ServiceHealth::Healthy
    }
}
