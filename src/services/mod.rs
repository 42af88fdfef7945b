mod health;
pub mod implementations;

pub use health::ServiceHealth;

use crate::config::Config;
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// How long `stop_all` waits for each background task
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// A long-running part of the process with an explicit lifecycle
#[async_trait]
pub trait Service: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lower starts earlier and stops later
    fn priority(&self) -> i32 {
        100
    }

    /// Services that must start before this one
    fn dependencies(&self) -> Vec<&'static str> {
        vec![]
    }

    fn is_enabled(&self, _config: &Config) -> bool {
        true
    }

    async fn initialize(&mut self) -> Result<(), String> {
        Ok(())
    }

    /// Spawn background tasks; they must exit once `shutdown` is notified
    async fn start(&mut self, shutdown: Arc<Notify>) -> Result<Vec<JoinHandle<()>>, String>;

    async fn stop(&mut self) -> Result<(), String> {
        Ok(())
    }

    async fn health(&self) -> ServiceHealth {
        ServiceHealth::Healthy
    }
}

pub struct ServiceManager {
    services: HashMap<&'static str, Box<dyn Service>>,
    handles: HashMap<&'static str, Vec<JoinHandle<()>>>,
    shutdown: Arc<Notify>,
    config: Config,
}

impl ServiceManager {
    pub fn new(config: Config) -> Self {
        Self {
            services: HashMap::new(),
            handles: HashMap::new(),
            shutdown: Arc::new(Notify::new()),
            config,
        }
    }

    pub fn register(&mut self, service: Box<dyn Service>) {
        let name = service.name();
        self.services.insert(name, service);
    }

    pub fn shutdown_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Initialize and start every enabled service, dependencies first
    pub async fn start_all(&mut self) -> Result<(), String> {
        let enabled: Vec<&'static str> = self
            .services
            .iter()
            .filter(|(_, service)| service.is_enabled(&self.config))
            .map(|(name, _)| *name)
            .collect();

        let ordered = self.resolve_startup_order(&enabled)?;
        logger::info(
            LogTag::System,
            &format!("Starting services: {:?}", ordered),
        );

        for name in ordered {
            let Some(service) = self.services.get_mut(name) else {
                continue;
            };
            service
                .initialize()
                .await
                .map_err(|e| format!("Service {} failed to initialize: {}", name, e))?;
            let handles = service
                .start(Arc::clone(&self.shutdown))
                .await
                .map_err(|e| format!("Service {} failed to start: {}", name, e))?;
            self.handles.insert(name, handles);

            logger::info(LogTag::System, &format!("Service started: {}", name));
        }

        Ok(())
    }

    /// Signal shutdown, then stop services in reverse startup order
    pub async fn stop_all(&mut self) -> Result<(), String> {
        self.shutdown.notify_waiters();

        let running: Vec<&'static str> = self.handles.keys().copied().collect();
        let mut ordered = self.resolve_startup_order(&running)?;
        ordered.reverse();

        for name in ordered {
            if let Some(service) = self.services.get_mut(name) {
                if let Err(e) = service.stop().await {
                    logger::warning(
                        LogTag::System,
                        &format!("Service {} stop error: {}", name, e),
                    );
                }
            }

            for handle in self.handles.remove(name).unwrap_or_default() {
                if tokio::time::timeout(STOP_TIMEOUT, handle).await.is_err() {
                    logger::warning(
                        LogTag::System,
                        &format!("Service {} did not stop within {:?}", name, STOP_TIMEOUT),
                    );
                }
            }

            logger::info(LogTag::System, &format!("Service stopped: {}", name));
        }

        Ok(())
    }

    /// Topological order over dependencies, stable by priority
    fn resolve_startup_order(&self, names: &[&'static str]) -> Result<Vec<&'static str>, String> {
        fn visit(
            name: &'static str,
            services: &HashMap<&'static str, Box<dyn Service>>,
            ordered: &mut Vec<&'static str>,
            visited: &mut HashSet<&'static str>,
            visiting: &mut HashSet<&'static str>,
        ) -> Result<(), String> {
            if visited.contains(name) {
                return Ok(());
            }
            if !visiting.insert(name) {
                return Err(format!("Circular dependency detected for service: {}", name));
            }
            if let Some(service) = services.get(name) {
                for dependency in service.dependencies() {
                    visit(dependency, services, ordered, visited, visiting)?;
                }
            }
            visiting.remove(name);
            visited.insert(name);
            ordered.push(name);
            Ok(())
        }

        let mut sorted = names.to_vec();
        sorted.sort_by_key(|name| {
            (
                self.services.get(name).map(|s| s.priority()).unwrap_or(100),
                *name,
            )
        });

        let mut ordered = Vec::new();
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();
        for name in sorted {
            visit(name, &self.services, &mut ordered, &mut visited, &mut visiting)?;
        }
        Ok(ordered)
    }

    /// Health per registered service; a service whose task exited is unhealthy
    pub async fn get_health(&self) -> HashMap<&'static str, ServiceHealth> {
        let mut report = HashMap::new();
        for (name, service) in &self.services {
            let health = match self.handles.get(name) {
                None => ServiceHealth::Starting,
                Some(handles) => match health::from_handles(handles) {
                    ServiceHealth::Healthy => service.health().await,
                    other => other,
                },
            };
            report.insert(*name, health);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct RecordingService {
        name: &'static str,
        priority: i32,
        dependencies: Vec<&'static str>,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Service for RecordingService {
        fn name(&self) -> &'static str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn dependencies(&self) -> Vec<&'static str> {
            self.dependencies.clone()
        }

        async fn start(&mut self, shutdown: Arc<Notify>) -> Result<Vec<JoinHandle<()>>, String> {
            self.log.lock().push(format!("start {}", self.name));
            Ok(vec![tokio::spawn(async move {
                shutdown.notified().await;
            })])
        }

        async fn stop(&mut self) -> Result<(), String> {
            self.log.lock().push(format!("stop {}", self.name));
            Ok(())
        }
    }

    fn service(
        name: &'static str,
        priority: i32,
        dependencies: Vec<&'static str>,
        log: &Arc<Mutex<Vec<String>>>,
    ) -> Box<dyn Service> {
        Box::new(RecordingService {
            name,
            priority,
            dependencies,
            log: Arc::clone(log),
        })
    }

    #[tokio::test]
    async fn test_start_and_stop_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = ServiceManager::new(Config::default());
        manager.register(service("webserver", 30, vec!["refresh"], &log));
        manager.register(service("refresh", 20, vec!["dispatcher"], &log));
        manager.register(service("dispatcher", 10, vec![], &log));

        manager.start_all().await.unwrap();
        // Let the spawned tasks reach their shutdown wait
        tokio::task::yield_now().await;
        let health = manager.get_health().await;
        assert!(health.values().all(|h| h.is_healthy()));

        manager.stop_all().await.unwrap();
        assert_eq!(
            *log.lock(),
            vec![
                "start dispatcher",
                "start refresh",
                "start webserver",
                "stop webserver",
                "stop refresh",
                "stop dispatcher",
            ]
        );
    }

    #[tokio::test]
    async fn test_circular_dependencies_rejected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = ServiceManager::new(Config::default());
        manager.register(service("a", 10, vec!["b"], &log));
        manager.register(service("b", 10, vec!["a"], &log));

        assert!(manager.start_all().await.is_err());
    }
}
