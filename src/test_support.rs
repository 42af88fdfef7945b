//! Shared fixtures for unit tests
use crate::dispatcher::{HttpTransport, RateLimitedDispatcher, RequestSpec, TransportResponse};
use crate::errors::MetadataResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// Transport answering from a list of (url fragment, status, body) routes
///
/// The first route whose fragment appears in the URL wins; anything else is a 404.
#[derive(Default)]
pub struct RoutedTransport {
    routes: Mutex<Vec<(String, u16, String)>>,
    calls: Mutex<Vec<RequestSpec>>,
}

impl RoutedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, fragment: &str, status: u16, body: impl Into<String>) -> Self {
        self.routes
            .lock()
            .push((fragment.to_string(), status, body.into()));
        self
    }

    pub fn calls(&self) -> Vec<RequestSpec> {
        self.calls.lock().clone()
    }

    pub fn calls_matching(&self, fragment: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.url.contains(fragment))
            .count()
    }
}

#[async_trait]
impl HttpTransport for RoutedTransport {
    async fn execute(&self, request: &RequestSpec) -> MetadataResult<TransportResponse> {
        self.calls.lock().push(request.clone());
        let routes = self.routes.lock();
        let (status, body) = routes
            .iter()
            .find(|(fragment, _, _)| request.url.contains(fragment.as_str()))
            .map(|(_, status, body)| (*status, body.clone()))
            .unwrap_or((404, String::new()));
        Ok(TransportResponse { status, body })
    }
}

/// Dispatcher with a quota high enough that tests never wait on a tick
pub fn fast_dispatcher(transport: Arc<RoutedTransport>) -> Arc<RateLimitedDispatcher> {
    Arc::new(RateLimitedDispatcher::new(10_000, transport).unwrap())
}
