/// Network seam for the dispatcher
use super::request::RequestSpec;
use crate::errors::{MetadataError, MetadataResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Proxy};
use std::collections::HashMap;
use std::time::Duration;

/// Raw status and body, before the dispatcher interprets them
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Performs a single HTTP exchange
///
/// Network-level failures are returned as errors; every HTTP status,
/// including errors, is returned as a response.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: &RequestSpec) -> MetadataResult<TransportResponse>;
}

/// reqwest-backed transport with one client per proxy
pub struct ReqwestTransport {
    timeout: Duration,
    clients: Mutex<HashMap<Option<String>, Client>>,
}

impl ReqwestTransport {
    pub fn new(timeout_secs: u64) -> MetadataResult<Self> {
        if timeout_secs == 0 {
            return Err(MetadataError::Config(
                "Timeout must be greater than zero".to_string(),
            ));
        }

        let transport = Self {
            timeout: Duration::from_secs(timeout_secs),
            clients: Mutex::new(HashMap::new()),
        };
        // Build the direct client eagerly so TLS setup problems surface at startup
        transport.client_for(None)?;
        Ok(transport)
    }

    fn client_for(&self, proxy: Option<&str>) -> MetadataResult<Client> {
        let key = proxy.map(str::to_string);
        let mut clients = self.clients.lock();
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let mut builder = Client::builder().timeout(self.timeout);
        if let Some(proxy_url) = proxy {
            let proxy = Proxy::all(proxy_url)
                .map_err(|e| MetadataError::Config(format!("Invalid proxy '{}': {}", proxy_url, e)))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| MetadataError::Config(format!("Failed to create HTTP client: {}", e)))?;

        clients.insert(key, client.clone());
        Ok(client)
    }
}

fn build_headers(headers: &[(String, String)]) -> MetadataResult<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| MetadataError::Config(format!("Invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| MetadataError::Config(format!("Invalid header value: {}", e)))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &RequestSpec) -> MetadataResult<TransportResponse> {
        let client = self.client_for(request.proxy.as_deref())?;
        let method = Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|e| MetadataError::Config(format!("Invalid method '{}': {}", request.method, e)))?;

        let mut builder = client
            .request(method, &request.url)
            .headers(build_headers(&request.headers)?);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(TransportResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(ReqwestTransport::new(0).is_err());
    }

    #[test]
    fn test_invalid_header_rejected() {
        let headers = vec![("bad header".to_string(), "x".to_string())];
        assert!(build_headers(&headers).is_err());
    }

    #[test]
    fn test_headers_passed_through() {
        let headers = vec![("GOMU-API-KEY".to_string(), "secret".to_string())];
        let map = build_headers(&headers).unwrap();
        assert_eq!(map.get("gomu-api-key").unwrap(), "secret");
    }
}
