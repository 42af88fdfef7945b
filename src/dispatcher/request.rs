/// Outbound request description and decoded responses
use serde_json::Value;

/// How a 200 body is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    Text,
}

/// Everything the dispatcher needs to perform one upstream call
///
/// Headers, method, body and proxy are passed to the transport unmodified.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub proxy: Option<String>,
    pub format: ResponseFormat,
}

impl RequestSpec {
    /// GET request expecting a JSON body
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
            proxy: None,
            format: ResponseFormat::Json,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn as_text(mut self) -> Self {
        self.format = ResponseFormat::Text;
        self
    }
}

/// Decoded body of a successful (200) response
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchResponse {
    Json(Value),
    Text(String),
}

impl DispatchResponse {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            DispatchResponse::Json(value) => Some(value),
            DispatchResponse::Text(_) => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            DispatchResponse::Json(value) => Some(value),
            DispatchResponse::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            DispatchResponse::Text(text) => Some(text),
            DispatchResponse::Json(_) => None,
        }
    }
}
