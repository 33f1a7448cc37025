use async_trait::async_trait;
use http::Method;
use odata_http::{HttpClient, HttpError};
use serde_json::Value;
use std::collections::BTreeMap;

/// One HTTP exchange as the entity service describes it.
#[derive(Debug, Clone, PartialEq)]
pub struct ODataRequest {
    pub method: Method,
    /// Absolute URL without query string
    pub url: String,
    /// Query parameters, percent-encoded by the transport
    pub params: BTreeMap<String, String>,
    pub headers: Vec<(String, String)>,
    /// JSON request body
    pub body: Option<Value>,
}

impl ODataRequest {
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            params: BTreeMap::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Sends [`ODataRequest`]s and decodes the JSON response.
///
/// `Ok(None)` means the server answered without a body (e.g. `204`).
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: ODataRequest) -> Result<Option<Value>, HttpError>;
}

#[async_trait]
impl HttpTransport for HttpClient {
    async fn execute(&self, request: ODataRequest) -> Result<Option<Value>, HttpError> {
        let mut builder = self.request(request.method, &request.url);
        for (name, value) in request.params {
            builder = builder.query(name, value);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body)?;
        }
        builder.send().await?.json_opt().await
    }
}
