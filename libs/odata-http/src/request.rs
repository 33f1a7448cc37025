use crate::client::HttpService;
use crate::config::TransportSecurity;
use crate::error::{HttpError, InvalidUriKind};
use crate::response::{HttpResponse, ResponseBody};
use bytes::Bytes;
use http::{Request, Response};
use http::header::{ACCEPT, CONTENT_TYPE, HeaderName, HeaderValue, USER_AGENT};
use http_body_util::Full;
use serde::Serialize;
use tower::ServiceExt;

/// HTTP request builder with fluent API
///
/// Created by [`HttpClient::get`](crate::HttpClient::get),
/// [`HttpClient::post`](crate::HttpClient::post), etc. Errors from header or
/// body configuration are deferred to [`send()`](RequestBuilder::send).
///
/// # Example
///
/// ```ignore
/// let resp = client
///     .post("https://example.com/odata/Products")
///     .header("x-request-id", "123")
///     .query("$select", "Id,Name")
///     .json(&NewProduct { name: "Milk" })?
///     .send()
///     .await?;
/// ```
#[must_use = "RequestBuilder does nothing until .send() is called"]
pub struct RequestBuilder {
    service: HttpService,
    user_agent: HeaderValue,
    max_body_size: usize,
    method: http::Method,
    url: String,
    query: Vec<(String, String)>,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Option<Bytes>,
    /// Error captured during building (deferred to `send()`)
    error: Option<HttpError>,
    transport_security: TransportSecurity,
}

impl RequestBuilder {
    pub(crate) fn new(
        service: HttpService,
        user_agent: HeaderValue,
        max_body_size: usize,
        method: http::Method,
        url: String,
        transport_security: TransportSecurity,
    ) -> Self {
        Self {
            service,
            user_agent,
            max_body_size,
            method,
            url,
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            error: None,
            transport_security,
        }
    }

    /// Add a single header to the request
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }

        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => self.headers.push((name, value)),
            (Err(e), _) => self.error = Some(HttpError::InvalidHeaderName(e)),
            (_, Err(e)) => self.error = Some(HttpError::InvalidHeaderValue(e)),
        }
        self
    }

    /// Append a query parameter; values are percent-encoded on send
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Set request body as JSON
    ///
    /// Sets `content-type: application/json` unless a Content-Type header was
    /// already provided.
    ///
    /// # Errors
    ///
    /// Returns `Err(HttpError::Json)` if serialization fails.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        let json_bytes = serde_json::to_vec(body)?;
        self.body = Some(Bytes::from(json_bytes));
        Ok(self)
    }

    /// Parse the URL, append query pairs and check the scheme against the
    /// transport security mode.
    fn build_uri(&self) -> Result<http::Uri, HttpError> {
        let mut url = url::Url::parse(&self.url).map_err(|e| HttpError::InvalidUri {
            url: self.url.clone(),
            kind: InvalidUriKind::ParseError,
            reason: e.to_string(),
        })?;

        if !url.has_host() {
            return Err(HttpError::InvalidUri {
                url: self.url.clone(),
                kind: InvalidUriKind::MissingAuthority,
                reason: "missing host/authority".to_owned(),
            });
        }

        match url.scheme() {
            "https" => {}
            "http" => {
                if self.transport_security == TransportSecurity::TlsOnly {
                    return Err(HttpError::InvalidScheme {
                        scheme: "http".to_owned(),
                        reason: "HTTPS required (transport security is TlsOnly)".to_owned(),
                    });
                }
            }
            other => {
                return Err(HttpError::InvalidScheme {
                    scheme: other.to_owned(),
                    reason: "only http:// and https:// schemes are supported".to_owned(),
                });
            }
        }

        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }

        url.as_str()
            .parse::<http::Uri>()
            .map_err(|e| HttpError::InvalidUri {
                url: self.url.clone(),
                kind: InvalidUriKind::ParseError,
                reason: e.to_string(),
            })
    }

    fn has_header(&self, name: &HeaderName) -> bool {
        self.headers.iter().any(|(n, _)| n == name)
    }

    /// Send the request and return the response
    ///
    /// Returns `Ok` for every HTTP status; use the body readers on
    /// [`HttpResponse`] to turn non-2xx into errors.
    ///
    /// # Errors
    ///
    /// Returns `HttpError` if:
    /// - Request building failed (invalid headers, URL, scheme)
    /// - Network/transport error
    /// - Request timeout
    pub async fn send(mut self) -> Result<HttpResponse, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        let uri = self.build_uri()?;

        tracing::debug!(method = %self.method, url = %uri, "sending request");

        let has_user_agent = self.has_header(&USER_AGENT);
        let has_accept = self.has_header(&ACCEPT);
        let has_content_type = self.has_header(&CONTENT_TYPE);

        let mut builder = Request::builder().method(self.method).uri(uri);
        if !has_user_agent {
            builder = builder.header(USER_AGENT, self.user_agent);
        }
        if !has_accept {
            builder = builder.header(ACCEPT, "application/json");
        }
        if self.body.is_some() && !has_content_type {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }

        let request = builder
            .body(Full::new(self.body.unwrap_or_default()))
            .map_err(HttpError::RequestBuild)?;

        // the boxed service already yields `HttpError`; no conversion on this path
        let inner: Response<ResponseBody> = self.service.oneshot(request).await?;

        Ok(HttpResponse {
            inner,
            max_body_size: self.max_body_size,
        })
    }
}
