use crate::builder::HttpClientBuilder;
use crate::config::TransportSecurity;
use crate::error::HttpError;
use crate::request::RequestBuilder;
use crate::response::ResponseBody;
use bytes::Bytes;
use http::header::HeaderValue;
use http::{Request, Response};
use http_body_util::Full;
use tower::util::BoxCloneSyncService;

/// Type-erased tower stack the client dispatches through
pub type HttpService = BoxCloneSyncService<Request<Full<Bytes>>, Response<ResponseBody>, HttpError>;

/// HTTP client with tower middleware stack
///
/// `HttpClient` is `Clone + Send + Sync`; cloning shares the connection pool.
/// Store it directly, no `Mutex` needed.
///
/// # Example
///
/// ```ignore
/// struct CatalogApi {
///     http: HttpClient,
/// }
///
/// impl CatalogApi {
///     async fn products(&self) -> Result<Option<serde_json::Value>, HttpError> {
///         self.http
///             .get("https://example.com/odata/Products")
///             .send()
///             .await?
///             .json_opt()
///             .await
///     }
/// }
/// ```
#[derive(Clone)]
pub struct HttpClient {
    pub(crate) service: HttpService,
    pub(crate) user_agent: HeaderValue,
    pub(crate) max_body_size: usize,
    pub(crate) transport_security: TransportSecurity,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("user_agent", &self.user_agent)
            .field("max_body_size", &self.max_body_size)
            .field("transport_security", &self.transport_security)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails
    pub fn new() -> Result<Self, HttpError> {
        HttpClientBuilder::new().build()
    }

    /// Create a builder for configuring the HTTP client
    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// Create a request builder for an arbitrary method
    ///
    /// The URL must be absolute (`https://host/path`). Query parameters are
    /// added with [`RequestBuilder::query`].
    pub fn request(&self, method: http::Method, url: &str) -> RequestBuilder {
        RequestBuilder::new(
            self.service.clone(),
            self.user_agent.clone(),
            self.max_body_size,
            method,
            url.to_owned(),
            self.transport_security,
        )
    }

    /// Create a GET request builder
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(http::Method::GET, url)
    }

    /// Create a POST request builder
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(http::Method::POST, url)
    }

    /// Create a PUT request builder
    pub fn put(&self, url: &str) -> RequestBuilder {
        self.request(http::Method::PUT, url)
    }

    /// Create a PATCH request builder
    pub fn patch(&self, url: &str) -> RequestBuilder {
        self.request(http::Method::PATCH, url)
    }

    /// Create a DELETE request builder
    pub fn delete(&self, url: &str) -> RequestBuilder {
        self.request(http::Method::DELETE, url)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn test_client() -> HttpClient {
        HttpClientBuilder::new()
            .allow_insecure_http()
            .build()
            .unwrap()
    }

    #[test]
    fn test_http_client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HttpClient>();
    }

    #[tokio::test]
    async fn test_http_client_get() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(GET).path("/Products");
            then.status(200).json_body(json!({"value": []}));
        });

        let client = test_client();
        let resp = client
            .get(&server.url("/Products"))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), http::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_http_client_patch_and_put() {
        let server = MockServer::start();
        let patch = server.mock(|when, then| {
            when.method(PATCH).path("/Products(1)");
            then.status(204);
        });
        let put = server.mock(|when, then| {
            when.method(PUT).path("/Products(1)");
            then.status(204);
        });

        let client = test_client();
        let url = server.url("/Products(1)");
        client.patch(&url).send().await.unwrap();
        client.put(&url).send().await.unwrap();

        patch.assert();
        put.assert();
    }

    #[tokio::test]
    async fn test_http_client_delete() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(DELETE).path("/Products(9)");
            then.status(204);
        });

        let client = test_client();
        let resp = client
            .delete(&server.url("/Products(9)"))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), http::StatusCode::NO_CONTENT);
        m.assert();
    }

    #[tokio::test]
    async fn test_client_is_clone() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(GET).path("/ping");
            then.status(200);
        });

        let client = test_client();
        let cloned = client.clone();
        client.get(&server.url("/ping")).send().await.unwrap();
        cloned.get(&server.url("/ping")).send().await.unwrap();

        m.assert_hits(2);
    }

    #[tokio::test]
    async fn test_user_agent_header_sent() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(GET)
                .path("/ua")
                .header("user-agent", "catalog-sync/1.0");
            then.status(200);
        });

        let client = HttpClientBuilder::new()
            .allow_insecure_http()
            .user_agent("catalog-sync/1.0")
            .build()
            .unwrap();
        client.get(&server.url("/ua")).send().await.unwrap();

        m.assert();
    }
}
