use crate::client::{HttpClient, HttpService};
use crate::config::{HttpClientConfig, TransportSecurity};
use crate::error::HttpError;
use crate::response::ResponseBody;
use bytes::Bytes;
use http::Response;
use http::header::HeaderValue;
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower::ServiceExt;
use tower::timeout::TimeoutLayer;
use tower_http::decompression::DecompressionLayer;

/// Builds an [`HttpClient`] from an [`HttpClientConfig`].
///
/// Stack, outermost first: timeout, decompression, pooled hyper client.
pub struct HttpClientBuilder {
    config: HttpClientConfig,
}

impl HttpClientBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HttpClientConfig::default())
    }

    #[must_use]
    pub fn with_config(config: HttpClientConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    /// Accept `http://` URLs; debug builds or the `allow-insecure-http` feature only
    #[must_use]
    #[cfg(any(debug_assertions, feature = "allow-insecure-http"))]
    pub fn allow_insecure_http(mut self) -> Self {
        self.config.transport = TransportSecurity::AllowInsecureHttp;
        self
    }

    /// # Errors
    /// `HttpError::Tls` if the TLS connector cannot be set up and
    /// `HttpError::InvalidHeaderValue` for an unusable user agent.
    pub fn build(self) -> Result<HttpClient, HttpError> {
        let HttpClientConfig {
            request_timeout,
            user_agent,
            max_body_size,
            transport,
            pool_idle_timeout,
            pool_max_idle_per_host,
        } = self.config;

        if transport == TransportSecurity::AllowInsecureHttp {
            tracing::warn!(
                target: "odata_http::security",
                "plain HTTP allowed; traffic is not encrypted"
            );
        }
        let user_agent = HeaderValue::try_from(user_agent)?;

        let mut pool = Client::builder(TokioExecutor::new());
        // the idle timeout is only enforced with a pool timer
        pool.pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(pool_max_idle_per_host)
            .pool_idle_timeout(pool_idle_timeout);
        let hyper_client = pool.build::<_, Full<Bytes>>(https_connector(transport)?);

        let service = ServiceBuilder::new()
            .layer(TimeoutLayer::new(request_timeout))
            .layer(DecompressionLayer::new())
            .service(hyper_client)
            .map_response(|response: Response<_>| response.map(box_body))
            .map_err(move |e: tower::BoxError| service_error(e, request_timeout));

        Ok(HttpClient {
            service: HttpService::new(service),
            user_agent,
            max_body_size,
            transport_security: transport,
        })
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Elapsed timers become `Timeout`; everything else is a transport failure.
fn service_error(err: tower::BoxError, timeout: Duration) -> HttpError {
    if err.is::<tower::timeout::error::Elapsed>() {
        HttpError::Timeout(timeout)
    } else {
        HttpError::Transport(err)
    }
}

fn box_body<B>(body: B) -> ResponseBody
where
    B: hyper::body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<tower::BoxError>,
{
    body.map_err(Into::into).boxed()
}

/// Rustls connector over the bundled webpki roots, ALPN h2 + http/1.1.
fn https_connector(
    transport: TransportSecurity,
) -> Result<HttpsConnector<HttpConnector>, HttpError> {
    let provider = rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()));

    let builder = hyper_rustls::HttpsConnectorBuilder::new()
        .with_provider_and_webpki_roots(provider)
        .map_err(|e| HttpError::Tls(Box::new(e)))?;

    Ok(match transport {
        TransportSecurity::TlsOnly => builder.https_only().enable_all_versions().build(),
        TransportSecurity::AllowInsecureHttp => {
            builder.https_or_http().enable_all_versions().build()
        }
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::DEFAULT_USER_AGENT;

    #[test]
    fn test_builder_defaults_to_tls_only() {
        let builder = HttpClientBuilder::new();
        assert_eq!(builder.config.request_timeout, Duration::from_secs(30));
        assert_eq!(builder.config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(builder.config.transport, TransportSecurity::TlsOnly);
    }

    #[tokio::test]
    async fn test_builder_takes_pool_settings_from_config() {
        let config = HttpClientConfig {
            pool_idle_timeout: None,
            pool_max_idle_per_host: 4,
            ..HttpClientConfig::default()
        };
        let builder = HttpClientBuilder::with_config(config)
            .timeout(Duration::from_secs(3))
            .user_agent("shop-admin/2.1")
            .max_body_size(512);

        assert_eq!(builder.config.pool_idle_timeout, None);
        assert_eq!(builder.config.pool_max_idle_per_host, 4);

        let client = builder.build().unwrap();
        assert_eq!(client.max_body_size, 512);
        assert_eq!(client.user_agent, "shop-admin/2.1");
    }

    #[tokio::test]
    async fn test_invalid_user_agent_rejected() {
        let result = HttpClientBuilder::new().user_agent("bad\nagent").build();
        assert!(matches!(result, Err(HttpError::InvalidHeaderValue(_))));
    }

    #[test]
    fn test_elapsed_maps_to_timeout() {
        let err: tower::BoxError = Box::new(tower::timeout::error::Elapsed::new());
        let mapped = service_error(err, Duration::from_secs(7));
        assert!(matches!(mapped, HttpError::Timeout(d) if d == Duration::from_secs(7)));
    }

    #[test]
    fn test_other_service_errors_are_transport() {
        let err: tower::BoxError = "connection reset".into();
        assert!(matches!(
            service_error(err, Duration::from_secs(1)),
            HttpError::Transport(_)
        ));
    }
}
