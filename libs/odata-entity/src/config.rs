//! Layered service configuration.
//!
//! Sources, later ones winning: built-in defaults, an optional YAML file,
//! then `ODATA_*` environment variables (`__` separates nested keys, e.g.
//! `ODATA_HTTP__TIMEOUT=5s`).

use crate::error::ODataError;
use crate::service::UpdateMethod;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use odata_http::{HttpClient, HttpClientBuilder, HttpClientConfig, HttpError, TransportSecurity};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix of the environment variables read by [`ODataServiceConfig::load`]
pub const ENV_PREFIX: &str = "ODATA_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ODataServiceConfig {
    /// Collection URL of the entity set, e.g. `https://host/odata/Products`
    pub api_root: String,
    pub update_method: UpdateMethod,
    pub http: HttpSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpSettings {
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub user_agent: String,
    pub max_body_size: usize,
    /// Accept `http://` roots (local development only)
    pub allow_insecure_http: bool,
    /// Idle pooled connections are closed after this long; `null` keeps them
    #[serde(with = "humantime_serde")]
    pub pool_idle_timeout: Option<Duration>,
    pub pool_max_idle_per_host: usize,
}

impl Default for ODataServiceConfig {
    fn default() -> Self {
        Self {
            api_root: String::new(),
            update_method: UpdateMethod::default(),
            http: HttpSettings::default(),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        let defaults = HttpClientConfig::default();
        Self {
            timeout: defaults.request_timeout,
            user_agent: defaults.user_agent,
            max_body_size: defaults.max_body_size,
            allow_insecure_http: false,
            pool_idle_timeout: defaults.pool_idle_timeout,
            pool_max_idle_per_host: defaults.pool_max_idle_per_host,
        }
    }
}

impl ODataServiceConfig {
    /// Defaults, then `yaml` if given, then `ODATA_*` environment variables.
    ///
    /// # Errors
    /// Returns `ODataError::Config` if a source cannot be read or a value has
    /// the wrong shape.
    pub fn load(yaml: Option<&Path>) -> Result<Self, ODataError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = yaml {
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(&figment)
    }

    /// Extract from a caller-assembled figment.
    ///
    /// # Errors
    /// Returns `ODataError::Config` on extraction failure.
    pub fn from_figment(figment: &Figment) -> Result<Self, ODataError> {
        Ok(figment.extract()?)
    }

    /// Settings for the HTTP client
    #[must_use]
    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            request_timeout: self.http.timeout,
            user_agent: self.http.user_agent.clone(),
            max_body_size: self.http.max_body_size,
            transport: if self.http.allow_insecure_http {
                TransportSecurity::AllowInsecureHttp
            } else {
                TransportSecurity::TlsOnly
            },
            pool_idle_timeout: self.http.pool_idle_timeout,
            pool_max_idle_per_host: self.http.pool_max_idle_per_host,
        }
    }

    /// Build the HTTP client these settings describe.
    ///
    /// # Errors
    /// Returns `HttpError` if TLS initialization fails or the user agent is
    /// not a valid header value.
    pub fn http_client(&self) -> Result<HttpClient, HttpError> {
        HttpClientBuilder::with_config(self.http_client_config()).build()
    }
}
