//! Entity service translating store-level CRUD into `OData` requests.

use crate::config::ODataServiceConfig;
use crate::envelope::strip_metadata;
use crate::error::ODataError;
use crate::key::EntityKey;
use crate::loading::{LoadingEvent, LoadingNotifier};
use crate::normalize::normalize;
use crate::state::{EntityState, EntityStore};
use crate::transport::{HttpTransport, ODataRequest};
use http::Method;
use odata_query::QueryParams;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Replaces the default envelope normalization of a single call.
pub type ResponseMapper = Arc<dyn Fn(Option<Value>) -> Option<Value> + Send + Sync>;

/// Full-control hook run after `function`/`action` with the normalized response.
pub type StoreUpdater<St> = Arc<dyn Fn(&St, Option<&Value>) + Send + Sync>;

/// Structured query accepted in place of a raw parameter map.
pub type SharedQuery = Arc<dyn QueryParams + Send + Sync>;

/// HTTP method used by [`ODataEntityService::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UpdateMethod {
    #[default]
    #[serde(alias = "patch")]
    Patch,
    #[serde(alias = "put")]
    Put,
}

impl UpdateMethod {
    #[must_use]
    pub fn as_method(self) -> Method {
        match self {
            UpdateMethod::Patch => Method::PATCH,
            UpdateMethod::Put => Method::PUT,
        }
    }
}

/// Store write performed with the entities of a collection `get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionWrite {
    /// Replace every stored entity
    #[default]
    Set,
    /// Add entities with unknown ids after the stored ones
    Append,
    /// Insert unknown entities, merge known ones
    Upsert,
}

/// Per-call options for `get`, `add`, `update` and `delete`.
#[derive(Clone, Default)]
pub struct RequestConfig {
    /// Full URL replacing the one derived from the API root
    pub url: Option<String>,
    /// Explicit query parameters; override same-named query-derived ones
    pub params: BTreeMap<String, String>,
    pub headers: Vec<(String, String)>,
    pub query: Option<SharedQuery>,
    pub map_response: Option<ResponseMapper>,
    /// Only read by `update`
    pub method: Option<UpdateMethod>,
    /// How a collection `get` writes the fetched entities
    pub collection_write: CollectionWrite,
    /// `add`: put the created entity first
    pub prepend: bool,
    /// Leave the store's entities untouched
    pub skip_write: bool,
}

impl RequestConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_query<Q>(mut self, query: Q) -> Self
    where
        Q: QueryParams + Send + Sync + 'static,
    {
        self.query = Some(Arc::new(query));
        self
    }

    #[must_use]
    pub fn with_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(Option<Value>) -> Option<Value> + Send + Sync + 'static,
    {
        self.map_response = Some(Arc::new(mapper));
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: UpdateMethod) -> Self {
        self.method = Some(method);
        self
    }

    #[must_use]
    pub fn with_append(mut self) -> Self {
        self.collection_write = CollectionWrite::Append;
        self
    }

    #[must_use]
    pub fn with_upsert(mut self) -> Self {
        self.collection_write = CollectionWrite::Upsert;
        self
    }

    #[must_use]
    pub fn with_prepend(mut self) -> Self {
        self.prepend = true;
        self
    }

    #[must_use]
    pub fn skip_write(mut self) -> Self {
        self.skip_write = true;
        self
    }

    /// Query mapping first, explicit params on top.
    fn merged_params(&self) -> BTreeMap<String, String> {
        merge_params(self.query.as_deref(), &self.params)
    }
}

impl fmt::Debug for RequestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestConfig")
            .field("url", &self.url)
            .field("params", &self.params)
            .field("headers", &self.headers)
            .field("query", &self.query.as_ref().map(|q| q.to_query_string()))
            .field("map_response", &self.map_response.is_some())
            .field("method", &self.method)
            .field("collection_write", &self.collection_write)
            .field("prepend", &self.prepend)
            .field("skip_write", &self.skip_write)
            .finish()
    }
}

/// What a `function`/`action` call is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationTarget {
    /// `<api-root>/<name>`
    Collection,
    /// `<api-root>(<key>)/<name>`
    Entity(EntityKey),
}

impl OperationTarget {
    #[must_use]
    pub fn key(&self) -> Option<&EntityKey> {
        match self {
            OperationTarget::Collection => None,
            OperationTarget::Entity(key) => Some(key),
        }
    }
}

/// Options for `function` and `action`.
pub struct OperationConfig<St> {
    pub url: Option<String>,
    pub query: Option<SharedQuery>,
    /// Function: rendered into the call's parentheses. Action: POST body.
    pub params: Map<String, Value>,
    /// Schema namespace prefixed to the operation name
    pub namespace: Option<String>,
    pub store_updater: Option<StoreUpdater<St>>,
}

impl<St> Default for OperationConfig<St> {
    fn default() -> Self {
        Self {
            url: None,
            query: None,
            params: Map::new(),
            namespace: None,
            store_updater: None,
        }
    }
}

impl<St> Clone for OperationConfig<St> {
    fn clone(&self) -> Self {
        Self {
            url: self.url.clone(),
            query: self.query.clone(),
            params: self.params.clone(),
            namespace: self.namespace.clone(),
            store_updater: self.store_updater.clone(),
        }
    }
}

impl<St> fmt::Debug for OperationConfig<St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationConfig")
            .field("url", &self.url)
            .field("query", &self.query.as_ref().map(|q| q.to_query_string()))
            .field("params", &self.params)
            .field("namespace", &self.namespace)
            .field("store_updater", &self.store_updater.is_some())
            .finish()
    }
}

impl<St> OperationConfig<St> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_query<Q>(mut self, query: Q) -> Self
    where
        Q: QueryParams + Send + Sync + 'static,
    {
        self.query = Some(Arc::new(query));
        self
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    #[must_use]
    pub fn with_store_updater<F>(mut self, updater: F) -> Self
    where
        F: Fn(&St, Option<&Value>) + Send + Sync + 'static,
    {
        self.store_updater = Some(Arc::new(updater));
        self
    }

    fn qualified(&self, name: &str) -> String {
        match &self.namespace {
            Some(ns) if !ns.is_empty() => format!("{ns}.{name}"),
            _ => name.to_owned(),
        }
    }
}

/// Entity service bound to one API root, one store, one transport and one
/// loading channel.
pub struct ODataEntityService<St: EntityStore> {
    api: String,
    store: Arc<St>,
    http: Arc<dyn HttpTransport>,
    loader: Arc<dyn LoadingNotifier>,
    update_method: UpdateMethod,
}

impl<St: EntityStore> fmt::Debug for ODataEntityService<St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ODataEntityService")
            .field("api", &self.api)
            .field("store", &self.store.name())
            .field("update_method", &self.update_method)
            .finish_non_exhaustive()
    }
}

impl<St: EntityStore> ODataEntityService<St> {
    #[must_use]
    pub fn new(
        api: impl Into<String>,
        store: Arc<St>,
        http: Arc<dyn HttpTransport>,
        loader: Arc<dyn LoadingNotifier>,
    ) -> Self {
        Self {
            api: api.into(),
            store,
            http,
            loader,
            update_method: UpdateMethod::default(),
        }
    }

    /// Build the service and its HTTP client from configuration.
    ///
    /// # Errors
    /// - `ODataError::InvalidUrl` if `api_root` is not an absolute URL
    /// - `ODataError::Http` if the HTTP client cannot be built
    pub fn from_config(
        config: &ODataServiceConfig,
        store: Arc<St>,
        loader: Arc<dyn LoadingNotifier>,
    ) -> Result<Self, ODataError> {
        url::Url::parse(&config.api_root).map_err(|e| ODataError::InvalidUrl {
            url: config.api_root.clone(),
            reason: e.to_string(),
        })?;
        let http = config.http_client()?;
        Ok(Self::new(config.api_root.clone(), store, Arc::new(http), loader)
            .with_update_method(config.update_method))
    }

    /// Default method for [`update`](Self::update)
    #[must_use]
    pub fn with_update_method(mut self, method: UpdateMethod) -> Self {
        self.update_method = method;
        self
    }

    #[must_use]
    pub fn api(&self) -> &str {
        &self.api
    }

    #[must_use]
    pub fn store(&self) -> &Arc<St> {
        &self.store
    }

    /// `url_override` if given, else `<api>(<key>)` or `<api>`.
    #[must_use]
    pub fn resolve_url(&self, url_override: Option<&str>, key: Option<&EntityKey>) -> String {
        match (url_override, key) {
            (Some(url), _) => url.to_owned(),
            (None, Some(key)) => format!("{}({key})", self.api),
            (None, None) => self.api.clone(),
        }
    }

    /// GET the collection (`key == None`) or one entity.
    ///
    /// Collections come back as the bare `value` array; their metadata is
    /// synced into the store and their entities replace the stored ones
    /// (or are appended/upserted, see [`RequestConfig`]). A single entity is
    /// upserted under its key.
    ///
    /// # Errors
    /// Returns `ODataError::Http` when the request fails.
    pub async fn get(
        &self,
        key: Option<&EntityKey>,
        config: RequestConfig,
    ) -> Result<Option<Value>, ODataError> {
        let url = self.resolve_url(config.url.as_deref(), key);
        let request = ODataRequest::new(Method::GET, url);

        self.dispatch_loading(true, &Method::GET, key);
        let result = self.send(request, &config).await;
        if let Ok(data) = &result {
            match (key, data) {
                (Some(key), Some(entity)) => {
                    let id = key.id();
                    self.write(&config, |state| state.upsert_one(&id, entity.clone()));
                }
                (None, Some(Value::Array(entities))) => {
                    self.write(&config, |state| match config.collection_write {
                        CollectionWrite::Set => state.set_all(entities.clone()),
                        CollectionWrite::Append => state.add_all(entities.clone(), false),
                        CollectionWrite::Upsert => state.upsert_all(entities.clone()),
                    });
                }
                _ => {}
            }
        }
        self.dispatch_loading(false, &Method::GET, key);
        result
    }

    /// GET the collection and deserialize its entities.
    ///
    /// # Errors
    /// Returns `ODataError::Http` on transport failure and `ODataError::Json`
    /// if an entity does not match `T`.
    pub async fn get_all<T: DeserializeOwned>(
        &self,
        config: RequestConfig,
    ) -> Result<Vec<T>, ODataError> {
        match self.get(None, config).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    /// GET one entity and deserialize it.
    ///
    /// # Errors
    /// Returns `ODataError::Http` on transport failure (including `404`) and
    /// `ODataError::Json` if the entity does not match `T`.
    pub async fn get_by_id<T: DeserializeOwned>(
        &self,
        key: &EntityKey,
        config: RequestConfig,
    ) -> Result<Option<T>, ODataError> {
        self.get(Some(key), config)
            .await?
            .map(serde_json::from_value)
            .transpose()
            .map_err(ODataError::from)
    }

    /// POST a new entity to the collection and add the created one to the store.
    ///
    /// # Errors
    /// Returns `ODataError::Json` if `entity` cannot be serialized and
    /// `ODataError::Http` when the request fails.
    pub async fn add<E: Serialize + ?Sized>(
        &self,
        entity: &E,
        config: RequestConfig,
    ) -> Result<Option<Value>, ODataError> {
        let body = serde_json::to_value(entity)?;
        let url = self.resolve_url(config.url.as_deref(), None);
        let request = ODataRequest::new(Method::POST, url).with_body(body);

        self.dispatch_loading(true, &Method::POST, None);
        let result = self.send(request, &config).await;
        if let Ok(Some(created)) = &result {
            self.write(&config, |state| {
                state.add_all(vec![created.clone()], config.prepend);
            });
        }
        self.dispatch_loading(false, &Method::POST, None);
        result
    }

    /// PATCH (or PUT) an entity and merge the result into the stored one.
    ///
    /// The response loses its metadata properties; an empty or `null`
    /// response yields the submitted entity instead.
    ///
    /// # Errors
    /// Returns `ODataError::Json` if `entity` cannot be serialized and
    /// `ODataError::Http` when the request fails.
    pub async fn update<E: Serialize + ?Sized>(
        &self,
        key: &EntityKey,
        entity: &E,
        config: RequestConfig,
    ) -> Result<Option<Value>, ODataError> {
        let body = serde_json::to_value(entity)?;
        let method = config.method.unwrap_or(self.update_method).as_method();
        let url = self.resolve_url(config.url.as_deref(), Some(key));
        let request = ODataRequest::new(method.clone(), url)
            .with_params(config.merged_params())
            .with_headers(config.headers.clone())
            .with_body(body.clone());

        tracing::debug!(store = self.store.name(), method = %request.method, url = %request.url, "odata update");
        self.dispatch_loading(true, &method, Some(key));
        let result = self.http.execute(request).await.map(|raw| match &config.map_response {
            Some(mapper) => mapper(raw),
            None => Some(match raw {
                Some(Value::Object(response)) => Value::Object(strip_metadata(&response)),
                None | Some(Value::Null) => body,
                Some(other) => other,
            }),
        });
        if let Ok(Some(updated)) = &result {
            let id = key.id();
            self.write(&config, |state| state.update_one(&id, updated.clone()));
        }
        self.dispatch_loading(false, &method, Some(key));
        result.map_err(ODataError::from)
    }

    /// DELETE one entity and remove it from the store.
    ///
    /// # Errors
    /// Returns `ODataError::Http` when the request fails.
    pub async fn delete(
        &self,
        key: &EntityKey,
        config: RequestConfig,
    ) -> Result<Option<Value>, ODataError> {
        let url = self.resolve_url(config.url.as_deref(), Some(key));
        let request = ODataRequest::new(Method::DELETE, url);

        self.dispatch_loading(true, &Method::DELETE, Some(key));
        let result = self.send(request, &config).await;
        if result.is_ok() {
            let id = key.id();
            self.write(&config, |state| state.remove_one(&id));
        }
        self.dispatch_loading(false, &Method::DELETE, Some(key));
        result
    }

    /// Invoke a bound `OData` function with GET.
    ///
    /// URL: `<resolved>/<ns.>name(p1=lit,p2=lit)`.
    ///
    /// A loading event is dispatched before the request and cleared after the
    /// store updater ran. A failed request leaves the loading flag set.
    ///
    /// # Errors
    /// Returns `ODataError::Http` when the request fails.
    pub async fn function(
        &self,
        target: &OperationTarget,
        name: &str,
        config: OperationConfig<St>,
    ) -> Result<Option<Value>, ODataError> {
        let url = format!(
            "{}/{}({})",
            self.resolve_url(config.url.as_deref(), target.key()),
            config.qualified(name),
            function_parameters(&config.params),
        );
        let request = ODataRequest::new(Method::GET, url);
        self.invoke(target, request, &config).await
    }

    /// Invoke a bound `OData` action with POST; `params` become the JSON body.
    ///
    /// URL: `<resolved>/<ns.>name`. Loading events behave as in
    /// [`function`](Self::function).
    ///
    /// # Errors
    /// Returns `ODataError::Http` when the request fails.
    pub async fn action(
        &self,
        target: &OperationTarget,
        name: &str,
        config: OperationConfig<St>,
    ) -> Result<Option<Value>, ODataError> {
        let url = format!(
            "{}/{}",
            self.resolve_url(config.url.as_deref(), target.key()),
            config.qualified(name),
        );
        let request =
            ODataRequest::new(Method::POST, url).with_body(Value::Object(config.params.clone()));
        self.invoke(target, request, &config).await
    }

    async fn send(
        &self,
        request: ODataRequest,
        config: &RequestConfig,
    ) -> Result<Option<Value>, ODataError> {
        let request = request
            .with_params(config.merged_params())
            .with_headers(config.headers.clone());

        tracing::debug!(store = self.store.name(), method = %request.method, url = %request.url, "odata request");
        let raw = self.http.execute(request).await?;

        Ok(match &config.map_response {
            Some(mapper) => mapper(raw),
            None => normalize(self.store.as_ref(), raw),
        })
    }

    async fn invoke(
        &self,
        target: &OperationTarget,
        request: ODataRequest,
        config: &OperationConfig<St>,
    ) -> Result<Option<Value>, ODataError> {
        let method = request.method.clone();
        self.dispatch_loading(true, &method, target.key());

        let request = request.with_params(merge_params(config.query.as_deref(), &BTreeMap::new()));
        tracing::debug!(store = self.store.name(), method = %request.method, url = %request.url, "odata operation");

        // on failure the loading flag stays set
        let raw = self.http.execute(request).await?;
        let response = normalize(self.store.as_ref(), raw);
        if let Some(updater) = &config.store_updater {
            updater(self.store.as_ref(), response.as_ref());
        }

        self.dispatch_loading(false, &method, target.key());
        Ok(response)
    }

    fn dispatch_loading(&self, loading: bool, method: &Method, key: Option<&EntityKey>) {
        self.loader.dispatch(LoadingEvent {
            loading,
            method: method.clone(),
            store_name: self.store.name().to_owned(),
            entity_id: key.map(EntityKey::id),
        });
    }

    /// Apply one entity write to the store unless the call opted out.
    fn write<F>(&self, config: &RequestConfig, apply: F)
    where
        F: FnOnce(&mut St::State),
    {
        if config.skip_write {
            return;
        }
        self.store.replace_state(|state| {
            let mut next = state.clone();
            apply(&mut next);
            next
        });
    }
}

fn merge_params(
    query: Option<&(dyn QueryParams + Send + Sync)>,
    explicit: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut params = query
        .map(QueryParams::to_parameter_mapping)
        .unwrap_or_default();
    params.extend(explicit.iter().map(|(k, v)| (k.clone(), v.clone())));
    params
}

/// `name=literal` pairs joined with `,`.
fn function_parameters(params: &Map<String, Value>) -> String {
    params
        .iter()
        .map(|(name, value)| format!("{name}={}", parameter_literal(value)))
        .collect::<Vec<_>>()
        .join(",")
}

fn parameter_literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => other.to_string(),
    }
}
