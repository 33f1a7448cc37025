#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! `OData` entity-service adapter for observable client-side stores
//!
//! Translates store-level CRUD (`get`, `add`, `update`, `delete`) and bound
//! operations (`function`, `action`) into `OData` HTTP requests, and unwraps
//! the response envelopes back into plain entity data:
//!
//! - Collection responses (`{"@odata.context", "@odata.count"?, "value": [...]}`)
//!   yield the `value` array; their context and count are mirrored into the
//!   store, only when they changed.
//! - Single-entity responses yield the entity without `@odata.` properties.
//!
//! # Example
//!
//! ```ignore
//! use odata_entity::{
//!     BroadcastLoader, EntityKey, ODataEntityService, ODataEntityState, ODataServiceConfig,
//!     RequestConfig, Store,
//! };
//! use odata_query::ODataQuery;
//! use std::sync::Arc;
//!
//! let config = ODataServiceConfig::load(None)?;
//! let store = Arc::new(Store::new("products", ODataEntityState::<Product>::default()));
//! let service = ODataEntityService::from_config(&config, store.clone(), Arc::new(BroadcastLoader::default()))?;
//!
//! let page: Vec<Product> = service
//!     .get_all(RequestConfig::new().with_query(ODataQuery::new().with_top(20).with_count(true)))
//!     .await?;
//! println!("{} of {:?}", page.len(), store.odata_count());
//!
//! let tea: Option<Product> = service.get_by_id(&EntityKey::from(7), RequestConfig::new()).await?;
//! ```

pub mod config;
pub mod envelope;
pub mod error;
pub mod key;
pub mod loading;
pub mod normalize;
pub mod service;
pub mod state;
pub mod transport;

pub use config::{HttpSettings, ODataServiceConfig};
pub use envelope::{CollectionEnvelope, Envelope, classify, is_collection, strip_metadata};
pub use error::ODataError;
pub use key::EntityKey;
pub use loading::{BroadcastLoader, LoadingEvent, LoadingNotifier};
pub use normalize::{normalize, sync_metadata};
pub use service::{
    CollectionWrite, ODataEntityService, OperationConfig, OperationTarget, RequestConfig, ResponseMapper,
    SharedQuery, StoreUpdater, UpdateMethod,
};
pub use state::{
    DEFAULT_ID_KEY, EntityState, EntityStore, ODataEntityState, ODataMetadata, ODataState, Store,
};
pub use transport::{HttpTransport, ODataRequest};
