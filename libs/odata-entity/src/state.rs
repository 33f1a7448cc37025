//! Observable store state carrying the cached collection metadata.

use futures::Stream;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// Cached copy of the last collection envelope's metadata.
///
/// Both fields start as `None` and are only written by the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ODataMetadata {
    pub context: Option<String>,
    pub count: Option<u64>,
}

/// Store state that carries [`ODataMetadata`].
pub trait ODataState: Clone + Send + Sync + 'static {
    fn odata(&self) -> &ODataMetadata;
    fn odata_mut(&mut self) -> &mut ODataMetadata;
}

impl ODataState for ODataMetadata {
    fn odata(&self) -> &ODataMetadata {
        self
    }

    fn odata_mut(&mut self) -> &mut ODataMetadata {
        self
    }
}

/// Store state the entity service writes fetched and changed entities into.
///
/// Every method works on decoded JSON entities. The defaults ignore the
/// write, which suits states that only track metadata.
pub trait EntityState: ODataState {
    /// Replace all entities
    fn set_all(&mut self, _entities: Vec<Value>) {}

    /// Add entities whose id is not known yet, at the front if `prepend`
    fn add_all(&mut self, _entities: Vec<Value>, _prepend: bool) {}

    /// Insert new entities and merge known ones
    fn upsert_all(&mut self, _entities: Vec<Value>) {}

    /// Insert or merge the entity stored under `id`
    fn upsert_one(&mut self, _id: &str, _entity: Value) {}

    /// Merge `changes` into the entity stored under `id`; unknown ids are ignored
    fn update_one(&mut self, _id: &str, _changes: Value) {}

    fn remove_one(&mut self, _id: &str) {}
}

impl EntityState for ODataMetadata {}

/// Default id property of [`ODataEntityState`]
pub const DEFAULT_ID_KEY: &str = "id";

fn default_id_key() -> String {
    DEFAULT_ID_KEY.to_owned()
}

/// Default entity-store state: entities keyed by id plus `OData` metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ODataEntityState<E> {
    pub entities: HashMap<String, E>,
    /// Ids in insertion order
    pub ids: Vec<String>,
    #[serde(flatten)]
    pub metadata: ODataMetadata,
    /// Property holding the id of entities written by the service
    #[serde(skip, default = "default_id_key")]
    pub id_key: String,
}

impl<E> Default for ODataEntityState<E> {
    fn default() -> Self {
        Self {
            entities: HashMap::new(),
            ids: Vec::new(),
            metadata: ODataMetadata::default(),
            id_key: default_id_key(),
        }
    }
}

impl<E> ODataEntityState<E> {
    /// Read entity ids from `id_key` (e.g. `Id` for `PascalCase` services)
    #[must_use]
    pub fn with_id_key(mut self, id_key: impl Into<String>) -> Self {
        self.id_key = id_key.into();
        self
    }

    /// Replace every entity, keeping metadata.
    pub fn set_entities<I>(&mut self, entities: I)
    where
        I: IntoIterator<Item = (String, E)>,
    {
        self.entities.clear();
        self.ids.clear();
        for (id, entity) in entities {
            self.upsert(id, entity);
        }
    }

    /// Insert or replace one entity; new ids go to the end.
    pub fn upsert(&mut self, id: impl Into<String>, entity: E) {
        let id = id.into();
        if self.entities.insert(id.clone(), entity).is_none() {
            self.ids.push(id);
        }
    }

    /// Insert an entity under a new id. Returns `false` if the id is known.
    pub fn add(&mut self, id: impl Into<String>, entity: E, prepend: bool) -> bool {
        let id = id.into();
        if self.entities.contains_key(&id) {
            return false;
        }
        if prepend {
            self.ids.insert(0, id.clone());
        } else {
            self.ids.push(id.clone());
        }
        self.entities.insert(id, entity);
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<E> {
        let removed = self.entities.remove(id)?;
        self.ids.retain(|known| known != id);
        Some(removed)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&E> {
        self.entities.get(id)
    }

    /// Entities in insertion order.
    pub fn all(&self) -> impl Iterator<Item = &E> {
        self.ids.iter().filter_map(|id| self.entities.get(id))
    }
}

impl<E> ODataEntityState<E>
where
    E: Serialize + DeserializeOwned,
{
    /// Decode entities that carry an id; the others are skipped.
    fn decode_keyed(&self, entities: Vec<Value>) -> Vec<(String, E)> {
        entities
            .into_iter()
            .filter_map(|entity| {
                let Some(id) = entity_id(&entity, &self.id_key) else {
                    tracing::warn!(id_key = %self.id_key, "entity without id not stored");
                    return None;
                };
                let entity = decode(&id, entity)?;
                Some((id, entity))
            })
            .collect()
    }

    /// Known entity with `changes` applied on top, or `changes` alone.
    fn merged(&self, id: &str, changes: Value) -> Option<E> {
        let merged = match (self.entities.get(id).map(serde_json::to_value), changes) {
            (Some(Ok(Value::Object(mut base))), Value::Object(changes)) => {
                base.extend(changes);
                Value::Object(base)
            }
            (Some(Err(e)), _) => {
                tracing::warn!(id, error = %e, "stored entity could not be encoded; not merged");
                return None;
            }
            (_, changes) => changes,
        };
        decode(id, merged)
    }
}

fn entity_id(entity: &Value, id_key: &str) -> Option<String> {
    match entity.get(id_key)? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn decode<E: DeserializeOwned>(id: &str, entity: Value) -> Option<E> {
    match serde_json::from_value(entity) {
        Ok(entity) => Some(entity),
        Err(e) => {
            tracing::warn!(id, error = %e, "entity does not match the store type; not stored");
            None
        }
    }
}

impl<E> ODataState for ODataEntityState<E>
where
    E: Clone + Send + Sync + 'static,
{
    fn odata(&self) -> &ODataMetadata {
        &self.metadata
    }

    fn odata_mut(&mut self) -> &mut ODataMetadata {
        &mut self.metadata
    }
}

impl<E> EntityState for ODataEntityState<E>
where
    E: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn set_all(&mut self, entities: Vec<Value>) {
        let decoded = self.decode_keyed(entities);
        self.set_entities(decoded);
    }

    fn add_all(&mut self, entities: Vec<Value>, prepend: bool) {
        let decoded = self.decode_keyed(entities);
        if prepend {
            // reversed so the batch keeps its own order at the front
            for (id, entity) in decoded.into_iter().rev() {
                self.add(id, entity, true);
            }
        } else {
            for (id, entity) in decoded {
                self.add(id, entity, false);
            }
        }
    }

    fn upsert_all(&mut self, entities: Vec<Value>) {
        for entity in entities {
            if let Some(id) = entity_id(&entity, &self.id_key) {
                self.upsert_one(&id, entity);
            } else {
                tracing::warn!(id_key = %self.id_key, "entity without id not stored");
            }
        }
    }

    fn upsert_one(&mut self, id: &str, entity: Value) {
        if let Some(entity) = self.merged(id, entity) {
            self.upsert(id, entity);
        }
    }

    fn update_one(&mut self, id: &str, changes: Value) {
        if !self.entities.contains_key(id) {
            return;
        }
        if let Some(entity) = self.merged(id, changes) {
            self.upsert(id, entity);
        }
    }

    fn remove_one(&mut self, id: &str) {
        self.remove(id);
    }
}

/// Contract the entity service needs from the host store.
pub trait EntityStore: Send + Sync {
    type State: EntityState;

    /// Store identifier, reported in loading events
    fn name(&self) -> &str;

    /// Snapshot of the current state
    fn current_state(&self) -> Self::State;

    /// Replace the state with a successor computed from the current one.
    ///
    /// Implementations apply the replacement indivisibly relative to readers.
    fn replace_state<F>(&self, successor: F)
    where
        F: FnOnce(&Self::State) -> Self::State;

    /// Current metadata without cloning the whole state where possible
    fn odata_metadata(&self) -> ODataMetadata {
        self.current_state().odata().clone()
    }
}

/// `tokio::sync::watch` backed store.
///
/// Every [`replace_state`](EntityStore::replace_state) runs under the
/// channel's write lock and wakes all subscribers.
#[derive(Debug)]
pub struct Store<S> {
    name: String,
    tx: watch::Sender<S>,
}

impl<S: ODataState> Store<S> {
    #[must_use]
    pub fn new(name: impl Into<String>, initial: S) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            name: name.into(),
            tx,
        }
    }

    /// Receiver observing every state replacement.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.tx.subscribe()
    }

    /// Current cached `@odata.context`
    #[must_use]
    pub fn odata_context(&self) -> Option<String> {
        self.tx.borrow().odata().context.clone()
    }

    /// Current cached `@odata.count`
    #[must_use]
    pub fn odata_count(&self) -> Option<u64> {
        self.tx.borrow().odata().count
    }

    /// Stream of distinct projections of the state, starting with the current one.
    #[must_use]
    pub fn select<T, F>(&self, project: F) -> impl Stream<Item = T> + Send + use<S, T, F>
    where
        T: Clone + PartialEq + Send + 'static,
        F: Fn(&S) -> T + Send + 'static,
    {
        let mut last: Option<T> = None;
        WatchStream::new(self.tx.subscribe()).filter_map(move |state| {
            let next = project(&state);
            let emit = last.as_ref() != Some(&next);
            if emit {
                last = Some(next.clone());
            }
            futures::future::ready(emit.then_some(next))
        })
    }

    /// Distinct values of the cached context
    #[must_use]
    pub fn select_odata_context(&self) -> impl Stream<Item = Option<String>> + Send + use<S> {
        self.select(|s: &S| s.odata().context.clone())
    }

    /// Distinct values of the cached count
    #[must_use]
    pub fn select_odata_count(&self) -> impl Stream<Item = Option<u64>> + Send + use<S> {
        self.select(|s: &S| s.odata().count)
    }
}

impl<S: EntityState> EntityStore for Store<S> {
    type State = S;

    fn name(&self) -> &str {
        &self.name
    }

    fn current_state(&self) -> S {
        self.tx.borrow().clone()
    }

    fn replace_state<F>(&self, successor: F)
    where
        F: FnOnce(&S) -> S,
    {
        self.tx.send_modify(|state| {
            let next = successor(state);
            *state = next;
        });
    }

    fn odata_metadata(&self) -> ODataMetadata {
        self.tx.borrow().odata().clone()
    }
}
