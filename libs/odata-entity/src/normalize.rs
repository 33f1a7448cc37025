//! Envelope normalization and metadata synchronization.

use crate::envelope::{Envelope, VALUE_KEY, classify, strip_metadata};
use crate::state::{EntityStore, ODataMetadata, ODataState};
use serde_json::Value;

/// Unwrap a decoded response body.
///
/// - `None` or a JSON `null` body yields `None` and leaves the store untouched.
/// - A collection envelope syncs its metadata into `store` and yields the
///   `value` array.
/// - Any other object yields a copy without `@odata.` properties.
/// - Non-object bodies are returned as they are.
#[must_use]
pub fn normalize<St>(store: &St, raw: Option<Value>) -> Option<Value>
where
    St: EntityStore + ?Sized,
{
    match raw? {
        Value::Null => None,
        Value::Object(mut body) => {
            let incoming = match classify(&body) {
                Envelope::Collection(envelope) => Some(envelope.metadata),
                Envelope::NotCollection => None,
            };
            match incoming {
                Some(metadata) => {
                    sync_metadata(store, &metadata);
                    body.remove(VALUE_KEY)
                }
                None => Some(Value::Object(strip_metadata(&body))),
            }
        }
        other => Some(other),
    }
}

/// Write `incoming` into the store when it differs from the cached metadata.
///
/// A changed context, or a present and different count, triggers one atomic
/// replacement. Absent, empty or zero values never overwrite what is cached.
pub fn sync_metadata<St>(store: &St, incoming: &ODataMetadata)
where
    St: EntityStore + ?Sized,
{
    let current = store.odata_metadata();
    let count_changed = present_count(incoming).is_some_and(|count| current.count != Some(count));
    let changed = incoming.context != current.context || count_changed;
    if !changed {
        return;
    }

    tracing::debug!(
        store = store.name(),
        context = ?incoming.context,
        count = ?incoming.count,
        "Set OData properties"
    );

    store.replace_state(|state| {
        let mut next = state.clone();
        *next.odata_mut() = merge(state.odata(), incoming);
        next
    });
}

fn present_count(metadata: &ODataMetadata) -> Option<u64> {
    metadata.count.filter(|count| *count != 0)
}

fn merge(cached: &ODataMetadata, incoming: &ODataMetadata) -> ODataMetadata {
    ODataMetadata {
        context: incoming
            .context
            .clone()
            .filter(|context| !context.is_empty())
            .or_else(|| cached.context.clone()),
        count: present_count(incoming).or(cached.count),
    }
}
