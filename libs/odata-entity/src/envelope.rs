//! Classification of decoded `OData` response bodies.
//!
//! This is the only place where the wire names (`@odata.context`,
//! `@odata.count`) are read; everything past it works with [`ODataMetadata`].

use crate::state::ODataMetadata;
use serde_json::{Map, Value};

/// Reserved prefix of protocol metadata properties
pub const ODATA_PREFIX: &str = "@odata.";

/// Wire name of the context marker
pub const ODATA_CONTEXT: &str = "@odata.context";

/// Wire name of the total item count
pub const ODATA_COUNT: &str = "@odata.count";

/// Property holding the entities of a collection response
pub const VALUE_KEY: &str = "value";

/// Result of [`classify`].
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<'a> {
    /// `{ "@odata.context", "@odata.count"?, "value": [...] }`
    Collection(CollectionEnvelope<'a>),
    /// Single entity or any other shape
    NotCollection,
}

/// Borrowed view of a collection response.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionEnvelope<'a> {
    pub metadata: ODataMetadata,
    pub value: &'a [Value],
}

/// Whether `key` names a protocol metadata property.
#[must_use]
pub fn is_metadata_key(key: &str) -> bool {
    key.starts_with(ODATA_PREFIX)
}

/// Classify a decoded JSON object.
///
/// The body is a collection envelope iff its non-metadata keys are exactly
/// `{value}` and `value` is an array (empty arrays qualify). Total: never fails.
#[must_use]
pub fn classify(body: &Map<String, Value>) -> Envelope<'_> {
    let mut data_keys = body.keys().filter(|k| !is_metadata_key(k));
    let only_value = matches!(
        (data_keys.next(), data_keys.next()),
        (Some(key), None) if key == VALUE_KEY
    );
    if !only_value {
        return Envelope::NotCollection;
    }

    match body.get(VALUE_KEY) {
        Some(Value::Array(items)) => Envelope::Collection(CollectionEnvelope {
            metadata: read_metadata(body),
            value: items,
        }),
        _ => Envelope::NotCollection,
    }
}

/// Shorthand for `matches!(classify(body), Envelope::Collection(_))`.
#[must_use]
pub fn is_collection(body: &Map<String, Value>) -> bool {
    matches!(classify(body), Envelope::Collection(_))
}

/// Copy of `body` without any `@odata.`-prefixed property.
#[must_use]
pub fn strip_metadata(body: &Map<String, Value>) -> Map<String, Value> {
    body.iter()
        .filter(|(k, _)| !is_metadata_key(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Translate the wire metadata of an envelope into [`ODataMetadata`].
///
/// Counts are accepted as numbers or as numeric strings
/// (`IEEE754Compatible=true` responses).
#[must_use]
pub fn read_metadata(body: &Map<String, Value>) -> ODataMetadata {
    let context = body
        .get(ODATA_CONTEXT)
        .and_then(Value::as_str)
        .map(str::to_owned);
    let count = body.get(ODATA_COUNT).and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
    });
    ODataMetadata { context, count }
}
