use std::fmt;
use uuid::Uuid;

/// Entity key rendered as the `OData` key literal in `<api-root>(<key>)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    /// `Products(7)`
    Int(i64),
    /// `Products('a''b')`; single quotes are doubled
    Str(String),
    /// `Products(3f2504e0-4f89-11d3-9a0c-0305e82c3301)`
    Guid(Uuid),
    /// Written verbatim, e.g. composite keys `OrderId=1,ItemNo=2`
    Raw(String),
}

impl EntityKey {
    /// Composite or otherwise pre-formatted key
    #[must_use]
    pub fn raw(key: impl Into<String>) -> Self {
        Self::Raw(key.into())
    }

    /// Unquoted id value, as stored in entity state and loading events
    #[must_use]
    pub fn id(&self) -> String {
        match self {
            EntityKey::Int(n) => n.to_string(),
            EntityKey::Str(s) | EntityKey::Raw(s) => s.clone(),
            EntityKey::Guid(id) => id.hyphenated().to_string(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Int(n) => write!(f, "{n}"),
            EntityKey::Str(s) => write!(f, "'{}'", s.replace('\'', "''")),
            EntityKey::Guid(id) => write!(f, "{}", id.hyphenated()),
            EntityKey::Raw(raw) => f.write_str(raw),
        }
    }
}

impl From<i64> for EntityKey {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for EntityKey {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<u32> for EntityKey {
    fn from(n: u32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<&str> for EntityKey {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for EntityKey {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Uuid> for EntityKey {
    fn from(id: Uuid) -> Self {
        Self::Guid(id)
    }
}
