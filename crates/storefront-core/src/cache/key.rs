use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::domain::{QueryParams, ResourceId};

/// One element of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    Str(String),
    Int(i64),
    Bool(bool),
    Params(QueryParams),
}

impl Display for KeyPart {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Str(value) => f.write_str(value),
            Self::Int(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Params(params) => write!(f, "{params}"),
        }
    }
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&String> for KeyPart {
    fn from(value: &String) -> Self {
        Self::Str(value.clone())
    }
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for KeyPart {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for KeyPart {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<bool> for KeyPart {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<QueryParams> for KeyPart {
    fn from(params: QueryParams) -> Self {
        Self::Params(params)
    }
}

impl From<&QueryParams> for KeyPart {
    fn from(params: &QueryParams) -> Self {
        Self::Params(params.clone())
    }
}

impl From<ResourceId> for KeyPart {
    fn from(id: ResourceId) -> Self {
        match id {
            ResourceId::Int(id) => Self::Int(id),
            ResourceId::Str(id) => Self::Str(id),
        }
    }
}

impl From<&ResourceId> for KeyPart {
    fn from(id: &ResourceId) -> Self {
        Self::from(id.clone())
    }
}

/// Identity of one cacheable query: an immutable tuple of [`KeyPart`]s.
///
/// Keys compare by value, so two keys built from equal parts address the same
/// cache entry. Cloning is a reference-count bump.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Arc<[KeyPart]>);

impl QueryKey {
    pub fn new<I>(parts: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<KeyPart>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `true` when `prefix` names this key or a family containing it.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// New key with `part` appended.
    pub fn child(&self, part: impl Into<KeyPart>) -> Self {
        Self(self.0.iter().cloned().chain([part.into()]).collect())
    }
}

impl Display for QueryKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("[")?;
        for (index, part) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{part}")?;
        }
        f.write_str("]")
    }
}

/// Builds a [`QueryKey`] from heterogeneous parts.
///
/// ```rust,ignore
/// let key = query_key!["products", "detail", 42];
/// ```
#[macro_export]
macro_rules! query_key {
    ($($part:expr),* $(,)?) => {
        $crate::cache::QueryKey::new::<::std::vec::Vec<$crate::cache::KeyPart>>(
            ::std::vec![$($crate::cache::KeyPart::from($part)),*]
        )
    };
}
