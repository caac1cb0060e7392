use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Scalar query-string value.
///
/// Floats are deliberately absent so params stay hashable and usable inside
/// query keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Display for ParamValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Str(value) => f.write_str(value),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Sort direction for list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Ordered query parameters. Key order never affects equality or hashing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryParams(BTreeMap<String, ParamValue>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn page(self, page: u32) -> Self {
        self.with("page", page)
    }

    pub fn per_page(self, per_page: u32) -> Self {
        self.with("perPage", per_page)
    }

    pub fn sort(self, field: impl Into<String>) -> Self {
        self.with("sort", field.into())
    }

    pub fn order(self, order: SortOrder) -> Self {
        self.with("order", order.as_str())
    }

    pub fn search(self, term: impl Into<String>) -> Self {
        self.with("search", term.into())
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// URL-encoded `k=v&k=v` form, keys in sorted order.
    pub fn to_query_string(&self) -> String {
        self.0
            .iter()
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(key),
                    urlencoding::encode(&value.to_string())
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl Display for QueryParams {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("{")?;
        for (index, (key, value)) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}={value}")?;
        }
        f.write_str("}")
    }
}

/// Entity identifier: the backend uses both numeric and string ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceId {
    Int(i64),
    Str(String),
}

impl ResourceId {
    /// Zero and empty ids never identify a real entity.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Int(id) => *id == 0,
            Self::Str(id) => id.trim().is_empty(),
        }
    }
}

impl Display for ResourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Str(id) => f.write_str(id),
        }
    }
}

impl From<i64> for ResourceId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<i32> for ResourceId {
    fn from(id: i32) -> Self {
        Self::Int(i64::from(id))
    }
}

impl From<u32> for ResourceId {
    fn from(id: u32) -> Self {
        Self::Int(i64::from(id))
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self::Str(id.to_owned())
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self::Str(id)
    }
}

impl From<&ResourceId> for ResourceId {
    fn from(id: &ResourceId) -> Self {
        id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_order_does_not_matter() {
        let a = QueryParams::new().page(1).search("aspirin");
        let b = QueryParams::new().search("aspirin").page(1);
        assert_eq!(a, b);
        assert_eq!(a.to_query_string(), b.to_query_string());
    }

    #[test]
    fn query_string_is_encoded() {
        let params = QueryParams::new()
            .search("cold & flu")
            .order(SortOrder::Desc)
            .with("inStock", true);
        assert_eq!(
            params.to_query_string(),
            "inStock=true&order=desc&search=cold%20%26%20flu"
        );
    }

    #[test]
    fn ids_deserialize_from_numbers_and_strings() {
        let numeric: ResourceId = serde_json::from_str("42").expect("numeric id");
        let text: ResourceId = serde_json::from_str("\"sku-7\"").expect("string id");
        assert_eq!(numeric, ResourceId::Int(42));
        assert_eq!(text, ResourceId::Str(String::from("sku-7")));
        assert!(ResourceId::Int(0).is_blank());
        assert!(ResourceId::from(" ").is_blank());
    }
}
