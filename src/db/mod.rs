//! Document store layer.
//!
//! A [`DocumentStore`] is the thin seam to the managed document database:
//! untyped JSON documents addressed by collection name and id. The typed
//! [`Collection`] façade sits on top and is what handlers use.

mod collection;
mod firestore;
mod memory;

pub use collection::{Collection, CollectionError, Record};
pub use firestore::FirestoreStore;
pub use memory::MemoryDocumentStore;

use std::cmp::Ordering;

use async_trait::async_trait;
use serde_json::Value;

/// A schema-less document body.
pub type Document = serde_json::Map<String, Value>;

/// Comparison operators supported by field queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    ArrayContains,
}

impl FilterOp {
    /// Operator name as the Firestore query API spells it.
    pub fn as_firestore(&self) -> &'static str {
        match self {
            Self::Equal => "EQUAL",
            Self::NotEqual => "NOT_EQUAL",
            Self::LessThan => "LESS_THAN",
            Self::LessThanOrEqual => "LESS_THAN_OR_EQUAL",
            Self::GreaterThan => "GREATER_THAN",
            Self::GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
            Self::ArrayContains => "ARRAY_CONTAINS",
        }
    }

    /// Evaluate the operator locally. Values of different kinds never order.
    pub fn matches(&self, actual: &Value, expected: &Value) -> bool {
        match self {
            Self::Equal => actual == expected,
            Self::NotEqual => actual != expected,
            Self::ArrayContains => actual
                .as_array()
                .map(|items| items.contains(expected))
                .unwrap_or(false),
            ordered => match compare(actual, expected) {
                Some(ord) => match ordered {
                    Self::LessThan => ord == Ordering::Less,
                    Self::LessThanOrEqual => ord != Ordering::Greater,
                    Self::GreaterThan => ord == Ordering::Greater,
                    _ => ord != Ordering::Less,
                },
                None => false,
            },
        }
    }
}

impl std::str::FromStr for FilterOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "==" => Ok(Self::Equal),
            "!=" => Ok(Self::NotEqual),
            "<" => Ok(Self::LessThan),
            "<=" => Ok(Self::LessThanOrEqual),
            ">" => Ok(Self::GreaterThan),
            ">=" => Ok(Self::GreaterThanOrEqual),
            "array-contains" => Ok(Self::ArrayContains),
            _ => Err(format!("Unknown filter operator: {}", s)),
        }
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// A single-field query condition.
#[derive(Debug, Clone)]
pub struct FieldFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl FieldFilter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("credentials: {0}")]
    Auth(#[from] crate::gcp::TokenError),
}

/// Raw access to a document database.
///
/// Implementations perform exactly one backend round trip per call (plus
/// pagination) and never retry.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every document in a collection, optionally restricted to `fields`.
    async fn list(
        &self,
        collection: &str,
        fields: Option<&[&str]>,
    ) -> Result<Vec<Document>, StoreError>;

    /// Documents whose field satisfies the filter.
    async fn query(&self, collection: &str, filter: &FieldFilter)
        -> Result<Vec<Document>, StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Create or fully replace a document.
    async fn set(&self, collection: &str, id: &str, doc: Document) -> Result<(), StoreError>;

    /// Overwrite the given top-level fields of an existing document.
    async fn merge(&self, collection: &str, id: &str, fields: Document) -> Result<(), StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(FilterOp::Equal, json!("a"), json!("a"), true)]
    #[case(FilterOp::Equal, json!("a"), json!("b"), false)]
    #[case(FilterOp::NotEqual, json!(1), json!(2), true)]
    #[case(FilterOp::LessThan, json!(1), json!(2), true)]
    #[case(FilterOp::LessThanOrEqual, json!(2), json!(2), true)]
    #[case(FilterOp::GreaterThan, json!("b"), json!("a"), true)]
    #[case(FilterOp::GreaterThanOrEqual, json!(1.5), json!(2), false)]
    #[case(FilterOp::GreaterThan, json!("1"), json!(0), false)]
    #[case(FilterOp::ArrayContains, json!(["rust", "go"]), json!("go"), true)]
    #[case(FilterOp::ArrayContains, json!("rust"), json!("rust"), false)]
    fn test_filter_op_matches(
        #[case] op: FilterOp,
        #[case] actual: Value,
        #[case] expected: Value,
        #[case] result: bool,
    ) {
        assert_eq!(op.matches(&actual, &expected), result);
    }

    #[test]
    fn test_filter_op_parses_query_syntax() {
        assert_eq!("==".parse::<FilterOp>().unwrap(), FilterOp::Equal);
        assert_eq!(
            "array-contains".parse::<FilterOp>().unwrap(),
            FilterOp::ArrayContains
        );
        assert!("~=".parse::<FilterOp>().is_err());
    }
}
