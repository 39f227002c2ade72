use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::RawDocument;
use crate::id::{DocId, ToDocId};

/// A single stored field value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    /// Identifier of a document of the field's target type.
    Ref(DocId),
    /// A referenced document the driver has already populated.
    Embedded(Box<RawDocument>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Ref(id) => Some(id.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Timestamp(_) => "timestamp",
            Self::Ref(_) => "ref",
            Self::Embedded(_) => "embedded",
        }
    }

    /// Strip driver population: embedded documents become references.
    pub fn dehydrated(&self) -> Value {
        match self {
            Self::Embedded(doc) => Self::Ref(doc.id.clone()),
            other => other.clone(),
        }
    }

    /// Equality as used by query conditions.
    ///
    /// References, embedded documents and identifier strings compare by
    /// canonical id; integers and floats compare numerically.
    pub fn loose_eq(&self, other: &Value) -> bool {
        if let (Some(a), Some(b)) = (self.ref_id(), other.ref_id()) {
            return a == b;
        }
        match (self, other) {
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => (*a as f64) == *b,
            (a, b) => a == b,
        }
    }

    /// Ordering used by sorts and range conditions. `None` across unrelated
    /// kinds. `Null` sorts before everything.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            (Self::Null, _) => Some(Ordering::Less),
            (_, Self::Null) => Some(Ordering::Greater),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Timestamp(a), Self::Timestamp(b)) => Some(a.cmp(b)),
            (a, b) => match (a.ref_id(), b.ref_id()) {
                (Some(x), Some(y)) => Some(x.cmp(&y)),
                _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
            },
        }
    }

    fn ref_id(&self) -> Option<DocId> {
        match self {
            Self::Ref(id) => Some(id.clone()),
            Self::Embedded(doc) => Some(doc.id.clone()),
            Self::String(s) => s.doc_id(),
            _ => None,
        }
    }
}

impl ToDocId for Value {
    fn doc_id(&self) -> Option<DocId> {
        self.ref_id()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(n.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Timestamp(t)
    }
}

impl From<DocId> for Value {
    fn from(id: DocId) -> Self {
        Self::Ref(id)
    }
}

impl From<&DocId> for Value {
    fn from(id: &DocId) -> Self {
        Self::Ref(id.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> DocId {
        DocId::parse(s).unwrap()
    }

    #[test]
    fn refs_compare_with_id_strings() {
        let r = Value::Ref(id("111122223333444455556666"));
        assert!(r.loose_eq(&Value::from("111122223333444455556666")));
        assert!(!r.loose_eq(&Value::from("011222233334444555566667")));
    }

    #[test]
    fn embedded_compares_by_id() {
        let raw = RawDocument::new("User", id("111122223333444455556666"));
        let embedded = Value::Embedded(Box::new(raw));
        assert!(embedded.loose_eq(&Value::Ref(id("111122223333444455556666"))));
        assert_eq!(
            embedded.dehydrated(),
            Value::Ref(id("111122223333444455556666"))
        );
    }

    #[test]
    fn numeric_comparison_crosses_int_and_float() {
        assert!(Value::Int(3).loose_eq(&Value::Float(3.0)));
        assert_eq!(
            Value::Int(2).compare(&Value::Float(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::from("a").compare(&Value::Int(1)), None);
    }

    #[test]
    fn null_sorts_first() {
        assert_eq!(Value::Null.compare(&Value::Int(-5)), Some(Ordering::Less));
        assert_eq!(Value::from("x").compare(&Value::Null), Some(Ordering::Greater));
    }

    #[test]
    fn option_converts_to_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::from("x"));
    }
}
