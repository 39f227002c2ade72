use std::cmp::Ordering;

use refmesh_types::{RawDocument, Value};

/// A predicate on one field.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    /// Equal to the value. `Eq(Null)` also matches an absent field.
    Eq(Value),
    /// Not equal. `Ne(Null)` matches any present, non-null value.
    Ne(Value),
    In(Vec<Value>),
    /// Field is (or is not) present in the stored record.
    Exists(bool),
    Gt(Value),
    Lt(Value),
    /// String value starts with the prefix.
    StartsWith(String),
}

impl Filter {
    pub fn matches(&self, value: Option<&Value>) -> bool {
        let null = Value::Null;
        let v = value.unwrap_or(&null);
        match self {
            Self::Eq(expected) => v.loose_eq(expected),
            Self::Ne(expected) => !v.loose_eq(expected),
            Self::In(options) => options.iter().any(|o| v.loose_eq(o)),
            Self::Exists(wanted) => value.is_some() == *wanted,
            Self::Gt(bound) => !v.is_null() && v.compare(bound) == Some(Ordering::Greater),
            Self::Lt(bound) => !v.is_null() && v.compare(bound) == Some(Ordering::Less),
            Self::StartsWith(prefix) => matches!(v, Value::String(s) if s.starts_with(prefix)),
        }
    }
}

/// Conjunction of field filters, in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Conditions {
    clauses: Vec<(String, Filter)>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, field: impl Into<String>, filter: Filter) -> Self {
        self.clauses.push((field.into(), filter));
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, Filter::Eq(value.into()))
    }

    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, Filter::Ne(value.into()))
    }

    pub fn is_in<V: Into<Value>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.push(field, Filter::In(values.into_iter().map(Into::into).collect()))
    }

    pub fn exists(self, field: impl Into<String>, wanted: bool) -> Self {
        self.push(field, Filter::Exists(wanted))
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, Filter::Gt(value.into()))
    }

    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, Filter::Lt(value.into()))
    }

    pub fn starts_with(self, field: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.push(field, Filter::StartsWith(prefix.into()))
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Field paths named by the clauses.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.clauses.iter().map(|(f, _)| f.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Filter)> {
        self.clauses.iter().map(|(f, c)| (f.as_str(), c))
    }

    /// Evaluate against a stored record. Only top-level fields and `_id`
    /// are addressable.
    pub fn matches(&self, doc: &RawDocument) -> bool {
        self.clauses
            .iter()
            .all(|(field, filter)| filter.matches(doc.get(field).as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refmesh_types::DocId;

    fn user() -> RawDocument {
        RawDocument::new("User", DocId::parse("111122223333444455556666").unwrap())
            .with("username", "Streams Jorsh 1")
            .with("age", 31)
            .with("favorite_document", DocId::parse("aaaabbbbccccddddeeeeffff").unwrap())
            .with("password", Value::Null)
    }

    #[test]
    fn empty_conditions_match_everything() {
        assert!(Conditions::new().matches(&user()));
    }

    #[test]
    fn equality_on_refs_accepts_id_strings() {
        let c = Conditions::new().eq("favorite_document", "aaaabbbbccccddddeeeeffff");
        assert!(c.matches(&user()));
        let c = Conditions::new().eq("_id", "111122223333444455556666");
        assert!(c.matches(&user()));
    }

    #[test]
    fn ne_null_requires_a_value() {
        assert!(Conditions::new().ne("favorite_document", Value::Null).matches(&user()));
        assert!(!Conditions::new().ne("password", Value::Null).matches(&user()));
        assert!(!Conditions::new().ne("email", Value::Null).matches(&user()));
    }

    #[test]
    fn range_and_prefix_filters() {
        assert!(Conditions::new().gt("age", 30).lt("age", 32).matches(&user()));
        assert!(!Conditions::new().gt("age", 31).matches(&user()));
        assert!(Conditions::new().starts_with("username", "Streams Jorsh").matches(&user()));
        assert!(!Conditions::new().starts_with("age", "3").matches(&user()));
    }

    #[test]
    fn exists_and_in() {
        assert!(Conditions::new().exists("password", true).matches(&user()));
        assert!(Conditions::new().exists("email", false).matches(&user()));
        assert!(Conditions::new().is_in("age", [1, 31]).matches(&user()));
        assert!(!Conditions::new().is_in("age", [1, 2]).matches(&user()));
    }

    #[test]
    fn all_clauses_must_hold() {
        let c = Conditions::new().eq("age", 31).eq("username", "someone else");
        assert!(!c.matches(&user()));
        assert_eq!(c.fields().collect::<Vec<_>>(), ["age", "username"]);
    }
}
