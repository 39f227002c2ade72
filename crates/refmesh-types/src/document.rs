use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::{DocId, ToDocId};
use crate::value::Value;

/// Name of the implicit identifier field.
pub const ID_FIELD: &str = "_id";

/// A stored record as the driver sees it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    pub doc_type: String,
    pub id: DocId,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl RawDocument {
    pub fn new(doc_type: impl Into<String>, id: DocId) -> Self {
        Self {
            doc_type: doc_type.into(),
            id,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field assignment.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Field value; `_id` is served from the identifier.
    pub fn get(&self, field: &str) -> Option<Value> {
        if field == ID_FIELD {
            return Some(Value::String(self.id.to_string()));
        }
        self.fields.get(field).cloned()
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    /// Copy with every embedded document replaced by its identifier.
    pub fn dehydrated(&self) -> RawDocument {
        RawDocument {
            doc_type: self.doc_type.clone(),
            id: self.id.clone(),
            fields: self
                .fields
                .iter()
                .map(|(k, v)| (k.clone(), v.dehydrated()))
                .collect(),
        }
    }

    /// Copy restricted to the given fields.
    pub fn project(&self, fields: &[String]) -> RawDocument {
        RawDocument {
            doc_type: self.doc_type.clone(),
            id: self.id.clone(),
            fields: self
                .fields
                .iter()
                .filter(|(k, _)| fields.iter().any(|f| f == *k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

impl ToDocId for RawDocument {
    fn doc_id(&self) -> Option<DocId> {
        Some(self.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawDocument {
        let owner = RawDocument::new("User", DocId::parse("aaaabbbbccccddddeeeeffff").unwrap())
            .with("username", "Jash");
        RawDocument::new("Document", DocId::parse("111122223333444455556666").unwrap())
            .with("filename", "1.tex")
            .with("owner", Value::Embedded(Box::new(owner)))
    }

    #[test]
    fn id_field_is_served_as_string() {
        let doc = sample();
        assert_eq!(
            doc.get(ID_FIELD),
            Some(Value::String("111122223333444455556666".into()))
        );
        assert!(doc.get("missing").is_none());
    }

    #[test]
    fn dehydrate_replaces_embedded_with_ref() {
        let doc = sample().dehydrated();
        assert_eq!(
            doc.get("owner"),
            Some(Value::Ref(DocId::parse("aaaabbbbccccddddeeeeffff").unwrap()))
        );
        assert_eq!(doc.get("filename"), Some(Value::from("1.tex")));
    }

    #[test]
    fn projection_keeps_only_selected_fields() {
        let doc = sample().project(&["filename".to_string()]);
        assert_eq!(doc.fields.len(), 1);
        assert!(doc.get("owner").is_none());
        assert_eq!(doc.id.as_str(), "111122223333444455556666");
    }

    #[test]
    fn json_representation_is_stable() {
        let doc = sample().dehydrated();
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["doc_type"], "Document");
        assert_eq!(json["id"], "111122223333444455556666");
        assert_eq!(json["fields"]["filename"]["String"], "1.tex");
        let back: RawDocument = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc);
    }
}
