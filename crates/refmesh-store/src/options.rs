use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use refmesh_types::RawDocument;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Everything about a find besides its conditions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Sort keys, most significant first.
    pub sort: Vec<(String, SortOrder)>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
    /// Fields to return besides `_id`. `None` returns every field.
    pub projection: Option<Vec<String>>,
    /// Reference fields the driver may populate natively. Drivers only
    /// handle single-segment paths; anything else is left to the caller.
    pub populate: Vec<String>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Order two records by the sort keys.
    pub fn compare(&self, a: &RawDocument, b: &RawDocument) -> Ordering {
        for (field, order) in &self.sort {
            let (va, vb) = (a.get(field), b.get(field));
            let ord = match (va, vb) {
                (Some(x), Some(y)) => x.compare(&y).unwrap_or(Ordering::Equal),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            let ord = match order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Apply sort, skip and limit to a result set.
    pub fn window(&self, mut docs: Vec<RawDocument>) -> Vec<RawDocument> {
        if !self.sort.is_empty() {
            docs.sort_by(|a, b| self.compare(a, b));
        }
        docs.into_iter()
            .skip(self.skip.unwrap_or(0))
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refmesh_types::DocId;

    fn docs() -> Vec<RawDocument> {
        ["b", "c", "a"]
            .iter()
            .map(|name| RawDocument::new("User", DocId::generate()).with("username", *name))
            .collect()
    }

    fn names(docs: &[RawDocument]) -> Vec<String> {
        docs.iter()
            .map(|d| d.get("username").unwrap().as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn sorts_then_windows() {
        let opts = FindOptions {
            sort: vec![("username".into(), SortOrder::Descending)],
            skip: Some(1),
            limit: Some(1),
            ..Default::default()
        };
        assert_eq!(names(&opts.window(docs())), ["b"]);
    }

    #[test]
    fn unsorted_window_keeps_order() {
        let opts = FindOptions {
            limit: Some(2),
            ..Default::default()
        };
        assert_eq!(names(&opts.window(docs())), ["b", "c"]);
    }
}
