//! Vocabulary entries.
//!
//! A [`Vocab`] is a node of the walk corpus: its row in the embedding matrices
//! plus its corpus frequency. Drivers that need extra bookkeeping (labels,
//! Huffman codes, sample weights) attach it as named attributes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A single vocabulary item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vocab {
    /// Row in the node/context embedding matrices.
    pub index: usize,
    /// Corpus frequency, used when building the sampling table.
    pub count: u64,
    /// Extra named attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, Value>,
}

impl Vocab {
    /// Create an entry with a zero count.
    pub fn new(index: usize) -> Self {
        Self {
            index,
            count: 0,
            attrs: BTreeMap::new(),
        }
    }

    /// Set the corpus count.
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }

    /// Attach a named attribute.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Set a named attribute, returning the previous value.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.attrs.insert(key.into(), value.into())
    }

    /// Look up a named attribute.
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    /// Compare two entries by frequency.
    pub fn cmp_count(&self, other: &Self) -> Ordering {
        self.count.cmp(&other.count)
    }
}

impl fmt::Display for Vocab {
    /// `<count:3, index:0, label:"a">`: every public attribute sorted by name.
    /// Names starting with `_` are private and omitted.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields: BTreeMap<&str, String> = self
            .attrs
            .iter()
            .filter(|(k, _)| !k.starts_with('_'))
            .map(|(k, v)| (k.as_str(), v.to_string()))
            .collect();
        fields.insert("count", self.count.to_string());
        fields.insert("index", self.index.to_string());

        write!(f, "<")?;
        for (i, (k, v)) in fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}:{v}")?;
        }
        write!(f, ">")
    }
}

/// Orders a borrowed [`Vocab`] by `count` alone, for heaps and sorts.
#[derive(Debug, Clone, Copy)]
pub struct ByCount<'a>(pub &'a Vocab);

impl PartialEq for ByCount<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.0.count == other.0.count
    }
}

impl Eq for ByCount<'_> {}

impl PartialOrd for ByCount<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ByCount<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp_count(other.0)
    }
}
