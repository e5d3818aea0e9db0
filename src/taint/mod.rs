//! Taint tracker.
//!
//! Provenance tags for data that entered from an untrusted boundary. Taint
//! is advisory metadata: it never blocks an operation by itself. Sink
//! adapters consult it to decide whether validation is required at all, or
//! record it for audit; the decision engine's verdict is orthogonal.
//!
//! Values are never mutated in place. Every transformation produces a new
//! wrapper whose tag set is the union of its inputs — tags are carried
//! forward or added, never removed — which is what makes cross-request
//! concurrent use race-free without synchronization.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An opaque provenance label (e.g. `"untrusted"`, `"http"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaintTag(String);

impl TaintTag {
    pub fn new(label: impl Into<String>) -> Self {
        TaintTag(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaintTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaintTag {
    fn from(label: &str) -> Self {
        TaintTag::new(label)
    }
}

/// A raw value wrapped with a set of taint tags.
///
/// Reading the inner value never destroys the tags; transformations go
/// through [`map`](Tainted::map) and [`join`](Tainted::join) so provenance
/// survives them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tainted<T> {
    inner: T,
    tags: BTreeSet<TaintTag>,
}

impl<T> Tainted<T> {
    pub fn new(inner: T, tags: impl IntoIterator<Item = TaintTag>) -> Self {
        Tainted {
            inner,
            tags: tags.into_iter().collect(),
        }
    }

    /// Wrap a value with no tags (trusted origin).
    pub fn clean(inner: T) -> Self {
        Tainted {
            inner,
            tags: BTreeSet::new(),
        }
    }

    pub fn tags(&self) -> &BTreeSet<TaintTag> {
        &self.tags
    }

    pub fn is_tainted(&self) -> bool {
        !self.tags.is_empty()
    }

    pub fn has_tag(&self, tag: &TaintTag) -> bool {
        self.tags.contains(tag)
    }

    pub fn get(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Return a new wrapper with additional tags (monotonic: existing tags
    /// are kept).
    pub fn with_tags(mut self, extra: impl IntoIterator<Item = TaintTag>) -> Self {
        self.tags.extend(extra);
        self
    }

    /// Transform the inner value, carrying every tag forward.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Tainted<U> {
        Tainted {
            inner: f(self.inner),
            tags: self.tags,
        }
    }

    /// Combine with another tainted value; the result carries the union of
    /// both tag sets.
    pub fn join<U, V>(self, other: Tainted<U>, f: impl FnOnce(T, U) -> V) -> Tainted<V> {
        let mut tags = self.tags;
        tags.extend(other.tags);
        Tainted {
            inner: f(self.inner, other.inner),
            tags,
        }
    }
}

impl Tainted<String> {
    /// String concatenation with taint union.
    pub fn concat(self, other: Tainted<String>) -> Tainted<String> {
        self.join(other, |a, b| a + &b)
    }
}

/// Model composition of two tainted values (string concatenation, template
/// splice): the result carries the union of both tag sets.
///
/// Two string leaves concatenate. For any other pair the right-hand value
/// is taken as the composed result (e.g. a template on the left, the
/// rendered document on the right) and every leaf is re-tagged with the
/// combined provenance.
pub fn union(a: TaintedValue, b: TaintedValue) -> TaintedValue {
    let mut tags = a.tags();
    tags.extend(b.tags());
    match (a, b) {
        (TaintedValue::String(x), TaintedValue::String(y)) => {
            let joined = x.get().clone() + y.get();
            TaintedValue::String(Tainted::new(joined, tags))
        }
        (_, composed) => composed.with_tags(&tags),
    }
}

/// A JSON-like tree whose leaf strings carry taint tags.
///
/// [`TaintedValue::tag`] wraps every leaf string of the input recursively;
/// non-string scalars carry no tags (they cannot smuggle injected text).
#[derive(Debug, Clone, PartialEq)]
pub enum TaintedValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(Tainted<String>),
    Array(Vec<TaintedValue>),
    Object(Vec<(String, TaintedValue)>),
}

impl TaintedValue {
    /// Recursively wrap a value, attaching `tags` to every leaf string.
    pub fn tag(value: &Value, tags: &BTreeSet<TaintTag>) -> Self {
        match value {
            Value::Null => TaintedValue::Null,
            Value::Bool(b) => TaintedValue::Bool(*b),
            Value::Number(n) => TaintedValue::Number(n.clone()),
            Value::String(s) => {
                TaintedValue::String(Tainted::new(s.clone(), tags.iter().cloned()))
            }
            Value::Array(items) => {
                TaintedValue::Array(items.iter().map(|v| Self::tag(v, tags)).collect())
            }
            Value::Object(map) => TaintedValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::tag(v, tags)))
                    .collect(),
            ),
        }
    }

    /// Strip the tags, reconstructing the raw value. Key order is preserved.
    pub fn to_value(&self) -> Value {
        match self {
            TaintedValue::Null => Value::Null,
            TaintedValue::Bool(b) => Value::Bool(*b),
            TaintedValue::Number(n) => Value::Number(n.clone()),
            TaintedValue::String(s) => Value::String(s.get().clone()),
            TaintedValue::Array(items) => {
                Value::Array(items.iter().map(TaintedValue::to_value).collect())
            }
            TaintedValue::Object(entries) => {
                let mut map = Map::new();
                for (k, v) in entries {
                    map.insert(k.clone(), v.to_value());
                }
                Value::Object(map)
            }
        }
    }

    /// Union of the tags on every leaf of the tree.
    pub fn tags(&self) -> BTreeSet<TaintTag> {
        let mut out = BTreeSet::new();
        self.collect_tags(&mut out);
        out
    }

    fn collect_tags(&self, out: &mut BTreeSet<TaintTag>) {
        match self {
            TaintedValue::String(s) => out.extend(s.tags().iter().cloned()),
            TaintedValue::Array(items) => {
                for item in items {
                    item.collect_tags(out);
                }
            }
            TaintedValue::Object(entries) => {
                for (_, v) in entries {
                    v.collect_tags(out);
                }
            }
            _ => {}
        }
    }

    /// Query whether any leaf carries the tag. No side effects.
    pub fn has_tag(&self, tag: &TaintTag) -> bool {
        match self {
            TaintedValue::String(s) => s.has_tag(tag),
            TaintedValue::Array(items) => items.iter().any(|v| v.has_tag(tag)),
            TaintedValue::Object(entries) => entries.iter().any(|(_, v)| v.has_tag(tag)),
            _ => false,
        }
    }

    /// Return a new tree with additional tags on every leaf string
    /// (monotonic).
    pub fn with_tags(self, extra: &BTreeSet<TaintTag>) -> Self {
        match self {
            TaintedValue::String(s) => {
                TaintedValue::String(s.with_tags(extra.iter().cloned()))
            }
            TaintedValue::Array(items) => TaintedValue::Array(
                items.into_iter().map(|v| v.with_tags(extra)).collect(),
            ),
            TaintedValue::Object(entries) => TaintedValue::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, v.with_tags(extra)))
                    .collect(),
            ),
            leaf => leaf,
        }
    }
}

/// Tag a value as coming from an untrusted boundary.
///
/// Convenience over [`TaintedValue::tag`] for callers holding plain labels.
pub fn tag(value: &Value, labels: &[&str]) -> TaintedValue {
    let tags: BTreeSet<TaintTag> = labels.iter().copied().map(TaintTag::from).collect();
    TaintedValue::tag(value, &tags)
}
