//! Ambient call context.
//!
//! A `CallContext` accompanies one logical request through every nested
//! call. It carries string metadata keyed by header-style names, most
//! importantly `X-Trace-Id`.
//!
//! The context is an immutable value: adding a key produces a new context
//! and leaves the original untouched (copy-on-write). Cloning a context is
//! cheap, the metadata map is shared behind an `Arc`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Metadata key carrying the trace identifier of a call chain.
pub const TRACE_ID_HEADER: &str = "X-Trace-Id";

/// Header-style string metadata.
///
/// Keys are case-sensitive; `X-Trace-Id` and `x-trace-id` are distinct keys
/// here. Transport bridges (see `grpc`) normalize the trace header on the
/// way in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    /// Create empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Insert a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for Metadata
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Ambient context of one logical call chain.
///
/// `metadata()` is `None` until something attaches metadata; interceptors
/// treat a missing map the same as an empty one.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    metadata: Option<Arc<Metadata>>,
}

impl CallContext {
    /// A context with no metadata attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A context carrying `metadata`.
    #[must_use]
    pub fn with_metadata(metadata: Metadata) -> Self {
        Self {
            metadata: Some(Arc::new(metadata)),
        }
    }

    /// Attached metadata, if any.
    #[must_use]
    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_deref()
    }

    /// Look up a metadata value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.metadata().and_then(|md| md.get(key))
    }

    /// The chain's trace id, if one has been established.
    #[must_use]
    pub fn trace_id(&self) -> Option<&str> {
        self.get(TRACE_ID_HEADER)
    }

    /// Return a new context with `key` set to `value`.
    ///
    /// `self` is left unchanged.
    #[must_use]
    pub fn with_value(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut metadata = self.metadata().cloned().unwrap_or_default();
        metadata.insert(key, value);
        Self::with_metadata(metadata)
    }

    /// Whether both contexts share the same metadata allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.metadata, &other.metadata) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_has_no_metadata() {
        let ctx = CallContext::new();
        assert!(ctx.metadata().is_none());
        assert!(ctx.trace_id().is_none());
    }

    #[test]
    fn test_with_value_is_copy_on_write() {
        let original = CallContext::with_metadata(Metadata::from_iter([("User", "alice")]));
        let derived = original.with_value("Region", "eu-west-1");

        assert_eq!(original.get("Region"), None);
        assert_eq!(derived.get("Region"), Some("eu-west-1"));
        assert_eq!(derived.get("User"), Some("alice"));
        assert!(!original.ptr_eq(&derived));
    }

    #[test]
    fn test_with_value_on_empty_context_creates_metadata() {
        let ctx = CallContext::new().with_value(TRACE_ID_HEADER, "abc");
        assert_eq!(ctx.trace_id(), Some("abc"));
        assert_eq!(ctx.metadata().map(Metadata::len), Some(1));
    }

    #[test]
    fn test_clone_shares_metadata() {
        let ctx = CallContext::new().with_value("k", "v");
        let cloned = ctx.clone();
        assert!(ctx.ptr_eq(&cloned));
    }

    #[test]
    fn test_metadata_keys_are_case_sensitive() {
        let md = Metadata::from_iter([("x-trace-id", "lower")]);
        assert!(md.get(TRACE_ID_HEADER).is_none());
        assert_eq!(md.get("x-trace-id"), Some("lower"));
    }

    #[test]
    fn test_metadata_iter_is_key_ordered() {
        let md = Metadata::from_iter([("b", "2"), ("a", "1")]);
        let keys: Vec<&str> = md.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
