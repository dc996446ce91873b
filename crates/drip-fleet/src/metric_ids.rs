//! Per-session metric id cache
//!
//! The backend answers a report with numeric ids for the metric names it has
//! seen. Later submissions send the id instead of the name. Entries are never
//! removed; a newer id for a known name replaces the old one.

use std::collections::HashMap;

use crate::protocol::MetricDescriptor;

#[derive(Debug, Clone, Default)]
pub struct MetricIdCache {
    ids: HashMap<String, String>,
}

impl MetricIdCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key to emit for `name`: its id if resolved, otherwise the name itself
    pub fn key_for<'a>(&'a self, name: &'a str) -> &'a str {
        self.ids.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.ids.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, id: impl Into<String>) {
        self.ids.insert(name.into(), id.into());
    }

    /// Merge descriptors from a report response, returning how many were applied
    pub fn merge(&mut self, descriptors: &[MetricDescriptor]) -> usize {
        let mut applied = 0;
        for descriptor in descriptors {
            match descriptor.id_string() {
                Some(id) => {
                    self.ids.insert(descriptor.name.clone(), id);
                    applied += 1;
                }
                None => {
                    tracing::debug!(
                        "Ignoring descriptor for {} with unusable id {}",
                        descriptor.name,
                        descriptor.id
                    );
                }
            }
        }
        applied
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, id: u64) -> MetricDescriptor {
        MetricDescriptor {
            name: name.to_string(),
            id: id.into(),
        }
    }

    #[test]
    fn test_unresolved_name_is_its_own_key() {
        let cache = MetricIdCache::new();
        assert_eq!(cache.key_for("JVM/Memory/HeapMax"), "JVM/Memory/HeapMax");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_last_write_wins() {
        let mut cache = MetricIdCache::new();
        assert_eq!(cache.merge(&[descriptor("X", 7)]), 1);
        assert_eq!(cache.key_for("X"), "7");

        cache.merge(&[descriptor("X", 9)]);
        assert_eq!(cache.get("X"), Some("9"));
        assert_eq!(cache.key_for("X"), "9");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_empty_merge_keeps_entries() {
        let mut cache = MetricIdCache::new();
        cache.insert("X", "7");
        assert_eq!(cache.merge(&[]), 0);
        assert_eq!(cache.key_for("X"), "7");
    }

    #[test]
    fn test_negative_id_is_skipped() {
        let mut cache = MetricIdCache::new();
        let bad = MetricDescriptor {
            name: "X".to_string(),
            id: serde_json::Number::from(-3i64),
        };
        assert_eq!(cache.merge(&[bad, descriptor("Y", 1)]), 1);
        assert_eq!(cache.get("X"), None);
        assert_eq!(cache.get("Y"), Some("1"));
    }
}
