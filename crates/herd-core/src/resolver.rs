//! # Identifier Resolution
//!
//! Batch-scoped maps from an external key to a store id.
//!
//! - [`TempIdMap`]: client temp id → real id, filled as a sync batch mints
//!   records. Later jobs in the same batch resolve their references through it.
//! - [`TagIndex`]: ear tag → real id, filled by the importer before it links
//!   parents.
//!
//! Both live only as long as one call. Nothing is persisted.

use std::collections::HashMap;
use std::hash::Hash;

use crate::types::RecordId;

/// Client-minted ids are negative; the store only ever hands out positive ones.
///
/// ```rust
/// use herd_core::is_temp_id;
///
/// assert!(is_temp_id(-1));
/// assert!(!is_temp_id(1));
/// ```
pub fn is_temp_id(id: RecordId) -> bool {
    id < 0
}

// =============================================================================
// IdResolver
// =============================================================================

/// Key → store id lookup table.
#[derive(Debug, Clone)]
pub struct IdResolver<K> {
    ids: HashMap<K, RecordId>,
}

impl<K: Eq + Hash> Default for IdResolver<K> {
    fn default() -> Self {
        Self {
            ids: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash> IdResolver<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `key → id`, replacing any earlier mapping.
    pub fn remember(&mut self, key: K, id: RecordId) {
        self.ids.insert(key, id);
    }

    pub fn lookup(&self, key: &K) -> Option<RecordId> {
        self.ids.get(key).copied()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.ids.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

// =============================================================================
// Temp Id Map
// =============================================================================

/// Temp id → real id for one sync batch.
pub type TempIdMap = IdResolver<RecordId>;

impl IdResolver<RecordId> {
    /// Maps a reference through the table. Anything not in the table,
    /// real ids included, comes back unchanged.
    pub fn resolve(&self, id: RecordId) -> RecordId {
        self.lookup(&id).unwrap_or(id)
    }

    /// Resolves an optional reference.
    pub fn resolve_opt(&self, id: Option<RecordId>) -> Option<RecordId> {
        id.map(|id| self.resolve(id))
    }

    /// Snapshot of every mapping, for the batch response.
    pub fn to_map(&self) -> HashMap<RecordId, RecordId> {
        self.ids.clone()
    }
}

// =============================================================================
// Tag Index
// =============================================================================

/// Ear tag → real id for one import call.
pub type TagIndex = IdResolver<String>;

impl IdResolver<String> {
    pub fn find(&self, tag: &str) -> Option<RecordId> {
        self.ids.get(tag).copied()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_passes_unknown_ids_through() {
        let mut ids = TempIdMap::new();
        ids.remember(-1, 100);

        assert_eq!(ids.resolve(-1), 100);
        assert_eq!(ids.resolve(-2), -2);
        assert_eq!(ids.resolve(55), 55);
        assert_eq!(ids.resolve_opt(None), None);
        assert_eq!(ids.resolve_opt(Some(-1)), Some(100));
    }

    #[test]
    fn test_later_mapping_replaces_earlier() {
        let mut ids = TempIdMap::new();
        ids.remember(-1, 100);
        ids.remember(-1, 101);

        assert_eq!(ids.len(), 1);
        assert_eq!(ids.resolve(-1), 101);
    }

    #[test]
    fn test_tag_index_lookup() {
        let mut tags = TagIndex::new();
        tags.remember("PL-1".to_string(), 7);

        assert_eq!(tags.find("PL-1"), Some(7));
        assert_eq!(tags.find("PL-2"), None);
        assert!(tags.contains(&"PL-1".to_string()));
    }
}
