//! Session-local answer store.
//!
//! An ordered map from question key to the student's current answer
//! text. Edits land here first; durable flushes to the attempt row are
//! opportunistic and happen again at submission time regardless.

use std::collections::BTreeMap;

use crate::exam::keys;

pub(crate) type AnswerMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct AnswerStore {
    entries: AnswerMap,
}

impl AnswerStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&mut self, question_key: &str, text: impl Into<String>) {
        self.entries.insert(keys::migrate_legacy(question_key).into_owned(), text.into());
    }

    /// Merge a persisted map in, migrating legacy matching keys. Values
    /// already present are overwritten by the loaded ones.
    pub(crate) fn load_from(&mut self, map: &AnswerMap) {
        for (key, value) in map {
            self.entries.insert(keys::migrate_legacy(key).into_owned(), value.clone());
        }
    }

    /// Answers eligible for submission: keys outside the recognized
    /// section prefixes are filtered out here.
    pub(crate) fn get_all(&self) -> AnswerMap {
        self.entries
            .iter()
            .filter(|(key, _)| keys::is_answer_key(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub(crate) fn is_empty(&self) -> bool {
        !self.entries.keys().any(|key| keys::is_answer_key(key))
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Standalone migration over a persisted map, used when a stored map is
/// consumed without going through an [`AnswerStore`].
pub(crate) fn migrate_map(map: &AnswerMap) -> AnswerMap {
    map.iter()
        .map(|(key, value)| (keys::migrate_legacy(key).into_owned(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> AnswerMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn legacy_keys_migrate_on_load() {
        let mut store = AnswerStore::new();
        store.load_from(&map(&[("lang_match_7", "1-a"), ("comp_1_0", "Paris")]));

        let all = store.get_all();
        assert_eq!(all.get("lang_7_0").map(String::as_str), Some("1-a"));
        assert_eq!(all.get("comp_1_0").map(String::as_str), Some("Paris"));
        assert!(!all.contains_key("lang_match_7"));
    }

    #[test]
    fn migration_is_noop_on_migrated_maps() {
        let already = map(&[("lang_7_0", "1-a")]);
        assert_eq!(migrate_map(&already), already);
        assert_eq!(migrate_map(&map(&[("lang_match_7", "1-a")])), already);
    }

    #[test]
    fn get_all_filters_unrecognized_keys() {
        let mut store = AnswerStore::new();
        store.set("comp_1_0", "Paris");
        store.load_from(&map(&[("scratchpad", "notes"), ("view_comp_1_0", "echo")]));

        let all = store.get_all();
        assert_eq!(all.len(), 1);
        assert!(all.contains_key("comp_1_0"));
    }

    #[test]
    fn emptiness_ignores_non_answer_keys() {
        let mut store = AnswerStore::new();
        assert!(store.is_empty());
        store.load_from(&map(&[("scratchpad", "notes")]));
        assert!(store.is_empty());
        store.set("writing_1", "Mon essai");
        assert!(!store.is_empty());
    }

    #[test]
    fn later_writes_win() {
        let mut store = AnswerStore::new();
        store.set("writing_1", "draft");
        store.set("writing_1", "final");
        assert_eq!(store.get_all().get("writing_1").map(String::as_str), Some("final"));
    }
}
