//! Question-key addressing scheme.
//!
//! Every answerable leaf of an exam document is addressed by a stable
//! string key of the form `{section}_{exerciseId}_{questionIndex}`
//! (writing topics use `writing_{topicId}`). Answers and correction
//! items are re-associated across reloads by these keys alone.

use std::borrow::Cow;

pub(crate) const COMP_PREFIX: &str = "comp_";
pub(crate) const LANG_PREFIX: &str = "lang_";
pub(crate) const LANG_FREE_PREFIX: &str = "lang_free_";
pub(crate) const WRITING_PREFIX: &str = "writing_";

/// Old matching-exercise key form, replaced by `lang_{ex}_0`.
pub(crate) const LEGACY_MATCHING_PREFIX: &str = "lang_match_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Section {
    Comprehension,
    Language,
    LanguageFree,
    Writing,
}

impl Section {
    pub(crate) fn prefix(self) -> &'static str {
        match self {
            Self::Comprehension => COMP_PREFIX,
            Self::Language => LANG_PREFIX,
            Self::LanguageFree => LANG_FREE_PREFIX,
            Self::Writing => WRITING_PREFIX,
        }
    }

    /// Section a key belongs to. `lang_free_` must win over `lang_`.
    pub(crate) fn of(key: &str) -> Option<Self> {
        if key.starts_with(LANG_FREE_PREFIX) {
            Some(Self::LanguageFree)
        } else if key.starts_with(LANG_PREFIX) {
            Some(Self::Language)
        } else if key.starts_with(COMP_PREFIX) {
            Some(Self::Comprehension)
        } else if key.starts_with(WRITING_PREFIX) {
            Some(Self::Writing)
        } else {
            None
        }
    }
}

/// Whether a session-local key addresses an answer. Anything else is
/// never sent to the correction worker.
pub(crate) fn is_answer_key(key: &str) -> bool {
    Section::of(key).is_some()
}

/// Migrate a legacy `lang_match_{ex}` key to `lang_{ex}_0`. Already
/// migrated keys pass through unchanged.
pub(crate) fn migrate_legacy(key: &str) -> Cow<'_, str> {
    match key.strip_prefix(LEGACY_MATCHING_PREFIX) {
        Some(exercise_id) => Cow::Owned(format!("{LANG_PREFIX}{exercise_id}_0")),
        None => Cow::Borrowed(key),
    }
}

pub(crate) fn question_key(section: Section, exercise_id: &str, index: usize) -> String {
    format!("{}{}_{}", section.prefix(), exercise_id, index)
}

pub(crate) fn topic_key(topic_id: &str) -> String {
    format!("{WRITING_PREFIX}{topic_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_resolution_prefers_lang_free() {
        assert_eq!(Section::of("lang_free_2_1"), Some(Section::LanguageFree));
        assert_eq!(Section::of("lang_2_1"), Some(Section::Language));
        assert_eq!(Section::of("comp_1_0"), Some(Section::Comprehension));
        assert_eq!(Section::of("writing_1"), Some(Section::Writing));
        assert_eq!(Section::of("ans_scratch"), None);
    }

    #[test]
    fn migrate_legacy_rewrites_matching_keys() {
        assert_eq!(migrate_legacy("lang_match_7"), "lang_7_0");
        assert_eq!(migrate_legacy("lang_7_0"), "lang_7_0");
        assert_eq!(migrate_legacy("comp_1_0"), "comp_1_0");
    }

    #[test]
    fn question_key_shapes() {
        assert_eq!(question_key(Section::Comprehension, "1", 0), "comp_1_0");
        assert_eq!(question_key(Section::LanguageFree, "3", 2), "lang_free_3_2");
        assert_eq!(topic_key("1"), "writing_1");
    }
}
