//! Answer-key normalizer.
//!
//! Exam documents arrive from the generation workflow in several shapes:
//! array-wrapped, string-encoded (sometimes inside a markdown code
//! fence), wrapped in an envelope field, or using the upstream French
//! vocabulary (`texte`, `exercices`, `consigne`, `sujets`). This module
//! maps every known shape onto one canonical schema and stamps each
//! answerable leaf with a stable question key (see [`crate::exam::keys`]).
//!
//! Normalization is idempotent: feeding a canonical document back
//! through [`normalize`] yields the same value, which matters because
//! the document is re-normalized after every reload from storage.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::exam::keys::{self, Section};

const WRAPPER_KEYS: &[&str] = &["output", "exam", "data", "json"];
const SECTION_KEYS: &[&str] = &["comprehension", "language", "writing", "info"];

#[derive(Debug, Error)]
pub(crate) enum NormalizeError {
    /// The payload text is not valid JSON. The raw text is kept so it
    /// can be surfaced for diagnostics instead of disappearing.
    #[error("exam payload is not valid JSON: {source}")]
    MalformedPayload {
        #[source]
        source: serde_json::Error,
        raw: String,
    },
    #[error("exam document is empty")]
    EmptyDocument,
    #[error("exam document is not a JSON object")]
    NotAnObject { raw: Value },
    #[error("exam document contains none of the comprehension, language or writing sections")]
    NoSections,
    #[error("duplicate question key after normalization: {0}")]
    DuplicateKey(String),
    #[error("exam document does not fit the canonical schema: {0}")]
    Shape(#[from] serde_json::Error),
}

impl NormalizeError {
    /// Raw payload associated with the failure, when one was retained.
    pub(crate) fn raw_payload(&self) -> Option<String> {
        match self {
            Self::MalformedPayload { raw, .. } => Some(raw.clone()),
            Self::NotAnObject { raw } => Some(raw.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ExamContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) info: Option<ExamInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) comprehension: Option<ComprehensionSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) language: Option<LanguageSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) writing: Option<WritingSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ExamInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) duration: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) total_points: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ComprehensionSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) text: Option<String>,
    #[serde(default)]
    pub(crate) exercises: Vec<Exercise>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct LanguageSection {
    #[serde(default)]
    pub(crate) exercises: Vec<Exercise>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct WritingSection {
    #[serde(default)]
    pub(crate) topics: Vec<Topic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Exercise {
    #[serde(default)]
    pub(crate) id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) instruction: Option<String>,
    /// Plain questions. In the language section these are free-answer
    /// questions addressed with the `lang_free_` prefix.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) questions: Vec<Question>,
    /// Guided sub-questions (language section, `lang_` prefix).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) details: Vec<Question>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) matching: Option<Matching>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Question {
    #[serde(default)]
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) text: String,
    #[serde(default)]
    pub(crate) points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Matching {
    #[serde(default)]
    pub(crate) expressions: Vec<MatchItem>,
    #[serde(default)]
    pub(crate) functions: Vec<MatchItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct MatchItem {
    #[serde(default)]
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Topic {
    #[serde(default)]
    pub(crate) id: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub(crate) kind: Option<String>,
    #[serde(default)]
    pub(crate) points: f64,
    #[serde(default)]
    pub(crate) text: String,
}

impl ExamContent {
    pub(crate) fn has_any_section(&self) -> bool {
        self.comprehension.is_some() || self.language.is_some() || self.writing.is_some()
    }

    /// Every question key the document can answer, including the
    /// synthetic `lang_{ex}_0` key of matching exercises.
    pub(crate) fn question_keys(&self) -> Vec<String> {
        let mut out = Vec::new();

        if let Some(comp) = &self.comprehension {
            for exercise in &comp.exercises {
                for question in &exercise.questions {
                    out.push(question.id.clone());
                }
            }
        }

        if let Some(lang) = &self.language {
            for exercise in &lang.exercises {
                if exercise.matching.is_some() {
                    out.push(keys::question_key(Section::Language, &exercise.id, 0));
                }
                for question in &exercise.details {
                    out.push(question.id.clone());
                }
                for question in &exercise.questions {
                    out.push(question.id.clone());
                }
            }
        }

        if let Some(writing) = &self.writing {
            for topic in &writing.topics {
                out.push(topic.id.clone());
            }
        }

        out
    }

    /// Question text for a key, with the comprehension passage attached
    /// when the key belongs to the reading section.
    pub(crate) fn question_text(&self, key: &str) -> Option<(String, Option<String>)> {
        if let Some(comp) = &self.comprehension {
            for exercise in &comp.exercises {
                for question in &exercise.questions {
                    if question.id == key {
                        return Some((question.text.clone(), comp.text.clone()));
                    }
                }
            }
        }

        if let Some(lang) = &self.language {
            for exercise in &lang.exercises {
                for question in exercise.details.iter().chain(&exercise.questions) {
                    if question.id == key {
                        return Some((question.text.clone(), None));
                    }
                }
                if exercise.matching.is_some()
                    && keys::question_key(Section::Language, &exercise.id, 0) == key
                {
                    return Some((
                        exercise.instruction.clone().unwrap_or_default(),
                        None,
                    ));
                }
            }
        }

        if let Some(writing) = &self.writing {
            for topic in &writing.topics {
                if topic.id == key {
                    return Some((topic.text.clone(), None));
                }
            }
        }

        None
    }
}

/// Normalize a raw string payload. Markdown code fences are tolerated;
/// anything that still fails to parse is reported with the raw text
/// attached.
pub(crate) fn normalize_payload(text: &str) -> Result<ExamContent, NormalizeError> {
    let stripped = strip_code_fence(text);
    let value: Value = serde_json::from_str(stripped).map_err(|source| {
        NormalizeError::MalformedPayload { source, raw: text.to_string() }
    })?;
    normalize(&value)
}

/// Normalize raw exam JSON of unknown shape into an [`ExamContent`]
/// with unique question keys.
pub(crate) fn normalize(raw: &Value) -> Result<ExamContent, NormalizeError> {
    let mut doc = unwrap_document(raw)?;

    {
        let obj = doc.as_object_mut().ok_or(NormalizeError::NoSections)?;
        canonicalize_comprehension(obj);
        canonicalize_language(obj);
        canonicalize_writing(obj);
        assign_keys(obj);
    }

    let content: ExamContent = serde_json::from_value(doc)?;

    if !content.has_any_section() {
        return Err(NormalizeError::NoSections);
    }

    let mut seen = HashSet::new();
    for key in content.question_keys() {
        if !seen.insert(key.clone()) {
            return Err(NormalizeError::DuplicateKey(key));
        }
    }

    Ok(content)
}

/// Peel string encoding, array wrapping and envelope fields until the
/// actual exam object is reached.
fn unwrap_document(raw: &Value) -> Result<Value, NormalizeError> {
    let mut current = raw.clone();

    // Each wrapper level removes one layer; a small bound keeps a
    // self-referential envelope from looping.
    for _ in 0..4 {
        match current {
            Value::String(text) => {
                let stripped = strip_code_fence(&text);
                current = serde_json::from_str(stripped).map_err(|source| {
                    NormalizeError::MalformedPayload { source, raw: text.clone() }
                })?;
            }
            Value::Array(items) => {
                current = items.into_iter().next().ok_or(NormalizeError::EmptyDocument)?;
            }
            Value::Object(ref obj) => {
                if has_section_field(obj) {
                    return Ok(current);
                }
                let wrapped = WRAPPER_KEYS.iter().find_map(|key| obj.get(*key)).cloned();
                match wrapped {
                    Some(inner @ (Value::Object(_) | Value::Array(_) | Value::String(_))) => {
                        current = inner;
                    }
                    _ => return Ok(current),
                }
            }
            other => return Err(NormalizeError::NotAnObject { raw: other }),
        }
    }

    Ok(current)
}

fn has_section_field(obj: &Map<String, Value>) -> bool {
    SECTION_KEYS.iter().any(|key| obj.contains_key(*key))
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches(['\r', '\n']).trim_end_matches('`').trim()
}

fn canonicalize_comprehension(root: &mut Map<String, Value>) {
    let Some(section) = root.get_mut("comprehension").and_then(Value::as_object_mut) else {
        return;
    };
    rename_field(section, "texte", "text");
    rename_field(section, "exercices", "exercises");
    flatten_questions_into_exercises(section);
    if let Some(exercises) = section.get_mut("exercises").and_then(Value::as_array_mut) {
        for exercise in exercises.iter_mut() {
            canonicalize_exercise(exercise);
        }
    }
}

fn canonicalize_language(root: &mut Map<String, Value>) {
    let Some(section) = root.get_mut("language").and_then(Value::as_object_mut) else {
        return;
    };
    rename_field(section, "exercices", "exercises");
    flatten_questions_into_exercises(section);
    if let Some(exercises) = section.get_mut("exercises").and_then(Value::as_array_mut) {
        for exercise in exercises.iter_mut() {
            canonicalize_exercise(exercise);
        }
    }
}

fn canonicalize_writing(root: &mut Map<String, Value>) {
    let Some(section) = root.get_mut("writing").and_then(Value::as_object_mut) else {
        return;
    };
    rename_field(section, "sujets", "topics");
    // Flat question list in the writing section doubles as the topic
    // list; there is no exercise grouping here.
    rename_field(section, "questions", "topics");
    if let Some(topics) = section.get_mut("topics").and_then(Value::as_array_mut) {
        for topic in topics.iter_mut() {
            if let Some(topic) = topic.as_object_mut() {
                rename_field(topic, "sujet", "text");
                rename_field(topic, "question", "text");
                stringify_id(topic);
            }
        }
    }
}

fn canonicalize_exercise(exercise: &mut Value) {
    let Some(exercise) = exercise.as_object_mut() else {
        return;
    };
    rename_field(exercise, "consigne", "instruction");
    stringify_id(exercise);
    for list in ["questions", "details"] {
        if let Some(items) = exercise.get_mut(list).and_then(Value::as_array_mut) {
            for question in items.iter_mut() {
                if let Some(question) = question.as_object_mut() {
                    rename_field(question, "question", "text");
                    stringify_id(question);
                }
            }
        }
    }
    if let Some(matching) = exercise.get_mut("matching").and_then(Value::as_object_mut) {
        rename_field(matching, "fonctions", "functions");
        for list in ["expressions", "functions"] {
            if let Some(items) = matching.get_mut(list).and_then(Value::as_array_mut) {
                for item in items.iter_mut() {
                    if let Some(item) = item.as_object_mut() {
                        stringify_id(item);
                    }
                }
            }
        }
    }
}

/// A section may carry a flat `questions` list instead of grouped
/// exercises. If the first entry already nests sub-questions the list
/// is the exercise list; otherwise consecutive questions sharing the
/// same instruction become synthetic exercises numbered from 1.
fn flatten_questions_into_exercises(section: &mut Map<String, Value>) {
    if section.contains_key("exercises") {
        return;
    }
    let Some(questions) = section.remove("questions") else {
        return;
    };
    let Value::Array(items) = questions else {
        section.insert("questions".to_string(), questions);
        return;
    };

    let first_nests = items.first().and_then(Value::as_object).is_some_and(|first| {
        first.contains_key("questions")
            || first.contains_key("details")
            || first.contains_key("matching")
    });
    if first_nests {
        section.insert("exercises".to_string(), Value::Array(items));
        return;
    }

    let mut exercises: Vec<Value> = Vec::new();
    let mut current_instruction: Option<Value> = None;

    for item in items {
        let instruction = item
            .get("instruction")
            .or_else(|| item.get("consigne"))
            .cloned()
            .unwrap_or(Value::Null);

        let start_new = match (&current_instruction, &instruction) {
            (Some(previous), next) => previous != next,
            (None, _) => true,
        };

        if start_new {
            let ordinal = exercises.len() + 1;
            let mut exercise = Map::new();
            exercise.insert("id".to_string(), Value::String(ordinal.to_string()));
            if !instruction.is_null() {
                exercise.insert("instruction".to_string(), instruction.clone());
            }
            exercise.insert("questions".to_string(), Value::Array(Vec::new()));
            exercises.push(Value::Object(exercise));
            current_instruction = Some(instruction);
        }

        if let Some(questions) = exercises
            .last_mut()
            .and_then(Value::as_object_mut)
            .and_then(|exercise| exercise.get_mut("questions"))
            .and_then(Value::as_array_mut)
        {
            let mut question = item;
            if let Some(obj) = question.as_object_mut() {
                obj.remove("instruction");
                obj.remove("consigne");
            }
            questions.push(question);
        }
    }

    section.insert("exercises".to_string(), Value::Array(exercises));
}

/// Stamp prefixed question keys onto every leaf that lacks one.
fn assign_keys(root: &mut Map<String, Value>) {
    if let Some(section) = root.get_mut("comprehension").and_then(Value::as_object_mut) {
        assign_exercise_keys(section, Section::Comprehension);
    }
    if let Some(section) = root.get_mut("language").and_then(Value::as_object_mut) {
        assign_exercise_keys(section, Section::Language);
    }
    if let Some(section) = root.get_mut("writing").and_then(Value::as_object_mut) {
        if let Some(topics) = section.get_mut("topics").and_then(Value::as_array_mut) {
            for (index, topic) in topics.iter_mut().enumerate() {
                let Some(topic) = topic.as_object_mut() else { continue };
                let short_id = object_id(topic).unwrap_or_else(|| (index + 1).to_string());
                let current = topic.get("id").and_then(Value::as_str).unwrap_or_default();
                if !current.starts_with(keys::WRITING_PREFIX) {
                    topic.insert("id".to_string(), Value::String(keys::topic_key(&short_id)));
                }
            }
        }
    }
}

fn assign_exercise_keys(section: &mut Map<String, Value>, section_kind: Section) {
    let Some(exercises) = section.get_mut("exercises").and_then(Value::as_array_mut) else {
        return;
    };
    for (ex_index, exercise) in exercises.iter_mut().enumerate() {
        let Some(exercise) = exercise.as_object_mut() else { continue };
        let ex_id = object_id(exercise).unwrap_or_else(|| (ex_index + 1).to_string());
        exercise.insert("id".to_string(), Value::String(ex_id.clone()));

        let lists: &[(&str, Section)] = match section_kind {
            Section::Comprehension => &[("questions", Section::Comprehension)],
            _ => &[("details", Section::Language), ("questions", Section::LanguageFree)],
        };

        for (list, question_section) in lists {
            if let Some(items) = exercise.get_mut(*list).and_then(Value::as_array_mut) {
                for (q_index, question) in items.iter_mut().enumerate() {
                    let Some(question) = question.as_object_mut() else { continue };
                    let current = question.get("id").and_then(Value::as_str).unwrap_or_default();
                    if !current.starts_with(question_section.prefix()) {
                        question.insert(
                            "id".to_string(),
                            Value::String(keys::question_key(*question_section, &ex_id, q_index)),
                        );
                    }
                }
            }
        }
    }
}

/// Move a field from a legacy key to its canonical key. An existing
/// canonical field wins, which keeps normalization idempotent.
fn rename_field(obj: &mut Map<String, Value>, old: &str, new: &str) {
    if obj.contains_key(new) {
        return;
    }
    if let Some(value) = obj.remove(old) {
        obj.insert(new.to_string(), value);
    }
}

/// Exercise/topic ids arrive as numbers or strings; keys need strings.
fn stringify_id(obj: &mut Map<String, Value>) {
    if let Some(id) = obj.get("id") {
        if let Some(number) = id.as_i64() {
            obj.insert("id".to_string(), Value::String(number.to_string()));
        } else if let Some(number) = id.as_f64() {
            obj.insert("id".to_string(), Value::String(number.to_string()));
        }
    }
}

fn object_id(obj: &Map<String, Value>) -> Option<String> {
    match obj.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn french_document() -> Value {
        json!({
            "info": {"title": "Examen National", "duration": "120 min", "total_points": 40.0},
            "comprehension": {
                "texte": "Un texte à lire.",
                "exercices": [
                    {
                        "id": 1,
                        "consigne": "Répondez aux questions.",
                        "questions": [
                            {"question": "Quelle est l'idée principale ?", "points": 2},
                            {"question": "Relevez deux arguments.", "points": 3}
                        ]
                    }
                ]
            },
            "language": {
                "exercices": [
                    {
                        "id": 2,
                        "consigne": "Reliez chaque expression à sa fonction.",
                        "matching": {
                            "expressions": [{"id": 1, "text": "pourtant"}],
                            "fonctions": [{"id": "a", "text": "opposition"}]
                        }
                    },
                    {
                        "id": 3,
                        "consigne": "Complétez.",
                        "details": [
                            {"question": "Conjuguez le verbe.", "points": 1}
                        ],
                        "questions": [
                            {"question": "Réécrivez la phrase.", "points": 2}
                        ]
                    }
                ]
            },
            "writing": {
                "sujets": [
                    {"id": 1, "type": "essai", "points": 10, "sujet": "Rédigez un essai."}
                ]
            }
        })
    }

    #[test]
    fn normalizes_french_vocabulary_and_assigns_keys() {
        let content = normalize(&french_document()).expect("normalize");

        let comp = content.comprehension.as_ref().expect("comprehension");
        assert_eq!(comp.text.as_deref(), Some("Un texte à lire."));
        assert_eq!(comp.exercises[0].questions[0].id, "comp_1_0");
        assert_eq!(comp.exercises[0].questions[1].id, "comp_1_1");
        assert_eq!(comp.exercises[0].instruction.as_deref(), Some("Répondez aux questions."));

        let lang = content.language.as_ref().expect("language");
        assert!(lang.exercises[0].matching.is_some());
        assert_eq!(lang.exercises[0].matching.as_ref().unwrap().functions[0].text, "opposition");
        assert_eq!(lang.exercises[1].details[0].id, "lang_3_0");
        assert_eq!(lang.exercises[1].questions[0].id, "lang_free_3_0");

        let writing = content.writing.as_ref().expect("writing");
        assert_eq!(writing.topics[0].id, "writing_1");
        assert_eq!(writing.topics[0].text, "Rédigez un essai.");
    }

    #[test]
    fn normalization_is_idempotent() {
        let first = normalize(&french_document()).expect("first pass");
        let reencoded = serde_json::to_value(&first).expect("to_value");
        let second = normalize(&reencoded).expect("second pass");
        assert_eq!(first, second);
    }

    #[test]
    fn question_keys_are_unique_and_include_matching() {
        let content = normalize(&french_document()).expect("normalize");
        let keys = content.question_keys();
        let unique: HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len());
        assert!(keys.contains(&"lang_2_0".to_string()));
        assert!(keys.contains(&"writing_1".to_string()));
    }

    #[test]
    fn unwraps_array_and_envelope() {
        let wrapped = json!([{"output": french_document()}]);
        let content = normalize(&wrapped).expect("normalize");
        assert!(content.comprehension.is_some());
    }

    #[test]
    fn parses_fenced_string_payload() {
        let text = format!("```json\n{}\n```", french_document());
        let content = normalize_payload(&text).expect("normalize");
        assert!(content.writing.is_some());
    }

    #[test]
    fn malformed_payload_keeps_raw_text() {
        let err = normalize_payload("```json\n{not json at all\n```").expect_err("must fail");
        match &err {
            NormalizeError::MalformedPayload { raw, .. } => {
                assert!(raw.contains("not json at all"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.raw_payload().is_some());
    }

    #[test]
    fn non_object_payload_keeps_raw_value() {
        let err = normalize(&json!(42)).expect_err("must fail");
        assert_eq!(err.raw_payload().as_deref(), Some("42"));
    }

    #[test]
    fn groups_flat_questions_by_instruction() {
        let doc = json!({
            "comprehension": {
                "text": "Passage.",
                "questions": [
                    {"instruction": "Lisez.", "question": "Q1", "points": 1},
                    {"instruction": "Lisez.", "question": "Q2", "points": 1},
                    {"instruction": "Analysez.", "question": "Q3", "points": 2}
                ]
            }
        });

        let content = normalize(&doc).expect("normalize");
        let comp = content.comprehension.unwrap();
        assert_eq!(comp.exercises.len(), 2);
        assert_eq!(comp.exercises[0].id, "1");
        assert_eq!(comp.exercises[0].questions.len(), 2);
        assert_eq!(comp.exercises[0].questions[1].id, "comp_1_1");
        assert_eq!(comp.exercises[1].questions[0].id, "comp_2_0");
        assert_eq!(comp.exercises[1].questions[0].text, "Q3");
    }

    #[test]
    fn flat_list_of_nested_entries_is_the_exercise_list() {
        let doc = json!({
            "language": {
                "questions": [
                    {"id": 5, "consigne": "Transformez.", "details": [
                        {"question": "Phrase 1", "points": 1}
                    ]}
                ]
            }
        });

        let content = normalize(&doc).expect("normalize");
        let lang = content.language.unwrap();
        assert_eq!(lang.exercises.len(), 1);
        assert_eq!(lang.exercises[0].details[0].id, "lang_5_0");
    }

    #[test]
    fn rejects_document_without_sections() {
        let err = normalize(&json!({"info": {"title": "vide"}})).expect_err("must fail");
        assert!(matches!(err, NormalizeError::NoSections));
    }

    #[test]
    fn rejects_duplicate_keys() {
        let doc = json!({
            "language": {
                "exercises": [
                    {
                        "id": 4,
                        "matching": {"expressions": [], "functions": []},
                        "details": [{"id": "lang_4_0", "text": "collides"}]
                    }
                ]
            }
        });
        let err = normalize(&doc).expect_err("must fail");
        assert!(matches!(err, NormalizeError::DuplicateKey(key) if key == "lang_4_0"));
    }

    #[test]
    fn empty_array_payload_is_empty_document() {
        let err = normalize(&json!([])).expect_err("must fail");
        assert!(matches!(err, NormalizeError::EmptyDocument));
    }

    #[test]
    fn question_text_resolves_reading_passage() {
        let content = normalize(&french_document()).expect("normalize");
        let (question, passage) = content.question_text("comp_1_0").expect("found");
        assert_eq!(question, "Quelle est l'idée principale ?");
        assert_eq!(passage.as_deref(), Some("Un texte à lire."));
        assert!(content.question_text("comp_9_9").is_none());
    }
}
