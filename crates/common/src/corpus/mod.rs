//! Case corpus model
//!
//! Raw corpus records are JSON objects with loosely defined fields. They are
//! parsed once into [`CaseDocument`] values:
//!
//! - text: `sentences`, then `text`; the first field that is present and
//!   non-empty wins, otherwise the empty string
//! - id: `id`, then `case_id` (non-null); without either, the zero-based
//!   record position
//!
//! Nested text is flattened with [`flatten_text`].

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

/// Opaque case identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(String);

impl CaseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A case as loaded from the corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseDocument {
    pub case_id: CaseId,
    pub text: String,
}

impl CaseDocument {
    pub fn new(case_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            case_id: CaseId::new(case_id),
            text: text.into(),
        }
    }

    /// Parse a raw corpus record found at `position`
    pub fn from_record(record: &Value, position: usize) -> Self {
        let text = ["sentences", "text"]
            .iter()
            .filter_map(|field| record.get(*field))
            .find(|value| is_truthy(value))
            .map(flatten_text)
            .unwrap_or_default();

        let case_id = ["id", "case_id"]
            .iter()
            .filter_map(|field| record.get(*field))
            .find(|value| !value.is_null())
            .map(flatten_text)
            .unwrap_or_else(|| position.to_string());

        Self {
            case_id: CaseId(case_id),
            text,
        }
    }
}

/// Join nested text into a single string
///
/// Arrays are flattened recursively and joined with single spaces, `null`
/// becomes the empty string, and scalars render as text. Applying it to its
/// own output returns that output unchanged.
pub fn flatten_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(flatten_text)
            .collect::<Vec<_>>()
            .join(" "),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Object(_) => value.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(b) => *b,
        Value::Number(_) => true,
    }
}

/// Load a JSON Lines corpus, one record per non-blank line
pub fn load_corpus(path: &Path) -> Result<Vec<CaseDocument>> {
    let file = File::open(path).map_err(|e| AppError::Configuration {
        message: format!("Cannot open corpus {}: {}", path.display(), e),
    })?;
    let reader = BufReader::new(file);
    let mut documents = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: Value = serde_json::from_str(&line).map_err(|e| AppError::InvalidFormat {
            message: format!("Line {}: {}", line_num + 1, e),
        })?;
        documents.push(CaseDocument::from_record(&record, documents.len()));
    }

    info!(path = %path.display(), count = documents.len(), "Corpus loaded");
    Ok(documents)
}

/// Documents with non-blank text, remembering where each came from
#[derive(Debug, Clone)]
pub struct FilteredCorpus {
    /// Trimmed text of each surviving document, in corpus order
    texts: Vec<String>,
    /// Filtered position -> original corpus position
    origins: Vec<usize>,
}

impl FilteredCorpus {
    /// Drop documents whose text is blank
    pub fn new(documents: &[CaseDocument]) -> Self {
        let mut texts = Vec::new();
        let mut origins = Vec::new();

        for (position, doc) in documents.iter().enumerate() {
            let trimmed = doc.text.trim();
            if !trimmed.is_empty() {
                texts.push(trimmed.to_string());
                origins.push(position);
            }
        }

        debug!(
            loaded = documents.len(),
            surviving = texts.len(),
            "Blank documents filtered"
        );

        Self { texts, origins }
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    /// Original corpus position of a filtered position
    pub fn origin(&self, filtered: usize) -> usize {
        self.origins[filtered]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_flatten_nested() {
        let value = json!(["The appellant", ["filed", ["a suit"]], "for damages"]);
        assert_eq!(flatten_text(&value), "The appellant filed a suit for damages");
    }

    #[test]
    fn test_flatten_null_is_empty() {
        assert_eq!(flatten_text(&Value::Null), "");
        assert_eq!(flatten_text(&json!([null, "x"])), " x");
    }

    #[test]
    fn test_flatten_is_idempotent() {
        let inputs = [
            json!(null),
            json!("plain"),
            json!(["a", ["b", ["c", null]], 3]),
            json!([]),
            json!([true, 1.5]),
        ];
        for input in inputs {
            let once = flatten_text(&input);
            let twice = flatten_text(&Value::String(once.clone()));
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_record_field_precedence() {
        let doc = CaseDocument::from_record(
            &json!({"id": 7, "case_id": "c-7", "sentences": ["one", "two"], "text": "ignored"}),
            0,
        );
        assert_eq!(doc.case_id.as_str(), "7");
        assert_eq!(doc.text, "one two");

        // Empty sentences fall through to text
        let doc = CaseDocument::from_record(
            &json!({"case_id": "c-9", "sentences": [], "text": "fallback"}),
            3,
        );
        assert_eq!(doc.case_id.as_str(), "c-9");
        assert_eq!(doc.text, "fallback");

        // Null id falls through to case_id
        let doc = CaseDocument::from_record(&json!({"id": null, "case_id": "c-1"}), 4);
        assert_eq!(doc.case_id.as_str(), "c-1");
        assert_eq!(doc.text, "");
    }

    #[test]
    fn test_record_without_id_uses_position() {
        let doc = CaseDocument::from_record(&json!({"text": "orphan"}), 12);
        assert_eq!(doc.case_id.as_str(), "12");
    }

    #[test]
    fn test_filter_keeps_origin_positions() {
        let docs = vec![
            CaseDocument::new("a", "first"),
            CaseDocument::new("b", "   "),
            CaseDocument::new("c", "\tthird\n"),
        ];
        let filtered = FilteredCorpus::new(&docs);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.texts(), &["first".to_string(), "third".to_string()]);
        assert_eq!(filtered.origin(1), 2);
    }

    #[test]
    fn test_load_corpus_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.jsonl");
        let mut file = File::create(&path).unwrap();
        writeln!(file, r#"{{"id": "x1", "sentences": ["A", "B"]}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"text": "C"}}"#).unwrap();
        drop(file);

        let docs = load_corpus(&path).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].text, "A B");
        assert_eq!(docs[1].case_id.as_str(), "1");
    }

    #[test]
    fn test_load_corpus_reports_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "{\"id\": 1}\nnot json\n").unwrap();

        let err = load_corpus(&path).unwrap_err();
        assert!(err.to_string().contains("Line 2"));
    }
}
