//! JSON extraction and shape validation for model output
//!
//! Models wrap JSON in prose or code fences. Extraction scans for balanced
//! objects or arrays and takes the first one that decodes into the wanted
//! shape, then the `validate_*` functions drop items that are unusable.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::LlmError;

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 6;

/// A quiz question as returned by the model
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GeneratedQuestion {
    pub question: String,
    pub options: Vec<String>,
    #[serde(alias = "correctIndex", alias = "answer_index")]
    pub correct_index: usize,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
}

/// A flashcard as returned by the model
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GeneratedFlashcard {
    pub front: String,
    pub back: String,
    #[serde(default)]
    pub topic: Option<String>,
}

/// Remove a surrounding ``` fence (with optional language tag)
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Skip language tag line
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };

    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Balanced object or array starting at byte `start`
///
/// Brackets inside string literals are ignored.
fn balanced_span(text: &str, start: usize) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes.get(start..)?.iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Try each bracketed span in turn until `decode` accepts one
///
/// A span that is valid JSON but the wrong shape is skipped whole, so its
/// nested values are never tried on their own.
fn first_decoded<R>(
    text: &str,
    mut decode: impl FnMut(Value) -> Result<R, LlmError>,
) -> Result<R, LlmError> {
    let body = strip_code_fences(text);
    let mut last_err = LlmError::Parse("no JSON object or array in model output".to_string());
    let mut from = 0;

    while let Some(pos) = body[from..].find(['{', '[']) {
        let start = from + pos;
        let Some(span) = balanced_span(body, start) else {
            from = start + 1;
            continue;
        };

        match serde_json::from_str::<Value>(span) {
            Ok(value) => match decode(value) {
                Ok(decoded) => return Ok(decoded),
                Err(e) => {
                    last_err = e;
                    from = start + span.len();
                }
            },
            Err(e) => {
                last_err = LlmError::Parse(e.to_string());
                from = start + 1;
            }
        }
    }

    Err(last_err)
}

/// Deserialize the first JSON value in model output that fits `T`
pub fn extract_json<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    first_decoded(text, |value| {
        serde_json::from_value(value).map_err(|e| LlmError::Parse(e.to_string()))
    })
}

/// Extract a list, accepting either a bare array or `{"<key>": [...]}`
pub fn extract_list<T: DeserializeOwned>(text: &str, key: &str) -> Result<Vec<T>, LlmError> {
    first_decoded(text, |value| list_from_value(value, key))
}

fn list_from_value<T: DeserializeOwned>(value: Value, key: &str) -> Result<Vec<T>, LlmError> {
    let array = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => map
            .remove(key)
            .filter(Value::is_array)
            .ok_or_else(|| LlmError::InvalidOutput(format!("expected \"{}\" array", key)))?,
        _ => return Err(LlmError::InvalidOutput("expected array".to_string())),
    };

    // Decode item by item so one malformed entry does not sink the batch
    let Value::Array(items) = array else {
        return Err(LlmError::InvalidOutput("expected array".to_string()));
    };

    let total = items.len();
    let decoded: Vec<T> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed list item");
                None
            }
        })
        .collect();

    if total > 0 && decoded.is_empty() {
        return Err(LlmError::InvalidOutput("no list item has the expected shape".to_string()));
    }

    Ok(decoded)
}

fn question_is_valid(q: &GeneratedQuestion) -> bool {
    !q.question.trim().is_empty()
        && (MIN_OPTIONS..=MAX_OPTIONS).contains(&q.options.len())
        && q.options.iter().all(|o| !o.trim().is_empty())
        && q.correct_index < q.options.len()
}

/// Keep well-formed questions; error if none survive
pub fn validate_questions(
    questions: Vec<GeneratedQuestion>,
) -> Result<Vec<GeneratedQuestion>, LlmError> {
    let total = questions.len();
    let valid: Vec<_> = questions.into_iter().filter(question_is_valid).collect();

    if valid.len() < total {
        tracing::warn!(
            dropped = total - valid.len(),
            kept = valid.len(),
            "Dropped malformed generated questions"
        );
    }

    if valid.is_empty() {
        return Err(LlmError::InvalidOutput(
            "model returned no valid questions".to_string(),
        ));
    }

    Ok(valid)
}

/// Keep flashcards with non-empty front and back; error if none survive
pub fn validate_flashcards(
    cards: Vec<GeneratedFlashcard>,
) -> Result<Vec<GeneratedFlashcard>, LlmError> {
    let total = cards.len();
    let valid: Vec<_> = cards
        .into_iter()
        .filter(|c| !c.front.trim().is_empty() && !c.back.trim().is_empty())
        .collect();

    if valid.len() < total {
        tracing::warn!(
            dropped = total - valid.len(),
            kept = valid.len(),
            "Dropped malformed generated flashcards"
        );
    }

    if valid.is_empty() {
        return Err(LlmError::InvalidOutput(
            "model returned no valid flashcards".to_string(),
        ));
    }

    Ok(valid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences_with_language_tag() {
        let text = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(text), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_code_fences_passthrough() {
        assert_eq!(strip_code_fences("  [1, 2]  "), "[1, 2]");
    }

    #[test]
    fn test_balanced_span_ignores_brackets_in_strings() {
        let text = "Sure! Here you go: {\"front\": \"a}\", \"back\": \"b\"} Hope that helps.";
        let start = text.find('{').unwrap();
        assert_eq!(
            balanced_span(text, start),
            Some("{\"front\": \"a}\", \"back\": \"b\"}")
        );
    }

    #[test]
    fn test_balanced_span_unbalanced() {
        assert_eq!(balanced_span("{\"open\": [1, 2", 0), None);
        assert_eq!(balanced_span("[]", 5), None);
    }

    #[test]
    fn test_extract_json_skips_bracketed_prose() {
        let text = r#"As noted in [1] below, {"score": 80, "feedback": "Good"}"#;
        let value: Value = extract_json(text).unwrap();
        // [1] is valid JSON, so Value takes it; a typed target skips it
        assert_eq!(value, serde_json::json!([1]));

        #[derive(Deserialize)]
        struct Grade {
            score: u32,
        }
        let grade: Grade = extract_json(text).unwrap();
        assert_eq!(grade.score, 80);
    }

    #[test]
    fn test_extract_list_skips_citation_brackets() {
        let text = r#"See [1] and {not json} then {"flashcards": [{"front": "ATP", "back": "Energy"}]}"#;
        let cards: Vec<GeneratedFlashcard> = extract_list(text, "flashcards").unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].front, "ATP");
    }

    #[test]
    fn test_extract_json_without_json_is_parse_error() {
        let result: Result<Value, _> = extract_json("no json here");
        assert!(matches!(result, Err(LlmError::Parse(_))));
    }

    #[test]
    fn test_extract_list_accepts_wrapped_object() {
        let text = r#"```json
{"questions": [
  {"question": "2+2?", "options": ["3", "4"], "correct_index": 1},
  {"question": "broken"}
]}
```"#;
        let questions: Vec<GeneratedQuestion> = extract_list(text, "questions").unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].correct_index, 1);
    }

    #[test]
    fn test_extract_list_accepts_bare_array_and_alias() {
        let text = r#"[{"question": "Q", "options": ["a", "b", "c"], "correctIndex": 2}]"#;
        let questions: Vec<GeneratedQuestion> = extract_list(text, "questions").unwrap();
        assert_eq!(questions[0].correct_index, 2);
    }

    #[test]
    fn test_extract_list_wrong_key_is_invalid_output() {
        let result: Result<Vec<GeneratedFlashcard>, _> = extract_list(r#"{"cards": []}"#, "flashcards");
        assert!(matches!(result, Err(LlmError::InvalidOutput(_))));
    }

    fn question(options: usize, correct_index: usize) -> GeneratedQuestion {
        GeneratedQuestion {
            question: "What is a mitochondrion?".to_string(),
            options: (0..options).map(|i| format!("option {}", i)).collect(),
            correct_index,
            explanation: None,
            topic: None,
        }
    }

    #[test]
    fn test_validate_questions_filters_bad_shapes() {
        let questions = vec![
            question(4, 0),
            question(1, 0),
            question(7, 0),
            question(3, 3),
            GeneratedQuestion {
                question: "   ".to_string(),
                ..question(2, 1)
            },
        ];

        let valid = validate_questions(questions).unwrap();
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].options.len(), 4);
    }

    #[test]
    fn test_validate_questions_all_invalid() {
        let result = validate_questions(vec![question(1, 0)]);
        assert!(matches!(result, Err(LlmError::InvalidOutput(_))));
    }

    #[test]
    fn test_validate_flashcards() {
        let cards = vec![
            GeneratedFlashcard {
                front: "ATP".to_string(),
                back: "Energy currency of the cell".to_string(),
                topic: None,
            },
            GeneratedFlashcard {
                front: "".to_string(),
                back: "orphan".to_string(),
                topic: None,
            },
        ];

        let valid = validate_flashcards(cards).unwrap();
        assert_eq!(valid.len(), 1);
        assert!(validate_flashcards(vec![]).is_err());
    }
}
