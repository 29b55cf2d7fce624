//! Course material passed to the model as grounding text

use crate::upload::extract::truncate_chars;

/// Upper bound on material included in a single prompt
pub const MAX_CONTEXT_CHARS: usize = 12_000;

const SEPARATOR: &str = "\n\n---\n\n";

/// Join document texts, newest first, until `max_chars` is reached
pub fn course_context(texts: &[String], max_chars: usize) -> String {
    let mut out = String::new();
    let mut used = 0usize;

    for text in texts {
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        if !out.is_empty() {
            if used + SEPARATOR.len() >= max_chars {
                break;
            }
            out.push_str(SEPARATOR);
            used += SEPARATOR.len();
        }

        let remaining = max_chars.saturating_sub(used);
        if remaining == 0 {
            break;
        }

        let piece = truncate_chars(text, remaining);
        used += piece.chars().count();
        out.push_str(&piece);
    }

    out
}
