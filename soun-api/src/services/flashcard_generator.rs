//! Flashcard generation

use crate::llm::json::{extract_list, validate_flashcards, GeneratedFlashcard};
use crate::llm::{LanguageModel, LlmError};

pub const DEFAULT_CARD_COUNT: usize = 10;
pub const MAX_CARD_COUNT: usize = 50;

const SYSTEM_PROMPT: &str = "You create concise study flashcards. The front holds a term or \
question, the back a short answer. Respond with JSON only: {\"flashcards\": [{\"front\": string, \
\"back\": string, \"topic\": string}]}.";

pub struct FlashcardRequest<'a> {
    pub course_name: &'a str,
    pub topic: Option<&'a str>,
    pub count: usize,
    pub context: &'a str,
}

pub fn flashcard_prompt(req: &FlashcardRequest<'_>) -> String {
    let mut prompt = format!(
        "Create {} flashcards for the course \"{}\"",
        req.count, req.course_name
    );
    if let Some(topic) = req.topic {
        prompt.push_str(&format!(" focused on \"{}\"", topic));
    }
    prompt.push('.');

    if !req.context.is_empty() {
        prompt.push_str("\n\nUse this course material:\n");
        prompt.push_str(req.context);
    }

    prompt
}

pub async fn generate_flashcards(
    llm: &dyn LanguageModel,
    req: &FlashcardRequest<'_>,
) -> Result<Vec<GeneratedFlashcard>, LlmError> {
    let count = req.count.clamp(1, MAX_CARD_COUNT);
    let reply = llm.complete(SYSTEM_PROMPT, &flashcard_prompt(req)).await?;

    let mut cards = validate_flashcards(extract_list(&reply, "flashcards")?)?;
    cards.truncate(count);

    let fallback_topic = req.topic.unwrap_or(req.course_name);
    for card in &mut cards {
        if card.topic.as_deref().map_or(true, |t| t.trim().is_empty()) {
            card.topic = Some(fallback_topic.to_string());
        }
    }

    tracing::info!(model = llm.name(), generated = cards.len(), "Generated flashcards");
    Ok(cards)
}
