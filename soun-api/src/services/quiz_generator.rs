//! Multiple-choice question generation

use crate::llm::json::{extract_list, validate_questions, GeneratedQuestion, MAX_OPTIONS, MIN_OPTIONS};
use crate::llm::{LanguageModel, LlmError};
use crate::services::adaptive::Difficulty;

pub const DEFAULT_QUESTION_COUNT: usize = 5;
pub const MAX_QUESTION_COUNT: usize = 20;

const SYSTEM_PROMPT: &str = "You are an experienced instructor writing multiple-choice quiz questions \
for a student. Respond with JSON only: {\"questions\": [{\"question\": string, \"options\": \
[string], \"correct_index\": number, \"explanation\": string, \"topic\": string}]}. \
correct_index is zero-based.";

pub struct QuestionRequest<'a> {
    pub course_name: &'a str,
    pub topic: Option<&'a str>,
    pub difficulty: Difficulty,
    pub count: usize,
    /// Extracted course material, possibly empty
    pub context: &'a str,
}

pub fn question_prompt(req: &QuestionRequest<'_>) -> String {
    let mut prompt = format!(
        "Write {} {} multiple-choice questions for the course \"{}\"",
        req.count,
        req.difficulty.as_str(),
        req.course_name
    );
    if let Some(topic) = req.topic {
        prompt.push_str(&format!(" on the topic \"{}\"", topic));
    }
    prompt.push_str(&format!(
        ". Each question has {} to {} options and exactly one correct answer. \
         Label every question with a short topic name.",
        MIN_OPTIONS, MAX_OPTIONS
    ));

    if !req.context.is_empty() {
        prompt.push_str("\n\nBase the questions on this course material:\n");
        prompt.push_str(req.context);
    }

    prompt
}

/// Ask the model for questions and keep the well-formed ones
///
/// Questions without a topic inherit the requested topic or the course name.
pub async fn generate_questions(
    llm: &dyn LanguageModel,
    req: &QuestionRequest<'_>,
) -> Result<Vec<GeneratedQuestion>, LlmError> {
    let count = req.count.clamp(1, MAX_QUESTION_COUNT);
    let reply = llm.complete(SYSTEM_PROMPT, &question_prompt(req)).await?;

    let mut questions = validate_questions(extract_list(&reply, "questions")?)?;
    questions.truncate(count);

    let fallback_topic = req.topic.unwrap_or(req.course_name);
    for q in &mut questions {
        let blank = q.topic.as_deref().map_or(true, |t| t.trim().is_empty());
        if blank {
            q.topic = Some(fallback_topic.to_string());
        }
    }

    tracing::info!(
        model = llm.name(),
        requested = count,
        generated = questions.len(),
        "Generated quiz questions"
    );

    Ok(questions)
}
