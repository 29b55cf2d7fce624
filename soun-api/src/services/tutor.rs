//! Conversational tutor answers
//!
//! The reply's tone follows the emotion tags detected in the transcript. With
//! no model available the tutor answers with a canned, emotion-aware reply.

use crate::llm::LanguageModel;
use crate::services::emotion::{tone_instruction, Emotion};

const BASE_SYSTEM_PROMPT: &str = "You are Soun, a friendly study tutor. Answer the student's \
question clearly and accurately in a few short paragraphs suitable for reading aloud. If course \
material is provided, ground the answer in it and say when it does not cover the question.";

const DEFAULT_REPLY: &str = "I can't reach the tutor model right now. Try reviewing your course \
notes or flashcards for this topic, and ask me again in a moment.";

pub struct TutorRequest<'a> {
    pub question: &'a str,
    pub course_name: Option<&'a str>,
    pub context: &'a str,
    pub emotions: &'a [Emotion],
    pub topics: &'a [String],
}

#[derive(Debug, Clone, PartialEq)]
pub struct TutorReply {
    pub answer: String,
    /// False when the canned reply was used
    pub generated: bool,
}

pub fn system_prompt(emotions: &[Emotion]) -> String {
    match tone_instruction(emotions) {
        Some(tone) => format!("{} {}", BASE_SYSTEM_PROMPT, tone),
        None => BASE_SYSTEM_PROMPT.to_string(),
    }
}

fn user_prompt(req: &TutorRequest<'_>) -> String {
    let mut prompt = String::new();
    if let Some(course) = req.course_name {
        prompt.push_str(&format!("Course: {}\n", course));
    }
    if !req.context.is_empty() {
        prompt.push_str("Course material:\n");
        prompt.push_str(req.context);
        prompt.push_str("\n\n");
    }
    prompt.push_str("Student: ");
    prompt.push_str(req.question);
    prompt
}

/// Canned reply shaped by the first detected emotion
pub fn fallback_reply(emotions: &[Emotion], topics: &[String]) -> String {
    let about = topics
        .first()
        .map(|t| format!(" about {}", t))
        .unwrap_or_default();

    match emotions.first() {
        Some(Emotion::Confused) => format!(
            "Let's take it one step at a time. Write down what you already know{} and we'll build from there. {}",
            about, DEFAULT_REPLY
        ),
        Some(Emotion::Frustrated) => format!(
            "It's okay to find this hard. Take a short break, then try one small piece{}. {}",
            about, DEFAULT_REPLY
        ),
        Some(Emotion::Anxious) => format!(
            "You've got this. Focus on the key ideas{} first rather than everything at once. {}",
            about, DEFAULT_REPLY
        ),
        Some(Emotion::Curious) => format!(
            "Great question{}! Keep that curiosity going. {}",
            about, DEFAULT_REPLY
        ),
        Some(Emotion::Confident) => format!(
            "Nice work! Test yourself with a harder quiz{} to lock it in. {}",
            about, DEFAULT_REPLY
        ),
        None => DEFAULT_REPLY.to_string(),
    }
}

pub async fn answer(llm: &dyn LanguageModel, req: &TutorRequest<'_>) -> TutorReply {
    match llm.complete(&system_prompt(req.emotions), &user_prompt(req)).await {
        Ok(text) if !text.trim().is_empty() => TutorReply {
            answer: text.trim().to_string(),
            generated: true,
        },
        Ok(_) => {
            tracing::warn!(model = llm.name(), "Tutor model returned an empty reply");
            TutorReply {
                answer: fallback_reply(req.emotions, req.topics),
                generated: false,
            }
        }
        Err(e) => {
            tracing::warn!(model = llm.name(), error = %e, "Tutor model unavailable, using canned reply");
            TutorReply {
                answer: fallback_reply(req.emotions, req.topics),
                generated: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;
    use crate::llm::DisabledModel;

    fn request<'a>(emotions: &'a [Emotion], topics: &'a [String]) -> TutorRequest<'a> {
        TutorRequest {
            question: "What is osmosis?",
            course_name: Some("Biology"),
            context: "Osmosis is diffusion of water.",
            emotions,
            topics,
        }
    }

    #[tokio::test]
    async fn test_model_answer_with_tone() {
        let model = ScriptedModel::replying("  Osmosis is the movement of water.  ");
        let emotions = [Emotion::Confused];
        let reply = answer(&model, &request(&emotions, &[])).await;

        assert!(reply.generated);
        assert_eq!(reply.answer, "Osmosis is the movement of water.");

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].0.contains("small steps"));
        assert!(prompts[0].1.contains("Course: Biology"));
        assert!(prompts[0].1.ends_with("Student: What is osmosis?"));
    }

    #[tokio::test]
    async fn test_fallback_when_disabled() {
        let topics = vec!["osmosis".to_string()];
        let emotions = [Emotion::Anxious];
        let reply = answer(&DisabledModel, &request(&emotions, &topics)).await;

        assert!(!reply.generated);
        assert!(reply.answer.starts_with("You've got this."));
        assert!(reply.answer.contains("about osmosis"));
    }

    #[tokio::test]
    async fn test_empty_reply_falls_back() {
        let model = ScriptedModel::replying("   ");
        let reply = answer(&model, &request(&[], &[])).await;
        assert!(!reply.generated);
        assert_eq!(reply.answer, DEFAULT_REPLY);
    }
}
