//! Free-text answer evaluation
//!
//! The model grades the answer when available. Otherwise the score is the
//! share of reference keywords that appear in the student's answer. Without a
//! reference answer there is nothing to compare against, so the fallback
//! leaves the answer ungraded.

use crate::llm::json::extract_json;
use crate::llm::LanguageModel;
use crate::services::topics::content_terms;
use serde::{Deserialize, Serialize};

/// Keyword score needed to count as correct
pub const PASS_SCORE: u32 = 60;

const SYSTEM_PROMPT: &str = "You grade a student's free-text answer. Respond with JSON only: \
{\"score\": number from 0 to 100, \"is_correct\": boolean, \"feedback\": string}. Keep feedback \
to two sentences and be encouraging.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMethod {
    Model,
    KeywordOverlap,
    /// No model and no reference answer
    Ungraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub score: u32,
    pub is_correct: bool,
    pub feedback: String,
    pub method: EvaluationMethod,
}

impl Evaluation {
    /// Only graded results may move mastery
    pub fn is_graded(&self) -> bool {
        self.method != EvaluationMethod::Ungraded
    }
}

#[derive(Deserialize)]
struct ModelGrade {
    score: f64,
    is_correct: bool,
    #[serde(default)]
    feedback: String,
}

pub struct EvaluationRequest<'a> {
    pub question: &'a str,
    pub answer: &'a str,
    pub expected_answer: Option<&'a str>,
}

fn grading_prompt(req: &EvaluationRequest<'_>) -> String {
    let mut prompt = format!("Question: {}\n", req.question);
    if let Some(expected) = req.expected_answer {
        prompt.push_str(&format!("Reference answer: {}\n", expected));
    }
    prompt.push_str(&format!("Student answer: {}", req.answer));
    prompt
}

/// Percentage of reference keywords present in the answer
pub fn keyword_overlap_score(reference: &str, answer: &str) -> u32 {
    let expected = content_terms(reference);
    if expected.is_empty() {
        return 0;
    }
    let given = content_terms(answer);
    let hits = expected.intersection(&given).count();
    ((hits as f64 / expected.len() as f64) * 100.0).round() as u32
}

pub fn keyword_evaluation(req: &EvaluationRequest<'_>) -> Evaluation {
    let Some(reference) = req.expected_answer.filter(|r| !r.trim().is_empty()) else {
        return Evaluation {
            score: 0,
            is_correct: false,
            feedback: "This answer could not be graded automatically. Compare it with your notes."
                .to_string(),
            method: EvaluationMethod::Ungraded,
        };
    };
    let score = keyword_overlap_score(reference, req.answer);
    let is_correct = score >= PASS_SCORE;

    let feedback = if req.answer.trim().is_empty() {
        "No answer was given.".to_string()
    } else if is_correct {
        "Your answer covers the main ideas.".to_string()
    } else if score > 0 {
        "Your answer touches on some key ideas but misses others. Compare it with your notes."
            .to_string()
    } else {
        "Your answer doesn't mention the key ideas yet. Review the material and try again."
            .to_string()
    };

    Evaluation {
        score,
        is_correct,
        feedback,
        method: EvaluationMethod::KeywordOverlap,
    }
}

pub async fn evaluate_answer(llm: &dyn LanguageModel, req: &EvaluationRequest<'_>) -> Evaluation {
    let graded = match llm.complete(SYSTEM_PROMPT, &grading_prompt(req)).await {
        Ok(reply) => extract_json::<ModelGrade>(&reply),
        Err(e) => Err(e),
    };

    match graded {
        Ok(grade) => Evaluation {
            score: grade.score.clamp(0.0, 100.0).round() as u32,
            is_correct: grade.is_correct,
            feedback: grade.feedback,
            method: EvaluationMethod::Model,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Answer grading unavailable, using keyword overlap");
            keyword_evaluation(req)
        }
    }
}
