//! Study guide generation with a topic-outline fallback

use crate::llm::json::extract_json;
use crate::llm::{LanguageModel, LlmError};
use crate::services::topics::extract_topics;
use serde::{Deserialize, Serialize};

const SYSTEM_PROMPT: &str = "You write structured study guides. Respond with JSON only: \
{\"title\": string, \"sections\": [{\"heading\": string, \"content\": string, \
\"key_points\": [string]}]}.";

/// Topics in a fallback outline
const OUTLINE_TOPICS: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuideSection {
    pub heading: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub key_points: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuideContent {
    pub title: String,
    pub sections: Vec<GuideSection>,
    /// False when built from the topic outline instead of the model
    #[serde(default = "default_generated")]
    pub generated: bool,
}

fn default_generated() -> bool {
    true
}

pub struct GuideRequest<'a> {
    pub course_name: &'a str,
    pub topic: Option<&'a str>,
    pub context: &'a str,
}

fn guide_prompt(req: &GuideRequest<'_>) -> String {
    let mut prompt = format!("Write a study guide for the course \"{}\"", req.course_name);
    if let Some(topic) = req.topic {
        prompt.push_str(&format!(" covering \"{}\"", topic));
    }
    prompt.push_str(". Use 3 to 8 sections with short key points.");
    if !req.context.is_empty() {
        prompt.push_str("\n\nCourse material:\n");
        prompt.push_str(req.context);
    }
    prompt
}

fn parse_guide(reply: &str) -> Result<GuideContent, LlmError> {
    let mut guide: GuideContent = extract_json(reply)?;
    guide.sections.retain(|s| !s.heading.trim().is_empty());

    if guide.title.trim().is_empty() || guide.sections.is_empty() {
        return Err(LlmError::InvalidOutput("study guide has no title or sections".to_string()));
    }

    guide.generated = true;
    Ok(guide)
}

/// Outline built from topics found in the course material
pub fn outline_guide(req: &GuideRequest<'_>) -> GuideContent {
    let mut topics: Vec<String> = req.topic.map(|t| vec![t.to_string()]).unwrap_or_default();
    for topic in extract_topics(req.context, OUTLINE_TOPICS) {
        if !topics.iter().any(|t| t.eq_ignore_ascii_case(&topic)) {
            topics.push(topic);
        }
    }
    topics.truncate(OUTLINE_TOPICS);

    let sections = if topics.is_empty() {
        vec![GuideSection {
            heading: "Getting started".to_string(),
            content: format!(
                "Upload notes or slides for {} to get a guide built from your material.",
                req.course_name
            ),
            key_points: Vec::new(),
        }]
    } else {
        topics
            .into_iter()
            .map(|topic| GuideSection {
                content: format!("Review your notes on {}.", topic),
                key_points: vec![
                    format!("Define {} in your own words", topic),
                    format!("Work through an example involving {}", topic),
                ],
                heading: topic,
            })
            .collect()
    };

    GuideContent {
        title: match req.topic {
            Some(topic) => format!("{}: {} study outline", req.course_name, topic),
            None => format!("{} study outline", req.course_name),
        },
        sections,
        generated: false,
    }
}

/// Generate a guide, falling back to the topic outline on any model failure
pub async fn generate_guide(llm: &dyn LanguageModel, req: &GuideRequest<'_>) -> GuideContent {
    let result = match llm.complete(SYSTEM_PROMPT, &guide_prompt(req)).await {
        Ok(reply) => parse_guide(&reply),
        Err(e) => Err(e),
    };

    match result {
        Ok(guide) => guide,
        Err(e) => {
            tracing::warn!(error = %e, "Study guide generation failed, using topic outline");
            outline_guide(req)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;
    use crate::llm::DisabledModel;

    const CONTEXT: &str = "Photosynthesis converts light. Photosynthesis needs chlorophyll. \
                           Chlorophyll absorbs light.";

    fn request() -> GuideRequest<'static> {
        GuideRequest {
            course_name: "Biology",
            topic: None,
            context: CONTEXT,
        }
    }

    #[tokio::test]
    async fn test_model_guide_is_used() {
        let model = ScriptedModel::replying(
            r#"{"title": "Plants", "sections": [
                {"heading": "Light reactions", "content": "...", "key_points": ["ATP"]},
                {"heading": "  ", "content": "dropped"}
            ]}"#,
        );
        let guide = generate_guide(&model, &request()).await;
        assert!(guide.generated);
        assert_eq!(guide.title, "Plants");
        assert_eq!(guide.sections.len(), 1);
    }

    #[tokio::test]
    async fn test_falls_back_to_outline() {
        let guide = generate_guide(&DisabledModel, &request()).await;
        assert!(!guide.generated);
        assert_eq!(guide.title, "Biology study outline");
        let headings: Vec<_> = guide.sections.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(headings, vec!["photosynthesis", "light", "chlorophyll"]);
    }

    #[tokio::test]
    async fn test_invalid_model_output_falls_back() {
        let model = ScriptedModel::replying(r#"{"title": "", "sections": []}"#);
        let guide = generate_guide(&model, &request()).await;
        assert!(!guide.generated);
    }

    #[test]
    fn test_outline_without_material() {
        let guide = outline_guide(&GuideRequest {
            course_name: "History",
            topic: None,
            context: "",
        });
        assert_eq!(guide.sections.len(), 1);
        assert_eq!(guide.sections[0].heading, "Getting started");
    }
}
