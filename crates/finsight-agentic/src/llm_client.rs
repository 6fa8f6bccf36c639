//! LLM client abstraction.
//!
//! The pipeline never depends on a concrete provider; it sees this
//! trait. The only guaranteed classifier is rule-based — an LLM client
//! is an optional accuracy upgrade, never a requirement.

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Free-form chat completion.
    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Chat completion with JSON output mode; the response body is
    /// expected to be a single JSON object.
    async fn chat_json(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    fn model_name(&self) -> &str;

    fn provider_name(&self) -> &str;
}

/// Strip markdown code fences an LLM may wrap around JSON output, and
/// salvage the outermost object if the response is wrapped in prose.
pub fn extract_json(content: &str) -> &str {
    let stripped = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    if stripped.starts_with('{') {
        return stripped;
    }
    match (stripped.find('{'), stripped.rfind('}')) {
        (Some(start), Some(end)) if end > start => &stripped[start..=end],
        _ => stripped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_plain_json() {
        assert_eq!(extract_json(r#"{"a": 1}"#), r#"{"a": 1}"#);
    }

    #[test]
    fn extract_fenced_json() {
        let fenced = "```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json(fenced), "{\"a\": 1}");
    }

    #[test]
    fn extract_prose_wrapped_json() {
        let wrapped = "Here you go:\n\n{\"a\": 1}\n\nAnything else?";
        assert_eq!(extract_json(wrapped), "{\"a\": 1}");
    }
}
