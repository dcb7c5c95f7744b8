use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::config::TranslateConfig;
use crate::error::{KotobaError, Result};
use super::BatchTranslator;

const PROVIDER: &str = "ollama";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BatchResult {
    translations: Vec<String>,
}

/// Translation through a local LLM served by Ollama. The whole batch is
/// sent as a JSON array and expected back as `{"translations": [...]}`.
pub struct OllamaTranslator {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaTranslator {
    pub fn new(config: &TranslateConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(KotobaError::Http)?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    /// Build translation prompt for a batch, using JSON format
    fn build_prompt(&self, texts: &[String], source_language: &str, target_language: &str) -> Result<String> {
        let source_name = language_code_to_name(source_language);
        let target_name = language_code_to_name(target_language);
        let payload = serde_json::to_string_pretty(texts)?;

        Ok(format!(
            "You are a professional translator of software user interfaces.\n\
             \n\
             Translate every string of the JSON array below from {} to {} (language code: {}).\n\
             \n\
             RULES:\n\
             1. Keep the markers {{1}}, {{2}} and {{{{}}}} exactly as they are; they stand for markup.\n\
             2. Return exactly {} strings, in the same order.\n\
             3. Do not add explanations.\n\
             \n\
             Return ONLY JSON in the form {{\"translations\": [\"...\"]}}.\n\
             \n\
             [Strings]\n\
             {}\n",
            source_name, target_name, target_language, texts.len(), payload
        ))
    }
}

#[async_trait]
impl BatchTranslator for OllamaTranslator {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        source_language: &str,
        target_language: &str,
    ) -> Result<Vec<String>> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: self.build_prompt(texts, source_language, target_language)?,
            stream: false,
            format: "json".to_string(),
        };

        let url = format!("{}/api/generate", self.endpoint);
        debug!("Sending translation request to: {}", url);

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| KotobaError::provider(PROVIDER, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(KotobaError::provider(
                PROVIDER,
                format!("Ollama API error {}: {}", status, error_text),
            ));
        }

        let generated: GenerateResponse = response.json().await
            .map_err(|e| KotobaError::provider(PROVIDER, format!("Failed to parse response: {}", e)))?;

        debug!("Raw Ollama response: {}", generated.response);

        parse_translations(&generated.response).ok_or_else(|| {
            KotobaError::provider(
                PROVIDER,
                format!("No translations found in response: {}", generated.response.trim()),
            )
        })
    }

    /// Check if Ollama is available and the model is loaded
    async fn check_availability(&self) -> Result<()> {
        let url = format!("{}/api/show", self.endpoint);

        let response = self.client
            .post(&url)
            .json(&json!({ "name": self.model }))
            .send()
            .await
            .map_err(|e| KotobaError::provider(PROVIDER, format!("Failed to connect to Ollama: {}", e)))?;

        if response.status().is_success() {
            info!("Ollama model '{}' is available", self.model);
            Ok(())
        } else {
            Err(KotobaError::provider(
                PROVIDER,
                format!(
                    "Ollama model '{}' not found. Please pull the model first: ollama pull {}",
                    self.model, self.model
                ),
            ))
        }
    }
}

/// Try to parse JSON with various common formats and wrappers
fn parse_translations(text: &str) -> Option<Vec<String>> {
    let text = text.trim();

    if let Ok(parsed) = serde_json::from_str::<BatchResult>(text) {
        return Some(parsed.translations);
    }

    let cleaned = remove_markdown_code_blocks(text);
    if cleaned != text {
        if let Ok(parsed) = serde_json::from_str::<BatchResult>(&cleaned) {
            return Some(parsed.translations);
        }
    }

    // Mixed text: first '{' to last '}'
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<BatchResult>(&cleaned[start..=end])
        .ok()
        .map(|parsed| parsed.translations)
}

/// Remove markdown code blocks from text
fn remove_markdown_code_blocks(text: &str) -> String {
    let text = text.trim();

    for (open, close) in [("```json", "```"), ("```", "```"), ("`json", "`"), ("`", "`")] {
        if text.len() >= open.len() + close.len() && text.starts_with(open) && text.ends_with(close) {
            return text[open.len()..text.len() - close.len()].trim().to_string();
        }
    }

    text.to_string()
}

/// Convert language code to full language name for clearer prompts
fn language_code_to_name(code: &str) -> String {
    let primary = code.split(['-', '_']).next().unwrap_or(code);
    match (primary.to_lowercase().as_str(), code) {
        ("zh", "zh-TW") => "Traditional Chinese".to_string(),
        ("zh", _) => "Simplified Chinese".to_string(),
        ("pt", "pt-BR") => "Brazilian Portuguese".to_string(),
        ("en", _) => "English".to_string(),
        ("fr", _) => "French".to_string(),
        ("de", _) => "German".to_string(),
        ("es", _) => "Spanish".to_string(),
        ("it", _) => "Italian".to_string(),
        ("ja", _) => "Japanese".to_string(),
        ("ko", _) => "Korean".to_string(),
        ("ru", _) => "Russian".to_string(),
        ("tr", _) => "Turkish".to_string(),
        ("pt", _) => "Portuguese".to_string(),
        ("nl", _) => "Dutch".to_string(),
        ("pl", _) => "Polish".to_string(),
        ("ar", _) => "Arabic".to_string(),
        ("vi", _) => "Vietnamese".to_string(),
        ("th", _) => "Thai".to_string(),
        _ => code.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_parse_direct_json() {
        let parsed = parse_translations(r#"{"translations": ["Bonjour {1}Monde{2}", "Tout supprimer"]}"#);
        assert_eq!(parsed.unwrap(), vec!["Bonjour {1}Monde{2}", "Tout supprimer"]);
    }

    #[test]
    fn test_parse_fenced_json() {
        let parsed = parse_translations("```json\n{\"translations\": [\"Salut\"]}\n```");
        assert_eq!(parsed.unwrap(), vec!["Salut"]);
    }

    #[test]
    fn test_parse_json_in_prose() {
        let parsed = parse_translations("Here you go: {\"translations\": [\"Salut\"]} Enjoy!");
        assert_eq!(parsed.unwrap(), vec!["Salut"]);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_translations("I cannot help with that").is_none());
        assert!(parse_translations("{\"text\": \"Salut\"}").is_none());
    }

    #[test]
    fn test_prompt_keeps_sentinels_and_count() {
        let translator = OllamaTranslator::new(&Config::default().translate).unwrap();
        let prompt = translator
            .build_prompt(&["Save {{}} files".to_string()], "en", "zh-CN")
            .unwrap();
        assert!(prompt.contains("{1}, {2} and {{}}"));
        assert!(prompt.contains("Simplified Chinese"));
        assert!(prompt.contains("exactly 1 strings"));
        assert!(prompt.contains("\"Save {{}} files\""));
    }

    #[test]
    fn test_language_names() {
        assert_eq!(language_code_to_name("zh-TW"), "Traditional Chinese");
        assert_eq!(language_code_to_name("pt"), "Portuguese");
        assert_eq!(language_code_to_name("xx"), "xx");
    }
}
