use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::TranslateConfig;
use crate::error::{KotobaError, Result};
use super::BatchTranslator;

const PROVIDER: &str = "google";

/// Google Translate web endpoint. One POST per batch, one `q` field per
/// string.
pub struct GoogleTranslator {
    client: Client,
    endpoint: String,
}

impl GoogleTranslator {
    pub fn new(config: &TranslateConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()
            .map_err(KotobaError::Http)?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl BatchTranslator for GoogleTranslator {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        source_language: &str,
        target_language: &str,
    ) -> Result<Vec<String>> {
        let url = format!("{}/translate_a/t", self.endpoint);
        let query = [
            ("anno", "3"),
            ("client", "te"),
            ("v", "1.0"),
            ("format", "html"),
            ("sl", source_language),
            ("tl", target_language),
        ];
        let form: Vec<(&str, &str)> = texts.iter().map(|t| ("q", t.as_str())).collect();

        debug!("Sending {} strings to {}", texts.len(), url);

        let response = self.client
            .post(&url)
            .query(&query)
            .form(&form)
            .send()
            .await
            .map_err(|e| KotobaError::provider(PROVIDER, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(KotobaError::provider(
                PROVIDER,
                format!("API error {}: {}", status, error_text),
            ));
        }

        let body: Value = response.json().await
            .map_err(|e| KotobaError::provider(PROVIDER, format!("Failed to parse response: {}", e)))?;

        parse_response(&body)
    }
}

/// Extract translations from the endpoint's JSON. Elements are either a
/// string or `[translation, detected_language]`; a single-string request may
/// come back as a bare string.
fn parse_response(body: &Value) -> Result<Vec<String>> {
    let items = match body {
        Value::String(s) => return Ok(vec![decode_html_entities(s)]),
        Value::Array(items) => items,
        other => {
            return Err(KotobaError::provider(
                PROVIDER,
                format!("Unexpected response shape: {}", other),
            ));
        }
    };

    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(decode_html_entities(s)),
            Value::Array(parts) => match parts.first() {
                Some(Value::String(s)) => Ok(decode_html_entities(s)),
                _ => Err(KotobaError::provider(PROVIDER, format!("Unexpected item: {}", item))),
            },
            _ => Err(KotobaError::provider(PROVIDER, format!("Unexpected item: {}", item))),
        })
        .collect()
}

/// With `format=html` the endpoint escapes markup-significant characters.
fn decode_html_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let decoded = rest.find(';').and_then(|end| {
            let entity = &rest[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
