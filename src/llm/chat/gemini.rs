use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::info;
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;

use super::{ ChatClient, CompletionResponse };
use crate::llm::{ LlmConfig, DEFAULT_BASE_URL, DEFAULT_COMPLETION_MODEL };

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<GeminiInlineData>,
}

impl GeminiPart {
    fn text(text: String) -> Self {
        Self { text: Some(text), inline_data: None }
    }

    fn inline_image(mime_type: &str, data: &[u8]) -> Self {
        Self {
            text: None,
            inline_data: Some(GeminiInlineData {
                mime_type: mime_type.to_string(),
                data: BASE64.encode(data),
            }),
        }
    }
}

#[derive(Serialize)]
struct GeminiInlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
}

#[derive(Deserialize)]
struct GoogleCandidate {
    content: GoogleContent,
}

#[derive(Deserialize)]
struct GoogleContent {
    #[serde(default)]
    parts: Vec<GooglePart>,
}

#[derive(Deserialize)]
struct GooglePart {
    #[serde(default)]
    text: String,
}

fn extract_text(response: GoogleResponse) -> Option<String> {
    response.candidates
        .first()
        .and_then(|c| c.content.parts.first())
        .map(|p| p.text.clone())
}

pub struct GeminiChatClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiChatClient {
    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| DEFAULT_COMPLETION_MODEL.to_string());
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Self {
            http: reqwest::Client::new(),
            api_key,
            model,
            base_url,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        if config.api_key.is_empty() {
            return Err("Google API key is required for GeminiChatClient".into());
        }
        Ok(
            Self::new(
                config.api_key.clone(),
                config.completion_model.clone(),
                config.base_url.clone()
            )
        )
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url.trim_end_matches('/'),
            self.model,
            self.api_key
        )
    }

    async fn generate(
        &self,
        parts: Vec<GeminiPart>
    ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
        let payload = GeminiRequest {
            contents: vec![GeminiContent { parts }],
        };

        let response = self.http.post(self.endpoint()).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Gemini API returned {}: {}", status, body).into());
        }

        let parsed: GoogleResponse = response.json().await?;
        let text = extract_text(parsed).ok_or("Gemini API returned no candidates")?;

        Ok(CompletionResponse { response: text })
    }
}

#[async_trait]
impl ChatClient for GeminiChatClient {
    async fn complete(
        &self,
        prompt: &str
    ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
        info!("GeminiChatClient::complete() → model={}", self.model);
        self.generate(vec![GeminiPart::text(prompt.to_string())]).await
    }

    async fn complete_with_image(
        &self,
        prompt: &str,
        mime_type: &str,
        data: &[u8]
    ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
        info!(
            "GeminiChatClient::complete_with_image() → model={} mime_type={} bytes={}",
            self.model,
            mime_type,
            data.len()
        );
        self.generate(
            vec![GeminiPart::text(prompt.to_string()), GeminiPart::inline_image(mime_type, data)]
        ).await
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_text_comes_from_first_candidate() {
        let raw = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "The answer is 4."}], "role": "model"}}
            ]
        }"#;
        let parsed: GoogleResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(extract_text(parsed).unwrap(), "The answer is 4.");
    }

    #[test]
    fn empty_candidates_yield_no_text() {
        let parsed: GoogleResponse = serde_json::from_str("{}").unwrap();
        assert!(extract_text(parsed).is_none());
    }

    #[test]
    fn image_part_is_base64_inline_data() {
        let part = GeminiPart::inline_image("image/png", &[1, 2, 3]);
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["inlineData"]["mimeType"], "image/png");
        assert_eq!(json["inlineData"]["data"], "AQID");
        assert!(json.get("text").is_none());
    }

    #[test]
    fn endpoint_includes_model_and_key() {
        let client = GeminiChatClient::new("k".to_string(), None, None);
        assert_eq!(
            client.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent?key=k"
        );
    }
}
