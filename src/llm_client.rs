use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::log_llm_operation;

/// Which remote text-generation API the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    OpenAi,
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Gemini => "Gemini",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Narrow adapter around the remote text-generation collaborator.
///
/// The collaborator offers a single operation: prompt in, raw text out. All
/// prompt construction and response parsing belongs to the callers; this
/// client only handles transport, auth and the bounded request timeout.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: Client,
    provider: ProviderKind,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessageBody {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageBody,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: String,
}

impl LlmClient {
    pub fn new(
        provider: ProviderKind,
        api_key: String,
        base_url: Option<String>,
        model: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        let (base_url, model) = match provider {
            ProviderKind::OpenAi => (
                base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
                model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
            ),
            ProviderKind::Gemini => (
                base_url.unwrap_or_else(|| {
                    "https://generativelanguage.googleapis.com/v1beta".to_string()
                }),
                model.unwrap_or_else(|| "gemini-2.0-flash".to_string()),
            ),
        };

        Ok(Self {
            http,
            provider,
            api_key,
            base_url,
            model,
        })
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.as_str()
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Issue a single generation request and return the raw response text.
    ///
    /// Transport errors, non-success statuses, empty responses and timeout
    /// expiry all surface as errors; callers decide whether that means
    /// failure or a fallback path.
    pub async fn generate(&self, system_message: Option<&str>, prompt: &str) -> Result<String> {
        log_llm_operation!(start, "generate", provider = self.provider);

        let result = match self.provider {
            ProviderKind::OpenAi => self.generate_openai(system_message, prompt).await,
            ProviderKind::Gemini => self.generate_gemini(system_message, prompt).await,
        };

        match &result {
            Ok(text) => {
                log_llm_operation!(
                    success,
                    "generate",
                    provider = self.provider,
                    response_length = text.len()
                );
            }
            Err(e) => {
                log_llm_operation!(error, "generate", provider = self.provider, error = e);
            }
        }

        result
    }

    async fn generate_openai(&self, system_message: Option<&str>, prompt: &str) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(system) = system_message {
            messages.push(ChatMessageBody {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessageBody {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.model,
                "messages": messages,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("OpenAI API request failed ({}): {}", status, body);
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No choices in OpenAI response"))?;

        Ok(choice.message.content)
    }

    async fn generate_gemini(&self, system_message: Option<&str>, prompt: &str) -> Result<String> {
        // Gemini has no separate system slot in this API shape; prepend it.
        let full_prompt = match system_message {
            Some(system) => format!("{}\n\n{}", system, prompt),
            None => prompt.to_string(),
        };

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let response = self
            .http
            .post(&url)
            .json(&json!({
                "contents": [{ "parts": [{ "text": full_prompt }] }],
                "generationConfig": {
                    "temperature": 0.7,
                    "topK": 40,
                    "topP": 0.9,
                    "maxOutputTokens": 4096,
                },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("Gemini API request failed ({}): {}", status, body);
        }

        let parsed: GeminiResponse = response.json().await?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| anyhow::anyhow!("No candidates in Gemini response"))?;

        Ok(text)
    }
}

/// Extract JSON from model responses that might be wrapped in markdown
/// code fences or surrounded by prose.
pub fn extract_json(content: &str) -> String {
    if let Some(start) = content.find("```json") {
        if let Some(end) = content[start + 7..].find("```") {
            return content[start + 7..start + 7 + end].trim().to_string();
        }
    }

    if let Some(start) = content.find("```") {
        if let Some(end) = content[start + 3..].find("```") {
            let candidate = content[start + 3..start + 3 + end].trim();
            if candidate.starts_with('{') || candidate.starts_with('[') {
                return candidate.to_string();
            }
        }
    }

    if let Some(start) = content.find('{') {
        if let Some(end) = content.rfind('}') {
            if end > start {
                return content[start..=end].to_string();
            }
        }
    }

    if let Some(start) = content.find('[') {
        if let Some(end) = content.rfind(']') {
            if end > start {
                return content[start..=end].to_string();
            }
        }
    }

    content.trim().to_string()
}

/// Parse a model response into `T`, tolerating markdown wrapping.
pub fn parse_json_response<T>(content: &str) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let json_content = extract_json(content);
    serde_json::from_str::<T>(&json_content)
        .map_err(|e| anyhow::anyhow!("Failed to parse JSON response: {}", e))
}
