use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::{HallpassError, Result};

/// One turn in a chat-completions conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain("assistant", content)
    }

    /// A tool-result turn, answering the tool call with the given id.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    fn plain(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Tool calls requested by this message, if any.
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "default_tool_call_type")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object, exactly as the model emitted it.
    pub arguments: String,
}

fn default_tool_call_type() -> String {
    "function".to_string()
}

/// Seam between the dialogue loop and the model transport. The production
/// implementation is [`LlmService`]; tests script replies with their own impl.
pub trait ChatModel: Send + Sync {
    fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[serde_json::Value],
    ) -> impl std::future::Future<Output = Result<ChatMessage>> + Send;
}

/// LLM chat service speaking the OpenAI-compatible chat-completions dialect.
/// Groq and Ollama both expose this wire format, so one request shape covers
/// all supported providers.
pub struct LlmService {
    provider: LlmProvider,
    config: LlmConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for LlmService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmService")
            .field("provider", &self.provider)
            .field("model", &self.config.model)
            .finish()
    }
}

#[derive(Debug)]
enum LlmProvider {
    Groq,
    OpenAI,
    Ollama,
}

impl LlmService {
    /// Create an LLM service from configuration. Validates the provider name
    /// and resolves the API key up front so misconfiguration fails at startup,
    /// not on the first chat request.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let provider = match config.provider.as_str() {
            "groq" => LlmProvider::Groq,
            "openai" => LlmProvider::OpenAI,
            "ollama" => LlmProvider::Ollama,
            other => {
                return Err(HallpassError::Config(format!(
                    "unknown LLM provider: '{other}' (expected 'groq', 'openai', or 'ollama')"
                )));
            }
        };

        // Validate API key for providers that need one
        match &provider {
            LlmProvider::Groq => {
                resolve_api_key(config, "GROQ_API_KEY")?;
            }
            LlmProvider::OpenAI => {
                resolve_api_key(config, "OPENAI_API_KEY")?;
            }
            LlmProvider::Ollama => {}
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HallpassError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            provider,
            config: config.clone(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        let base_url = self.config.base_url.as_deref().unwrap_or(match self.provider {
            LlmProvider::Groq => "https://api.groq.com/openai",
            LlmProvider::OpenAI => "https://api.openai.com",
            LlmProvider::Ollama => "http://localhost:11434",
        });
        format!("{}/v1/chat/completions", base_url.trim_end_matches('/'))
    }

    fn api_key(&self) -> Result<Option<String>> {
        match self.provider {
            LlmProvider::Groq => resolve_api_key(&self.config, "GROQ_API_KEY").map(Some),
            LlmProvider::OpenAI => resolve_api_key(&self.config, "OPENAI_API_KEY").map(Some),
            LlmProvider::Ollama => Ok(None),
        }
    }
}

impl ChatModel for LlmService {
    /// POST {base_url}/v1/chat/completions and return the assistant message,
    /// including any `tool_calls` it carries.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[serde_json::Value],
    ) -> Result<ChatMessage> {
        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": 0.7,
            "max_tokens": self.config.max_tokens,
        });
        if !tools.is_empty() {
            body["tools"] = serde_json::Value::Array(tools.to_vec());
            body["tool_choice"] = serde_json::Value::String("auto".to_string());
        }

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = self.api_key()? {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let resp = request
            .send()
            .await
            .map_err(|e| HallpassError::Llm(format!("chat request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(HallpassError::Llm(format!("chat error {status}: {text}")));
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| HallpassError::Llm(format!("chat response parse error: {e}")))?;

        let message = json["choices"][0]["message"].clone();
        if message.is_null() {
            return Err(HallpassError::Llm(
                "chat response missing assistant message".into(),
            ));
        }

        serde_json::from_value(message)
            .map_err(|e| HallpassError::Llm(format!("malformed assistant message: {e}")))
    }
}

/// Resolve an API key from config, a custom env var, or a default env var.
fn resolve_api_key(config: &LlmConfig, default_env_var: &str) -> Result<String> {
    if let Some(ref key) = config.api_key {
        if !key.is_empty() {
            return Ok(key.clone());
        }
    }

    let env_var_name = config.env_var.as_deref().unwrap_or(default_env_var);

    std::env::var(env_var_name).map_err(|_| {
        HallpassError::Config(format!(
            "{} LLM provider requires an API key (set llm.api_key or {})",
            config.provider, env_var_name
        ))
    })
}
