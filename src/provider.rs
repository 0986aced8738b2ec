use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::BackendConfig;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const TEMPERATURE: f64 = 0.5;

/// Models offered when `ollama list` is unavailable or empty
pub const FALLBACK_OLLAMA_MODELS: &[&str] = &["llama3", "mistral", "gemma"];

/// Reply shapes returned by the different model APIs
#[derive(Debug, Clone, PartialEq)]
pub enum ModelResponse {
    /// Completion endpoints return the generated text directly
    Text(String),
    /// Chat endpoints return a message object
    Message { content: String },
}

impl ModelResponse {
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Message { content } => content,
        }
    }
}

/// A configured model that turns a prompt into a reply
pub trait ModelClient: Send + Sync {
    fn invoke(&self, prompt: &str) -> Result<ModelResponse>;
}

/// Builds a client for a resolved backend configuration
pub trait ClientFactory {
    fn build(&self, config: &BackendConfig) -> Result<Arc<dyn ModelClient>>;
}

/// Factory producing the HTTP clients below
pub struct HttpClientFactory {
    timeout: Duration,
}

impl HttpClientFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ClientFactory for HttpClientFactory {
    fn build(&self, config: &BackendConfig) -> Result<Arc<dyn ModelClient>> {
        let agent = ureq::AgentBuilder::new().timeout(self.timeout).build();
        let client: Arc<dyn ModelClient> = match config {
            BackendConfig::Local { host, model } => Arc::new(OllamaClient {
                agent,
                host: host.trim_end_matches('/').to_string(),
                model: model.clone(),
            }),
            BackendConfig::CloudHosted {
                api_key,
                model,
                base_url,
            } => Arc::new(OpenAiClient {
                agent,
                base_url: base_url
                    .as_deref()
                    .unwrap_or(OPENAI_BASE_URL)
                    .trim_end_matches('/')
                    .to_string(),
                api_key: api_key.clone(),
                model: model.clone(),
            }),
            BackendConfig::EnterpriseHosted {
                endpoint,
                deployment,
                api_key,
                api_version,
            } => Arc::new(AzureOpenAiClient {
                agent,
                base_url: azure_base_url(endpoint),
                deployment: deployment.clone(),
                api_key: api_key.clone(),
                api_version: api_version.clone(),
            }),
        };
        Ok(client)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: SamplingOptions,
}

#[derive(Serialize)]
struct SamplingOptions {
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: [ChatMessage<'a>; 1],
    temperature: f64,
}

impl<'a> ChatRequest<'a> {
    fn user(model: Option<&'a str>, prompt: &'a str) -> Self {
        Self {
            model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: TEMPERATURE,
        }
    }
}

/// Ollama `/api/generate`, non-streaming
pub struct OllamaClient {
    agent: ureq::Agent,
    host: String,
    model: String,
}

impl ModelClient for OllamaClient {
    fn invoke(&self, prompt: &str) -> Result<ModelResponse> {
        let url = format!("{}/api/generate", self.host);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: SamplingOptions {
                temperature: TEMPERATURE,
            },
        };
        let json = post_json(&self.agent, &url, &[], &body)?;
        extract_by_path(&json, "response").map(ModelResponse::Text)
    }
}

/// OpenAI chat completions
pub struct OpenAiClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
    model: String,
}

impl ModelClient for OpenAiClient {
    fn invoke(&self, prompt: &str) -> Result<ModelResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest::user(Some(self.model.as_str()), prompt);
        let auth = format!("Bearer {}", self.api_key);
        let json = post_json(&self.agent, &url, &[("Authorization", auth.as_str())], &body)?;
        extract_by_path(&json, "choices.0.message.content")
            .map(|content| ModelResponse::Message { content })
    }
}

/// Azure OpenAI chat completions against a named deployment
pub struct AzureOpenAiClient {
    agent: ureq::Agent,
    base_url: String,
    deployment: String,
    api_key: String,
    api_version: String,
}

impl AzureOpenAiClient {
    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.base_url, self.deployment, self.api_version
        )
    }
}

impl ModelClient for AzureOpenAiClient {
    fn invoke(&self, prompt: &str) -> Result<ModelResponse> {
        // the deployment in the URL selects the model
        let body = ChatRequest::user(None, prompt);
        let json = post_json(&self.agent, &self.url(), &[("api-key", self.api_key.as_str())], &body)?;
        extract_by_path(&json, "choices.0.message.content")
            .map(|content| ModelResponse::Message { content })
    }
}

/// Full endpoint URL, or `https://<name>.openai.azure.com` for a bare instance name
pub fn azure_base_url(endpoint: &str) -> String {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("https://{endpoint}.openai.azure.com")
    }
}

fn post_json(
    agent: &ureq::Agent,
    url: &str,
    headers: &[(&str, &str)],
    body: &impl Serialize,
) -> Result<Value> {
    log::debug!("POST {url}");
    let mut req = agent.post(url);
    for (key, val) in headers {
        req = req.set(key, val);
    }
    req = req.set("Content-Type", "application/json");

    let response = req.send_json(body).map_err(|e| match e {
        ureq::Error::Status(code, resp) => {
            let body = resp.into_string().unwrap_or_default();
            anyhow::anyhow!("API returned HTTP {code}: {body}")
        }
        ureq::Error::Transport(t) => anyhow::anyhow!("Network error: {t}"),
    })?;

    let json: Value = response
        .into_json()
        .context("Failed to parse API response as JSON")?;
    log::trace!("Response: {json}");
    Ok(json)
}

/// Walk a JSON value by a dot-separated path like "choices.0.message.content"
fn extract_by_path(value: &Value, path: &str) -> Result<String> {
    let found = path
        .split('.')
        .try_fold(value, |current, segment| match segment.parse::<usize>() {
            Ok(index) => current.get(index),
            Err(_) => current.get(segment),
        })
        .and_then(Value::as_str);

    found.map(str::to_string).with_context(|| {
        format!(
            "Failed to extract message from response at path '{}'. Response:\n{}",
            path,
            serde_json::to_string_pretty(value).unwrap_or_default()
        )
    })
}

/// Installed Ollama models, or the built-in list when `ollama list` fails
pub fn list_ollama_models() -> Vec<String> {
    let output = Command::new("ollama").arg("list").output();
    let models = match output {
        Ok(out) if out.status.success() => parse_ollama_list(&String::from_utf8_lossy(&out.stdout)),
        Ok(out) => {
            log::warn!(
                "ollama list failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            );
            Vec::new()
        }
        Err(e) => {
            log::warn!("Could not run ollama list: {e}");
            Vec::new()
        }
    };

    if models.is_empty() {
        FALLBACK_OLLAMA_MODELS.iter().map(|m| m.to_string()).collect()
    } else {
        models
    }
}

/// First column of each `ollama list` row, header skipped
pub fn parse_ollama_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("NAME"))
        .filter_map(|line| line.split_whitespace().next())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ollama_list_takes_first_column() {
        let out = "NAME            ID              SIZE      MODIFIED\n\
                   llama3:latest   365c0bd3c000    4.7 GB    2 days ago\n\
                   mistral:7b      61e88e884507    4.1 GB    3 weeks ago\n";
        assert_eq!(parse_ollama_list(out), vec!["llama3:latest", "mistral:7b"]);
    }

    #[test]
    fn parse_ollama_list_header_only_is_empty() {
        assert!(parse_ollama_list("NAME ID SIZE MODIFIED\n").is_empty());
    }

    #[test]
    fn azure_base_url_accepts_instance_names_and_urls() {
        assert_eq!(azure_base_url("contoso"), "https://contoso.openai.azure.com");
        assert_eq!(
            azure_base_url("https://contoso.openai.azure.com/"),
            "https://contoso.openai.azure.com"
        );
    }

    #[test]
    fn extract_by_path_walks_arrays_and_objects() {
        let json = serde_json::json!({"choices": [{"message": {"content": "hi"}}]});
        assert_eq!(
            extract_by_path(&json, "choices.0.message.content").expect("path"),
            "hi"
        );
        let err = extract_by_path(&json, "choices.1.message").expect_err("missing");
        assert!(err.to_string().contains("Failed to extract message"));
    }

    #[test]
    fn response_shapes_collapse_to_text() {
        assert_eq!(ModelResponse::Text("a".into()).into_text(), "a");
        assert_eq!(
            ModelResponse::Message {
                content: "b".into()
            }
            .into_text(),
            "b"
        );
    }
}
