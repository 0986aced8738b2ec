use std::fmt;
use std::str::FromStr;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{self, ConfigStore};
use crate::error::GenerateError;
use crate::guard::CancelToken;
use crate::prompt::{format_prompt, normalize_response};
use crate::provider::{self, ClientFactory, ModelClient, ModelResponse};
use crate::ui::Prompter;

/// Models offered when no OpenAI model is configured
pub const OPENAI_MODELS: &[&str] = &[
    "gpt-3.5-turbo",
    "gpt-3.5-turbo-16k",
    "gpt-4",
    "gpt-4-turbo",
    "gpt-4o",
];

pub const DEFAULT_OLLAMA_MODEL: &str = "llama3";

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The three supported model hosting setups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Ollama on this machine or the local network
    Local,
    /// OpenAI
    CloudHosted,
    /// Azure OpenAI deployment
    EnterpriseHosted,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [Self::Local, Self::CloudHosted, Self::EnterpriseHosted];

    pub fn id(self) -> &'static str {
        match self {
            Self::Local => "ollama",
            Self::CloudHosted => "openai",
            Self::EnterpriseHosted => "azure",
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" | "local" => Ok(Self::Local),
            "openai" | "cloud" => Ok(Self::CloudHosted),
            "azure" | "enterprise" => Ok(Self::EnterpriseHosted),
            other => Err(format!(
                "invalid backend '{other}' (expected ollama, openai, or azure)"
            )),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Resolved settings for one backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Local {
        host: String,
        model: String,
    },
    CloudHosted {
        api_key: String,
        model: String,
        base_url: Option<String>,
    },
    EnterpriseHosted {
        endpoint: String,
        deployment: String,
        api_key: String,
        api_version: String,
    },
}

impl BackendConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Local { .. } => BackendKind::Local,
            Self::CloudHosted { .. } => BackendKind::CloudHosted,
            Self::EnterpriseHosted { .. } => BackendKind::EnterpriseHosted,
        }
    }

    /// Backend plus model or deployment, used in error messages
    pub fn label(&self) -> String {
        let detail = match self {
            Self::Local { model, .. } | Self::CloudHosted { model, .. } => model,
            Self::EnterpriseHosted { deployment, .. } => deployment,
        };
        format!("{} ({detail})", self.kind())
    }
}

/// Decide which backend to use: command-line choice, `default_backend`, or ask.
pub fn select_backend(
    preset: Option<BackendKind>,
    store: &dyn ConfigStore,
    prompter: &dyn Prompter,
) -> Result<BackendKind, GenerateError> {
    if let Some(kind) = preset {
        return Ok(kind);
    }

    if let Some(value) = store.get("default_backend") {
        return value
            .parse::<BackendKind>()
            .map_err(|e| GenerateError::Selection(format!("default_backend: {e}")));
    }

    let options: Vec<String> = BackendKind::ALL.iter().map(|k| k.id().to_string()).collect();
    let choice = prompter
        .select(
            "Select the AI model type to generate commit message",
            &options,
        )
        .ok_or_else(|| GenerateError::Selection("No model type selected".into()))?;

    choice
        .parse::<BackendKind>()
        .map_err(|_| GenerateError::Selection(format!("Invalid model type selected: {choice}")))
}

/// Resolves backend settings from the store, asking for anything missing.
pub struct Resolver<'a> {
    store: &'a mut dyn ConfigStore,
    prompter: &'a dyn Prompter,
    model_lister: fn() -> Vec<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a mut dyn ConfigStore, prompter: &'a dyn Prompter) -> Self {
        Self {
            store,
            prompter,
            model_lister: provider::list_ollama_models,
        }
    }

    /// Replace the source of the local model pick list
    pub fn with_model_lister(mut self, lister: fn() -> Vec<String>) -> Self {
        self.model_lister = lister;
        self
    }

    pub fn resolve(&mut self, kind: BackendKind) -> Result<BackendConfig, GenerateError> {
        match kind {
            BackendKind::Local => self.resolve_local(),
            BackendKind::CloudHosted => self.resolve_cloud(),
            BackendKind::EnterpriseHosted => self.resolve_enterprise(),
        }
    }

    fn resolve_local(&mut self) -> Result<BackendConfig, GenerateError> {
        let prompter = self.prompter;
        let lister = self.model_lister;
        let model = config::get_or_prompt(&mut *self.store, "ollama.model", || {
            prompter.select("Select an Ollama model", &lister())
        })
        .map_err(GenerateError::Config)?
        .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string());

        let host = self
            .store
            .get("ollama.host")
            .unwrap_or_else(|| config::DEFAULT_OLLAMA_HOST.to_string());

        Ok(BackendConfig::Local { host, model })
    }

    fn resolve_cloud(&mut self) -> Result<BackendConfig, GenerateError> {
        let prompter = self.prompter;
        let api_key = self.require("openai.api_key", "OpenAI API key", || {
            prompter.secret("Enter your OpenAI API key (sk-...)")
        })?;
        let model = self.require("openai.model", "OpenAI model", || {
            let options: Vec<String> = OPENAI_MODELS.iter().map(|m| m.to_string()).collect();
            prompter.select("Select an OpenAI model", &options)
        })?;
        let base_url = self.store.get("openai.base_url");

        Ok(BackendConfig::CloudHosted {
            api_key,
            model,
            base_url,
        })
    }

    fn resolve_enterprise(&mut self) -> Result<BackendConfig, GenerateError> {
        let prompter = self.prompter;
        let endpoint = self.require("azure.endpoint", "Azure OpenAI endpoint", || {
            prompter.input(
                "Enter Azure OpenAI endpoint",
                Some("https://<resource>.openai.azure.com"),
            )
        })?;
        let deployment = self.require("azure.deployment", "Azure OpenAI deployment", || {
            prompter.input("Enter Azure OpenAI deployment name", None)
        })?;
        let api_key = self.require("azure.api_key", "Azure OpenAI API key", || {
            prompter.secret("Enter Azure OpenAI API key")
        })?;
        let api_version = self.require("azure.api_version", "Azure OpenAI API version", || {
            prompter.input("Enter Azure OpenAI API version", Some("2024-06-01"))
        })?;

        Ok(BackendConfig::EnterpriseHosted {
            endpoint,
            deployment,
            api_key,
            api_version,
        })
    }

    fn require<F>(&mut self, key: &str, what: &str, prompt: F) -> Result<String, GenerateError>
    where
        F: FnOnce() -> Option<String>,
    {
        config::get_or_prompt(&mut *self.store, key, prompt)
            .map_err(GenerateError::Config)?
            .ok_or_else(|| {
                GenerateError::Selection(format!(
                    "No {what} provided. Set it with `commit-gen config set {key} <value>`."
                ))
            })
    }
}

/// Runs the commit-message prompt against one backend.
///
/// Configuration and client are resolved on first use.
pub struct ModelAdapter {
    kind: BackendKind,
    config: Option<BackendConfig>,
    client: Option<Arc<dyn ModelClient>>,
}

impl ModelAdapter {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            config: None,
            client: None,
        }
    }

    pub fn from_config(config: BackendConfig) -> Self {
        Self {
            kind: config.kind(),
            config: Some(config),
            client: None,
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn config(&self) -> Option<&BackendConfig> {
        self.config.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.client.is_some()
    }

    fn label(&self) -> String {
        self.config
            .as_ref()
            .map(BackendConfig::label)
            .unwrap_or_else(|| self.kind.to_string())
    }

    pub fn initialize(
        &mut self,
        resolver: &mut Resolver<'_>,
        clients: &dyn ClientFactory,
    ) -> Result<&mut Self, GenerateError> {
        if self.config.is_none() {
            self.config = Some(resolver.resolve(self.kind)?);
        }
        if self.client.is_none() {
            let config = self
                .config
                .as_ref()
                .ok_or_else(|| GenerateError::Selection("backend is not configured".into()))?;
            let client = clients
                .build(config)
                .map_err(|e| GenerateError::backend(config.label(), e))?;
            log::info!("Using {}", config.label());
            self.client = Some(client);
        }
        Ok(self)
    }

    /// Generate a commit message for `diff`.
    pub fn run(
        &mut self,
        diff: &str,
        resolver: &mut Resolver<'_>,
        clients: &dyn ClientFactory,
        cancel: &CancelToken,
    ) -> Result<String, GenerateError> {
        if !self.is_initialized() {
            self.initialize(resolver, clients)?;
        }
        let client = self
            .client
            .clone()
            .ok_or_else(|| GenerateError::Selection("backend is not configured".into()))?;

        let prompt = format_prompt(diff);
        cancel.check()?;

        let reply = invoke_cancellable(client, prompt, cancel)?
            .map_err(|e| GenerateError::backend(self.label(), e))?;

        let message = normalize_response(&reply.into_text());
        if message.is_empty() {
            return Err(GenerateError::backend(
                self.label(),
                anyhow::anyhow!("model returned an empty commit message"),
            ));
        }
        Ok(message)
    }
}

/// Invoke the client on a worker thread, giving up when `cancel` is set.
///
/// The outer result carries cancellation, the inner one the client's own outcome.
fn invoke_cancellable(
    client: Arc<dyn ModelClient>,
    prompt: String,
    cancel: &CancelToken,
) -> Result<anyhow::Result<ModelResponse>, GenerateError> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(client.invoke(&prompt));
    });

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg} {elapsed}") {
        spinner.set_style(style);
    }
    spinner.set_message("Generating commit message...");
    spinner.enable_steady_tick(Duration::from_millis(80));

    let outcome = loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(result) => break Ok(result),
            Err(RecvTimeoutError::Timeout) => {
                if cancel.is_cancelled() {
                    break Err(GenerateError::Cancelled);
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                break Ok(Err(anyhow::anyhow!("model worker stopped unexpectedly")));
            }
        }
    };

    spinner.finish_and_clear();
    if outcome.is_err() {
        log::info!("Operation cancelled by the user");
    }
    outcome
}
