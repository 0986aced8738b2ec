use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Prefix for environment overrides, e.g. `COMMIT_GEN_OLLAMA_MODEL`
pub const ENV_PREFIX: &str = "COMMIT_GEN_";

/// Settings understood by commit-gen, with a short description each
pub const KNOWN_KEYS: &[(&str, &str)] = &[
    ("default_backend", "Backend used without asking (ollama, openai, azure)"),
    ("request_timeout_secs", "Timeout for a single model request, in seconds"),
    ("ollama.host", "Ollama server URL"),
    ("ollama.model", "Ollama model name"),
    ("openai.api_key", "OpenAI API key"),
    ("openai.model", "OpenAI model identifier"),
    ("openai.base_url", "OpenAI-compatible API base URL"),
    ("azure.endpoint", "Azure OpenAI endpoint URL or instance name"),
    ("azure.deployment", "Azure OpenAI deployment name"),
    ("azure.api_key", "Azure OpenAI API key"),
    ("azure.api_version", "Azure OpenAI API version"),
];

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Keyed, persistent settings with write-back.
///
/// Keys are dotted (`azure.endpoint`). Empty values are treated as absent.
pub trait ConfigStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn unset(&mut self, key: &str) -> Result<()>;
}

/// Read `key`, or ask for it and cache the answer for future runs.
///
/// Returns `Ok(None)` when the value is missing and the prompt produced nothing.
pub fn get_or_prompt<F>(store: &mut dyn ConfigStore, key: &str, prompt: F) -> Result<Option<String>>
where
    F: FnOnce() -> Option<String>,
{
    if let Some(value) = store.get(key) {
        return Ok(Some(value));
    }

    let answer = prompt()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    if let Some(value) = &answer {
        log::debug!("Caching {key} in configuration");
        store
            .set(key, value)
            .with_context(|| format!("Failed to save {key}"))?;
    }
    Ok(answer)
}

/// In-memory store, used by tests and for one-off runs
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    values: HashMap<String, String>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(pairs: &[(&str, &str)]) -> Self {
        let values = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { values }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).filter(|v| !v.is_empty()).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn unset(&mut self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// Layered store: environment → repository `.env` → global TOML.
///
/// Writes only ever touch the global TOML file.
#[derive(Debug, Clone, Default)]
pub struct TomlConfigStore {
    path: Option<PathBuf>,
    table: toml::Table,
    local: HashMap<String, String>,
}

impl TomlConfigStore {
    /// Load the global config file and the `.env` of the current repository
    pub fn load() -> Result<Self> {
        let mut store = match global_config_path() {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };

        if let Ok(root) = crate::git::find_repo_root(None) {
            let env_path = PathBuf::from(root).join(".env");
            if env_path.exists() {
                store.local = parse_dotenv(&env_path)?;
            }
        }
        Ok(store)
    }

    /// Load only the TOML file at `path` (a missing file is an empty config)
    pub fn from_path(path: PathBuf) -> Result<Self> {
        let table = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            content
                .parse::<toml::Table>()
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            toml::Table::new()
        };
        Ok(Self {
            path: Some(path),
            table,
            local: HashMap::new(),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Where a value currently comes from, for `config show`
    pub fn source_of(&self, key: &str) -> Option<&'static str> {
        if env_override(key).is_some() {
            Some("env")
        } else if self.local.get(&env_key(key)).is_some_and(|v| !v.is_empty()) {
            Some(".env")
        } else if self.file_value(key).is_some() {
            Some("config")
        } else {
            None
        }
    }

    fn file_value(&self, key: &str) -> Option<String> {
        let mut segments = key.split('.').peekable();
        let mut table = &self.table;
        while let Some(segment) = segments.next() {
            let value = table.get(segment)?;
            if segments.peek().is_none() {
                return match value {
                    toml::Value::String(s) => Some(s.clone()),
                    toml::Value::Integer(i) => Some(i.to_string()),
                    toml::Value::Boolean(b) => Some(b.to_string()),
                    toml::Value::Float(f) => Some(f.to_string()),
                    _ => None,
                }
                .filter(|v| !v.is_empty());
            }
            table = value.as_table()?;
        }
        None
    }

    fn save(&self) -> Result<()> {
        let path = self
            .path
            .as_ref()
            .context("Could not determine global config directory")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(&self.table).context("Failed to serialize config")?;
        let tmp_path = path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to rename temp file to {}", path.display()))?;
        Ok(())
    }
}

impl ConfigStore for TomlConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        env_override(key)
            .or_else(|| {
                self.local
                    .get(&env_key(key))
                    .filter(|v| !v.is_empty())
                    .cloned()
            })
            .or_else(|| self.file_value(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let (parents, leaf) = split_key(key)?;
        let mut table = &mut self.table;
        for segment in parents {
            let entry = table
                .entry(segment.to_string())
                .or_insert(toml::Value::Table(toml::Table::new()));
            if !entry.is_table() {
                *entry = toml::Value::Table(toml::Table::new());
            }
            table = entry
                .as_table_mut()
                .context("config entry is not a table")?;
        }
        table.insert(leaf.to_string(), toml::Value::String(value.to_string()));
        self.save()
    }

    fn unset(&mut self, key: &str) -> Result<()> {
        let (parents, leaf) = split_key(key)?;
        let mut table = &mut self.table;
        for segment in parents {
            match table.get_mut(segment).and_then(toml::Value::as_table_mut) {
                Some(next) => table = next,
                None => return Ok(()),
            }
        }
        if table.remove(leaf).is_some() {
            self.save()?;
        }
        Ok(())
    }
}

fn split_key(key: &str) -> Result<(Vec<&str>, &str)> {
    let mut segments: Vec<&str> = key.split('.').collect();
    if segments.iter().any(|s| s.trim().is_empty()) {
        bail!("Invalid config key '{key}'");
    }
    let leaf = segments.pop().context("empty config key")?;
    Ok((segments, leaf))
}

/// `azure.api_key` → `COMMIT_GEN_AZURE_API_KEY`
pub fn env_key(key: &str) -> String {
    format!("{ENV_PREFIX}{}", key.replace('.', "_").to_ascii_uppercase())
}

fn env_override(key: &str) -> Option<String> {
    std::env::var(env_key(key)).ok().filter(|v| !v.is_empty())
}

pub fn is_known_key(key: &str) -> bool {
    KNOWN_KEYS.iter().any(|(k, _)| *k == key)
}

pub fn is_secret_key(key: &str) -> bool {
    key.ends_with("api_key")
}

/// Global config file path
pub fn global_config_path() -> Option<PathBuf> {
    if let Some(override_dir) = std::env::var_os("COMMIT_GEN_CONFIG_HOME") {
        let override_path = PathBuf::from(override_dir);
        if !override_path.as_os_str().is_empty() {
            return Some(override_path.join("commit-gen").join("config.toml"));
        }
    }
    dirs::config_dir().map(|d| d.join("commit-gen").join("config.toml"))
}

/// Request timeout from `request_timeout_secs`, falling back to the default on bad input
pub fn request_timeout_secs(store: &dyn ConfigStore) -> u64 {
    store
        .get("request_timeout_secs")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_TIMEOUT_SECS)
}

pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    }
}

fn parse_dotenv(path: &Path) -> Result<HashMap<String, String>> {
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut map = HashMap::new();
    for item in iter {
        let (key, val) = item.with_context(|| format!("Failed to parse {}", path.display()))?;
        if key.starts_with(ENV_PREFIX) {
            map.insert(key, val);
        }
    }
    Ok(map)
}
