use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;

use crate::backend::BackendKind;
use crate::config::{self, ConfigStore, TomlConfigStore, KNOWN_KEYS};
use crate::sink::OutputKind;

#[derive(Parser, Debug)]
#[command(
    name = "commit-gen",
    about = "Draft git commit messages from staged changes via LLMs",
    version,
    after_help = "Arguments after `--` are forwarded to `git commit` when using `--output edit` or `--output commit`."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Backend to use instead of asking: ollama, openai, or azure
    #[arg(short, long, value_name = "BACKEND")]
    pub backend: Option<BackendKind>,

    /// Repository to generate for (repeatable; defaults to the current one)
    #[arg(short, long = "repo", value_name = "PATH")]
    pub repos: Vec<PathBuf>,

    /// Where to put the message: stdout, edit (review in git's commit editor), or commit
    #[arg(short, long, value_name = "OUTPUT", default_value_t = OutputKind::Stdout)]
    pub output: OutputKind,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Extra arguments forwarded to `git commit`
    #[arg(last = true)]
    pub extra_args: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect or change stored settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Print the prompt template sent to the model
    Prompt,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show every known setting and where its value comes from
    Show,
    /// Store a setting in the global config file
    Set { key: String, value: String },
    /// Remove a setting from the global config file
    Unset { key: String },
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn run_config(action: &ConfigAction) -> Result<()> {
    let mut store = TomlConfigStore::load()?;

    match action {
        ConfigAction::Show => {
            let path = store
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(no config directory)".into());
            println!("\n{}  configuration {}\n", "commit-gen".cyan().bold(), path.dimmed());
            for line in render_settings(&store) {
                println!("{line}");
            }
        }
        ConfigAction::Set { key, value } => {
            ensure_known_key(key)?;
            if key == "default_backend" {
                if let Err(e) = value.parse::<BackendKind>() {
                    bail!(e);
                }
            }
            store.set(key, value)?;
            println!("{} {} updated", "done!".green().bold(), key.yellow());
        }
        ConfigAction::Unset { key } => {
            ensure_known_key(key)?;
            store.unset(key)?;
            println!("{} {} removed", "done!".green().bold(), key.yellow());
        }
    }
    Ok(())
}

fn ensure_known_key(key: &str) -> Result<()> {
    if !config::is_known_key(key) {
        let known: Vec<&str> = KNOWN_KEYS.iter().map(|(k, _)| *k).collect();
        bail!("Unknown setting '{}'. Known settings: {}", key, known.join(", "));
    }
    Ok(())
}

/// One line per known key, secrets masked
pub fn render_settings(store: &TomlConfigStore) -> Vec<String> {
    KNOWN_KEYS
        .iter()
        .map(|(key, description)| {
            let value = match store.get(key) {
                Some(v) if config::is_secret_key(key) => config::mask_key(&v),
                Some(v) => v,
                None => "(not set)".into(),
            };
            let source = store
                .source_of(key)
                .map(|s| format!("[{s}]"))
                .unwrap_or_default();
            format!(
                "  {:<22} {:<36} {} {}",
                key,
                value,
                source.dimmed(),
                description.dimmed()
            )
        })
        .collect()
}
