#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use commit_gen::backend::BackendConfig;
use commit_gen::git::{ChangeSource, Repository};
use commit_gen::provider::{ClientFactory, ModelClient, ModelResponse};
use commit_gen::sink::MessageSink;
use commit_gen::ui::{Notifier, Prompter};
use tempfile::TempDir;

pub struct DirGuard {
    original: PathBuf,
}

impl DirGuard {
    pub fn enter(path: &Path) -> Self {
        let original = std::env::current_dir().expect("failed to read current directory");
        std::env::set_current_dir(path).expect("failed to change current directory");
        Self { original }
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.original);
    }
}

pub struct EnvGuard {
    previous: HashMap<String, Option<String>>,
}

impl EnvGuard {
    pub fn set(pairs: &[(&str, &str)]) -> Self {
        let mut previous = HashMap::new();
        for (key, value) in pairs {
            previous.insert((*key).to_string(), std::env::var(key).ok());
            std::env::set_var(key, value);
        }
        Self { previous }
    }

    pub fn clear(keys: &[&str]) -> Self {
        let mut previous = HashMap::new();
        for key in keys {
            previous.insert((*key).to_string(), std::env::var(key).ok());
            std::env::remove_var(key);
        }
        Self { previous }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            if let Some(value) = value {
                std::env::set_var(key, value);
            } else {
                std::env::remove_var(key);
            }
        }
    }
}

pub fn init_git_repo() -> TempDir {
    let repo = TempDir::new().expect("failed to create temp dir");
    git_ok(repo.path(), ["init"]);
    git_ok(repo.path(), ["config", "user.name", "Test User"]);
    git_ok(repo.path(), ["config", "user.email", "test@example.com"]);
    git_ok(repo.path(), ["config", "commit.gpgsign", "false"]);
    repo
}

pub fn write_file(path: &Path, content: &str) {
    std::fs::write(path, content).expect("failed to write file");
}

pub fn git_ok<const N: usize>(cwd: &Path, args: [&str; N]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git command failed: git {}\nstdout: {}\nstderr: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

pub fn git_stdout<const N: usize>(cwd: &Path, args: [&str; N]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git command failed: git {}\nstdout: {}\nstderr: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Change source with a fixed diff for every repository
pub struct FakeSource {
    pub repos: Vec<Repository>,
    pub diff: String,
    pub fail_setup: bool,
    pub diff_calls: Cell<usize>,
}

impl FakeSource {
    pub fn with_diff(diff: &str) -> Self {
        Self {
            repos: vec![Repository::new("/work/project")],
            diff: diff.to_string(),
            fail_setup: false,
            diff_calls: Cell::new(0),
        }
    }
}

impl ChangeSource for FakeSource {
    fn repositories(&self) -> Result<Vec<Repository>> {
        if self.fail_setup {
            anyhow::bail!("Git extension is not available.");
        }
        Ok(self.repos.clone())
    }

    fn staged_diff(&self, _repo: &Repository) -> Result<String> {
        self.diff_calls.set(self.diff_calls.get() + 1);
        Ok(self.diff.clone())
    }
}

/// Sink remembering everything written to it
#[derive(Default)]
pub struct RecordingSink {
    pub written: RefCell<Vec<(PathBuf, String)>>,
}

impl MessageSink for RecordingSink {
    fn write(&self, repo: &Repository, message: &str) -> Result<()> {
        self.written
            .borrow_mut()
            .push((repo.root.clone(), message.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub infos: RefCell<Vec<String>>,
    pub errors: RefCell<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn info(&self, message: &str) {
        self.infos.borrow_mut().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.borrow_mut().push(message.to_string());
    }
}

/// Prompter answering from a queue; an exhausted queue means "cancelled"
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: RefCell<VecDeque<Option<String>>>,
    pub asked: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn answering(answers: &[&str]) -> Self {
        Self {
            answers: RefCell::new(answers.iter().map(|a| Some(a.to_string())).collect()),
            asked: RefCell::new(Vec::new()),
        }
    }

    fn next(&self, message: &str) -> Option<String> {
        self.asked.borrow_mut().push(message.to_string());
        self.answers.borrow_mut().pop_front().flatten()
    }
}

impl Prompter for ScriptedPrompter {
    fn select(&self, message: &str, _options: &[String]) -> Option<String> {
        self.next(message)
    }

    fn input(&self, message: &str, _placeholder: Option<&str>) -> Option<String> {
        self.next(message)
    }

    fn secret(&self, message: &str) -> Option<String> {
        self.next(message)
    }
}

/// Model client returning a canned reply
pub struct StubClient {
    reply: std::result::Result<ModelResponse, String>,
    delay: Duration,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl StubClient {
    pub fn replying(reply: ModelResponse) -> Self {
        Self {
            reply: Ok(reply),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            ..Self::replying(ModelResponse::Text(String::new()))
        }
    }

    pub fn slow(reply: ModelResponse, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::replying(reply)
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ModelClient for StubClient {
    fn invoke(&self, prompt: &str) -> Result<ModelResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(prompt.to_string());
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.reply.clone().map_err(|e| anyhow::anyhow!(e))
    }
}

/// Factory handing out one shared stub and recording the configs it saw
pub struct StubFactory {
    pub client: Arc<StubClient>,
    pub built: Mutex<Vec<BackendConfig>>,
}

impl StubFactory {
    pub fn new(client: StubClient) -> Self {
        Self {
            client: Arc::new(client),
            built: Mutex::new(Vec::new()),
        }
    }

    pub fn built(&self) -> Vec<BackendConfig> {
        self.built.lock().expect("built lock").clone()
    }
}

impl ClientFactory for StubFactory {
    fn build(&self, config: &BackendConfig) -> Result<Arc<dyn ModelClient>> {
        self.built.lock().expect("built lock").push(config.clone());
        let client: Arc<dyn ModelClient> = self.client.clone();
        Ok(client)
    }
}

pub fn no_models() -> Vec<String> {
    vec!["llama3".to_string()]
}
