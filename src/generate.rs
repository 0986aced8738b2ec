use crate::backend::{select_backend, BackendKind, ModelAdapter, Resolver};
use crate::config::ConfigStore;
use crate::error::GenerateError;
use crate::git::{ChangeSource, Repository};
use crate::guard::{check_size, CancelToken, InProgress};
use crate::provider::{self, ClientFactory};
use crate::sink::MessageSink;
use crate::ui::{Notifier, Prompter};

/// Steps of a single generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Diffing,
    Guarding,
    SelectingBackend,
    Generating,
    WritingResult,
    Failed,
}

/// Result for one repository
#[derive(Debug)]
pub enum Outcome {
    Written(String),
    NoChanges,
    Failed(GenerateError),
}

/// Result of one invocation of the generate command
#[derive(Debug)]
pub enum RunReport {
    /// Another generation was already running; nothing was done
    Busy,
    /// The command could not start (e.g. git unavailable)
    Aborted(GenerateError),
    Finished(Vec<(Repository, Outcome)>),
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        match self {
            Self::Busy | Self::Aborted(_) => false,
            Self::Finished(outcomes) => outcomes
                .iter()
                .all(|(_, outcome)| !matches!(outcome, Outcome::Failed(_))),
        }
    }

    pub fn was_cancelled(&self) -> bool {
        match self {
            Self::Finished(outcomes) => outcomes
                .iter()
                .any(|(_, o)| matches!(o, Outcome::Failed(e) if e.is_cancelled())),
            _ => false,
        }
    }
}

/// The "generate commit message" command.
///
/// Collaborators are borrowed so callers can inspect them after a run.
pub struct Generator<'a> {
    source: &'a dyn ChangeSource,
    sink: &'a dyn MessageSink,
    store: &'a mut dyn ConfigStore,
    prompter: &'a dyn Prompter,
    clients: &'a dyn ClientFactory,
    notifier: &'a dyn Notifier,
    in_progress: &'a InProgress,
    cancel: CancelToken,
    backend: Option<BackendKind>,
    model_lister: fn() -> Vec<String>,
}

impl<'a> Generator<'a> {
    pub fn new(
        source: &'a dyn ChangeSource,
        sink: &'a dyn MessageSink,
        store: &'a mut dyn ConfigStore,
        prompter: &'a dyn Prompter,
        clients: &'a dyn ClientFactory,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Self {
            source,
            sink,
            store,
            prompter,
            clients,
            notifier,
            in_progress: InProgress::global(),
            cancel: CancelToken::new(),
            backend: None,
            model_lister: provider::list_ollama_models,
        }
    }

    /// Skip the interactive backend pick
    pub fn with_backend(mut self, backend: Option<BackendKind>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_in_progress(mut self, in_progress: &'a InProgress) -> Self {
        self.in_progress = in_progress;
        self
    }

    pub fn with_model_lister(mut self, lister: fn() -> Vec<String>) -> Self {
        self.model_lister = lister;
        self
    }

    /// Generate and write a message for every repository.
    ///
    /// Never returns an error: every failure is reported through the notifier.
    pub fn run(&mut self) -> RunReport {
        let in_progress = self.in_progress;
        let Some(_guard) = in_progress.try_acquire() else {
            self.notifier.info("Commit message is being generated");
            return RunReport::Busy;
        };

        let repos = match self.source.repositories() {
            Ok(repos) if !repos.is_empty() => repos,
            Ok(_) => {
                let err = GenerateError::Setup("No git repositories found.".into());
                return self.abort(err);
            }
            Err(e) => {
                let err = GenerateError::Setup(format!("Git integration is not available: {e:#}"));
                return self.abort(err);
            }
        };

        let mut outcomes = Vec::with_capacity(repos.len());
        for repo in repos {
            let outcome = match self.generate_for(&repo) {
                Ok(Some(message)) => {
                    self.notifier.info("Commit message generated successfully");
                    Outcome::Written(message)
                }
                Ok(None) => Outcome::NoChanges,
                Err(err) => {
                    self.enter(Phase::Failed, &repo);
                    if err.is_cancelled() {
                        self.notifier.info(&err.to_string());
                    } else {
                        log::debug!("{}: {err:?}", repo.display_name());
                        self.notifier.error(&err.to_string());
                    }
                    Outcome::Failed(err)
                }
            };
            self.enter(Phase::Idle, &repo);
            outcomes.push((repo, outcome));
        }

        RunReport::Finished(outcomes)
    }

    fn abort(&self, err: GenerateError) -> RunReport {
        log::debug!("{err:?}");
        self.notifier
            .error(&format!("Error generating commit message: {err}"));
        RunReport::Aborted(err)
    }

    /// One pass of the state machine; `Ok(None)` means nothing was staged.
    fn generate_for(&mut self, repo: &Repository) -> Result<Option<String>, GenerateError> {
        self.enter(Phase::Diffing, repo);
        let diff = self
            .source
            .staged_diff(repo)
            .map_err(GenerateError::Diff)?;
        if diff.trim().is_empty() {
            self.notifier.info("No changes to commit.");
            return Ok(None);
        }

        self.enter(Phase::Guarding, repo);
        let tokens = check_size(&diff)?;
        log::debug!("{}: diff is about {tokens} tokens", repo.display_name());
        self.cancel.check()?;

        self.enter(Phase::SelectingBackend, repo);
        let kind = select_backend(self.backend, &*self.store, self.prompter)?;

        self.enter(Phase::Generating, repo);
        let mut adapter = ModelAdapter::new(kind);
        let mut resolver =
            Resolver::new(&mut *self.store, self.prompter).with_model_lister(self.model_lister);
        let message = adapter.run(&diff, &mut resolver, self.clients, &self.cancel)?;

        self.enter(Phase::WritingResult, repo);
        self.sink
            .write(repo, &message)
            .map_err(GenerateError::Sink)?;
        Ok(Some(message))
    }

    fn enter(&self, phase: Phase, repo: &Repository) {
        log::debug!("{}: {phase:?}", repo.display_name());
    }
}
