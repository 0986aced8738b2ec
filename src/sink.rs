use anyhow::{Context, Result};
use std::fmt;
use std::str::FromStr;

use crate::git::{self, Repository};

/// Receives the finished commit message for a repository.
///
/// Only called with a complete, normalized message.
pub trait MessageSink {
    fn write(&self, repo: &Repository, message: &str) -> Result<()>;
}

/// Prints the message on stdout
pub struct StdoutSink;

impl MessageSink for StdoutSink {
    fn write(&self, _repo: &Repository, message: &str) -> Result<()> {
        println!("{message}");
        Ok(())
    }
}

/// Draft file under the git dir used by [`EditSink`]
pub const DRAFT_FILE: &str = "COMMIT_GEN_MSG";

/// Opens git's commit editor pre-filled with the message.
///
/// The message is staged in `<git dir>/COMMIT_GEN_MSG` and handed to
/// `git commit --edit -F`. The file is kept when the commit does not happen.
pub struct EditSink {
    pub extra_args: Vec<String>,
}

impl MessageSink for EditSink {
    fn write(&self, repo: &Repository, message: &str) -> Result<()> {
        let path = git::git_dir(&repo.root)?.join(DRAFT_FILE);
        std::fs::write(&path, format!("{message}\n"))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::debug!("Draft message written to {}", path.display());

        git::run_commit_edit(&repo.root, &path, &self.extra_args).with_context(|| {
            format!(
                "git commit failed; the generated message is kept in {}",
                path.display()
            )
        })?;

        if let Err(e) = std::fs::remove_file(&path) {
            log::warn!("Could not remove {}: {e}", path.display());
        }
        Ok(())
    }
}

/// Commits the staged changes with the message
pub struct CommitSink {
    pub extra_args: Vec<String>,
}

impl MessageSink for CommitSink {
    fn write(&self, repo: &Repository, message: &str) -> Result<()> {
        git::run_commit(&repo.root, message, &self.extra_args, false).context("git commit failed")
    }
}

/// Sink selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputKind {
    #[default]
    Stdout,
    Edit,
    Commit,
}

impl OutputKind {
    pub fn into_sink(self, extra_args: Vec<String>) -> Box<dyn MessageSink> {
        match self {
            Self::Stdout => Box::new(StdoutSink),
            Self::Edit => Box::new(EditSink { extra_args }),
            Self::Commit => Box::new(CommitSink { extra_args }),
        }
    }
}

impl FromStr for OutputKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdout" => Ok(Self::Stdout),
            "edit" | "editmsg" => Ok(Self::Edit),
            "commit" => Ok(Self::Commit),
            other => Err(format!(
                "unknown output '{other}' (expected stdout, edit, or commit)"
            )),
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stdout => "stdout",
            Self::Edit => "edit",
            Self::Commit => "commit",
        })
    }
}
