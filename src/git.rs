use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// A working copy the command operates on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub root: PathBuf,
}

impl Repository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn display_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string())
    }
}

/// Supplies repositories and their staged diffs
pub trait ChangeSource {
    fn repositories(&self) -> Result<Vec<Repository>>;
    fn staged_diff(&self, repo: &Repository) -> Result<String>;
}

/// Change source backed by the `git` executable.
///
/// With no explicit paths it uses the repository containing the current directory.
#[derive(Debug, Clone, Default)]
pub struct GitCli {
    paths: Vec<PathBuf>,
}

impl GitCli {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

impl ChangeSource for GitCli {
    fn repositories(&self) -> Result<Vec<Repository>> {
        ensure_git_available()?;

        if self.paths.is_empty() {
            let root = find_repo_root(None)?;
            return Ok(vec![Repository::new(root)]);
        }

        let mut repos: Vec<Repository> = Vec::new();
        for path in &self.paths {
            let root = find_repo_root(Some(path))
                .with_context(|| format!("{} is not inside a git repository", path.display()))?;
            let repo = Repository::new(root);
            if !repos.contains(&repo) {
                repos.push(repo);
            }
        }
        Ok(repos)
    }

    fn staged_diff(&self, repo: &Repository) -> Result<String> {
        get_staged_diff(&repo.root)
    }
}

/// Get the output of `git diff --cached` for a working copy
pub fn get_staged_diff(cwd: &Path) -> Result<String> {
    let output = Command::new("git")
        .args(["diff", "--cached"])
        .current_dir(cwd)
        .output()
        .context("Failed to run git diff --cached")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git diff --cached failed: {}", stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Find the git repository root directory, from `cwd` or the current directory
pub fn find_repo_root(cwd: Option<&Path>) -> Result<String> {
    let mut cmd = Command::new("git");
    cmd.args(["rev-parse", "--show-toplevel"]);
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }
    let output = cmd.output().context("Failed to run git rev-parse")?;

    if !output.status.success() {
        bail!("Not in a git repository");
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Absolute path of the `.git` directory for a working copy
pub fn git_dir(cwd: &Path) -> Result<PathBuf> {
    let output = Command::new("git")
        .args(["rev-parse", "--absolute-git-dir"])
        .current_dir(cwd)
        .output()
        .context("Failed to run git rev-parse --absolute-git-dir")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git rev-parse --absolute-git-dir failed: {}", stderr.trim());
    }

    Ok(PathBuf::from(
        String::from_utf8_lossy(&output.stdout).trim(),
    ))
}

/// Run `git commit -m "<message>" [extra_args...]`
pub fn run_commit(
    cwd: &Path,
    message: &str,
    extra_args: &[String],
    suppress_output: bool,
) -> Result<()> {
    let mut cmd = Command::new("git");
    cmd.args(["commit", "-m", message]);
    cmd.args(extra_args);
    cmd.current_dir(cwd);
    if suppress_output {
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
    }
    let status = cmd.status().context("Failed to run git commit")?;

    if !status.success() {
        bail!("git commit exited with status {status}");
    }

    Ok(())
}

/// Run `git commit --edit -F <file> [extra_args...]`, letting the user review the message
pub fn run_commit_edit(cwd: &Path, message_file: &Path, extra_args: &[String]) -> Result<()> {
    let status = Command::new("git")
        .args(["commit", "--edit", "-F"])
        .arg(message_file)
        .args(extra_args)
        .current_dir(cwd)
        .status()
        .context("Failed to run git commit")?;

    if !status.success() {
        bail!("git commit exited with status {status}");
    }

    Ok(())
}

fn ensure_git_available() -> Result<()> {
    let status = Command::new("git")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .context("Git is not available. Install git and make sure it is on PATH.")?;
    if !status.success() {
        bail!("Git is not available (git --version exited with {status})");
    }
    Ok(())
}
