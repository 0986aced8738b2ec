mod common;

use std::path::PathBuf;

use commit_gen::git::{self, ChangeSource, GitCli, Repository};
use commit_gen::sink::{CommitSink, EditSink, MessageSink, DRAFT_FILE};
use serial_test::serial;
use tempfile::TempDir;

use crate::common::{git_ok, git_stdout, write_file, DirGuard, EnvGuard};

fn canonical_root(repo: &TempDir) -> PathBuf {
    PathBuf::from(git_stdout(repo.path(), ["rev-parse", "--show-toplevel"]))
}

#[test]
fn staged_diff_is_empty_until_something_is_staged() {
    let repo = common::init_git_repo();

    let diff = git::get_staged_diff(repo.path()).expect("diff on empty index");
    assert!(diff.is_empty());

    write_file(&repo.path().join("notes.txt"), "hello\n");
    assert!(git::get_staged_diff(repo.path()).expect("unstaged").is_empty());

    git_ok(repo.path(), ["add", "notes.txt"]);
    let diff = git::get_staged_diff(repo.path()).expect("staged diff");
    assert!(diff.contains("notes.txt"));
    assert!(diff.contains("+hello"));
}

#[test]
fn explicit_paths_resolve_to_unique_repository_roots() {
    let repo = common::init_git_repo();
    let nested = repo.path().join("src");
    std::fs::create_dir_all(&nested).expect("mkdir");

    let source = GitCli::new(vec![repo.path().to_path_buf(), nested]);
    let repos = source.repositories().expect("repositories");

    assert_eq!(repos, vec![Repository::new(canonical_root(&repo))]);
}

#[test]
fn path_outside_a_repository_is_rejected() {
    let plain = TempDir::new().expect("tempdir");

    let err = GitCli::new(vec![plain.path().to_path_buf()])
        .repositories()
        .expect_err("not a repository");
    assert!(err.to_string().contains("is not inside a git repository"));
}

#[test]
#[serial]
fn default_source_uses_current_directory() {
    let repo = common::init_git_repo();
    let _cwd = DirGuard::enter(repo.path());

    let repos = GitCli::default().repositories().expect("repositories");
    assert_eq!(repos.len(), 1);
    assert_eq!(repos[0].root, canonical_root(&repo));
}

#[test]
#[serial]
fn edit_sink_hands_message_to_git_commit_editor() {
    let repo = common::init_git_repo();
    write_file(&repo.path().join("notes.txt"), "hello\n");
    git_ok(repo.path(), ["add", "notes.txt"]);
    let _editor = EnvGuard::set(&[("GIT_EDITOR", "true")]);

    let sink = EditSink {
        extra_args: Vec::new(),
    };
    sink.write(&Repository::new(canonical_root(&repo)), "Add notes file")
        .expect("commit through editor");

    assert_eq!(
        git_stdout(repo.path(), ["log", "-1", "--pretty=%B"]),
        "Add notes file"
    );
    assert!(!repo.path().join(".git").join(DRAFT_FILE).exists());
}

#[test]
#[serial]
fn edit_sink_keeps_draft_when_editor_aborts() {
    let repo = common::init_git_repo();
    write_file(&repo.path().join("notes.txt"), "hello\n");
    git_ok(repo.path(), ["add", "notes.txt"]);
    // truncating the file leaves an empty message, which git refuses
    let _editor = EnvGuard::set(&[("GIT_EDITOR", ": >")]);

    let sink = EditSink {
        extra_args: Vec::new(),
    };
    let err = sink
        .write(&Repository::new(canonical_root(&repo)), "Add notes file")
        .expect_err("empty message aborts the commit");

    let draft = repo.path().join(".git").join(DRAFT_FILE);
    assert!(err.to_string().contains("kept in"), "{err:#}");
    assert!(draft.exists());
    assert!(git::get_staged_diff(repo.path())
        .expect("still staged")
        .contains("notes.txt"));
}

#[test]
fn commit_sink_commits_staged_changes_with_extra_args() {
    let repo = common::init_git_repo();
    write_file(&repo.path().join("notes.txt"), "hello\n");
    git_ok(repo.path(), ["add", "notes.txt"]);

    let sink = CommitSink {
        extra_args: vec!["--no-verify".to_string()],
    };
    sink.write(&Repository::new(canonical_root(&repo)), "Add notes file")
        .expect("commit");

    assert_eq!(
        git_stdout(repo.path(), ["log", "-1", "--pretty=%s"]),
        "Add notes file"
    );
    assert!(git::get_staged_diff(repo.path())
        .expect("diff after commit")
        .is_empty());
}

#[test]
fn commit_sink_reports_git_failure() {
    let repo = common::init_git_repo();
    let sink = CommitSink {
        extra_args: Vec::new(),
    };

    let err = sink
        .write(&Repository::new(canonical_root(&repo)), "Nothing staged")
        .expect_err("nothing to commit");
    assert!(err.to_string().contains("git commit failed"));
}
