//! Tests for gitrecon's `git` command

use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;

/// A repository with commits by Alice on `main` and by Bob on `feature`.
fn two_branch_repo() -> TestRepo {
    let repo = TestRepo::new();
    let first = repo.commit("refs/heads/main", &[], ("a@x.com", "Alice"), ("a@x.com", "Alice"));
    repo.commit("refs/heads/feature", &[first], ("b@x.com", "Bob"), ("a@x.com", "Alice"));
    repo.set_head("refs/heads/main");
    repo
}

#[test]
fn local_two_branches() {
    let repo = two_branch_repo();
    let assert = gitrecon_success!("git", "--local", "--repos", repo.location());
    let records = json_lines(&assert.get_output().stdout);
    assert_eq!(records.len(), 1);

    let repository = &records[0]["repository"];
    assert_eq!(repository["location"], json!(repo.location()));
    assert_eq!(
        repository["metadata"],
        json!({ "a@x.com": ["Alice"], "b@x.com": ["Bob"] })
    );
    assert!(records[0].get("error").is_none());
}

#[test]
fn clone_local_path() {
    let repo = two_branch_repo();
    let assert = gitrecon_success!("git", "--repos", repo.location());
    let records = json_lines(&assert.get_output().stdout);
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0]["repository"]["metadata"],
        json!({ "a@x.com": ["Alice"], "b@x.com": ["Bob"] })
    );
}

#[test]
fn missing_repository_is_reported() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing").display().to_string();
    let assert = gitrecon_success!("git", "--local", "--repos", &missing);
    let records = json_lines(&assert.get_output().stdout);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["repository"]["location"], json!(missing));
    let message = records[0]["error"][0]["message"].as_str().unwrap();
    assert!(message.starts_with(&format!("failed to open '{missing}'")), "{message}");
}

#[test]
fn repos_from_file_and_appended_output() {
    let first = two_branch_repo();
    let second = TestRepo::new();
    second.commit("refs/heads/main", &[], ("c@x.com", "Carol"), ("c@x.com", "Carol"));
    second.set_head("refs/heads/main");

    let dir = TempDir::new().unwrap();
    let input = dir.child("repos.txt");
    input
        .write_str(&format!("{}\n\n{}\n", first.location(), second.location()))
        .unwrap();
    let output = dir.child("out.jsonl");
    output.write_str("").unwrap();

    for _ in 0..2 {
        gitrecon_success!("git", "--local", "--frepos", input.path(), "-o", output.path())
            .stdout(is_empty());
    }

    let records = json_lines(std::fs::read_to_string(output.path()).unwrap().as_bytes());
    assert_eq!(records.len(), 4);
    let mut locations: Vec<String> = records
        .iter()
        .map(|r| r["repository"]["location"].as_str().unwrap().to_owned())
        .collect();
    locations.sort();
    let mut expected = vec![first.location(), first.location(), second.location(), second.location()];
    expected.sort();
    assert_eq!(locations, expected);
}

#[test]
fn repos_required() {
    gitrecon_failure!("git")
        .code(2)
        .stderr(contains("required"));
}

#[test]
fn repos_and_frepos_conflict() {
    gitrecon_failure!("git", "--repos", "a", "--frepos", "b")
        .code(2)
        .stderr(contains("cannot be used with"));
}

#[test]
fn token_requires_username() {
    gitrecon_failure!("git", "--repos", "a", "--token", "secret")
        .code(2)
        .stderr(contains("--username"));
}

#[test]
fn username_requires_token_or_password() {
    gitrecon_failure!("git", "--repos", "a", "--username", "octocat")
        .code(2)
        .stderr(contains("A token (--token) or a password (--pass) is required"));
}

#[test]
fn password_prompt_requires_username_or_key() {
    gitrecon_failure!("git", "--repos", "a", "--pass")
        .code(2)
        .stderr(contains("A username (--username) or a key (--ssh) is required with --pass"));
}

#[test]
fn password_prompt_conflicts_with_token() {
    gitrecon_failure!("git", "--repos", "a", "--username", "octocat", "--token", "t", "--pass")
        .code(2)
        .stderr(contains("cannot be used with"));
}

#[test]
fn missing_input_file() {
    gitrecon_failure!("git", "--frepos", "/nonexistent/repos.txt")
        .code(2)
        .stderr(contains("Failed to open /nonexistent/repos.txt"));
}
