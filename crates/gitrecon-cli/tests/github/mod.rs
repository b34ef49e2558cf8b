//! Tests for gitrecon's `github` command
//!
//! These tests make no requests that can succeed: they cover argument validation and failures
//! detected before any work begins.

use super::*;

#[test]
fn token_required() {
    gitrecon_failure!("github", "--users", "octocat")
        .code(2)
        .stderr(contains("--token"));
}

#[test]
fn inputs_required() {
    gitrecon!("github")
        .env("GITRECON_GITHUB_TOKEN", "hahabogus")
        .assert()
        .failure()
        .code(2)
        .stderr(contains("No users, emails, or repositories specified"));
}

#[test]
fn users_and_fusers_conflict() {
    gitrecon_failure!("github", "--token", "hahabogus", "--users", "a", "--fusers", "b")
        .code(2)
        .stderr(contains("cannot be used with"));
}

#[test]
fn emails_and_femails_conflict() {
    gitrecon_failure!("github", "--token", "hahabogus", "--emails", "a@x.com", "--femails", "b")
        .code(2)
        .stderr(contains("cannot be used with"));
}

#[test]
fn missing_input_file() {
    gitrecon_failure!("github", "--token", "hahabogus", "--femails", "/nonexistent/emails.txt")
        .code(2)
        .stderr(contains("Failed to open /nonexistent/emails.txt"));
}

#[test]
fn unreachable_api_fails_token_check() {
    gitrecon_failure!(
        "github",
        "--token",
        "hahabogus",
        "--users",
        "octocat",
        "--api-url",
        "http://127.0.0.1:1/"
    )
    .code(2)
    .stderr(contains("Error: Invalid token"))
    .stdout(is_empty());
}
