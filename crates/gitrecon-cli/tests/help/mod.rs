//! Tests for gitrecon `help` functionality

use super::*;

#[test]
fn no_args() {
    gitrecon_failure!()
        .code(2)
        .stderr(contains("Usage: gitrecon"));
}

#[test]
fn help() {
    gitrecon_success!("help")
        .stdout(contains("git").and(contains("github")))
        .stderr(is_empty());
}

#[test]
fn help_git() {
    gitrecon_success!("git", "--help")
        .stdout(contains("--repos").and(contains("--frepos")).and(contains("--local")));
}

#[test]
fn help_git_describes_walked_refs() {
    gitrecon_success!("git", "--help")
        .stdout(contains("branch").and(contains("Tags")).and(contains("--ignore-certs")));
}

#[test]
fn help_github() {
    gitrecon_success!("github", "--help")
        .stdout(contains("--emails").and(contains("--contributors")).and(contains("--rate")));
}

#[test]
fn version() {
    gitrecon_success!("--version").stdout(is_match(r"^gitrecon \d+\.\d+\.\d+"));
}
