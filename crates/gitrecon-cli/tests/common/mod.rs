//! Integration Test Utilities and Common Code

#![allow(dead_code)]

pub use assert_cmd::prelude::*;
pub use assert_fs::prelude::*;
pub use assert_fs::TempDir;
pub use predicates::prelude::*;
pub use predicates::str::{contains, is_empty, RegexPredicate};
pub use std::path::Path;
pub use std::process::Command;

/// Build a `Command` for the `gitrecon` crate binary with variadic command-line arguments.
///
/// The arguments can be anything that is allowed by `Command::arg`.
#[macro_export]
macro_rules! gitrecon {
    ( $( $arg:expr ),* ) => {
        {
            let mut cmd = gitrecon_cmd();
            $(
                cmd.arg($arg);
            )*
            cmd
        }
    }
}

/// Build an `assert_cmd::assert::Assert` by calling `gitrecon!(args).assert().success()`.
#[macro_export]
macro_rules! gitrecon_success {
    ( $( $arg:expr ),* ) => { gitrecon!($( $arg ),*).assert().success() }
}

/// Build an `assert_cmd::assert::Assert` by calling `gitrecon!(args).assert().failure()`.
#[macro_export]
macro_rules! gitrecon_failure {
    ( $( $arg:expr ),* ) => { gitrecon!($( $arg ),*).assert().failure() }
}

/// Get the command for the gitrecon binary under test.
///
/// By default, this is the binary defined in this crate.
/// However, if the `GITRECON_TEST_PROGRAM` environment variable is set, its value is used instead.
/// Its value should be an absolute path to the desired `gitrecon` program to test.
pub fn gitrecon_cmd() -> Command {
    let mut cmd = if let Ok(program) = std::env::var("GITRECON_TEST_PROGRAM") {
        Command::new(program)
    } else {
        Command::cargo_bin("gitrecon").expect("gitrecon should be executable")
    };
    // Keep tokens from the environment running the tests out of the tests.
    cmd.env_remove("GITRECON_GITHUB_TOKEN");
    cmd.env_remove("GITRECON_GIT_TOKEN");
    cmd.env_remove("GITRECON_LOG");
    cmd
}

/// Create a `RegexPredicate` from the given pattern.
pub fn is_match(pat: &str) -> RegexPredicate {
    predicates::str::is_match(pat).expect("pattern should compile")
}

/// Parse JSON Lines output into values.
pub fn json_lines(output: &[u8]) -> Vec<serde_json::Value> {
    std::str::from_utf8(output)
        .expect("output should be UTF-8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("each output line should be JSON"))
        .collect()
}

/// A Git repository in a temporary directory, built with `git2`.
pub struct TestRepo {
    pub dir: TempDir,
    repo: git2::Repository,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("should be able to create tempdir");
        let repo = git2::Repository::init(dir.path()).expect("should be able to init repository");
        TestRepo { dir, repo }
    }

    pub fn location(&self) -> String {
        self.dir.path().display().to_string()
    }

    /// Write an empty-tree commit to `refname` with the given author and committer.
    pub fn commit(
        &self,
        refname: &str,
        parents: &[git2::Oid],
        author: (&str, &str),
        committer: (&str, &str),
    ) -> git2::Oid {
        let author = git2::Signature::now(author.1, author.0).unwrap();
        let committer = git2::Signature::now(committer.1, committer.0).unwrap();
        let tree_id = self.repo.treebuilder(None).unwrap().write().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();
        let parents: Vec<git2::Commit> =
            parents.iter().map(|p| self.repo.find_commit(*p).unwrap()).collect();
        let parents: Vec<&git2::Commit> = parents.iter().collect();
        let oid = self
            .repo
            .commit(None, &author, &committer, "test commit", &tree, &parents)
            .unwrap();
        self.repo.reference(refname, oid, true, "test").unwrap();
        oid
    }

    pub fn set_head(&self, refname: &str) {
        self.repo.set_head(refname).unwrap();
    }
}
