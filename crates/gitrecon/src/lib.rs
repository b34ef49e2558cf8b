pub mod commit_walk;
pub mod decoy;
pub mod dispatch;
pub mod git_binary;
pub mod git_url;
pub mod github;
pub mod harvest;
pub mod identity;
pub mod oracle;
pub mod platform;
pub mod progress;
pub mod recon;
pub mod record;
pub mod search;
pub mod traversal;

#[cfg(test)]
mod testing;
