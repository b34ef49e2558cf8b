//! Integration tests for gitrecon

mod common;
use common::*;

mod git;
mod github;
mod help;
