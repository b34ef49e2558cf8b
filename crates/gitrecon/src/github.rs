//! A minimal client for the parts of the GitHub REST API that reconnaissance needs.

mod auth;
mod client;
mod client_builder;
mod error;
pub mod models;
mod result;

pub use auth::Auth;
pub use client::Client;
pub use client_builder::ClientBuilder;
pub use error::Error;
pub use result::Result;
