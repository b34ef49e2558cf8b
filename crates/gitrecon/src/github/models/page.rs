use crate::github::Result;
use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use url::Url;

// -------------------------------------------------------------------------------------------------
// Page
// -------------------------------------------------------------------------------------------------
/// One page of a paginated listing.
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,

    /// The cursor for the next page, if there is one
    pub next: Option<Url>,

    /// The total number of matches; only reported by search endpoints
    pub total_count: Option<u64>,
}

/// The body of a search response.
#[derive(Debug, Deserialize)]
pub struct SearchResults<T> {
    pub total_count: u64,
    #[serde(default)]
    pub incomplete_results: bool,
    pub items: Vec<T>,
}

impl<T: serde::de::DeserializeOwned> Page<T> {
    pub async fn from_response(response: reqwest::Response) -> Result<Self> {
        let next = get_next_link(&response);
        let items = response.json().await?;
        Ok(Page {
            items,
            next,
            total_count: None,
        })
    }

    pub async fn from_search_response(response: reqwest::Response) -> Result<Self> {
        let next = get_next_link(&response);
        let body: SearchResults<T> = response.json().await?;
        Ok(Page {
            items: body.items,
            next,
            total_count: Some(body.total_count),
        })
    }
}

lazy_static! {
    static ref HEADER_LINKS_PATTERN: Regex =
        RegexBuilder::new(r#"<([^>]+)>; \s* rel \s* = \s* "next""#)
            .ignore_whitespace(true)
            .build()
            .expect("header links regex should compile");
}

fn get_next_link(response: &reqwest::Response) -> Option<Url> {
    response
        .headers()
        .get_all(reqwest::header::LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(parse_next_link)
}

/// Extract the `rel="next"` target from the value of a `Link` header.
fn parse_next_link(value: &str) -> Option<Url> {
    let captures = HEADER_LINKS_PATTERN.captures(value)?;
    Url::parse(captures.get(1)?.as_str()).ok()
}
