use chrono::{DateTime, TimeZone, Utc};
use reqwest::{header, header::HeaderValue, Method, StatusCode, Url};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, trace};

use super::models::{ClientError, NewRepository, Page, RateLimitOverview, Repository, User};
use super::{Auth, Error, Result};
use crate::platform::{Listing, Platform};

// -------------------------------------------------------------------------------------------------
// Client
// -------------------------------------------------------------------------------------------------
pub struct Client {
    pub(super) base_url: Url,
    pub(super) inner: reqwest::Client,
    pub(super) auth: Auth,
}

impl Client {
    pub async fn get_rate_limit(&self) -> Result<RateLimitOverview> {
        let response = self.get(&["rate_limit"], &[]).await?;
        Ok(response.json().await?)
    }

    pub async fn get_authenticated_user(&self) -> Result<User> {
        let response = self.get(&["user"], &[]).await?;
        Ok(response.json().await?)
    }

    pub async fn get_user(&self, login: &str) -> Result<User> {
        let response = self.get(&["users", login], &[]).await?;
        Ok(response.json().await?)
    }

    pub async fn get_repository(&self, owner: &str, name: &str) -> Result<Repository> {
        let response = self.get(&["repos", owner, name], &[]).await?;
        Ok(response.json().await?)
    }

    pub async fn get_repository_by_id(&self, id: i64) -> Result<Repository> {
        let id = id.to_string();
        let response = self.get(&["repositories", &id], &[]).await?;
        Ok(response.json().await?)
    }

    /// Create a repository owned by the authenticated user.
    pub async fn create_repository(&self, new_repo: &NewRepository) -> Result<Repository> {
        let url = self.make_url(&["user", "repos"], &[])?;
        let response = self.send(self.request(Method::POST, url).json(new_repo)).await?;
        Ok(response.json().await?)
    }

    pub async fn delete_repository(&self, owner: &str, name: &str) -> Result<()> {
        let url = self.make_url(&["repos", owner, name], &[])?;
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    pub async fn get_page<T>(&self, listing: &Listing, cursor: Option<&Url>) -> Result<Page<T>>
    where
        T: DeserializeOwned,
    {
        let url = match cursor {
            Some(url) => url.clone(),
            None => {
                let (path, params) = listing.endpoint();
                let path: Vec<&str> = path.iter().map(String::as_str).collect();
                let params: Vec<(&str, &str)> =
                    params.iter().map(|(k, v)| (*k, v.as_str())).collect();
                self.make_url(&path, &params)?
            }
        };
        let response = self.get_url(url).await?;
        if listing.is_search() {
            Page::from_search_response(response).await
        } else {
            Page::from_response(response).await
        }
    }
}

impl Platform for Client {
    async fn authenticated_user(&self) -> Result<User> {
        self.get_authenticated_user().await
    }

    async fn user(&self, login: &str) -> Result<User> {
        self.get_user(login).await
    }

    async fn rate_limit(&self) -> Result<RateLimitOverview> {
        self.get_rate_limit().await
    }

    async fn repository(&self, owner: &str, name: &str) -> Result<Repository> {
        self.get_repository(owner, name).await
    }

    async fn repository_by_id(&self, id: i64) -> Result<Repository> {
        self.get_repository_by_id(id).await
    }

    async fn create_repository(&self, new_repo: &NewRepository) -> Result<Repository> {
        Client::create_repository(self, new_repo).await
    }

    async fn delete_repository(&self, owner: &str, name: &str) -> Result<()> {
        Client::delete_repository(self, owner, name).await
    }

    async fn fetch_page<T: DeserializeOwned>(
        &self,
        listing: &Listing,
        cursor: Option<&Url>,
    ) -> Result<Page<T>> {
        self.get_page(listing, cursor).await
    }
}

/// Create a URL from the given base, path parts, and parameters.
///
/// The path parts should not contain slashes.
fn url_from_path_parts_and_params(
    base_url: Url,
    path_parts: &[&str],
    params: &[(&str, &str)],
) -> Result<Url> {
    if base_url.cannot_be_a_base() {
        return Err(Error::UrlBaseError(base_url));
    }

    let mut buf = base_url.path().to_string();
    if !buf.ends_with('/') {
        buf.push('/');
    }

    for (i, p) in path_parts.iter().enumerate() {
        if p.contains('/') {
            return Err(Error::UrlSlashError(p.to_string()));
        }
        if i > 0 {
            // no leading slash for the first part, or it would be joined as an absolute path
            buf.push('/');
        }
        buf.push_str(p);
    }
    let url = base_url.join(&buf)?;
    let url = if params.is_empty() {
        Url::parse(url.as_str())
    } else {
        Url::parse_with_params(url.as_str(), params)
    }?;
    Ok(url)
}

/// How long to wait for a primary rate limit to reset, from the response headers.
fn reset_wait(headers: &header::HeaderMap) -> Option<Duration> {
    let reset_time = headers
        .get("x-ratelimit-reset")?
        .to_str()
        .ok()?
        .parse::<i64>()
        .ok()?;
    let reset_time = Utc.timestamp_opt(reset_time, 0).single()?;

    let now = headers
        .get(header::DATE)
        .and_then(|d| d.to_str().ok())
        .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    Some((reset_time - now).to_std().unwrap_or(Duration::ZERO))
}

/// Read the body of an unsuccessful response as a GitHub client error, tolerating bodies that are
/// not JSON.
async fn client_error(response: reqwest::Response) -> Result<ClientError> {
    let status = response.status();
    let text = response.text().await?;
    Ok(serde_json::from_str(&text).unwrap_or_else(|_| ClientError {
        message: if text.trim().is_empty() {
            status.canonical_reason().unwrap_or("unknown error").to_owned()
        } else {
            text.trim().to_owned()
        },
        documentation_url: None,
    }))
}

// private implementation
impl Client {
    /// Construct a `Url` from the given path parts and query parameters.
    fn make_url(&self, path_parts: &[&str], params: &[(&str, &str)]) -> Result<Url> {
        url_from_path_parts_and_params(self.base_url.clone(), path_parts, params)
    }

    async fn get(&self, path_parts: &[&str], params: &[(&str, &str)]) -> Result<reqwest::Response> {
        let url = self.make_url(path_parts, params)?;
        self.get_url(url).await
    }

    async fn get_url(&self, url: Url) -> Result<reqwest::Response> {
        self.send(self.request(Method::GET, url)).await
    }

    /// Build a request, handling authentication if any.
    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        trace!("{method} {url}");
        let request_builder = self
            .inner
            .request(method, url)
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        match &self.auth {
            Auth::PersonalAccessToken(token) => request_builder.bearer_auth(token.expose_secret()),
            Auth::Unauthenticated => request_builder,
        }
    }

    async fn send(&self, request_builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request_builder.send().await?;
        let status = response.status();

        // GitHub signals rate limiting with either 403 or 429.
        //
        // Secondary rate limits carry a `Retry-After` header giving the number of seconds to wait.
        // Primary rate limits set `x-ratelimit-remaining` to 0 and `x-ratelimit-reset` to the
        // epoch second at which the window resets.
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            let headers = response.headers();
            let resource = headers
                .get("x-ratelimit-resource")
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);

            if let Some(retry_after) = headers.get(header::RETRY_AFTER) {
                let wait = atoi::atoi::<u64>(retry_after.as_bytes()).map(Duration::from_secs);
                debug!("Secondary rate limit: retry after {wait:?}");
                let client_error = client_error(response).await?;
                return Err(Error::RateLimited {
                    client_error,
                    wait,
                    resource,
                    secondary: true,
                });
            }

            if let Some(b"0") = headers.get("x-ratelimit-remaining").map(HeaderValue::as_bytes) {
                let wait = reset_wait(headers);
                debug!("Rate limit exhausted for {resource:?}: resets in {wait:?}");
                let client_error = client_error(response).await?;
                return Err(Error::RateLimited {
                    client_error,
                    wait,
                    resource,
                    secondary: false,
                });
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                let client_error = client_error(response).await?;
                return Err(Error::RateLimited {
                    client_error,
                    wait: None,
                    resource,
                    secondary: true,
                });
            }
        }

        if !status.is_success() {
            let client_error = client_error(response).await?;
            return Err(Error::ApiError {
                status: status.as_u16(),
                message: client_error.message,
            });
        }

        Ok(response)
    }
}
