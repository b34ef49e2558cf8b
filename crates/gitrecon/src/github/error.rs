use std::time::Duration;

use super::models;

// -------------------------------------------------------------------------------------------------
// Error
// -------------------------------------------------------------------------------------------------
#[derive(Debug)]
pub enum Error {
    RateLimited {
        /// The client error returned by GitHub
        client_error: models::ClientError,

        /// The duration to wait until trying again
        wait: Option<Duration>,

        /// The rate limit resource that was exhausted, from the `x-ratelimit-resource` header
        resource: Option<String>,

        /// Whether this is a secondary (abuse) rate limit, signaled with `Retry-After`
        secondary: bool,
    },
    ApiError {
        status: u16,
        message: String,
    },
    UrlParseError(url::ParseError),
    UrlBaseError(url::Url),
    UrlSlashError(String),
    ReqwestError(reqwest::Error),
}

impl Error {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimited { .. })
    }

    /// The HTTP status of an unsuccessful API response, if that is what this error is.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::ApiError { status, .. } => Some(*status),
            Error::ReqwestError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::RateLimited { client_error, resource, .. } => match resource {
                Some(r) => write!(f, "request was rate-limited ({r}): {}", client_error.message),
                None => write!(f, "request was rate-limited: {}", client_error.message),
            },
            Error::ApiError { status, message } => write!(f, "API error (status={status}): {message}"),
            Error::UrlParseError(e) => write!(f, "error parsing URL: {e}"),
            Error::UrlBaseError(u) => write!(f, "error building URL: {u} cannot be a base"),
            Error::UrlSlashError(p) => write!(f, "error building URL: component {p:?} contains a slash"),
            Error::ReqwestError(e) => write!(f, "error making request: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::RateLimited { .. } => None,
            Error::ApiError { .. } => None,
            Error::UrlParseError(e) => Some(e),
            Error::UrlBaseError(_) => None,
            Error::UrlSlashError(_) => None,
            Error::ReqwestError(e) => Some(e),
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Error {
        Error::UrlParseError(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Error {
        Error::ReqwestError(err)
    }
}
