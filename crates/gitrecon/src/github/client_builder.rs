use reqwest::{IntoUrl, Url};
use secrecy::SecretString;

use super::{Auth, Client, Result};

// -------------------------------------------------------------------------------------------------
// ClientBuilder
// -------------------------------------------------------------------------------------------------
pub struct ClientBuilder {
    base_url: reqwest::Url,
    auth: Auth,
    ignore_certs: bool,
}

impl ClientBuilder {
    /// The user agent string sent when accessing the GitHub REST API
    const USER_AGENT: &'static str = "gitrecon";

    /// Create a new `ClientBuilder` that uses unauthenticated access to <https://api.github.com>.
    pub fn new() -> Self {
        ClientBuilder {
            base_url: Url::parse("https://api.github.com").expect("default base URL should parse"),
            auth: Auth::Unauthenticated,
            ignore_certs: false,
        }
    }

    /// Use the specified base URL, e.g., `https://github.example.com/api/v3` for GitHub Enterprise.
    pub fn base_url<T: IntoUrl>(mut self, url: T) -> Result<Self> {
        self.base_url = url.into_url()?;
        Ok(self)
    }

    /// Use the given authentication mechanism.
    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    /// Authenticate with the given personal access token.
    pub fn personal_access_token(self, token: SecretString) -> Self {
        self.auth(Auth::PersonalAccessToken(token))
    }

    /// Ignore validation of TLS certs.
    pub fn ignore_certs(mut self, ignore_certs: bool) -> Self {
        self.ignore_certs = ignore_certs;
        self
    }

    /// Build a `Client` from this `ClientBuilder`.
    pub fn build(self) -> Result<Client> {
        let inner = reqwest::ClientBuilder::new()
            .user_agent(Self::USER_AGENT)
            .danger_accept_invalid_certs(self.ignore_certs)
            .build()?;
        Ok(Client {
            base_url: self.base_url,
            auth: self.auth,
            inner,
        })
    }
}

impl Default for ClientBuilder {
    /// Equivalent to `ClientBuilder::new()`.
    fn default() -> Self {
        Self::new()
    }
}
