use std::sync::LazyLock;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use url::Url;

use crate::spotify_rs::types::SpotifyTokenResponse;

pub const SPOTIFY_AUTHORIZE_PATH: &str = "/authorize";
pub const SPOTIFY_TOKEN_PATH: &str = "/api/token";

// Authorization codes are URL-safe base64, the accepted run is `[\w/-]+`
static CODE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w/-]+").expect("code pattern is valid"));

#[derive(Debug, Clone)]
pub struct SpotifyApiCredentials {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: Vec<String>,
}

impl SpotifyApiCredentials {
    pub fn new(
        client_id: String,
        client_secret: String,
        redirect_uri: String,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            scopes,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Value of the `Authorization` header for the token endpoint
    pub fn basic_authorization(&self) -> String {
        format!(
            "Basic {}",
            STANDARD.encode(format!("{}:{}", self.client_id(), self.client_secret()))
        )
    }
}

/// Build the URL the user is sent to in order to grant access
/// https://developer.spotify.com/documentation/web-api/tutorials/code-flow
pub fn authorization_url(
    accounts_base_url: &str,
    credentials: &SpotifyApiCredentials,
) -> Result<Url, url::ParseError> {
    let scope = credentials.scopes().join(" ");
    Url::parse_with_params(
        &format!(
            "{}{}",
            accounts_base_url.trim_end_matches('/'),
            SPOTIFY_AUTHORIZE_PATH
        ),
        &[
            ("client_id", credentials.client_id()),
            ("redirect_uri", credentials.redirect_uri()),
            ("scope", scope.as_str()),
            ("response_type", "code"),
        ],
    )
}

/// What the accounts service sent back to the redirect URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectResult {
    Code(String),
    Error(String),
    Missing,
}

/// Inspect the URL the authorization tab landed on.
///
/// An `error` parameter always wins. Otherwise the leading `[\w/-]+` run of
/// the `code` parameter is used.
pub fn parse_redirect(redirect_url: &str) -> RedirectResult {
    let Ok(url) = Url::parse(redirect_url) else {
        return RedirectResult::Missing;
    };

    let mut code = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "error" => return RedirectResult::Error(value.into_owned()),
            "code" if code.is_none() => code = Some(value.into_owned()),
            _ => {}
        }
    }

    code.and_then(|code| {
        CODE_PATTERN
            .find(&code)
            .map(|found| found.as_str().to_string())
    })
    .map(RedirectResult::Code)
    .unwrap_or(RedirectResult::Missing)
}

/// Form body of an authorization-code exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    pub code: String,
    pub redirect_uri: String,
}

impl TokenRequest {
    pub fn new(code: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            redirect_uri: redirect_uri.into(),
        }
    }

    /// `application/x-www-form-urlencoded` body
    pub fn form_body(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "authorization_code")
            .append_pair("code", &self.code)
            .append_pair("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExchangeCodeForTokenError {
    #[error("Invalid code ({status}): {reason}")]
    InvalidCode { status: u16, reason: String },
    #[error("Failed to send http request: {0}")]
    FailedToSendRequest(#[source] reqwest::Error),
    #[error("Failed to parse response: {0}")]
    FailedToParseResponse(String),
}

/// Exchange authorization code for access token
pub async fn exchange_code_for_token(
    client: &reqwest::Client,
    token_url: &str,
    credentials: &SpotifyApiCredentials,
    request: &TokenRequest,
) -> Result<SpotifyTokenResponse, ExchangeCodeForTokenError> {
    let response = client
        .post(token_url)
        .header(
            reqwest::header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        )
        .header(
            reqwest::header::AUTHORIZATION,
            credentials.basic_authorization(),
        )
        .body(request.form_body())
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .map_err(ExchangeCodeForTokenError::FailedToSendRequest)?;

    let status = response.status();
    if !status.is_success() {
        return Err(ExchangeCodeForTokenError::InvalidCode {
            status: status.as_u16(),
            reason: response
                .text()
                .await
                .unwrap_or("Failed to get error text".to_string()),
        });
    }

    let token_response: SpotifyTokenResponse = response
        .json()
        .await
        .map_err(|error| ExchangeCodeForTokenError::FailedToParseResponse(error.to_string()))?;

    Ok(token_response)
}
