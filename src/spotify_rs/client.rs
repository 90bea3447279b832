use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::ports::spotify::{AccountsClient, SpotifyClient};
use crate::spotify_rs::auth::{
    ExchangeCodeForTokenError, SPOTIFY_TOKEN_PATH, SpotifyApiCredentials, TokenRequest,
    exchange_code_for_token,
};
use crate::spotify_rs::types::{
    SpotifyPlaylistPage, SpotifySearchResponse, SpotifyTokenResponse, SpotifyTrack, SpotifyUser,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Spotify responded with {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to send http request: {0}")]
    FailedToSendRequest(#[source] reqwest::Error),
    #[error("Failed to parse response: {0}")]
    FailedToParseResponse(String),
}

impl ApiError {
    /// The API rejected the request; with a bearer token this means it went stale.
    pub fn is_rejected(&self) -> bool {
        matches!(self, ApiError::Status { .. })
    }
}

/// Spotify Web API client
///
/// The bearer token is passed per request since it is owned by the popup
/// session and may be replaced by a new authorization.
pub struct SpotifyWebClient {
    client: reqwest::Client,
    base_url: String,
}

impl SpotifyWebClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .bearer_auth(token)
            .timeout(REQUEST_TIMEOUT)
    }

    async fn send(request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(ApiError::FailedToSendRequest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: response
                    .text()
                    .await
                    .unwrap_or("Failed to get error text".to_string()),
            });
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
        Self::send(request)
            .await?
            .json()
            .await
            .map_err(|error| ApiError::FailedToParseResponse(error.to_string()))
    }
}

#[async_trait::async_trait]
impl SpotifyClient for SpotifyWebClient {
    async fn current_user(&self, token: &str) -> Result<SpotifyUser, ApiError> {
        Self::send_json(self.request(Method::GET, "/me", token)).await
    }

    async fn playlists_page(
        &self,
        token: &str,
        offset: u32,
        limit: u32,
    ) -> Result<SpotifyPlaylistPage, ApiError> {
        let request = self
            .request(Method::GET, "/me/playlists", token)
            .query(&[("offset", offset), ("limit", limit)]);
        Self::send_json(request).await
    }

    async fn search_tracks(&self, token: &str, query: &str) -> Result<Vec<SpotifyTrack>, ApiError> {
        let request = self
            .request(Method::GET, "/search", token)
            .query(&[("q", query), ("type", "track"), ("limit", "1")]);
        let response: SpotifySearchResponse = Self::send_json(request).await?;
        Ok(response.tracks.items)
    }

    async fn add_tracks_to_playlist(
        &self,
        token: &str,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), ApiError> {
        let path = format!("/playlists/{}/tracks", urlencoding::encode(playlist_id));
        let request = self
            .request(Method::POST, &path, token)
            .query(&[("uris", uris.join(","))])
            // Spotify answers 411 for a body-less POST without a length
            .header(reqwest::header::CONTENT_LENGTH, 0);
        Self::send(request).await?;
        Ok(())
    }

    async fn save_tracks(&self, token: &str, ids: &[String]) -> Result<(), ApiError> {
        let request = self
            .request(Method::PUT, "/me/tracks", token)
            .query(&[("ids", ids.join(","))])
            .header(reqwest::header::CONTENT_LENGTH, 0);
        Self::send(request).await?;
        Ok(())
    }
}

/// Client for the accounts service token endpoint
pub struct SpotifyAccountsClient {
    client: reqwest::Client,
    token_url: String,
    credentials: SpotifyApiCredentials,
}

impl SpotifyAccountsClient {
    pub fn new(accounts_base_url: &str, credentials: SpotifyApiCredentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            token_url: format!(
                "{}{}",
                accounts_base_url.trim_end_matches('/'),
                SPOTIFY_TOKEN_PATH
            ),
            credentials,
        }
    }
}

#[async_trait::async_trait]
impl AccountsClient for SpotifyAccountsClient {
    async fn exchange_code(
        &self,
        request: &TokenRequest,
    ) -> Result<SpotifyTokenResponse, ExchangeCodeForTokenError> {
        exchange_code_for_token(&self.client, &self.token_url, &self.credentials, request).await
    }
}
