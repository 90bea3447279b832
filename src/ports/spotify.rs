use crate::spotify_rs::auth::{ExchangeCodeForTokenError, TokenRequest};
use crate::spotify_rs::client::ApiError;
use crate::spotify_rs::types::{SpotifyPlaylistPage, SpotifyTokenResponse, SpotifyTrack, SpotifyUser};

/// Port trait wrapping the Spotify Web API calls made by the popup session.
///
/// Implementations live in `spotify_rs::client` (production) or test mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SpotifyClient: Send + Sync {
    async fn current_user(&self, token: &str) -> Result<SpotifyUser, ApiError>;

    async fn playlists_page(
        &self,
        token: &str,
        offset: u32,
        limit: u32,
    ) -> Result<SpotifyPlaylistPage, ApiError>;

    async fn search_tracks(&self, token: &str, query: &str) -> Result<Vec<SpotifyTrack>, ApiError>;

    async fn add_tracks_to_playlist(
        &self,
        token: &str,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), ApiError>;

    async fn save_tracks(&self, token: &str, ids: &[String]) -> Result<(), ApiError>;
}

/// Port trait for the accounts service token endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AccountsClient: Send + Sync {
    async fn exchange_code(
        &self,
        request: &TokenRequest,
    ) -> Result<SpotifyTokenResponse, ExchangeCodeForTokenError>;
}
