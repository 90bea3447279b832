use serde::{Deserialize, Serialize};

/// Namespace tag in front of every track URI (`spotify:track:<id>`).
pub const TRACK_URI_PREFIX: &str = "spotify:track:";

/// Spotify OAuth token response
///
/// The accounts service answers 200 with either an `access_token` or an
/// `error` payload, so every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpotifyTokenResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Spotify user profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyUser {
    pub id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyImage {
    pub url: String,
    pub height: Option<u32>,
    pub width: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyOwner {
    pub id: String,
}

/// Simplified playlist as returned by `/me/playlists`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyPlaylist {
    pub id: String,
    pub name: String,
    // Spotify sends `null` for playlists without a cover
    #[serde(default)]
    pub images: Option<Vec<SpotifyImage>>,
    pub owner: SpotifyOwner,
}

impl SpotifyPlaylist {
    pub fn cover_url(&self) -> Option<&str> {
        self.images
            .as_deref()
            .and_then(|images| images.first())
            .map(|image| image.url.as_str())
    }
}

/// One page of the current user's playlists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyPlaylistPage {
    pub items: Vec<SpotifyPlaylist>,
    pub next: Option<String>,
    pub offset: Option<u32>,
    pub limit: Option<u32>,
    pub total: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyArtist {
    pub id: Option<String>,
    pub name: String,
}

/// Spotify track from a catalog search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyTrack {
    pub id: Option<String>,
    pub uri: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifySearchTracks {
    pub items: Vec<SpotifyTrack>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifySearchResponse {
    pub tracks: SpotifySearchTracks,
}

/// Destination of a save: one of the user's playlists or their Liked Songs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlaylistTarget {
    LikedSongs,
    Playlist(String),
}

impl PlaylistTarget {
    /// Parses the CLI form: `liked` for Liked Songs, anything else is a playlist id.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "liked" | "liked-songs" => PlaylistTarget::LikedSongs,
            id => PlaylistTarget::Playlist(id.to_string()),
        }
    }
}

impl std::fmt::Display for PlaylistTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaylistTarget::LikedSongs => write!(f, "liked"),
            PlaylistTarget::Playlist(id) => write!(f, "{}", id),
        }
    }
}

/// Rendered entry in the playlist list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistPreview {
    pub target: PlaylistTarget,
    pub name: String,
    pub image_url: String,
}

/// Track picked for a playlist click, waiting for confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMatch {
    pub uri: String,
    pub query: String,
    pub target: PlaylistTarget,
}

impl TrackMatch {
    /// Track id with the `spotify:track:` namespace removed.
    pub fn track_id(&self) -> &str {
        self.uri
            .strip_prefix(TRACK_URI_PREFIX)
            .unwrap_or(&self.uri)
    }

    /// 30 second embeddable player for the matched track.
    pub fn embed_url(&self) -> String {
        format!("https://open.spotify.com/embed/track/{}", self.track_id())
    }
}
