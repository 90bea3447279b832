use std::collections::HashMap;
use std::sync::Mutex;

use color_eyre::eyre::Result;

use crate::ports::storage::TokenStore;
use crate::ports::view::{NoticeKind, PopupView};
use crate::spotify_rs::auth::SpotifyApiCredentials;
use crate::spotify_rs::types::{
    PlaylistPreview, SpotifyImage, SpotifyOwner, SpotifyPlaylist, SpotifyPlaylistPage,
    SpotifyTrack,
};

pub fn test_credentials(redirect_uri: &str) -> SpotifyApiCredentials {
    SpotifyApiCredentials::new(
        "client-id".to_string(),
        "client-secret".to_string(),
        redirect_uri.to_string(),
        vec![
            "user-library-modify".to_string(),
            "playlist-read-private".to_string(),
        ],
    )
}

#[derive(Default)]
pub struct MemoryTokenStore {
    values: Mutex<HashMap<String, String>>,
}

#[async_trait::async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Everything the popup was asked to draw, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    Playlist(PlaylistPreview),
    EndOfList,
    Notice(NoticeKind, String),
    Confirmation { query: String, embed_url: String },
    Reset,
}

#[derive(Debug, Default)]
pub struct RecordingView {
    pub events: Vec<ViewEvent>,
}

impl RecordingView {
    pub fn playlists(&self) -> Vec<&PlaylistPreview> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ViewEvent::Playlist(preview) => Some(preview),
                _ => None,
            })
            .collect()
    }

    pub fn notices(&self) -> Vec<(NoticeKind, &str)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ViewEvent::Notice(kind, message) => Some((*kind, message.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &ViewEvent) -> usize {
        self.events.iter().filter(|event| *event == wanted).count()
    }
}

impl PopupView for RecordingView {
    fn render_playlist(&mut self, preview: &PlaylistPreview) {
        self.events.push(ViewEvent::Playlist(preview.clone()));
    }

    fn render_end_of_list(&mut self) {
        self.events.push(ViewEvent::EndOfList);
    }

    fn notify(&mut self, kind: NoticeKind, message: &str) {
        self.events.push(ViewEvent::Notice(kind, message.to_string()));
    }

    fn show_confirmation(&mut self, query: &str, embed_url: &str) {
        self.events.push(ViewEvent::Confirmation {
            query: query.to_string(),
            embed_url: embed_url.to_string(),
        });
    }

    fn reset_to_list(&mut self) {
        self.events.push(ViewEvent::Reset);
    }
}

pub fn playlist(id: &str, owner: &str, image: Option<&str>) -> SpotifyPlaylist {
    SpotifyPlaylist {
        id: id.to_string(),
        name: format!("Playlist {}", id),
        images: image.map(|url| {
            vec![SpotifyImage {
                url: url.to_string(),
                height: None,
                width: None,
            }]
        }),
        owner: SpotifyOwner {
            id: owner.to_string(),
        },
    }
}

/// Slice `all` the way `/me/playlists` pages it.
pub fn page_of(all: &[SpotifyPlaylist], offset: u32, limit: u32) -> SpotifyPlaylistPage {
    let start = (offset as usize).min(all.len());
    let end = (start + limit as usize).min(all.len());
    SpotifyPlaylistPage {
        items: all[start..end].to_vec(),
        next: (end < all.len()).then(|| format!("next?offset={}", end)),
        offset: Some(offset),
        limit: Some(limit),
        total: Some(all.len() as u32),
    }
}

pub fn track(uri: &str) -> SpotifyTrack {
    SpotifyTrack {
        id: uri.rsplit(':').next().map(str::to_string),
        uri: uri.to_string(),
        name: "Never Gonna Give You Up".to_string(),
        artists: Vec::new(),
    }
}
