use std::sync::Arc;

use color_eyre::eyre::{Result, WrapErr};

use crate::ports::browser::BrowserHost;
use crate::ports::spotify::SpotifyClient;
use crate::ports::view::{NoticeKind, PopupView};
use crate::services::authenticator::Authenticator;
use crate::spotify_rs::client::ApiError;
use crate::spotify_rs::types::{PlaylistPreview, PlaylistTarget, SpotifyPlaylist, TrackMatch};
use crate::title_query::{normalize_title, truncate_query};

pub const LIKED_SONGS_NAME: &str = "Liked Songs";
pub const LIKED_SONGS_IMAGE: &str = "https://misc.scdn.co/liked-songs/liked-songs-640.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Authenticating,
    Identifying,
    Listing,
    AwaitingSelection,
    Searching,
    Confirming,
    Done,
    Error,
}

impl Phase {
    /// The playlist list is on screen and can be scrolled or clicked.
    fn accepts_selection(self) -> bool {
        matches!(self, Phase::AwaitingSelection | Phase::Done)
    }
}

/// Offset pagination over `/me/playlists`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistCursor {
    pub offset: u32,
    pub page_size: u32,
    pub exhausted: bool,
}

impl PlaylistCursor {
    pub fn new(page_size: u32) -> Self {
        Self {
            offset: 0,
            page_size,
            exhausted: false,
        }
    }

    /// Record a fetched page of `received` items.
    fn advance(&mut self, received: usize) {
        if received < self.page_size as usize {
            self.exhausted = true;
        } else {
            self.offset += self.page_size;
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub page_size: u32,
    pub placeholder_image: String,
}

/// Everything one popup lifetime knows.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub phase: Phase,
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub cursor: Option<PlaylistCursor>,
    pub pending: Option<TrackMatch>,
    pub query_override: Option<String>,
    pub query_locked: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: Phase::Init,
            token: None,
            user_id: None,
            cursor: None,
            pending: None,
            query_override: None,
            query_locked: false,
        }
    }
}

/// Drives one popup session: token, user, playlist pages, search and add.
///
/// Transitions take `&mut self`, so page requests can never overlap.
pub struct PlaylistSession<C: SpotifyClient, V: PopupView> {
    client: C,
    view: V,
    authenticator: Arc<Authenticator>,
    browser: Arc<dyn BrowserHost>,
    settings: SessionSettings,
    state: SessionState,
}

impl<C: SpotifyClient, V: PopupView> PlaylistSession<C, V> {
    pub fn new(
        client: C,
        view: V,
        authenticator: Arc<Authenticator>,
        browser: Arc<dyn BrowserHost>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            client,
            view,
            authenticator,
            browser,
            settings,
            state: SessionState::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    #[cfg(test)]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn is_exhausted(&self) -> bool {
        self.state
            .cursor
            .as_ref()
            .is_some_and(|cursor| cursor.exhausted)
    }

    /// Popup load: resolve a token, then identify the user and list the first page.
    pub async fn open(&mut self) -> Result<()> {
        let token = self.authenticator.token().await?;

        let Some(token) = token else {
            log::info!("No token stored, starting authorization");
            self.state.phase = Phase::Authenticating;
            return self.authenticator.start().await;
        };

        self.state.token = Some(token);
        self.identify().await
    }

    async fn identify(&mut self) -> Result<()> {
        self.state.phase = Phase::Identifying;
        let token = self.token()?;

        match self.client.current_user(&token).await {
            Ok(user) => {
                log::debug!("Signed in as {}", user.id);
                self.state.user_id = Some(user.id);
                self.state.cursor = Some(PlaylistCursor::new(self.settings.page_size));
                self.load_next_page().await
            }
            Err(error) => self.fail(error).await,
        }
    }

    async fn load_next_page(&mut self) -> Result<()> {
        let Some(cursor) = self.state.cursor.clone() else {
            return Ok(());
        };
        if cursor.exhausted {
            return Ok(());
        }

        self.state.phase = Phase::Listing;
        let token = self.token()?;

        let page = match self
            .client
            .playlists_page(&token, cursor.offset, cursor.page_size)
            .await
        {
            Ok(page) => page,
            Err(error) => return self.fail(error).await,
        };
        log::debug!(
            "Fetched {} playlists at offset {}",
            page.items.len(),
            cursor.offset
        );

        if cursor.offset == 0 {
            self.view.render_playlist(&PlaylistPreview {
                target: PlaylistTarget::LikedSongs,
                name: LIKED_SONGS_NAME.to_string(),
                image_url: LIKED_SONGS_IMAGE.to_string(),
            });
        }

        let user_id = self.state.user_id.clone().unwrap_or_default();
        for playlist in page.items.iter().filter(|item| item.owner.id == user_id) {
            let preview = self.preview(playlist);
            self.view.render_playlist(&preview);
        }

        let mut cursor = cursor;
        cursor.advance(page.items.len());
        if cursor.exhausted {
            self.view.render_end_of_list();
        }
        self.state.cursor = Some(cursor);
        self.state.phase = Phase::AwaitingSelection;

        Ok(())
    }

    fn preview(&self, playlist: &SpotifyPlaylist) -> PlaylistPreview {
        PlaylistPreview {
            target: PlaylistTarget::Playlist(playlist.id.clone()),
            name: playlist.name.clone(),
            image_url: playlist
                .cover_url()
                .unwrap_or(&self.settings.placeholder_image)
                .to_string(),
        }
    }

    /// The list was scrolled to the bottom.
    pub async fn on_scroll_bottom(&mut self) -> Result<()> {
        if !self.state.phase.accepts_selection() || self.is_exhausted() {
            return Ok(());
        }
        self.load_next_page().await
    }

    /// Edit the query field. Returns false while the field is locked.
    pub fn edit_query(&mut self, text: &str) -> bool {
        if self.state.query_locked {
            return false;
        }
        let text = text.trim();
        self.state.query_override = (!text.is_empty()).then(|| text.to_string());
        true
    }

    /// A playlist (or Liked Songs) was clicked: find the song to add.
    pub async fn select_playlist(&mut self, target: PlaylistTarget) -> Result<()> {
        if !self.state.phase.accepts_selection() {
            log::debug!("Ignoring selection in phase {:?}", self.state.phase);
            return Ok(());
        }
        self.state.phase = Phase::Searching;
        let token = self.token()?;

        let Some(query) = self.query().await else {
            self.view
                .notify(NoticeKind::Error, "Couldn't find a song title in this tab");
            self.state.phase = Phase::AwaitingSelection;
            return Ok(());
        };
        log::info!("Searching for {:?}", query);

        let tracks = match self.client.search_tracks(&token, &query).await {
            Ok(tracks) => tracks,
            Err(error) => {
                log::error!("Search failed: {}", error);
                self.state.phase = Phase::AwaitingSelection;
                return Ok(());
            }
        };

        let Some(track) = tracks.into_iter().next() else {
            self.view.notify(
                NoticeKind::Error,
                &format!("Couldn't find \"{}\"", truncate_query(&query)),
            );
            self.state.phase = Phase::AwaitingSelection;
            return Ok(());
        };

        let track_match = TrackMatch {
            uri: track.uri,
            query,
            target,
        };
        self.state.query_locked = true;
        self.view
            .show_confirmation(&track_match.query, &track_match.embed_url());
        self.state.pending = Some(track_match);
        self.state.phase = Phase::Confirming;

        Ok(())
    }

    /// The typed query if there is one, otherwise the cleaned active tab title.
    async fn query(&self) -> Option<String> {
        if let Some(ref query) = self.state.query_override {
            return Some(query.clone());
        }

        match self.browser.active_tab_title().await {
            Ok(Some(title)) => {
                let query = normalize_title(&title);
                (!query.is_empty()).then_some(query)
            }
            Ok(None) => None,
            Err(error) => {
                log::error!("Failed to read active tab title: {:?}", error);
                None
            }
        }
    }

    /// The confirm control was activated.
    pub async fn confirm(&mut self) -> Result<()> {
        if self.state.phase != Phase::Confirming {
            return Ok(());
        }
        // Taking the match makes the confirmation one-shot
        let Some(track_match) = self.state.pending.take() else {
            return Ok(());
        };
        let token = self.token()?;

        let result = match track_match.target {
            PlaylistTarget::LikedSongs => {
                self.client
                    .save_tracks(&token, &[track_match.track_id().to_string()])
                    .await
            }
            PlaylistTarget::Playlist(ref playlist_id) => {
                self.client
                    .add_tracks_to_playlist(&token, playlist_id, &[track_match.uri.clone()])
                    .await
            }
        };

        match result {
            Ok(()) => {
                let message = match track_match.target {
                    PlaylistTarget::LikedSongs => "Song added to Liked Songs",
                    PlaylistTarget::Playlist(_) => "Song added to playlist",
                };
                log::info!("Added {} to {}", track_match.uri, track_match.target);
                self.view.notify(NoticeKind::Success, message);
                self.back_to_list();
                self.state.phase = Phase::Done;
            }
            Err(error) => {
                log::error!("Failed to add {}: {}", track_match.uri, error);
                self.view.notify(NoticeKind::Error, "Couldn't add the song");
                self.state.pending = Some(track_match);
            }
        }

        Ok(())
    }

    /// Leave the confirmation view without adding anything.
    pub fn cancel(&mut self) {
        if self.state.phase != Phase::Confirming {
            return;
        }
        self.state.pending = None;
        self.back_to_list();
        self.state.phase = Phase::AwaitingSelection;
    }

    fn back_to_list(&mut self) {
        self.state.query_locked = false;
        self.state.query_override = None;
        self.view.reset_to_list();
    }

    /// A protected request failed. Rejections mean the token went stale and
    /// authorization starts over; anything else is only logged.
    async fn fail(&mut self, error: ApiError) -> Result<()> {
        self.state.phase = Phase::Error;

        if error.is_rejected() {
            log::warn!("Request rejected, token is most likely stale: {}", error);
            self.state.phase = Phase::Authenticating;
            return self.authenticator.start().await;
        }

        log::error!("Request failed: {}", error);
        Ok(())
    }

    fn token(&self) -> Result<String> {
        self.state
            .token
            .clone()
            .ok_or_else(|| color_eyre::eyre::eyre!("Session has no token"))
            .wrap_err("Popup session was not opened")
    }
}
