use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::{Result, eyre};

use crate::http_server::callback::RedirectListener;
use crate::ports::spotify::SpotifyClient;
use crate::ports::view::PopupView;
use crate::services::authenticator::{AuthOutcome, Authenticator};
use crate::services::playlist_session::{Phase, PlaylistSession};

/// Authorization rounds one command runs before giving up on a token that
/// keeps getting rejected.
const MAX_AUTHORIZATIONS: usize = 2;

type SessionFactory<C, V> = Box<dyn Fn() -> PlaylistSession<C, V>>;

/// Runs the popup sessions of one command and completes every
/// authorization they start, reopening the popup afterwards.
///
/// The redirect listener is bound before any step that may open the
/// authorization page.
pub struct SessionHost<C: SpotifyClient, V: PopupView> {
    authenticator: Arc<Authenticator>,
    redirect_uri: String,
    timeout: Duration,
    new_session: SessionFactory<C, V>,
    listener: Option<RedirectListener>,
}

impl<C: SpotifyClient, V: PopupView> SessionHost<C, V> {
    pub fn new(
        authenticator: Arc<Authenticator>,
        redirect_uri: &str,
        timeout: Duration,
        new_session: impl Fn() -> PlaylistSession<C, V> + 'static,
    ) -> Self {
        Self {
            authenticator,
            redirect_uri: redirect_uri.to_string(),
            timeout,
            new_session: Box::new(new_session),
            listener: None,
        }
    }

    /// Authorize without opening a popup.
    pub async fn login(&mut self) -> Result<()> {
        self.listen().await?;
        self.authenticator.start().await?;
        self.authorize().await
    }

    /// Open a popup session that ends on the playlist list.
    pub async fn open(&mut self) -> Result<PlaylistSession<C, V>> {
        self.listen().await?;
        let mut session = (self.new_session)();
        session.open().await?;
        self.settle(&mut session).await?;
        Ok(session)
    }

    /// Load the next page of `session`.
    pub async fn scroll(&mut self, session: &mut PlaylistSession<C, V>) -> Result<()> {
        self.listen().await?;
        session.on_scroll_bottom().await?;
        self.settle(session).await
    }

    #[cfg(test)]
    pub fn redirect_address(&self) -> Option<std::net::SocketAddr> {
        self.listener
            .as_ref()
            .and_then(|listener| listener.local_addr().ok())
    }

    async fn listen(&mut self) -> Result<()> {
        if self.listener.is_none() {
            let listener = RedirectListener::bind(&self.redirect_uri).await?;
            log::debug!("Redirect listener bound to {}", listener.local_addr()?);
            self.listener = Some(listener);
        }
        Ok(())
    }

    async fn authorize(&mut self) -> Result<()> {
        let listener = match self.listener.take() {
            Some(listener) => listener,
            None => RedirectListener::bind(&self.redirect_uri).await?,
        };
        match listener
            .wait(self.authenticator.clone(), self.timeout)
            .await?
        {
            AuthOutcome::Authorized => Ok(()),
            outcome => Err(eyre!("Authorization did not complete: {:?}", outcome)),
        }
    }

    /// A rejected or missing token sends a session to `Authenticating`:
    /// finish that authorization and replace the session with a fresh one.
    async fn settle(&mut self, session: &mut PlaylistSession<C, V>) -> Result<()> {
        let mut rounds = 0;
        while session.phase() == Phase::Authenticating {
            if rounds == MAX_AUTHORIZATIONS {
                return Err(eyre!(
                    "Spotify still rejects the token after {} authorizations",
                    rounds
                ));
            }
            rounds += 1;

            self.authorize().await?;
            self.listen().await?;
            *session = (self.new_session)();
            session.open().await?;
        }

        match session.phase() {
            Phase::AwaitingSelection | Phase::Done => Ok(()),
            phase => Err(eyre!("Could not load your playlists (ended in {:?})", phase)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::ports::browser::{BrowserHost, MockBrowserHost, TabId};
    use crate::ports::spotify::{MockAccountsClient, MockSpotifyClient};
    use crate::ports::storage::TokenStore;
    use crate::services::authenticator::TOKEN_KEY;
    use crate::services::playlist_session::SessionSettings;
    use crate::spotify_rs::client::ApiError;
    use crate::spotify_rs::types::{SpotifyPlaylist, SpotifyTokenResponse, SpotifyUser};
    use crate::test_utils::{MemoryTokenStore, RecordingView, page_of, playlist, test_credentials};

    const ANY_PORT: &str = "http://127.0.0.1:0/callback";
    const PAGE_SIZE: u32 = 2;

    fn owned_playlists() -> Vec<SpotifyPlaylist> {
        vec![
            playlist("p1", "me", None),
            playlist("p2", "me", None),
            playlist("p3", "me", None),
        ]
    }

    fn browser() -> Arc<dyn BrowserHost> {
        let mut browser = MockBrowserHost::new();
        browser.expect_close_popup().return_const(());
        browser.expect_open_tab().returning(|_| Ok(TabId(7)));
        browser.expect_close_tab().returning(|_| Ok(()));
        Arc::new(browser)
    }

    fn accounts(granted: Option<&'static str>) -> MockAccountsClient {
        let mut accounts = MockAccountsClient::new();
        accounts.expect_exchange_code().returning(move |_| {
            Ok(SpotifyTokenResponse {
                access_token: granted.map(str::to_string),
                ..Default::default()
            })
        });
        accounts
    }

    /// The first client rejects the second playlist page; later ones accept
    /// only the `fresh` token.
    fn client(generation: usize) -> MockSpotifyClient {
        let mut client = MockSpotifyClient::new();
        client.expect_current_user().returning(|_| {
            Ok(SpotifyUser {
                id: "me".to_string(),
                display_name: None,
            })
        });
        if generation == 0 {
            client
                .expect_playlists_page()
                .returning(|_, offset, limit| match offset {
                    0 => Ok(page_of(&owned_playlists(), offset, limit)),
                    _ => Err(ApiError::Status {
                        status: 401,
                        body: "The access token expired".to_string(),
                    }),
                });
        } else {
            client
                .expect_playlists_page()
                .withf(|token, _, _| token == "fresh")
                .returning(|_, offset, limit| Ok(page_of(&owned_playlists(), offset, limit)));
        }
        client
    }

    async fn host(
        store: Arc<MemoryTokenStore>,
        accounts: MockAccountsClient,
        timeout: Duration,
    ) -> (SessionHost<MockSpotifyClient, RecordingView>, Arc<AtomicUsize>) {
        store.set(TOKEN_KEY, "stale").await.unwrap();
        let browser = browser();
        let authenticator = Arc::new(Authenticator::new(
            test_credentials(ANY_PORT),
            "https://accounts.spotify.com",
            store,
            browser.clone(),
            Arc::new(accounts),
        ));

        let generations = Arc::new(AtomicUsize::new(0));
        let factory = {
            let authenticator = authenticator.clone();
            let generations = generations.clone();
            move || {
                PlaylistSession::new(
                    client(generations.fetch_add(1, Ordering::SeqCst)),
                    RecordingView::default(),
                    authenticator.clone(),
                    browser.clone(),
                    SessionSettings {
                        page_size: PAGE_SIZE,
                        placeholder_image: "placeholder.png".to_string(),
                    },
                )
            }
        };

        (
            SessionHost::new(authenticator, ANY_PORT, timeout, factory),
            generations,
        )
    }

    #[tokio::test]
    async fn test_rejected_later_page_reauthorizes_and_reopens() {
        let store = Arc::new(MemoryTokenStore::default());
        let (mut host, generations) =
            host(store.clone(), accounts(Some("fresh")), Duration::from_secs(10)).await;

        let mut session = host.open().await.unwrap();
        assert_eq!(session.phase(), Phase::AwaitingSelection);

        let address = host.redirect_address().unwrap();
        let redirect = tokio::spawn(reqwest::get(format!(
            "http://{}/callback?code=fresh-code",
            address
        )));

        host.scroll(&mut session).await.unwrap();

        assert!(redirect.await.unwrap().unwrap().status().is_success());
        assert_eq!(generations.load(Ordering::SeqCst), 2);
        assert_eq!(store.get(TOKEN_KEY).await.unwrap().as_deref(), Some("fresh"));
        assert_eq!(session.phase(), Phase::AwaitingSelection);
        // the reopened popup lists from the first page again
        assert_eq!(session.view().playlists().len(), 3);

        host.scroll(&mut session).await.unwrap();
        assert!(session.is_exhausted());
        assert_eq!(session.view().playlists().len(), 4);
    }

    #[tokio::test]
    async fn test_denied_reauthorization_is_an_error() {
        let store = Arc::new(MemoryTokenStore::default());
        let (mut host, generations) =
            host(store.clone(), accounts(None), Duration::from_secs(10)).await;

        let mut session = host.open().await.unwrap();
        let address = host.redirect_address().unwrap();
        let redirect = tokio::spawn(reqwest::get(format!(
            "http://{}/callback?error=access_denied",
            address
        )));

        let result = host.scroll(&mut session).await;

        assert!(result.unwrap_err().to_string().contains("Denied"));
        redirect.await.unwrap().unwrap();
        assert_eq!(generations.load(Ordering::SeqCst), 1);
        assert_eq!(store.get(TOKEN_KEY).await.unwrap().as_deref(), Some("stale"));
    }

    #[tokio::test]
    async fn test_reauthorization_waits_for_the_configured_timeout() {
        let store = Arc::new(MemoryTokenStore::default());
        let (mut host, _) = host(store, accounts(None), Duration::from_millis(50)).await;

        let mut session = host.open().await.unwrap();
        let result = host.scroll(&mut session).await;

        assert!(result.unwrap_err().to_string().contains("Timed out"));
    }
}
