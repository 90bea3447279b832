use std::sync::{Arc, Mutex};

use color_eyre::eyre::{Result, WrapErr};

use crate::ports::browser::{BrowserHost, TabId};
use crate::ports::spotify::AccountsClient;
use crate::ports::storage::TokenStore;
use crate::spotify_rs::auth::{
    RedirectResult, SpotifyApiCredentials, TokenRequest, authorization_url, parse_redirect,
};

/// Storage key of the bearer token.
pub const TOKEN_KEY: &str = "token";

/// State of one authorization round trip, dropped once its tab is closed.
#[derive(Debug, Clone)]
pub struct AuthorizationSession {
    pub scopes: Vec<String>,
    pub tab: TabId,
    pub code: Option<String>,
}

/// How a `finish` call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authorized,
    Denied { reason: String },
    Abandoned,
    Failed,
}

pub struct Authenticator {
    credentials: SpotifyApiCredentials,
    accounts_base_url: String,
    store: Arc<dyn TokenStore>,
    browser: Arc<dyn BrowserHost>,
    accounts: Arc<dyn AccountsClient>,
    pending: Mutex<Option<AuthorizationSession>>,
}

impl Authenticator {
    pub fn new(
        credentials: SpotifyApiCredentials,
        accounts_base_url: &str,
        store: Arc<dyn TokenStore>,
        browser: Arc<dyn BrowserHost>,
        accounts: Arc<dyn AccountsClient>,
    ) -> Self {
        Self {
            credentials,
            accounts_base_url: accounts_base_url.to_string(),
            store,
            browser,
            accounts,
            pending: Mutex::new(None),
        }
    }

    pub async fn has_token(&self) -> Result<bool> {
        Ok(self.token().await?.is_some())
    }

    pub async fn token(&self) -> Result<Option<String>> {
        self.store
            .get(TOKEN_KEY)
            .await
            .wrap_err("Failed to read token from storage")
    }

    /// Send the user to the authorization page in a new tab.
    ///
    /// The popup is closed first since the redirect lands in that other tab.
    pub async fn start(&self) -> Result<()> {
        self.browser.close_popup();

        let url = authorization_url(&self.accounts_base_url, &self.credentials)
            .wrap_err("Failed to build authorization URL")?;
        log::info!("Opening authorization page");
        log::debug!("Authorization URL: {}", url);

        let tab = self
            .browser
            .open_tab(url.as_str())
            .await
            .wrap_err("Failed to open authorization tab")?;

        self.set_pending(Some(AuthorizationSession {
            scopes: self.credentials.scopes().to_vec(),
            tab,
            code: None,
        }));

        Ok(())
    }

    /// Complete the flow once the authorization tab reached the redirect URI.
    ///
    /// Never fails: every problem abandons the flow and closes the tab, the
    /// next protected request starts over.
    pub async fn finish(&self, redirect_url: &str) -> AuthOutcome {
        let code = match parse_redirect(redirect_url) {
            RedirectResult::Error(reason) => {
                log::warn!("Authorization was denied: {}", reason);
                self.close_authorization_tab().await;
                return AuthOutcome::Denied { reason };
            }
            RedirectResult::Missing => {
                log::warn!("Redirect URL carried no authorization code");
                self.close_authorization_tab().await;
                return AuthOutcome::Abandoned;
            }
            RedirectResult::Code(code) => code,
        };

        if let Some(session) = self.pending_mut().as_mut() {
            log::debug!("Code granted for scopes: {}", session.scopes.join(" "));
            session.code = Some(code.clone());
        }

        let request = TokenRequest::new(code, self.credentials.redirect_uri());
        let outcome = match self.accounts.exchange_code(&request).await {
            Ok(response) => match (response.access_token, response.error) {
                (Some(token), None) => match self.store.set(TOKEN_KEY, &token).await {
                    Ok(()) => {
                        log::info!("OAuth token saved");
                        AuthOutcome::Authorized
                    }
                    Err(error) => {
                        log::error!("Failed to persist token: {:?}", error);
                        AuthOutcome::Failed
                    }
                },
                (_, error) => {
                    log::warn!(
                        "Token endpoint answered with an error: {} {}",
                        error.unwrap_or_default(),
                        response.error_description.unwrap_or_default()
                    );
                    AuthOutcome::Failed
                }
            },
            Err(error) => {
                log::warn!("Failed to exchange authorization code: {}", error);
                AuthOutcome::Failed
            }
        };

        self.close_authorization_tab().await;
        outcome
    }

    pub async fn clear_token(&self) -> Result<()> {
        self.store
            .remove(TOKEN_KEY)
            .await
            .wrap_err("Failed to clear token")?;
        log::info!("Token cleared");
        Ok(())
    }

    #[cfg(test)]
    pub fn pending_session(&self) -> Option<AuthorizationSession> {
        self.pending_mut().clone()
    }

    async fn close_authorization_tab(&self) {
        let session = self.pending_mut().take();
        let closed = match session {
            Some(session) => self.browser.close_tab(session.tab).await,
            None => self.browser.close_active_tab().await,
        };
        if let Err(error) = closed {
            log::warn!("Failed to close authorization tab: {:?}", error);
        }
    }

    fn set_pending(&self, session: Option<AuthorizationSession>) {
        *self.pending_mut() = session;
    }

    fn pending_mut(&self) -> std::sync::MutexGuard<'_, Option<AuthorizationSession>> {
        // The guarded value is a plain Option, a poisoned lock is still usable
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;
    use crate::ports::browser::MockBrowserHost;
    use crate::ports::spotify::MockAccountsClient;
    use crate::spotify_rs::auth::ExchangeCodeForTokenError;
    use crate::spotify_rs::types::SpotifyTokenResponse;
    use crate::test_utils::{MemoryTokenStore, test_credentials};

    const REDIRECT: &str = "http://127.0.0.1:8888/callback";

    fn authenticator(
        store: Arc<MemoryTokenStore>,
        browser: MockBrowserHost,
        accounts: MockAccountsClient,
    ) -> Authenticator {
        Authenticator::new(
            test_credentials(REDIRECT),
            "https://accounts.spotify.com",
            store,
            Arc::new(browser),
            Arc::new(accounts),
        )
    }

    fn granted(token: &str) -> SpotifyTokenResponse {
        SpotifyTokenResponse {
            access_token: Some(token.to_string()),
            token_type: Some("Bearer".to_string()),
            expires_in: Some(3600),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_has_token() {
        let store = Arc::new(MemoryTokenStore::default());
        let auth = authenticator(
            store.clone(),
            MockBrowserHost::new(),
            MockAccountsClient::new(),
        );

        assert!(!auth.has_token().await.unwrap());
        store.set(TOKEN_KEY, "tok").await.unwrap();
        assert!(auth.has_token().await.unwrap());
        assert_eq!(auth.token().await.unwrap().as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_start_closes_popup_and_opens_authorize_tab() {
        let mut browser = MockBrowserHost::new();
        browser.expect_close_popup().times(1).return_const(());
        browser
            .expect_open_tab()
            .withf(|url| {
                url.starts_with("https://accounts.spotify.com/authorize?")
                    && url.contains("client_id=client-id")
                    && url.contains("response_type=code")
                    && url.contains("scope=user-library-modify+playlist-read-private")
            })
            .times(1)
            .returning(|_| Ok(TabId(7)));

        let auth = authenticator(
            Arc::new(MemoryTokenStore::default()),
            browser,
            MockAccountsClient::new(),
        );
        auth.start().await.unwrap();

        let session = auth.pending_session().unwrap();
        assert_eq!(session.tab, TabId(7));
        assert_eq!(session.scopes.len(), 2);
        assert!(session.code.is_none());
    }

    #[tokio::test]
    async fn test_finish_exchanges_code_and_stores_token() {
        let mut browser = MockBrowserHost::new();
        browser.expect_close_popup().return_const(());
        browser.expect_open_tab().returning(|_| Ok(TabId(3)));
        browser
            .expect_close_tab()
            .with(eq(TabId(3)))
            .times(1)
            .returning(|_| Ok(()));
        browser.expect_close_active_tab().never();

        let mut accounts = MockAccountsClient::new();
        let expected_body = format!(
            "grant_type=authorization_code&code=abc123&redirect_uri={}",
            urlencoding::encode(REDIRECT)
        );
        accounts
            .expect_exchange_code()
            .withf(move |request| request.form_body() == expected_body)
            .times(1)
            .returning(|_| Ok(granted("fresh-token")));

        let store = Arc::new(MemoryTokenStore::default());
        let auth = authenticator(store.clone(), browser, accounts);
        auth.start().await.unwrap();

        let outcome = auth.finish(&format!("{}?code=abc123", REDIRECT)).await;

        assert_eq!(outcome, AuthOutcome::Authorized);
        assert_eq!(
            store.get(TOKEN_KEY).await.unwrap().as_deref(),
            Some("fresh-token")
        );
        assert!(auth.pending_session().is_none());
    }

    #[tokio::test]
    async fn test_finish_with_error_never_calls_token_endpoint() {
        let mut browser = MockBrowserHost::new();
        browser
            .expect_close_active_tab()
            .times(1)
            .returning(|| Ok(()));

        let mut accounts = MockAccountsClient::new();
        accounts.expect_exchange_code().never();

        let store = Arc::new(MemoryTokenStore::default());
        let auth = authenticator(store.clone(), browser, accounts);

        let outcome = auth
            .finish(&format!("{}?error=access_denied", REDIRECT))
            .await;

        assert_eq!(
            outcome,
            AuthOutcome::Denied {
                reason: "access_denied".to_string()
            }
        );
        assert!(store.get(TOKEN_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_finish_without_code_is_abandoned() {
        let mut browser = MockBrowserHost::new();
        browser
            .expect_close_active_tab()
            .times(1)
            .returning(|| Ok(()));
        let mut accounts = MockAccountsClient::new();
        accounts.expect_exchange_code().never();

        let auth = authenticator(Arc::new(MemoryTokenStore::default()), browser, accounts);

        assert_eq!(auth.finish(REDIRECT).await, AuthOutcome::Abandoned);
    }

    #[tokio::test]
    async fn test_finish_with_error_body_stores_nothing() {
        let mut browser = MockBrowserHost::new();
        browser
            .expect_close_active_tab()
            .times(1)
            .returning(|| Ok(()));

        let mut accounts = MockAccountsClient::new();
        accounts.expect_exchange_code().times(1).returning(|_| {
            Ok(SpotifyTokenResponse {
                error: Some("invalid_grant".to_string()),
                error_description: Some("Invalid authorization code".to_string()),
                ..Default::default()
            })
        });

        let store = Arc::new(MemoryTokenStore::default());
        let auth = authenticator(store.clone(), browser, accounts);

        assert_eq!(
            auth.finish(&format!("{}?code=abc123", REDIRECT)).await,
            AuthOutcome::Failed
        );
        assert!(store.get(TOKEN_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_finish_with_rejected_exchange_stores_nothing() {
        let mut browser = MockBrowserHost::new();
        browser
            .expect_close_active_tab()
            .times(1)
            .returning(|| Ok(()));

        let mut accounts = MockAccountsClient::new();
        accounts.expect_exchange_code().times(1).returning(|_| {
            Err(ExchangeCodeForTokenError::InvalidCode {
                status: 400,
                reason: "invalid_client".to_string(),
            })
        });

        let store = Arc::new(MemoryTokenStore::default());
        let auth = authenticator(store.clone(), browser, accounts);

        assert_eq!(
            auth.finish(&format!("{}?code=abc123", REDIRECT)).await,
            AuthOutcome::Failed
        );
        assert!(store.get(TOKEN_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_token() {
        let store = Arc::new(MemoryTokenStore::default());
        store.set(TOKEN_KEY, "tok").await.unwrap();
        let auth = authenticator(
            store.clone(),
            MockBrowserHost::new(),
            MockAccountsClient::new(),
        );

        auth.clear_token().await.unwrap();

        assert!(!auth.has_token().await.unwrap());
    }
}
