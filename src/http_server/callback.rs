use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Router,
    extract::{RawQuery, State},
    response::Html,
    routing::get,
};
use color_eyre::eyre::{Context, Result, eyre};
use tokio::net::TcpListener;
use tokio::sync::{Notify, oneshot};
use url::Url;

use crate::services::authenticator::{AuthOutcome, Authenticator};

struct CallbackState {
    authenticator: Arc<Authenticator>,
    redirect_uri: String,
    outcome: Mutex<Option<oneshot::Sender<AuthOutcome>>>,
}

/// Host/port and path the redirect URI points at
pub fn redirect_target(redirect_uri: &str) -> Result<(String, String)> {
    let url = Url::parse(redirect_uri)
        .wrap_err_with(|| format!("Invalid redirect URI: {}", redirect_uri))?;
    let host = url
        .host_str()
        .ok_or_else(|| eyre!("Redirect URI has no host: {}", redirect_uri))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| eyre!("Redirect URI has no port: {}", redirect_uri))?;

    Ok((format!("{}:{}", host, port), url.path().to_string()))
}

async fn callback(
    State(state): State<Arc<CallbackState>>,
    RawQuery(query): RawQuery,
) -> Html<&'static str> {
    let redirect_url = match query {
        Some(query) => format!("{}?{}", state.redirect_uri, query),
        None => state.redirect_uri.clone(),
    };

    let outcome = state.authenticator.finish(&redirect_url).await;
    let page = match outcome {
        AuthOutcome::Authorized => "<p>Authorized. You can close this tab.</p>",
        AuthOutcome::Denied { .. } => "<p>Authorization was denied. You can close this tab.</p>",
        AuthOutcome::Abandoned | AuthOutcome::Failed => {
            "<p>Authorization failed. Close this tab and try again.</p>"
        }
    };

    let sender = state
        .outcome
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take();
    if let Some(sender) = sender {
        let _ = sender.send(outcome);
    }

    Html(page)
}

/// Socket the authorization tab is redirected to.
///
/// Bound before the authorization page is opened: a redirect that arrives
/// early waits in the accept queue until `wait` serves it.
pub struct RedirectListener {
    listener: TcpListener,
    redirect_uri: String,
    path: String,
}

impl RedirectListener {
    pub async fn bind(redirect_uri: &str) -> Result<Self> {
        let (address, path) = redirect_target(redirect_uri)?;
        let listener = TcpListener::bind(&address)
            .await
            .wrap_err_with(|| eyre!("Failed to bind redirect listener to {}", address))?;

        Ok(Self {
            listener,
            redirect_uri: redirect_uri
                .split('?')
                .next()
                .unwrap_or(redirect_uri)
                .to_string(),
            path,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .wrap_err("Redirect listener has no local address")
    }

    /// Serve the redirect URI until one redirect finished the flow.
    pub async fn wait(
        self,
        authenticator: Arc<Authenticator>,
        timeout: Duration,
    ) -> Result<AuthOutcome> {
        let (sender, receiver) = oneshot::channel();
        let state = Arc::new(CallbackState {
            authenticator,
            redirect_uri: self.redirect_uri,
            outcome: Mutex::new(Some(sender)),
        });

        let app = Router::new()
            .route(&self.path, get(callback))
            .with_state(state);

        log::info!(
            "Waiting for authorization redirect on {}",
            self.listener
                .local_addr()
                .map(|address| address.to_string())
                .unwrap_or_default()
        );

        let shutdown = Arc::new(Notify::new());
        let server = {
            let shutdown = shutdown.clone();
            let listener = self.listener;
            tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move { shutdown.notified().await })
                    .await
            })
        };

        let outcome = tokio::time::timeout(timeout, receiver).await;
        shutdown.notify_one();
        server
            .await
            .wrap_err("Redirect listener panicked")?
            .wrap_err("Redirect listener failed")?;

        match outcome {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(_)) => Err(eyre!("Redirect listener stopped before authorization finished")),
            Err(_) => Err(eyre!(
                "Timed out after {} waiting for authorization",
                humantime::format_duration(timeout)
            )),
        }
    }
}
