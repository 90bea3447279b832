use std::sync::atomic::{AtomicU64, Ordering};

use color_eyre::eyre::Result;

use crate::ports::browser::{BrowserHost, TabId};

const OPENERS: [&str; 3] = ["xdg-open", "open", "wslview"];

/// Browser host for the command line: URLs go to the platform opener and
/// the "active tab title" is whatever the user passed on the command line.
pub struct SystemBrowser {
    title: Option<String>,
    next_tab: AtomicU64,
}

impl SystemBrowser {
    pub fn new(title: Option<String>) -> Self {
        Self {
            title,
            next_tab: AtomicU64::new(1),
        }
    }
}

#[async_trait::async_trait]
impl BrowserHost for SystemBrowser {
    async fn open_tab(&self, url: &str) -> Result<TabId> {
        let tab = TabId(self.next_tab.fetch_add(1, Ordering::Relaxed));

        let opened = match OPENERS.iter().find_map(|name| which::which(name).ok()) {
            Some(opener) => {
                log::debug!("Opening {} with {}", url, opener.display());
                match tokio::process::Command::new(&opener).arg(url).status().await {
                    Ok(status) if status.success() => true,
                    Ok(status) => {
                        log::warn!("{} exited with {}", opener.display(), status);
                        false
                    }
                    Err(error) => {
                        log::warn!("Failed to run {}: {}", opener.display(), error);
                        false
                    }
                }
            }
            None => false,
        };

        if !opened {
            println!("Open this URL in your browser:\n\n  {}\n", url);
        }

        Ok(tab)
    }

    async fn close_tab(&self, tab: TabId) -> Result<()> {
        log::debug!("Authorization tab {} is done", tab.0);
        println!("Authorization finished, you can close the browser tab.");
        Ok(())
    }

    async fn close_active_tab(&self) -> Result<()> {
        println!("Authorization finished, you can close the browser tab.");
        Ok(())
    }

    fn close_popup(&self) {
        log::debug!("Popup closed for authorization");
    }

    async fn active_tab_title(&self) -> Result<Option<String>> {
        Ok(self.title.clone())
    }
}
