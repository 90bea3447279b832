use color_eyre::eyre::Result;

/// Identifier of a browser tab opened by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabId(pub u64);

/// Port trait for the host browser: tab management, the popup window and
/// the title of the page the user is looking at.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait BrowserHost: Send + Sync {
    async fn open_tab(&self, url: &str) -> Result<TabId>;

    async fn close_tab(&self, tab: TabId) -> Result<()>;

    async fn close_active_tab(&self) -> Result<()>;

    fn close_popup(&self);

    async fn active_tab_title(&self) -> Result<Option<String>>;
}
