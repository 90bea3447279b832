pub mod authenticator;
pub mod playlist_session;
pub mod session_host;
pub mod system_browser;
pub mod terminal_view;
pub mod token_store;
