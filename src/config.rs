use std::path::{Path, PathBuf};

use color_eyre::eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};

use crate::spotify_rs::auth::SpotifyApiCredentials;

const APP_DIRECTORY: &str = "tab-to-playlist";

pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";
pub const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_ACCOUNTS_BASE_URL: &str = "https://accounts.spotify.com";
pub const DEFAULT_PLACEHOLDER_IMAGE: &str = "images/default-playlist.png";
pub const DEFAULT_PAGE_SIZE: u32 = 50;

pub const DEFAULT_SCOPES: [&str; 5] = [
    "user-library-modify",
    "user-top-read",
    "playlist-read-private",
    "playlist-modify-public",
    "playlist-modify-private",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default = "default_redirect_uri")]
    redirect_uri: String,
    #[serde(default = "default_scopes")]
    scopes: Vec<String>,
    #[serde(default = "default_page_size")]
    page_size: u32,
    #[serde(default = "default_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_accounts_base_url")]
    accounts_base_url: String,
    #[serde(default = "default_placeholder_image")]
    placeholder_image: String,
    #[serde(default)]
    token_file: Option<String>,
}

fn default_redirect_uri() -> String {
    DEFAULT_REDIRECT_URI.to_string()
}

fn default_scopes() -> Vec<String> {
    DEFAULT_SCOPES.iter().map(|scope| scope.to_string()).collect()
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_accounts_base_url() -> String {
    DEFAULT_ACCOUNTS_BASE_URL.to_string()
}

fn default_placeholder_image() -> String {
    DEFAULT_PLACEHOLDER_IMAGE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: default_redirect_uri(),
            scopes: default_scopes(),
            page_size: default_page_size(),
            api_base_url: default_api_base_url(),
            accounts_base_url: default_accounts_base_url(),
            placeholder_image: default_placeholder_image(),
            token_file: None,
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&contents)
            .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        if config.page_size == 0 {
            return Err(eyre!("page_size must be greater than zero"));
        }
        Ok(config)
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join(APP_DIRECTORY).join("config.toml"))
    }

    /// Load the default config file, or built-in defaults when it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path().ok_or(eyre!("No config directory found"))?;

        if !config_path.exists() {
            log::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        Self::from_file(&config_path)
    }

    /// Write the default config file, if it doesn't exist
    pub fn create_default() -> Result<PathBuf> {
        let config_path = Self::config_path().ok_or(eyre!("No config directory found"))?;
        if config_path.exists() {
            log::info!("Config already exists at {}", config_path.display());
            return Ok(config_path);
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents =
            toml::to_string_pretty(&Self::default()).wrap_err("Failed to serialize config")?;
        std::fs::write(&config_path, contents)
            .wrap_err_with(|| format!("Failed to write {}", config_path.display()))?;

        Ok(config_path)
    }

    /// Expand ~ to home directory
    fn expand_path(&self, path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    /// Where the bearer token is persisted
    pub fn token_file_path(&self) -> Result<PathBuf> {
        if let Some(ref token_file) = self.token_file {
            return Ok(self.expand_path(token_file));
        }
        dirs::config_dir()
            .map(|path| path.join(APP_DIRECTORY).join("token.json"))
            .ok_or(eyre!("No config directory found for the token file"))
    }

    /// Client credentials, falling back to environment variables
    pub fn credentials(&self) -> Result<SpotifyApiCredentials> {
        let client_id = self
            .client_id
            .clone()
            .or_else(|| std::env::var("SPOTIFY_CLIENT_ID").ok())
            .ok_or(eyre!(
                "Missing client_id (set it in the config file or SPOTIFY_CLIENT_ID)"
            ))?;
        let client_secret = self
            .client_secret
            .clone()
            .or_else(|| std::env::var("SPOTIFY_CLIENT_SECRET").ok())
            .ok_or(eyre!(
                "Missing client_secret (set it in the config file or SPOTIFY_CLIENT_SECRET)"
            ))?;

        Ok(SpotifyApiCredentials::new(
            client_id,
            client_secret,
            self.redirect_uri.clone(),
            self.scopes.clone(),
        ))
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn accounts_base_url(&self) -> &str {
        &self.accounts_base_url
    }

    pub fn placeholder_image(&self) -> &str {
        &self.placeholder_image
    }
}
