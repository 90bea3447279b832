mod config;
mod http_server;
mod logging;
mod ports;
mod services;
mod spotify_rs;
mod title_query;

#[cfg(test)]
mod test_utils;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre::Context, eyre::eyre};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    config::Config,
    logging::setup_logging,
    ports::browser::BrowserHost,
    services::{
        authenticator::{AuthOutcome, Authenticator},
        playlist_session::{Phase, PlaylistSession, SessionSettings},
        session_host::SessionHost,
        system_browser::SystemBrowser,
        terminal_view::TerminalView,
        token_store::FileTokenStore,
    },
    spotify_rs::{
        client::{SpotifyAccountsClient, SpotifyWebClient},
        types::PlaylistTarget,
    },
    title_query::normalize_title,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "TAB_TO_PLAYLIST_CONFIG")]
    config: Option<PathBuf>,

    /// Console log level (default: off)
    #[arg(long, default_value = "off", global = true, env = "LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// File log level (default: debug)
    #[arg(long, default_value = "debug", global = true)]
    log_file_level: log::LevelFilter,

    /// Path to log file
    #[arg(long, env = "TAB_TO_PLAYLIST_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,

    /// How long to wait for the browser to come back from authorization
    #[arg(long, default_value = "5m", global = true)]
    auth_timeout: humantime::Duration,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Authorize with Spotify and store the token
    Login,
    /// Finish authorization with the URL the browser was redirected to
    Finish {
        /// The full redirect URL, including its query string
        #[arg(short, long)]
        redirect_url: String,
    },
    /// Remove the stored token
    Logout,
    /// Print whether a token is stored
    Status,
    /// Print the search query derived from a tab title
    Query {
        /// The tab title
        #[arg(short, long)]
        title: String,
    },
    /// List the playlists you can add songs to
    Playlists {
        /// Keep loading pages until the list ends
        #[arg(short, long)]
        all: bool,
    },
    /// Find the song from a tab title and add it to a playlist
    Save {
        /// The tab title the song is read from
        #[arg(short, long, env = "TAB_TITLE")]
        title: Option<String>,

        /// Playlist id, or `liked` for Liked Songs
        #[arg(short, long)]
        playlist: String,

        /// Search for this instead of the cleaned tab title
        #[arg(short, long)]
        query: Option<String>,

        /// Add without asking for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

type TerminalSessions = SessionHost<SpotifyWebClient, TerminalView>;

struct Host {
    config: Config,
    browser: Arc<dyn BrowserHost>,
    authenticator: Arc<Authenticator>,
}

impl Host {
    fn new(config: Config, title: Option<String>) -> Result<Self> {
        let credentials = config.credentials()?;
        let browser: Arc<dyn BrowserHost> = Arc::new(SystemBrowser::new(title));
        let store = Arc::new(FileTokenStore::new(config.token_file_path()?));
        log::debug!("Token file: {}", store.path().display());

        let accounts = Arc::new(SpotifyAccountsClient::new(
            config.accounts_base_url(),
            credentials.clone(),
        ));
        let authenticator = Arc::new(Authenticator::new(
            credentials,
            config.accounts_base_url(),
            store,
            browser.clone(),
            accounts,
        ));

        Ok(Self {
            config,
            browser,
            authenticator,
        })
    }

    /// Popup sessions against the Web API, rendered to the terminal.
    fn sessions(&self, auth_timeout: Duration) -> TerminalSessions {
        let api_base_url = self.config.api_base_url().to_string();
        let authenticator = self.authenticator.clone();
        let browser = self.browser.clone();
        let settings = SessionSettings {
            page_size: self.config.page_size(),
            placeholder_image: self.config.placeholder_image().to_string(),
        };

        SessionHost::new(
            self.authenticator.clone(),
            self.config.redirect_uri(),
            auth_timeout,
            move || {
                PlaylistSession::new(
                    SpotifyWebClient::new(&api_base_url),
                    TerminalView::new(),
                    authenticator.clone(),
                    browser.clone(),
                    settings.clone(),
                )
            },
        )
    }
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    if let Some(path) = path {
        Config::from_file(&path)
    } else {
        Config::load()
    }
    .wrap_err("Failed to load tab-to-playlist config")
}

async fn confirm_prompt(question: &str) -> Result<bool> {
    println!("{} [y/N]", question);
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .wrap_err("Failed to read answer")?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    setup_logging(args.log_level, args.log_file.clone(), args.log_file_level)?;
    let auth_timeout: Duration = args.auth_timeout.into();

    log::debug!("tab-to-playlist starting");

    match args.command {
        Commands::Query { title } => {
            println!("{}", normalize_title(&title));
        }
        Commands::Config(config_commands) => match config_commands {
            ConfigCommands::CreateDefault => {
                let path = Config::create_default()?;
                println!("{}", path.display());
            }
            ConfigCommands::Path => match Config::config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
        },
        Commands::Login => {
            let host = Host::new(load_config(args.config)?, None)?;
            host.sessions(auth_timeout).login().await?;
            println!("Logged in");
        }
        Commands::Finish { redirect_url } => {
            let host = Host::new(load_config(args.config)?, None)?;
            match host.authenticator.finish(&redirect_url).await {
                AuthOutcome::Authorized => println!("Logged in"),
                outcome => return Err(eyre!("Authorization did not complete: {:?}", outcome)),
            }
        }
        Commands::Logout => {
            let host = Host::new(load_config(args.config)?, None)?;
            host.authenticator.clear_token().await?;
            println!("Logged out");
        }
        Commands::Status => {
            let host = Host::new(load_config(args.config)?, None)?;
            if host.authenticator.has_token().await? {
                println!("Token stored");
            } else {
                println!("Not logged in");
            }
        }
        Commands::Playlists { all } => {
            let host = Host::new(load_config(args.config)?, None)?;
            let mut sessions = host.sessions(auth_timeout);
            let mut session = sessions.open().await?;
            while all && !session.is_exhausted() {
                sessions.scroll(&mut session).await?;
            }
            log::info!("Listed {} playlists", session.view().rendered());
        }
        Commands::Save {
            title,
            playlist,
            query,
            yes,
        } => {
            let host = Host::new(load_config(args.config)?, title)?;
            let mut session = host.sessions(auth_timeout).open().await?;
            if let Some(query) = query {
                session.edit_query(&query);
            }

            let target = PlaylistTarget::parse(&playlist);
            session.select_playlist(target.clone()).await?;
            if session.phase() != Phase::Confirming {
                return Err(eyre!("No song to add"));
            }

            if !yes && !confirm_prompt(&format!("Add it to {}?", target)).await? {
                session.cancel();
                return Ok(());
            }

            session.confirm().await?;
            if session.phase() != Phase::Done {
                return Err(eyre!("The song was not added"));
            }
        }
    }

    Ok(())
}
