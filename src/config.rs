//! Process configuration.
//!
//! All settings come from the environment; the command line is ignored. A
//! `.env` file in the working directory is loaded first and never overrides
//! variables that are already set.

use clap::Parser;
use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Immutable settings established once at startup.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Config {
    /// Homepage to poll; also the base for site-relative links
    #[arg(long, env = "RBC_URL", default_value = "https://www.rbc.ru/")]
    pub source_url: Url,

    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_TOKEN", hide_env_values = true)]
    pub telegram_token: String,

    /// Destination chat or channel (`@name` or numeric id)
    #[arg(long, env = "CHANNEL_ID")]
    pub channel_id: String,

    /// Bot API base URL
    #[arg(long, env = "TELEGRAM_API_URL", default_value = "https://api.telegram.org")]
    pub telegram_api_url: Url,

    /// File holding the links already relayed, one per line
    #[arg(long, env = "SENT_ARTICLES_FILE", default_value = "sent_articles.txt")]
    pub sent_articles_file: PathBuf,

    /// Seconds between poll cycles
    #[arg(long, env = "CHECK_INTERVAL", default_value_t = 900)]
    pub check_interval: u64,

    /// Per-request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT", default_value_t = 10)]
    pub request_timeout: u64,

    /// Telegram message length limit in characters
    #[arg(long, env = "MAX_MESSAGE_LENGTH", default_value_t = 4096)]
    pub max_message_length: usize,

    /// `User-Agent` sent with every request
    #[arg(long, env = "USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Pause after each delivered chunk, in milliseconds
    #[arg(long, env = "CHUNK_PAUSE_MS", default_value_t = 1000)]
    pub chunk_pause_ms: u64,

    /// Pause after each relayed article, in milliseconds
    #[arg(long, env = "ARTICLE_PAUSE_MS", default_value_t = 2000)]
    pub article_pause_ms: u64,

    /// Log file, written alongside stderr
    #[arg(long, env = "LOG_FILE", default_value = "news_bot.log")]
    pub log_file: PathBuf,
}

impl Config {
    /// Read the configuration from the environment only.
    pub fn from_env() -> Result<Self, clap::Error> {
        Self::try_parse_from([env!("CARGO_PKG_NAME")])
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn chunk_pause(&self) -> Duration {
        Duration::from_millis(self.chunk_pause_ms)
    }

    pub fn article_pause(&self) -> Duration {
        Duration::from_millis(self.article_pause_ms)
    }
}

/// Export `KEY=value` pairs from `path` into the environment.
///
/// Must run before any other thread is started.
pub fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };
    for (key, value) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue;
        }
        // SAFETY: called from `main` before the runtime or any thread exists.
        unsafe { env::set_var(key, value) };
    }
}

/// Parse `.env` contents. Blank lines, comments and lines without `=` are
/// skipped; an optional `export ` prefix and surrounding quotes are removed.
fn parse_dotenv(contents: &str) -> Vec<(OsString, OsString)> {
    let mut pairs = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((k, v)) = line.split_once('=') else {
            continue;
        };
        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut value = v.trim();
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            value = &value[1..value.len() - 1];
        }
        pairs.push((key.into(), value.into()));
    }
    pairs
}
