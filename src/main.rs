//! # RBC News Relay
//!
//! Polls the [RBC](https://www.rbc.ru/) homepage, extracts the text of every
//! article it has not relayed yet and posts it to a Telegram channel.
//!
//! ## Usage
//!
//! ```sh
//! TELEGRAM_TOKEN=123:ABC CHANNEL_ID=@my_channel rbc_news_relay
//! ```
//!
//! Configuration is read from the environment (and `.env`), see [`config`].
//!
//! ## Architecture
//!
//! Each cycle runs strictly in sequence:
//! 1. **Load**: read the set of links already relayed
//! 2. **Index**: list the feed articles on the homepage
//! 3. **Extract**: fetch each new article and keep its paragraph text
//! 4. **Deliver**: split into Telegram-sized chunks and post them in order
//! 5. **Record**: append the link to the sent-articles file
//!
//! The process then sleeps for the check interval and starts over until it is
//! interrupted.

use std::fs::OpenOptions;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod config;
mod error;
mod fetch;
mod format;
mod models;
mod relay;
mod scrapers;
mod store;
mod telegram;
mod utils;

use config::Config;
use fetch::{build_client, HttpFetcher};
use relay::Relay;
use telegram::TelegramChannel;

fn main() -> ExitCode {
    // Environment mutation has to happen before the runtime spawns threads.
    config::load_dotenv_if_present(Path::new(".env"));
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.log_file);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(config))
}

async fn run(config: Config) -> ExitCode {
    info!(
        source = %config.source_url,
        channel = %config.channel_id,
        interval_secs = config.check_interval,
        store = %config.sent_articles_file.display(),
        "Bot started"
    );

    let client = match build_client(&config.user_agent, config.request_timeout()) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to build HTTP client");
            return ExitCode::FAILURE;
        }
    };

    let fetcher = HttpFetcher::new(client.clone());
    let channel = TelegramChannel::new(
        client,
        config.telegram_api_url.as_str(),
        &config.telegram_token,
        &config.channel_id,
    );
    let relay = Relay::new(&config, fetcher, channel);

    tokio::select! {
        result = relay.run() => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!(error = %e, "Fatal error; stopping");
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Bot stopped");
            ExitCode::SUCCESS
        }
    }
}

/// Log to stderr and, when it can be opened, to `log_file`.
fn init_tracing(log_file: &Path) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tfmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(UtcTime::rfc_3339());

    let (file_layer, file_error) = match OpenOptions::new().create(true).append(true).open(log_file) {
        Ok(file) => {
            let layer = tfmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true)
                .with_timer(UtcTime::rfc_3339());
            (Some(layer), None)
        }
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    if let Some(e) = file_error {
        warn!(path = %log_file.display(), error = %e, "Cannot open log file; logging to stderr only");
    }
}
