//! The poll loop.
//!
//! One cycle is: load the sent set → list the homepage → drop known links →
//! for each new article extract, format, deliver every chunk, record as sent
//! → sleep. Everything runs sequentially; no two requests are ever in flight.
//!
//! Only store failures escape a cycle. Fetch failures skip the affected item
//! and delivery failures are logged; neither stops the loop.

use crate::config::Config;
use crate::error::RelayError;
use crate::fetch::PageSource;
use crate::format::format_message;
use crate::models::{Article, CycleReport, Extraction};
use crate::scrapers::rbc;
use crate::store::SentStore;
use crate::telegram::Channel;
use crate::utils::truncate_for_log;
use chrono::{Local, TimeDelta};
use itertools::Itertools;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

const LOG_TITLE_CHARS: usize = 50;

/// Orchestrates fetching, formatting, delivery and deduplication.
#[derive(Debug)]
pub struct Relay<S, C> {
    source: S,
    channel: C,
    store: SentStore,
    base_url: String,
    max_message_length: usize,
    chunk_pause: Duration,
    article_pause: Duration,
    check_interval: Duration,
}

impl<S, C> Relay<S, C>
where
    S: PageSource,
    C: Channel,
{
    pub fn new(config: &Config, source: S, channel: C) -> Self {
        Self {
            source,
            channel,
            store: SentStore::new(&config.sent_articles_file),
            base_url: config.source_url.to_string(),
            max_message_length: config.max_message_length,
            chunk_pause: config.chunk_pause(),
            article_pause: config.article_pause(),
            check_interval: config.check_interval(),
        }
    }

    /// Run cycles until a store error occurs. Cancellation is handled by the
    /// caller dropping this future.
    pub async fn run(&self) -> Result<(), RelayError> {
        loop {
            let report = self.run_cycle().await?;
            info!(
                listed = report.listed,
                new = report.new,
                relayed = report.relayed,
                skipped = report.skipped,
                chunks_sent = report.chunks_sent,
                chunks_failed = report.chunks_failed,
                "Cycle complete"
            );

            let next_check = TimeDelta::from_std(self.check_interval)
                .ok()
                .map(|delta| (Local::now() + delta).format("%H:%M:%S").to_string())
                .unwrap_or_default();
            info!(
                %next_check,
                "Next check in {} minutes",
                self.check_interval.as_secs() / 60
            );
            sleep(self.check_interval).await;
        }
    }

    /// One pass over the homepage.
    #[instrument(level = "info", skip_all)]
    pub async fn run_cycle(&self) -> Result<CycleReport, RelayError> {
        let sent = self.store.load().await?;
        let listed = rbc::index_articles(&self.source, &self.base_url).await;

        let mut report = CycleReport {
            listed: listed.len(),
            ..CycleReport::default()
        };

        let fresh: Vec<Article> = listed
            .into_iter()
            .filter(|article| !sent.contains(&article.link))
            .unique_by(|article| article.link.clone())
            .collect();
        report.new = fresh.len();
        info!(new = fresh.len(), known = sent.len(), "Filtered homepage articles");

        for article in &fresh {
            let extraction = rbc::extract_article(&self.source, &article.link).await;
            let Some(content) = extraction.deliverable() else {
                let reason = match &extraction {
                    Extraction::Failed(e) => e.to_string(),
                    other => truncate_for_log(other.text(), LOG_TITLE_CHARS),
                };
                info!(
                    title = %truncate_for_log(&article.title, LOG_TITLE_CHARS),
                    link = %article.link,
                    %reason,
                    "No content; will retry next cycle"
                );
                report.skipped += 1;
                continue;
            };

            self.relay_article(article, content, &mut report).await;
            self.store.append(&article.link).await?;
            report.relayed += 1;
            sleep(self.article_pause).await;
        }

        Ok(report)
    }

    /// Deliver every chunk of one article in order.
    async fn relay_article(&self, article: &Article, content: &str, report: &mut CycleReport) {
        let title = truncate_for_log(&article.title, LOG_TITLE_CHARS);
        let chunks = format_message(
            &article.title,
            content,
            &article.link,
            self.max_message_length,
        );
        let total = chunks.len();
        let mut delivered = 0usize;

        for (index, chunk) in chunks.iter().enumerate() {
            if self.channel.deliver(chunk).await {
                delivered += 1;
                report.chunks_sent += 1;
                info!(%title, part = index + 1, total, "Sent article");
                sleep(self.chunk_pause).await;
            } else {
                report.chunks_failed += 1;
                warn!(%title, part = index + 1, total, "Failed to deliver chunk");
            }
        }

        if delivered == 0 {
            warn!(
                %title,
                link = %article.link,
                "No chunk was delivered; the article is still recorded as sent"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::Path;
    use tempfile::tempdir;

    const BASE: &str = "https://www.rbc.ru/";

    #[derive(Default)]
    struct FakeSite {
        pages: HashMap<String, String>,
        requested: RefCell<Vec<String>>,
    }

    impl FakeSite {
        fn page(mut self, url: &str, markup: &str) -> Self {
            self.pages.insert(url.to_string(), markup.to_string());
            self
        }

        fn requested(&self) -> Vec<String> {
            self.requested.borrow().clone()
        }
    }

    impl PageSource for FakeSite {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.requested.borrow_mut().push(url.to_string());
            self.pages.get(url).cloned().ok_or(FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    struct FakeChannel {
        accept: bool,
        messages: RefCell<Vec<String>>,
    }

    impl FakeChannel {
        fn accepting(accept: bool) -> Self {
            Self {
                accept,
                messages: RefCell::new(Vec::new()),
            }
        }

        fn messages(&self) -> Vec<String> {
            self.messages.borrow().clone()
        }
    }

    impl Channel for FakeChannel {
        async fn deliver(&self, message: &str) -> bool {
            self.messages.borrow_mut().push(message.to_string());
            self.accept
        }
    }

    fn config(store: &Path, max_message_length: usize) -> Config {
        Config {
            source_url: BASE.parse().unwrap(),
            telegram_token: "t".into(),
            channel_id: "@c".into(),
            telegram_api_url: "https://api.telegram.org".parse().unwrap(),
            sent_articles_file: store.to_path_buf(),
            check_interval: 900,
            request_timeout: 10,
            max_message_length,
            user_agent: "ua".into(),
            chunk_pause_ms: 0,
            article_pause_ms: 0,
            log_file: "news_bot.log".into(),
        }
    }

    fn homepage(links: &[(&str, &str)]) -> String {
        let anchors: String = links
            .iter()
            .map(|(href, title)| format!(r#"<a class="main__feed__link" href="{href}">{title}</a>"#))
            .collect();
        format!("<html><body>{anchors}<a href=\"/other\">x</a></body></html>")
    }

    fn article_page(text: &str) -> String {
        format!(r#"<html><body><div class="article__text"><p>{text}</p></div></body></html>"#)
    }

    #[tokio::test]
    async fn test_only_new_articles_are_relayed() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("sent_articles.txt");
        std::fs::write(&store_path, "https://www.rbc.ru/b\n").unwrap();

        let site = FakeSite::default()
            .page(BASE, &homepage(&[("/a", "Новость A"), ("/b", "Новость B")]))
            .page("https://www.rbc.ru/a", &article_page("Текст A"))
            .page("https://www.rbc.ru/b", &article_page("Текст B"));
        let channel = FakeChannel::accepting(true);
        let relay = Relay::new(&config(&store_path, 4096), site, channel);

        let report = relay.run_cycle().await.unwrap();

        assert_eq!(
            relay.source.requested(),
            vec![BASE.to_string(), "https://www.rbc.ru/a".to_string()]
        );
        let messages = relay.channel.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Новость A"));
        assert!(messages[0].contains("Текст A"));
        assert_eq!(
            std::fs::read_to_string(&store_path).unwrap(),
            "https://www.rbc.ru/b\nhttps://www.rbc.ru/a\n"
        );
        assert_eq!(
            report,
            CycleReport {
                listed: 2,
                new: 1,
                relayed: 1,
                skipped: 0,
                chunks_sent: 1,
                chunks_failed: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_sent_articles_are_never_extracted_again() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("sent_articles.txt");
        let site = FakeSite::default()
            .page(BASE, &homepage(&[("/a", "A")]))
            .page("https://www.rbc.ru/a", &article_page("Текст"));
        let relay = Relay::new(&config(&store_path, 4096), site, FakeChannel::accepting(true));

        relay.run_cycle().await.unwrap();
        let second = relay.run_cycle().await.unwrap();

        assert_eq!(second.new, 0);
        let article_fetches = relay
            .source
            .requested()
            .into_iter()
            .filter(|url| url == "https://www.rbc.ru/a")
            .count();
        assert_eq!(article_fetches, 1);
        assert_eq!(relay.channel.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_content_is_skipped_and_not_recorded() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("sent_articles.txt");
        let site = FakeSite::default()
            .page(BASE, &homepage(&[("/a", "A"), ("/gone", "Gone")]))
            .page("https://www.rbc.ru/a", "<html><body><p>no container</p></body></html>");
        let relay = Relay::new(&config(&store_path, 4096), site, FakeChannel::accepting(true));

        let report = relay.run_cycle().await.unwrap();

        assert_eq!(report.skipped, 2);
        assert_eq!(report.relayed, 0);
        assert!(relay.channel.messages().is_empty());
        assert!(relay.store.load().await.unwrap().is_empty());

        // Both are retried on the next cycle.
        relay.run_cycle().await.unwrap();
        let retries = relay
            .source
            .requested()
            .into_iter()
            .filter(|url| url != BASE)
            .count();
        assert_eq!(retries, 4);
    }

    #[tokio::test]
    async fn test_failed_homepage_yields_empty_cycle() {
        let dir = tempdir().unwrap();
        let relay = Relay::new(
            &config(&dir.path().join("sent_articles.txt"), 4096),
            FakeSite::default(),
            FakeChannel::accepting(true),
        );

        let report = relay.run_cycle().await.unwrap();
        assert_eq!(report, CycleReport::default());
    }

    #[tokio::test]
    async fn test_failed_delivery_still_records_article() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("sent_articles.txt");
        let long_text = "Слово ".repeat(200);
        let site = FakeSite::default()
            .page(BASE, &homepage(&[("/a", "A")]))
            .page("https://www.rbc.ru/a", &article_page(&long_text));
        let relay = Relay::new(&config(&store_path, 512), site, FakeChannel::accepting(false));

        let report = relay.run_cycle().await.unwrap();

        let attempts = relay.channel.messages();
        assert!(attempts.len() > 1);
        assert_eq!(report.chunks_failed, attempts.len());
        assert_eq!(report.chunks_sent, 0);
        assert_eq!(report.relayed, 1);
        assert!(relay.store.load().await.unwrap().contains("https://www.rbc.ru/a"));
    }

    #[tokio::test]
    async fn test_chunks_are_delivered_in_order() {
        let dir = tempdir().unwrap();
        let text: String = (0..300).map(|i| format!("{i:04} ")).collect();
        let site = FakeSite::default()
            .page(BASE, &homepage(&[("/a", "A")]))
            .page("https://www.rbc.ru/a", &article_page(&text));
        let relay = Relay::new(
            &config(&dir.path().join("sent_articles.txt"), 256),
            site,
            FakeChannel::accepting(true),
        );

        relay.run_cycle().await.unwrap();

        let messages = relay.channel.messages();
        assert!(messages.len() > 1);
        let bodies: String = messages
            .iter()
            .map(|m| m.split("</b>\n\n").nth(1).unwrap().split("\n\n<a").next().unwrap())
            .collect();
        assert_eq!(bodies, text.trim_end());
    }

    #[tokio::test]
    async fn test_duplicate_homepage_links_are_relayed_once() {
        let dir = tempdir().unwrap();
        let site = FakeSite::default()
            .page(BASE, &homepage(&[("/a", "A"), ("https://www.rbc.ru/a", "A again")]))
            .page("https://www.rbc.ru/a", &article_page("Текст"));
        let relay = Relay::new(
            &config(&dir.path().join("sent_articles.txt"), 4096),
            site,
            FakeChannel::accepting(true),
        );

        let report = relay.run_cycle().await.unwrap();
        assert_eq!(report.listed, 2);
        assert_eq!(report.new, 1);
        assert_eq!(relay.channel.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_store_stops_the_cycle() {
        let dir = tempdir().unwrap();
        let store_path = dir.path().join("sent_articles.txt");
        std::fs::write(&store_path, [0xff, 0xfe]).unwrap();
        let site = FakeSite::default().page(BASE, &homepage(&[("/a", "A")]));
        let relay = Relay::new(&config(&store_path, 4096), site, FakeChannel::accepting(true));

        assert!(matches!(
            relay.run_cycle().await,
            Err(RelayError::Store(_))
        ));
        assert!(relay.source.requested().is_empty());
    }
}
