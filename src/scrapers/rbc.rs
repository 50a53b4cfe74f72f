//! RBC homepage and article scraper.
//!
//! # Homepage
//!
//! Feed entries are anchors carrying the `main__feed__link` class. Their
//! `href` is either absolute or site-relative (`/economy/...`).
//!
//! # Article pages
//!
//! The body lives in `div.article__text`; some layouts only wrap it in a bare
//! `<article>`. Inline promo blocks (`div.article__incut`), asides, scripts and
//! styles are dropped before the paragraph and heading text is collected.

use crate::fetch::PageSource;
use crate::models::{Article, Extraction};
use crate::utils::collapse_whitespace;
use once_cell::sync::Lazy;
use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, error, info, instrument, warn};

static FEED_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a.main__feed__link").unwrap());

/// Content containers in priority order.
static CONTENT_CONTAINERS: Lazy<[Selector; 2]> = Lazy::new(|| {
    [
        Selector::parse("div.article__text").unwrap(),
        Selector::parse("article").unwrap(),
    ]
});

static TEXT_BLOCKS: Lazy<Selector> = Lazy::new(|| Selector::parse("p, h2, h3").unwrap());

const NOISE_TAGS: [&str; 3] = ["script", "style", "aside"];
const INCUT_CLASS: &str = "article__incut";

/// Fetch the homepage and list its feed articles.
///
/// A failed fetch is logged and yields an empty list; the next cycle retries.
#[instrument(level = "info", skip(source))]
pub async fn index_articles(source: &impl PageSource, base_url: &str) -> Vec<Article> {
    match source.fetch(base_url).await {
        Ok(markup) => {
            let articles = list_articles(&markup, base_url);
            info!(count = articles.len(), source = base_url, "Indexed RBC articles");
            articles
        }
        Err(e) => {
            error!(error = %e, "Failed to fetch homepage");
            Vec::new()
        }
    }
}

/// Parse homepage markup into feed articles, in document order.
pub fn list_articles(markup: &str, base_url: &str) -> Vec<Article> {
    let document = Html::parse_document(markup);
    let mut articles = Vec::new();

    for anchor in document.select(&FEED_LINK) {
        let Some(href) = anchor.value().attr("href") else {
            debug!("Feed link without href; skipping");
            continue;
        };
        let title = collapse_whitespace(&anchor.text().collect::<String>());
        articles.push(Article {
            title,
            link: resolve_link(href.trim(), base_url),
        });
    }

    articles
}

/// Make a feed link absolute.
///
/// Links that already start with an `http://` or `https://` scheme are kept as
/// they are. Anything else is appended to the base URL with its leading
/// slashes removed.
pub fn resolve_link(link: &str, base_url: &str) -> String {
    if link.starts_with("http://") || link.starts_with("https://") {
        return link.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        link.trim_start_matches('/')
    )
}

/// Fetch one article and extract its text.
#[instrument(level = "info", skip(source))]
pub async fn extract_article(source: &impl PageSource, url: &str) -> Extraction {
    match source.fetch(url).await {
        Ok(markup) => {
            let extraction = extract_content(&markup);
            match &extraction {
                Extraction::Text(text) => debug!(chars = text.chars().count(), "Parsed article"),
                Extraction::NotFound => warn!("No content container found"),
                Extraction::Failed(_) => {}
            }
            extraction
        }
        Err(e) => {
            error!(error = %e, "Failed to fetch article");
            Extraction::Failed(e)
        }
    }
}

/// Extract paragraph and heading text from article markup.
pub fn extract_content(markup: &str) -> Extraction {
    let document = Html::parse_document(markup);
    let Some(container) = CONTENT_CONTAINERS
        .iter()
        .find_map(|selector| document.select(selector).next())
    else {
        return Extraction::NotFound;
    };

    let blocks: Vec<String> = container
        .select(&TEXT_BLOCKS)
        .filter(|block| !inside_noise(*block, container))
        .map(|block| collapse_whitespace(&visible_text(block)))
        .filter(|text| !text.is_empty())
        .collect();

    Extraction::Text(blocks.join("\n\n"))
}

fn is_noise(element: &Element) -> bool {
    NOISE_TAGS.contains(&element.name())
        || (element.name() == "div" && element.classes().any(|class| class == INCUT_CLASS))
}

/// Whether `element` or any ancestor below `container` is a noise element.
fn inside_noise(element: ElementRef, container: ElementRef) -> bool {
    if is_noise(element.value()) {
        return true;
    }
    element
        .ancestors()
        .take_while(|node| node.id() != container.id())
        .filter_map(ElementRef::wrap)
        .any(|ancestor| is_noise(ancestor.value()))
}

/// Text of `element`, skipping text that sits inside noise descendants.
fn visible_text(element: ElementRef) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node
            .ancestors()
            .take_while(|ancestor| ancestor.id() != element.id())
            .filter_map(ElementRef::wrap)
            .any(|ancestor| is_noise(ancestor.value()));
        if !hidden {
            out.push_str(text);
        }
    }
    out
}
