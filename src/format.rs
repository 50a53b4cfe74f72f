//! Telegram message rendering and splitting.
//!
//! Every chunk is rendered with the same decoration:
//!
//! ```text
//! <b>📰 {title}</b>
//!
//! {content slice}
//!
//! <a href='{link}'>🔗 Источник</a>
//! ```
//!
//! The content capacity of a chunk is the platform limit minus the length of
//! that decoration, so no rendered chunk exceeds the limit. Lengths are counted
//! in characters. Content is HTML-escaped before splitting and a split never
//! lands inside an entity such as `&amp;`.

use crate::utils::{escape_attr, escape_html};

const SOURCE_LABEL: &str = "🔗 Источник";
const TITLE_ICON: &str = "📰";
/// Longest entity produced by [`escape_html`] (`&amp;`).
const MAX_ENTITY_LEN: usize = 5;

/// Decoration shared by every chunk of one article.
#[derive(Debug, Clone)]
struct Template {
    header: String,
    footer: String,
}

impl Template {
    fn new(title: &str, link: &str) -> Self {
        Self {
            header: format!("<b>{TITLE_ICON} {}</b>\n\n", escape_html(title)),
            footer: format!("\n\n<a href='{}'>{SOURCE_LABEL}</a>", escape_attr(link)),
        }
    }

    fn decoration_len(&self) -> usize {
        self.header.chars().count() + self.footer.chars().count()
    }

    fn render(&self, content: &str) -> String {
        format!("{}{}{}", self.header, content, self.footer)
    }
}

/// Render an article as one or more messages no longer than `max_len`
/// characters each.
///
/// Always returns at least one message. Titles that would leave less than
/// half of the limit for content are shortened with an ellipsis.
pub fn format_message(title: &str, content: &str, link: &str, max_len: usize) -> Vec<String> {
    let mut template = Template::new(title, link);
    if template.decoration_len() + max_len / 2 > max_len {
        let budget = max_len / (4 * MAX_ENTITY_LEN);
        let short: String = title.chars().take(budget).collect();
        template = Template::new(&format!("{}…", short.trim_end()), link);
    }

    let capacity = max_len.saturating_sub(template.decoration_len()).max(1);
    split_content(&escape_html(content), capacity)
        .iter()
        .map(|part| template.render(part))
        .collect()
}

/// Split escaped content into consecutive slices of at most `capacity`
/// characters. An empty input gives a single empty slice.
fn split_content(escaped: &str, capacity: usize) -> Vec<String> {
    let chars: Vec<char> = escaped.chars().collect();
    let mut parts = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + capacity).min(chars.len());
        if end < chars.len() {
            if let Some(amp) = open_entity(&chars[start..end]) {
                if amp > 0 {
                    end = start + amp;
                }
            }
        }
        parts.push(chars[start..end].iter().collect());
        start = end;
    }

    if parts.is_empty() {
        parts.push(String::new());
    }
    parts
}

/// Position of an `&` near the end of `slice` whose entity is not terminated
/// within the slice.
fn open_entity(slice: &[char]) -> Option<usize> {
    let window = slice.len().saturating_sub(MAX_ENTITY_LEN - 1);
    (window..slice.len())
        .rev()
        .find(|&i| slice[i] == '&')
        .filter(|&i| !slice[i..].contains(&';'))
}
