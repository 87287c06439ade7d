//! Provides a client for the news site's per-section RSS feeds.
//!
//! Fetches are a single GET with a fixed timeout. An optional session cookie lets a
//! logged-in subscriber see the same feed they get in the browser. Nothing is cached
//! and nothing is retried.

use crate::config::FEED_TIMEOUT;
use crate::error::{AppError, Result};
use crate::models::{Headline, RssItem};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::header::{COOKIE, USER_AGENT};
use reqwest::Client;
use tracing::{debug, error, info};

/// Section names accepted by `headlines --section`.
pub const SECTIONS: [&str; 11] = [
    "home",
    "world",
    "uk",
    "us",
    "companies",
    "technology",
    "markets",
    "climate",
    "opinion",
    "lex",
    "life-arts",
];

pub const DEFAULT_SECTION: &str = "home";

const CLIENT_AGENT: &str = concat!("headliner/", env!("CARGO_PKG_VERSION"));

/// An asynchronous client for fetching section feeds.
pub struct FeedClient {
    client: Client,
    base_url: String,
    session_cookie: Option<String>,
}

impl FeedClient {
    /// Creates a client for the site at `base_url` (no trailing slash).
    pub fn new(base_url: &str, session_cookie: Option<String>) -> Result<Self> {
        let client = Client::builder().timeout(FEED_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_cookie,
        })
    }

    /// Feed URL for a section. Fails for names outside [`SECTIONS`].
    pub fn section_url(&self, section: &str) -> Result<String> {
        let section = section.trim().to_lowercase();
        if !SECTIONS.contains(&section.as_str()) {
            return Err(AppError::Validation(format!(
                "Unknown section '{}'. Must be one of: {}",
                section,
                SECTIONS.join(", ")
            )));
        }

        Ok(if section == DEFAULT_SECTION {
            format!("{}/?format=rss", self.base_url)
        } else {
            format!("{}/{}?format=rss", self.base_url, section)
        })
    }

    /// Fetches a section feed and returns at most `limit` headlines in feed order.
    pub async fn fetch_headlines(&self, section: &str, limit: usize) -> Result<Vec<Headline>> {
        let url = self.section_url(section)?;
        info!("Fetching headlines for section {} from {}", section, url);

        let mut request = self.client.get(&url).header(USER_AGENT, CLIENT_AGENT);
        if let Some(cookie) = &self.session_cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await.map_err(|e| {
            error!("Error fetching feed {}: {}", url, e);
            AppError::from(e)
        })?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                error!(
                    "Feed request to {} failed with status {}",
                    url,
                    e.status().unwrap_or_default()
                );
                return Err(AppError::from(e));
            },
        };

        let body = response.text().await?;
        let mut headlines = parse_feed(&body)?;
        headlines.truncate(limit);

        debug!("Parsed {} headlines for {}", headlines.len(), section);
        Ok(headlines)
    }
}

/// Item children that feed a [`Headline`].
///
/// Matched on the full element name, so namespaced extensions such as `media:title`
/// or `dc:creator` never stand in for the RSS element of the same local name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemField {
    Title,
    Link,
    Description,
    Category,
    PubDate,
}

impl ItemField {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Self::Title),
            b"link" => Some(Self::Link),
            b"description" => Some(Self::Description),
            b"category" => Some(Self::Category),
            b"pubDate" => Some(Self::PubDate),
            _ => None,
        }
    }

    /// Stores `value` on `item`. The first occurrence of a single-valued field wins.
    fn store(self, item: &mut RssItem, value: String) {
        match self {
            Self::Title => {
                item.title.get_or_insert(value);
            },
            Self::Link => {
                item.link.get_or_insert(value);
            },
            Self::Description => {
                item.description.get_or_insert(value);
            },
            Self::Category => item.categories.push(value),
            Self::PubDate => {
                item.pub_date.get_or_insert(value);
            },
        }
    }
}

/// Maps an RSS 2.0 document to headlines, dropping items without a title.
///
/// Categories may be interleaved with other elements; unknown and namespaced
/// elements are skipped.
pub fn parse_feed(xml: &str) -> Result<Vec<Headline>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut seen_root = false;
    let mut item: Option<RssItem> = None;
    let mut field: Option<ItemField> = None;
    let mut text = String::new();
    let mut headlines = Vec::new();

    loop {
        match reader.read_event().map_err(feed_error)? {
            Event::Start(e) | Event::Empty(e) if !seen_root => {
                if e.name().as_ref() != b"rss" {
                    let found = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    error!("Feed document has root <{}>, expected <rss>", found);
                    return Err(AppError::Feed(format!(
                        "Expected an RSS document, found <{}>",
                        found
                    )));
                }
                seen_root = true;
            },
            Event::Start(e) => {
                if e.name().as_ref() == b"item" {
                    item = Some(RssItem::default());
                    field = None;
                } else if item.is_some() && field.is_none() {
                    field = ItemField::from_name(e.name().as_ref());
                    text.clear();
                }
            },
            Event::Text(e) if field.is_some() => {
                text.push_str(&e.unescape().map_err(feed_error)?);
            },
            Event::CData(e) if field.is_some() => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            },
            Event::End(e) => {
                if e.name().as_ref() == b"item" {
                    if let Some(done) = item.take() {
                        headlines.push(Headline::from(done));
                    }
                    field = None;
                } else if let (Some(current), Some(open)) = (item.as_mut(), field) {
                    if ItemField::from_name(e.name().as_ref()) == Some(open) {
                        open.store(current, std::mem::take(&mut text));
                        field = None;
                    }
                }
            },
            Event::Eof => break,
            _ => {},
        }
    }

    if !seen_root {
        error!("Feed document is empty");
        return Err(AppError::Feed("Empty feed document".to_string()));
    }

    Ok(headlines
        .into_iter()
        .filter(|headline| !headline.title.is_empty())
        .collect())
}

fn feed_error(err: quick_xml::Error) -> AppError {
    error!("Error parsing RSS document: {}", err);
    AppError::from(err)
}
