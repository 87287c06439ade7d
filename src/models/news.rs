//! Records handed over by the network collaborators.
//!
//! Includes:
//! - `RssItem`, the raw fields of one RSS 2.0 item.
//! - `Headline`, the cleaned-up record printed for the consuming agent.
//! - Browser bridge payloads (`BridgeStatus`, `Article`, `SearchResult`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- RSS Structs ---

/// Fields of one `<item>`, as read from its un-prefixed child elements.
#[derive(Debug, Default)]
pub struct RssItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub categories: Vec<String>,
    pub pub_date: Option<String>,
}

/// One headline from a section feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    pub link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
}

impl From<RssItem> for Headline {
    fn from(item: RssItem) -> Self {
        let published = item
            .pub_date
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc2822(raw.trim()).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Self {
            title: item.title.map(|t| t.trim().to_string()).unwrap_or_default(),
            link: item.link.map(|l| l.trim().to_string()).unwrap_or_default(),
            description: item
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            category: item.categories.into_iter().next(),
            published,
        }
    }
}

// --- Browser Bridge Structs ---

/// Reply of the bridge's `/status` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeStatus {
    pub connected: bool,
    #[serde(default)]
    pub browser: Option<String>,
    #[serde(default)]
    pub logged_in: Option<bool>,
}

/// Full text of an article extracted from a rendered page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
}

/// Envelope of the bridge's `/search` endpoint.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchResult>,
}
