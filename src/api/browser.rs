//! Client for the browser-automation bridge.
//!
//! The bridge is a separate, externally managed process that owns a logged-in browser
//! session and exposes a small JSON API. This client only forwards requests; every
//! failure is reported as `AppError::Browser` with the original message and a remedy.

use crate::config::BROWSER_TIMEOUT;
use crate::error::{AppError, Result};
use crate::models::{Article, BridgeStatus, SearchResponse, SearchResult};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, error, info};

const REMEDY: &str =
    "check `headliner status` and make sure the browser session is running and logged in";

pub struct BrowserClient {
    client: Client,
    base_url: String,
    /// Site the bridge should search on.
    site_url: String,
}

impl BrowserClient {
    pub fn new(base_url: &str, site_url: &str) -> Result<Self> {
        let client = Client::builder().timeout(BROWSER_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            site_url: site_url.trim_end_matches('/').to_string(),
        })
    }

    /// Connection state of the bridge and its browser.
    pub async fn status(&self) -> Result<BridgeStatus> {
        let url = format!("{}/status", self.base_url);
        debug!("Checking browser bridge at {}", url);
        let response = self.client.get(&url).send().await;
        self.decode(&url, response).await
    }

    /// Extracts the readable text of the article at `url`.
    pub async fn read_article(&self, url: &str) -> Result<Article> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(AppError::Validation(format!(
                "'{}' is not an http(s) URL",
                url
            )));
        }
        info!("Reading article {}", url);
        let endpoint = format!("{}/extract", self.base_url);
        let response = self
            .client
            .post(&endpoint)
            .json(&json!({ "url": url }))
            .send()
            .await;
        self.decode(&endpoint, response).await
    }

    /// Runs a site search and returns at most `limit` results.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Validation(
                "search query must not be empty".to_string(),
            ));
        }
        info!("Searching for '{}'", query);
        let endpoint = format!("{}/search", self.base_url);
        let response = self
            .client
            .post(&endpoint)
            .json(&json!({ "site": self.site_url, "query": query, "limit": limit }))
            .send()
            .await;
        let mut results = self.decode::<SearchResponse>(&endpoint, response).await?.results;
        results.truncate(limit);
        Ok(results)
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        response: reqwest::Result<reqwest::Response>,
    ) -> Result<T> {
        let response = response
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| bridge_error(endpoint, &e.to_string()))?;

        response
            .json::<T>()
            .await
            .map_err(|e| bridge_error(endpoint, &format!("unexpected response: {}", e)))
    }
}

fn bridge_error(endpoint: &str, message: &str) -> AppError {
    error!("Browser bridge call {} failed: {}", endpoint, message);
    AppError::Browser(format!("{} ({})", message, REMEDY))
}
