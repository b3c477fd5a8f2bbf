// src/services/feed.rs

//! Feed fetcher service.
//!
//! Downloads the XML job feed and parses it into a [`FeedDocument`].

use async_trait::async_trait;
use reqwest::Client;

use crate::error::Result;
use crate::models::FeedDocument;
use crate::utils::http::fetch_text;

/// Source of feed documents.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and parse the feed.
    ///
    /// Every failure is logged and reported as `None`.
    async fn fetch(&self) -> Option<FeedDocument>;
}

/// Fetches the feed over HTTP.
pub struct FeedFetcher {
    client: Client,
    url: String,
}

impl FeedFetcher {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Fetch and parse the feed, keeping the error.
    pub async fn try_fetch(&self) -> Result<FeedDocument> {
        let body = fetch_text(&self.client, &self.url).await?;
        log::debug!("Fetched {} bytes from {}", body.len(), self.url);
        FeedDocument::parse(&body)
    }
}

#[async_trait]
impl FeedSource for FeedFetcher {
    async fn fetch(&self) -> Option<FeedDocument> {
        match self.try_fetch().await {
            Ok(document) => Some(document),
            Err(e) => {
                log::error!("Error fetching or parsing feed {}: {}", self.url, e);
                None
            }
        }
    }
}
