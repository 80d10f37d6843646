//! Web search and page fetching
//!
//! [`SearchBackend`] is what the research provider depends on.
//! [`DaedraSearch`] implements it with the daedra crate, which uses
//! DuckDuckGo as the search backend.

use crate::types::{AppError, Result};
use crate::utils::config::SearchConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// One search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// `web` or `news`
    pub source: String,
}

/// Readable content of a fetched page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    pub url: String,
    pub title: String,
    pub content: String,
    pub word_count: usize,
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn web_search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;

    async fn news_search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;

    async fn fetch_page(&self, url: &str) -> Result<PageContent>;
}

/// Search backend powered by daedra
pub struct DaedraSearch {
    timeout: Duration,
}

impl DaedraSearch {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    async fn with_timeout<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| AppError::Search(format!("{} timed out after {:?}", what, self.timeout)))?
    }

    async fn search(&self, query: &str, max_results: usize, source: &str) -> Result<Vec<SearchHit>> {
        let search_args = daedra::SearchArgs {
            query: query.to_string(),
            options: Some(daedra::SearchOptions {
                num_results: max_results,
                ..Default::default()
            }),
        };

        let response = self
            .with_timeout("Search", async {
                daedra::tools::search::perform_search(&search_args)
                    .await
                    .map_err(|e| AppError::Search(format!("Search failed: {}", e)))
            })
            .await?;

        Ok(response
            .data
            .iter()
            .take(max_results)
            .map(|result| hit_from_result(result, source))
            .collect())
    }
}

fn hit_from_result(result: &daedra::SearchResult, source: &str) -> SearchHit {
    SearchHit {
        title: result.title.clone(),
        url: result.url.clone(),
        snippet: result.description.clone(),
        source: source.to_string(),
    }
}

impl From<daedra::types::PageContent> for PageContent {
    fn from(page: daedra::types::PageContent) -> Self {
        Self {
            url: page.url,
            title: page.title,
            content: page.content,
            word_count: page.word_count,
        }
    }
}

#[async_trait]
impl SearchBackend for DaedraSearch {
    async fn web_search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        tracing::debug!(query = %query, max_results, "Web search");
        self.search(query, max_results, "web").await
    }

    /// DuckDuckGo has no separate news endpoint in daedra, so the query is
    /// scoped to recent news instead.
    async fn news_search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        tracing::debug!(query = %query, max_results, "News search");
        self.search(&format!("{} latest news", query), max_results, "news")
            .await
    }

    async fn fetch_page(&self, url: &str) -> Result<PageContent> {
        let fetch_args = daedra::VisitPageArgs {
            url: url.to_string(),
            include_images: false,
            selector: None,
        };

        let page = self
            .with_timeout("Page fetch", async {
                daedra::tools::fetch::fetch_page(&fetch_args)
                    .await
                    .map_err(|e| AppError::Search(format!("Failed to fetch page: {}", e)))
            })
            .await?;

        Ok(page.into())
    }
}
