//! Research provider
//!
//! Collects web results, optional news and optional full page content for a
//! topic, then asks the model for a short digest of what was found.

use crate::agents::{ActionTable, Agent, AgentOutbox};
use crate::llm::LLMClient;
use crate::protocol::{AgentMessage, CapabilityDescriptor};
use crate::providers::json::{extract_json_object, str_field};
use crate::tools::search::{SearchBackend, SearchHit};
use crate::types::{truncate_chars, AppError, Result};
use crate::utils::config::SearchConfig;
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You are a research agent. Summarise search results accurately, \
point out the most relevant sources, note information gaps and conflicting sources. \
Be concise but complete.";

const DIGEST_PROMPT: &str = "Analyse these search results and provide:
1. A summary of the main points (3-5 sentences)
2. The most relevant sources (max 3)
3. Any information gaps
4. A confidence score (0-1)

Answer in JSON with the keys summary, sources, gaps, confidence.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResearchAction {
    WebSearch,
    NewsSearch,
}

pub struct ResearchAgent {
    outbox: AgentOutbox,
    actions: ActionTable<ResearchAction>,
    llm: Arc<dyn LLMClient>,
    search: Arc<dyn SearchBackend>,
    config: SearchConfig,
}

impl ResearchAgent {
    pub fn new(
        agent_id: &str,
        llm: Arc<dyn LLMClient>,
        search: Arc<dyn SearchBackend>,
        config: SearchConfig,
    ) -> Result<Self> {
        let actions = ActionTable::build(
            agent_id,
            &Self::capability_list(),
            &[
                ("web_search", ResearchAction::WebSearch),
                ("news_search", ResearchAction::NewsSearch),
            ],
        )?;

        Ok(Self {
            outbox: AgentOutbox::new(agent_id, "Research Agent"),
            actions,
            llm,
            search,
            config,
        })
    }

    fn capability_list() -> Vec<CapabilityDescriptor> {
        vec![
            CapabilityDescriptor::new(
                "web_search",
                "Search the web for a topic and digest the results",
                json!({"topic": "string", "include_news": "bool", "deep_search": "bool"}),
                json!({"web_results": "list", "news_results": "list", "analysis": "object"}),
            ),
            CapabilityDescriptor::new(
                "news_search",
                "Search recent news for a topic",
                json!({"topic": "string", "max_results": "int"}),
                json!({"articles": "list"}),
            ),
        ]
    }

    pub fn outbox(&self) -> &AgentOutbox {
        &self.outbox
    }

    async fn research_topic(&self, topic: &str, include_news: bool, deep_search: bool) -> Value {
        tracing::info!(topic = %topic, include_news, deep_search, "Starting research");

        let queries = [
            topic.to_string(),
            format!("{} {}", topic, Utc::now().year()),
            format!("{} analysis", topic),
        ];

        let mut web_results: Vec<SearchHit> = Vec::new();
        for query in &queries[..2] {
            match self.search.web_search(query, self.config.max_results).await {
                Ok(hits) => web_results.extend(hits),
                Err(e) => tracing::warn!(query = %query, error = %e, "Web search failed"),
            }
        }

        let news_results = if include_news {
            self.news(topic, self.config.max_results).await
        } else {
            Vec::new()
        };

        let mut deep_content = Vec::new();
        if deep_search {
            for hit in web_results.iter().filter(|h| !h.url.is_empty()).take(self.config.deep_pages) {
                match self.search.fetch_page(&hit.url).await {
                    Ok(page) if !page.content.is_empty() => deep_content.push(json!({
                        "url": hit.url,
                        "title": page.title,
                        "content": truncate_chars(&page.content, self.config.page_chars),
                    })),
                    Ok(_) => {}
                    Err(e) => tracing::warn!(url = %hit.url, error = %e, "Page fetch failed"),
                }
            }
        }

        let analysis = self.digest(topic, &web_results, &news_results).await;

        json!({
            "topic": topic,
            "timestamp": Utc::now().to_rfc3339(),
            "queries_used": queries,
            "web_results": web_results,
            "news_results": news_results,
            "deep_content": deep_content,
            "analysis": analysis,
        })
    }

    async fn news(&self, topic: &str, max_results: usize) -> Vec<SearchHit> {
        match self.search.news_search(topic, max_results).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "News search failed");
                Vec::new()
            }
        }
    }

    async fn digest(&self, topic: &str, web: &[SearchHit], news: &[SearchHit]) -> Value {
        let mut context = vec![format!("Topic: {}\n", topic), "## Web results:".to_string()];
        for (i, hit) in web.iter().take(5).enumerate() {
            context.push(format!("{}. {}: {}", i + 1, hit.title, truncate_chars(&hit.snippet, 200)));
        }
        if !news.is_empty() {
            context.push("\n## News:".to_string());
            for (i, hit) in news.iter().take(3).enumerate() {
                context.push(format!("{}. {}", i + 1, hit.title));
            }
        }

        let prompt = format!("{}\n\n{}", DIGEST_PROMPT, context.join("\n"));
        match self.llm.generate_with_system(SYSTEM_PROMPT, &prompt).await {
            Ok(response) => match extract_json_object(&response) {
                Some(map) => Value::Object(map),
                None => json!({
                    "summary": response,
                    "confidence": 0.7,
                    "sources": [],
                    "gaps": [],
                }),
            },
            Err(e) => {
                tracing::warn!(error = %e, "Research digest unavailable");
                json!({
                    "summary": "Analysis unavailable",
                    "confidence": 0.0,
                    "error": e.to_string(),
                })
            }
        }
    }
}

#[async_trait]
impl Agent for ResearchAgent {
    fn id(&self) -> &str {
        self.outbox.agent_id()
    }

    fn name(&self) -> &str {
        self.outbox.name()
    }

    fn capabilities(&self) -> Vec<CapabilityDescriptor> {
        Self::capability_list()
    }

    async fn process(&self, request: AgentMessage) -> Result<AgentMessage> {
        let action = match self.actions.resolve_request(&request) {
            Ok(action) => action,
            Err(e) => return Ok(self.outbox.error(&request, e.to_string())),
        };

        let payload = Value::Object(request.payload.clone());
        let topic = str_field(&payload, "topic").trim();
        if topic.is_empty() {
            let err = AppError::Validation("Research needs a non-empty 'topic'".to_string());
            return Ok(self.outbox.error(&request, err.to_string()));
        }

        let result = match action {
            ResearchAction::WebSearch => {
                let include_news = payload.get("include_news").and_then(Value::as_bool).unwrap_or(true);
                let deep_search = payload.get("deep_search").and_then(Value::as_bool).unwrap_or(false);
                self.research_topic(topic, include_news, deep_search).await
            }
            ResearchAction::NewsSearch => {
                let max_results = payload
                    .get("max_results")
                    .and_then(Value::as_u64)
                    .map_or(self.config.max_results, |n| n as usize);
                let articles = self.news(topic, max_results).await;
                json!({ "topic": topic, "articles": articles })
            }
        };

        Ok(self.outbox.result(&request, result))
    }
}
