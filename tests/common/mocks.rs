//! Mock implementations for testing.
//!
//! Scripted providers, LLM clients and search backends that can be used
//! across test files without any running model server or network access.

use async_trait::async_trait;
use conclave::agents::{Agent, AgentOutbox};
use conclave::llm::LLMClient;
use conclave::protocol::{AgentMessage, CapabilityDescriptor};
use conclave::tools::search::{PageContent, SearchBackend, SearchHit};
use conclave::types::{AppError, Result};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// What a [`ScriptedAgent`] does when it is called
#[derive(Debug, Clone)]
pub enum Script {
    /// Response envelope carrying `result`
    Respond(Value),
    /// `Err` returned from `process`
    Fail(String),
    /// Error envelope carrying `error`
    ErrorEnvelope(String),
    Panic(String),
    /// Response whose correlation id does not match the request
    WrongCorrelation(Value),
    /// Response envelope without a `result` key
    NoResult,
}

/// Provider that follows a fixed script and counts its calls.
pub struct ScriptedAgent {
    outbox: AgentOutbox,
    action: String,
    script: Script,
    calls: AtomicUsize,
    requests: Mutex<Vec<AgentMessage>>,
}

impl ScriptedAgent {
    pub fn new(id: &str, action: &str, script: Script) -> Arc<Self> {
        Arc::new(Self {
            outbox: AgentOutbox::new(id, format!("Scripted {}", id)),
            action: action.to_string(),
            script,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn research(script: Script) -> Arc<Self> {
        Self::new("research_agent", "web_search", script)
    }

    pub fn analysis(script: Script) -> Arc<Self> {
        Self::new("analysis_agent", "analyze_data", script)
    }

    pub fn synthesis(script: Script) -> Arc<Self> {
        Self::new("synthesis_agent", "create_report", script)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<AgentMessage> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn id(&self) -> &str {
        self.outbox.agent_id()
    }

    fn name(&self) -> &str {
        self.outbox.name()
    }

    fn capabilities(&self) -> Vec<CapabilityDescriptor> {
        vec![CapabilityDescriptor::new(
            self.action.as_str(),
            "scripted",
            json!({}),
            json!({}),
        )]
    }

    async fn process(&self, request: AgentMessage) -> Result<AgentMessage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        match &self.script {
            Script::Respond(result) => Ok(self.outbox.result(&request, result.clone())),
            Script::Fail(message) => Err(AppError::LLM(message.clone())),
            Script::ErrorEnvelope(message) => Ok(self.outbox.error(&request, message.as_str())),
            Script::Panic(message) => panic!("{}", message),
            Script::WrongCorrelation(result) => {
                let mut response = self.outbox.result(&request, result.clone());
                response.correlation_id = Some("someone-else".to_string());
                Ok(response)
            }
            Script::NoResult => Ok(self.outbox.respond(&request, Default::default(), true)),
        }
    }
}

/// Research result with `web` web hits and `news` news hits
pub fn research_result(topic: &str, web: usize, news: usize) -> Value {
    let hits = |source: &str, n: usize| -> Vec<Value> {
        (1..=n)
            .map(|i| {
                json!({
                    "title": format!("{} {} {}", topic, source, i),
                    "url": format!("https://example.com/{}/{}", source, i),
                    "snippet": format!("Snippet {} about {}", i, topic),
                    "source": source,
                })
            })
            .collect()
    };

    json!({
        "topic": topic,
        "web_results": hits("web", web),
        "news_results": hits("news", news),
        "deep_content": [],
        "analysis": {"summary": "Mock digest", "confidence": 0.8},
    })
}

pub fn analysis_result(themes: &[&str], gaps: &[&str]) -> Value {
    json!({
        "themes": themes,
        "gaps": gaps,
        "summary": "Mock analysis",
    })
}

pub fn synthesis_result(word_count: u64, file_path: &str) -> Value {
    json!({
        "word_count": word_count,
        "file_path": file_path,
        "report_preview": "# Mock report\n\nBody",
        "format": "markdown",
    })
}

/// Mock LLM client that answers according to what the prompt asks for.
///
/// Rules are checked in order; the first rule whose needle occurs in the
/// prompt wins. Prompts are recorded for later inspection.
pub struct MockLLMClient {
    rules: Vec<(String, String)>,
    default_response: String,
    should_fail: bool,
    prompts: Mutex<Vec<String>>,
}

impl MockLLMClient {
    /// Create a new mock client that returns the given response.
    pub fn new(response: &str) -> Self {
        Self {
            rules: Vec::new(),
            default_response: response.to_string(),
            should_fail: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answer `response` whenever the prompt contains `needle`
    pub fn with_rule(mut self, needle: &str, response: &str) -> Self {
        self.rules.push((needle.to_string(), response.to_string()));
        self
    }

    /// Create a mock client that always returns an error.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new("")
        }
    }

    /// Client scripted for the three built-in providers
    pub fn research_pipeline() -> Self {
        Self::new("Plain text answer")
            .with_rule(
                "Create the sections",
                r#"Here you go:
[
  {"title": "Context and Background", "content": "Solid state cells replace the liquid electrolyte."},
  {"title": "Current Situation", "content": "Pilot lines are running in several countries."},
  {"title": "Conclusions", "content": "Costs must fall before mass adoption."}
]"#,
            )
            .with_rule(
                "executive summary",
                "Solid state batteries are close to pilot scale but cost remains the main barrier.",
            )
            .with_rule(
                "recurring themes",
                r#"```json
{"themes": ["energy density", "manufacturing cost"], "gaps": ["long term durability"], "summary": "Promising but expensive."}
```"#,
            )
            .with_rule(
                "confidence score",
                r#"{"summary": "Results focus on pilot production.", "sources": [], "gaps": [], "confidence": 0.8}"#,
            )
    }

    /// Every prompt received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    fn answer(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        if self.should_fail {
            return Err(AppError::LLM("Mock LLM failure".to_string()));
        }

        Ok(self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| self.default_response.clone()))
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.answer(prompt)
    }

    async fn generate_with_system(&self, _system: &str, prompt: &str) -> Result<String> {
        self.answer(prompt)
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

/// Search backend returning a fixed number of synthetic hits
pub struct MockSearch {
    hits: usize,
    should_fail: bool,
    web_queries: Mutex<Vec<String>>,
    news_queries: Mutex<Vec<String>>,
    fetched: Mutex<Vec<String>>,
}

impl MockSearch {
    pub fn new(hits: usize) -> Self {
        Self {
            hits,
            should_fail: false,
            web_queries: Mutex::new(Vec::new()),
            news_queries: Mutex::new(Vec::new()),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new(0)
        }
    }

    pub fn web_queries(&self) -> Vec<String> {
        self.web_queries.lock().clone()
    }

    pub fn news_queries(&self) -> Vec<String> {
        self.news_queries.lock().clone()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }

    fn hits(&self, query: &str, source: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        if self.should_fail {
            return Err(AppError::Search("Mock search failure".to_string()));
        }

        Ok((1..=self.hits.min(max_results))
            .map(|i| SearchHit {
                title: format!("{} {} {}", query, source, i),
                url: format!("https://example.com/{}/{}", source, i),
                snippet: format!("Snippet {} for {}", i, query),
                source: source.to_string(),
            })
            .collect())
    }
}

#[async_trait]
impl SearchBackend for MockSearch {
    async fn web_search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        self.web_queries.lock().push(query.to_string());
        self.hits(query, "web", max_results)
    }

    async fn news_search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        self.news_queries.lock().push(query.to_string());
        self.hits(query, "news", max_results)
    }

    async fn fetch_page(&self, url: &str) -> Result<PageContent> {
        self.fetched.lock().push(url.to_string());
        if self.should_fail {
            return Err(AppError::Search("Mock fetch failure".to_string()));
        }

        let content = format!("Full text of {} ", url).repeat(50);
        Ok(PageContent {
            url: url.to_string(),
            title: format!("Page {}", url),
            word_count: content.split_whitespace().count(),
            content,
        })
    }
}
