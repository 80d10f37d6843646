//! Analysis provider
//!
//! Turns research results into themes, gaps and a structured summary, and
//! offers entity extraction and fact checking over arbitrary text.

use crate::agents::{ActionTable, Agent, AgentOutbox};
use crate::llm::LLMClient;
use crate::protocol::{AgentMessage, CapabilityDescriptor};
use crate::providers::json::{array_field, extract_json_object, str_field};
use crate::types::{truncate_chars, AppError, Payload, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You are an analysis agent. Extract structured information, \
identify key entities, check consistency between sources and flag missing or inconsistent \
data. Be precise and methodical.";

const RESEARCH_PROMPT: &str = "Analyse these research results and provide:
1. themes: the 3-5 most recurring themes
2. reliable_sources: which sources look most authoritative
3. contradictions: conflicting information, if any
4. trends: a common trend or direction, if one emerges
5. gaps: information that is missing or needs more work
6. summary: a structured summary (200-300 words)

Answer in JSON with exactly those keys; themes and gaps must be lists of strings.";

const ENTITY_KEYS: [&str; 6] = [
    "persons",
    "organizations",
    "locations",
    "dates",
    "numbers",
    "concepts",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnalysisAction {
    AnalyzeData,
    ExtractEntities,
    FactCheck,
}

pub struct AnalysisAgent {
    outbox: AgentOutbox,
    actions: ActionTable<AnalysisAction>,
    llm: Arc<dyn LLMClient>,
}

impl AnalysisAgent {
    pub fn new(agent_id: &str, llm: Arc<dyn LLMClient>) -> Result<Self> {
        let actions = ActionTable::build(
            agent_id,
            &Self::capability_list(),
            &[
                ("analyze_data", AnalysisAction::AnalyzeData),
                ("extract_entities", AnalysisAction::ExtractEntities),
                ("fact_check", AnalysisAction::FactCheck),
            ],
        )?;

        Ok(Self {
            outbox: AgentOutbox::new(agent_id, "Analysis Agent"),
            actions,
            llm,
        })
    }

    fn capability_list() -> Vec<CapabilityDescriptor> {
        vec![
            CapabilityDescriptor::new(
                "analyze_data",
                "Analyse structured research results",
                json!({"research_data": "object", "topic": "string"}),
                json!({"themes": "list", "gaps": "list", "summary": "string"}),
            ),
            CapabilityDescriptor::new(
                "extract_entities",
                "Extract named entities from text",
                json!({"text": "string"}),
                json!({"persons": "list", "organizations": "list", "locations": "list"}),
            ),
            CapabilityDescriptor::new(
                "fact_check",
                "Check claims against a set of sources",
                json!({"claims": "list", "sources": "list"}),
                json!({"verifications": "list"}),
            ),
        ]
    }

    pub fn outbox(&self) -> &AgentOutbox {
        &self.outbox
    }

    async fn analyze_research(&self, data: &Value, topic: &str) -> Result<Value> {
        if !data.is_object() {
            return Err(AppError::Validation(
                "'research_data' must be an object".to_string(),
            ));
        }

        let web = array_field(data, "web_results");
        let news = array_field(data, "news_results");
        let deep = array_field(data, "deep_content");
        let topic = match str_field(data, "topic") {
            "" => topic,
            declared => declared,
        };
        tracing::info!(topic = %topic, sources = web.len() + news.len(), "Analysing research results");

        let mut context = vec![format!("Research topic: {}\n", topic), "## Web results:".to_string()];
        for hit in web.iter().take(5) {
            context.push(format!(
                "- {}: {}",
                str_field(hit, "title"),
                truncate_chars(str_field(hit, "snippet"), 200)
            ));
        }
        if !news.is_empty() {
            context.push("\n## Recent news:".to_string());
            for hit in news.iter().take(3) {
                context.push(format!("- {}", str_field(hit, "title")));
            }
        }
        if !deep.is_empty() {
            context.push("\n## In-depth content:".to_string());
            for page in deep.iter().take(2) {
                context.push(format!("---\n{}\n---", truncate_chars(str_field(page, "content"), 1000)));
            }
        }

        let prompt = format!("{}\n\n{}", RESEARCH_PROMPT, context.join("\n"));
        let response = self.llm.generate_with_system(SYSTEM_PROMPT, &prompt).await?;

        let mut analysis = extract_json_object(&response).unwrap_or_else(|| {
            let mut raw = Payload::new();
            raw.insert("raw_analysis".to_string(), json!(response));
            raw.insert("summary".to_string(), json!(truncate_chars(&response, 1500)));
            raw
        });
        for key in ["themes", "gaps"] {
            if !analysis.get(key).is_some_and(Value::is_array) {
                analysis.insert(key.to_string(), json!([]));
            }
        }
        if !analysis.get("summary").is_some_and(Value::is_string) {
            analysis.insert("summary".to_string(), json!(""));
        }
        analysis.insert("topic".to_string(), json!(topic));
        analysis.insert(
            "sources_analyzed".to_string(),
            json!(web.len() + news.len() + deep.len()),
        );
        analysis.insert("analyzed_at".to_string(), json!(Utc::now().to_rfc3339()));

        Ok(Value::Object(analysis))
    }

    async fn extract_entities(&self, text: &str) -> Result<Value> {
        if text.trim().is_empty() {
            return Ok(json!({}));
        }

        let prompt = format!(
            "Extract the following entities from the text: people, organisations, places, \
             dates, significant numbers and key concepts. Answer in JSON with the keys {}.\n\n{}",
            ENTITY_KEYS.join(", "),
            truncate_chars(text, 5000)
        );
        let response = self.llm.generate_with_system(SYSTEM_PROMPT, &prompt).await?;

        Ok(match extract_json_object(&response) {
            Some(map) => Value::Object(map),
            None => {
                let mut fallback: Payload = ENTITY_KEYS
                    .iter()
                    .map(|key| (key.to_string(), json!([])))
                    .collect();
                fallback.insert("raw".to_string(), json!(response));
                Value::Object(fallback)
            }
        })
    }

    async fn fact_check(&self, claims: &[Value], sources: &[Value]) -> Result<Value> {
        if claims.is_empty() {
            return Err(AppError::Validation("No claims to verify".to_string()));
        }

        let sources_text: Vec<String> = sources
            .iter()
            .take(5)
            .enumerate()
            .map(|(i, source)| {
                let title = match str_field(source, "title") {
                    "" => format!("Source {}", i + 1),
                    title => title.to_string(),
                };
                let content = match str_field(source, "content") {
                    "" => str_field(source, "snippet"),
                    content => content,
                };
                format!("[{}] {}: {}", i + 1, title, truncate_chars(content, 500))
            })
            .collect();
        let claims_text: Vec<String> = claims
            .iter()
            .map(|claim| format!("- {}", claim.as_str().map_or_else(|| claim.to_string(), str::to_string)))
            .collect();

        let prompt = format!(
            "Check these claims against the sources provided.\n\nCLAIMS:\n{}\n\n\
             For each claim answer SUPPORTED, CONTRADICTED, UNVERIFIABLE or PARTIAL, with an \
             explanation and the source reference. Answer in JSON with a \"verifications\" array.\n\n\
             SOURCES:\n{}",
            claims_text.join("\n"),
            sources_text.join("\n\n")
        );
        let response = self.llm.generate_with_system(SYSTEM_PROMPT, &prompt).await?;

        Ok(match extract_json_object(&response) {
            Some(map) => Value::Object(map),
            None => json!({ "raw_verification": response }),
        })
    }
}

#[async_trait]
impl Agent for AnalysisAgent {
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
        let outcome = match action {
            AnalysisAction::AnalyzeData => {
                let data = payload.get("research_data").cloned().unwrap_or(Value::Null);
                self.analyze_research(&data, str_field(&payload, "topic")).await
            }
            AnalysisAction::ExtractEntities => {
                self.extract_entities(str_field(&payload, "text")).await
            }
            AnalysisAction::FactCheck => {
                self.fact_check(
                    array_field(&payload, "claims"),
                    array_field(&payload, "sources"),
                )
                .await
            }
        };

        Ok(match outcome {
            Ok(result) => self.outbox.result(&request, result),
            Err(e) => {
                tracing::warn!(agent_id = %self.id(), error = %e, "Analysis failed");
                self.outbox.error(&request, e.to_string())
            }
        })
    }
}
