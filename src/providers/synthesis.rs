//! Synthesis provider
//!
//! Combines research and analysis into a report. Sections and the executive
//! summary come from the model; rendering and saving are local.

use crate::agents::{ActionTable, Agent, AgentOutbox};
use crate::llm::LLMClient;
use crate::protocol::{AgentMessage, CapabilityDescriptor};
use crate::providers::json::{array_field, extract_json_array, extract_json_object, str_field};
use crate::types::{truncate_chars, AppError, Result};
use crate::workflows::OutputFormat;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "You are a synthesis agent that writes professional reports. \
Combine information from multiple sources coherently, use a clear structure with logical \
sections, highlight key insights and always cite the sources used.";

const SECTIONS_PROMPT: &str = "Generate 4-5 report sections as a JSON array:
[
  {\"title\": \"Section title\", \"content\": \"Detailed section content (200-400 words)\"},
  ...
]
Suggested sections:
1. Context and Background
2. Current Situation
3. Key Trends and Developments
4. Implications and Opportunities
5. Conclusions and Recommendations
Base the content on the data provided and cite sources where possible.";

const EXECUTIVE_SUMMARY_PROMPT: &str = "Write an executive summary (150-200 words) that captures \
the key points of the report, highlights the main conclusions and states any recommendations. \
It must read on its own.";

const COMBINE_PROMPT: &str = "Combine the information from the sources provided. Identify the \
common themes, note any conflicting information, write one coherent text that integrates every \
source and say which information comes from which source. Answer in JSON:
{
  \"combined_text\": \"integrated text\",
  \"common_themes\": [\"theme\"],
  \"conflicts\": [{\"topic\": \"...\", \"source1_view\": \"...\", \"source2_view\": \"...\"}],
  \"unique_insights\": [{\"source\": 1, \"insight\": \"...\"}]
}";

/// Characters of the rendered report returned inline
const REPORT_PREVIEW_CHARS: usize = 2000;
const MAX_SOURCES: usize = 10;
/// Characters of each source handed to `combine_sources`
const COMBINE_SOURCE_CHARS: usize = 1500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SynthesisAction {
    CreateReport,
    CreateSummary,
    CombineSources,
}

#[derive(Debug, Clone)]
struct Section {
    title: String,
    content: String,
}

#[derive(Debug, Clone)]
struct Source {
    title: String,
    url: String,
    kind: &'static str,
}

pub struct SynthesisAgent {
    outbox: AgentOutbox,
    actions: ActionTable<SynthesisAction>,
    llm: Arc<dyn LLMClient>,
    output_dir: PathBuf,
}

impl SynthesisAgent {
    pub fn new(agent_id: &str, llm: Arc<dyn LLMClient>, output_dir: impl Into<PathBuf>) -> Result<Self> {
        let actions = ActionTable::build(
            agent_id,
            &Self::capability_list(),
            &[
                ("create_report", SynthesisAction::CreateReport),
                ("create_summary", SynthesisAction::CreateSummary),
                ("combine_sources", SynthesisAction::CombineSources),
            ],
        )?;

        Ok(Self {
            outbox: AgentOutbox::new(agent_id, "Synthesis Agent"),
            actions,
            llm,
            output_dir: output_dir.into(),
        })
    }

    fn capability_list() -> Vec<CapabilityDescriptor> {
        vec![
            CapabilityDescriptor::new(
                "create_report",
                "Write a full report from research and analysis data",
                json!({"topic": "string", "research_data": "object", "analysis_data": "object", "output_format": "string"}),
                json!({"report_preview": "string", "file_path": "string", "word_count": "int"}),
            ),
            CapabilityDescriptor::new(
                "create_summary",
                "Summarise existing content",
                json!({"content": "string", "max_words": "int"}),
                json!({"summary": "string"}),
            ),
            CapabilityDescriptor::new(
                "combine_sources",
                "Merge several sources into one text and list their conflicts",
                json!({"sources": "list"}),
                json!({"combined_text": "string", "common_themes": "list", "conflicts": "list", "unique_insights": "list"}),
            ),
        ]
    }

    pub fn outbox(&self) -> &AgentOutbox {
        &self.outbox
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    async fn create_report(
        &self,
        topic: &str,
        research: &Value,
        analysis: &Value,
        format: OutputFormat,
    ) -> Result<Value> {
        tracing::info!(topic = %topic, format = %format.as_str(), "Creating report");

        let context = prepare_context(topic, research, analysis);
        let sections = self.generate_sections(topic, &context).await?;
        let summary = self.executive_summary(&sections).await?;
        let sources = extract_sources(research);

        let report = match format {
            OutputFormat::Markdown => render_markdown(topic, &summary, &sections, &sources),
            OutputFormat::Html => render_html(topic, &summary, &sections, &sources),
        };
        let file_path = self.save_report(topic, &report, format).await?;

        let preview = if report.chars().count() > REPORT_PREVIEW_CHARS {
            format!("{}...", truncate_chars(&report, REPORT_PREVIEW_CHARS))
        } else {
            report.clone()
        };

        Ok(json!({
            "topic": topic,
            "format": format,
            "sections_count": sections.len(),
            "word_count": report.split_whitespace().count(),
            "file_path": file_path.display().to_string(),
            "report_content": report,
            "report_preview": preview,
            "generated_at": Utc::now().to_rfc3339(),
        }))
    }

    async fn generate_sections(&self, topic: &str, context: &str) -> Result<Vec<Section>> {
        let prompt = format!(
            "Create the sections of a report on \"{}\".\n\n{}\n\nDATA:\n{}",
            topic, SECTIONS_PROMPT, context
        );
        let response = self.llm.generate_with_system(SYSTEM_PROMPT, &prompt).await?;

        let sections: Vec<Section> = extract_json_array(&response)
            .unwrap_or_default()
            .iter()
            .filter_map(|item| {
                let title = str_field(item, "title").trim();
                let content = str_field(item, "content").trim();
                (!title.is_empty() && !content.is_empty()).then(|| Section {
                    title: title.to_string(),
                    content: content.to_string(),
                })
            })
            .collect();

        if sections.is_empty() {
            return Ok(vec![Section {
                title: "Analysis".to_string(),
                content: response.trim().to_string(),
            }]);
        }
        Ok(sections)
    }

    async fn executive_summary(&self, sections: &[Section]) -> Result<String> {
        let sections_text: Vec<String> = sections
            .iter()
            .map(|s| format!("## {}\n{}", s.title, truncate_chars(&s.content, 500)))
            .collect();
        let prompt = format!("{}\n\n{}", EXECUTIVE_SUMMARY_PROMPT, sections_text.join("\n\n"));

        Ok(self
            .llm
            .generate_with_system(SYSTEM_PROMPT, &prompt)
            .await?
            .trim()
            .to_string())
    }

    async fn save_report(&self, topic: &str, content: &str, format: OutputFormat) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let file_name = format!(
            "report_{}_{}.{}",
            file_stem(topic),
            Utc::now().format("%Y%m%d_%H%M%S"),
            format.extension()
        );
        let path = self.output_dir.join(file_name);
        tokio::fs::write(&path, content).await?;

        tracing::info!(path = %path.display(), "Report saved");
        Ok(path)
    }

    async fn create_summary(&self, content: &str, max_words: u64) -> Result<Value> {
        if content.trim().is_empty() {
            return Err(AppError::Validation("Nothing to summarise".to_string()));
        }

        let prompt = format!(
            "Summarise this content in at most {} words. Keep the essential points and the \
             logical structure, in a professional tone.\n\n{}",
            max_words,
            truncate_chars(content, 8000)
        );
        let summary = self
            .llm
            .generate_with_system(SYSTEM_PROMPT, &prompt)
            .await?
            .trim()
            .to_string();

        let original_length = content.split_whitespace().count();
        let summary_length = summary.split_whitespace().count();
        let ratio = summary_length as f64 / original_length.max(1) as f64;

        Ok(json!({
            "summary": summary,
            "original_length": original_length,
            "summary_length": summary_length,
            "compression_ratio": (ratio * 100.0).round() / 100.0,
        }))
    }

    async fn combine_sources(&self, sources: &[Value]) -> Result<Value> {
        if sources.is_empty() {
            return Err(AppError::Validation("No sources to combine".to_string()));
        }
        tracing::info!(sources = sources.len(), "Combining sources");

        let context: Vec<String> = sources
            .iter()
            .enumerate()
            .map(|(i, source)| {
                let title = match str_field(source, "title") {
                    "" => format!("Source {}", i + 1),
                    title => title.to_string(),
                };
                format!(
                    "[SOURCE {}: {}]\n{}",
                    i + 1,
                    title,
                    truncate_chars(str_field(source, "content"), COMBINE_SOURCE_CHARS)
                )
            })
            .collect();
        let prompt = format!("{}\n\n{}", COMBINE_PROMPT, context.join("\n\n---\n\n"));
        let response = self.llm.generate_with_system(SYSTEM_PROMPT, &prompt).await?;

        Ok(match extract_json_object(&response) {
            Some(combined) => Value::Object(combined),
            None => json!({"combined_text": response}),
        })
    }
}

#[async_trait]
impl Agent for SynthesisAgent {
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
            SynthesisAction::CreateReport => {
                let topic = match str_field(&payload, "topic").trim() {
                    "" => "Report",
                    topic => topic,
                };
                let format = match payload.get("output_format").and_then(Value::as_str) {
                    Some(format) => OutputFormat::parse(format),
                    None => Ok(OutputFormat::Markdown),
                };
                let research = payload.get("research_data").cloned().unwrap_or(Value::Null);
                let analysis = payload.get("analysis_data").cloned().unwrap_or(Value::Null);

                match format {
                    Ok(format) => self.create_report(topic, &research, &analysis, format).await,
                    Err(e) => Err(e),
                }
            }
            SynthesisAction::CreateSummary => {
                let max_words = payload.get("max_words").and_then(Value::as_u64).unwrap_or(200);
                self.create_summary(str_field(&payload, "content"), max_words)
                    .await
            }
            SynthesisAction::CombineSources => {
                self.combine_sources(array_field(&payload, "sources")).await
            }
        };

        Ok(match outcome {
            Ok(result) => self.outbox.result(&request, result),
            Err(e) => {
                tracing::warn!(agent_id = %self.id(), error = %e, "Synthesis failed");
                self.outbox.error(&request, e.to_string())
            }
        })
    }
}

/// Text handed to the model: research highlights followed by the analysis
fn prepare_context(topic: &str, research: &Value, analysis: &Value) -> String {
    let mut parts = vec![format!("TOPIC: {}\n", topic)];

    if research.is_object() {
        parts.push("## RESEARCH DATA:".to_string());
        for hit in array_field(research, "web_results").iter().take(5) {
            parts.push(format!(
                "- {}: {}",
                str_field(hit, "title"),
                truncate_chars(str_field(hit, "snippet"), 200)
            ));
        }
        for hit in array_field(research, "news_results").iter().take(3) {
            parts.push(format!("- [NEWS] {}", str_field(hit, "title")));
        }
        if let Some(summary) = research.get("analysis").map(|a| str_field(a, "summary")) {
            if !summary.is_empty() {
                parts.push(format!("\nRESEARCH SUMMARY: {}", summary));
            }
        }
    }

    if analysis.is_object() {
        parts.push("\n## ANALYSIS DATA:".to_string());
        let raw = str_field(analysis, "raw_analysis");
        if !raw.is_empty() {
            parts.push(truncate_chars(raw, 1500));
        } else {
            for key in ["themes", "trends", "gaps", "contradictions"] {
                if let Some(value) = analysis.get(key) {
                    parts.push(format!("{}: {}", key, value));
                }
            }
            let summary = str_field(analysis, "summary");
            if !summary.is_empty() {
                parts.push(format!("summary: {}", summary));
            }
        }
    }

    parts.join("\n")
}

fn extract_sources(research: &Value) -> Vec<Source> {
    let web = array_field(research, "web_results").iter().map(|hit| (hit, "web"));
    let news = array_field(research, "news_results").iter().map(|hit| (hit, "news"));

    web.chain(news)
        .map(|(hit, kind)| Source {
            title: match str_field(hit, "title") {
                "" => "Source".to_string(),
                title => title.to_string(),
            },
            url: str_field(hit, "url").to_string(),
            kind,
        })
        .take(MAX_SOURCES)
        .collect()
}

/// File name stem: alphanumerics, spaces, dashes and underscores only
fn file_stem(topic: &str) -> String {
    let cleaned: String = topic
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let stem = truncate_chars(&cleaned.trim().replace(' ', "_"), 50);
    if stem.is_empty() {
        "untitled".to_string()
    } else {
        stem
    }
}

fn anchor(title: &str) -> String {
    title.to_lowercase().replace(' ', "-")
}

fn render_markdown(topic: &str, summary: &str, sections: &[Section], sources: &[Source]) -> String {
    let mut lines = vec![
        format!("# {}", topic),
        String::new(),
        format!("*Report generated on {}*", Utc::now().format("%Y-%m-%d %H:%M UTC")),
        String::new(),
        "---".to_string(),
        String::new(),
        "## Executive Summary".to_string(),
        String::new(),
        summary.to_string(),
        String::new(),
        "---".to_string(),
        String::new(),
        "## Contents".to_string(),
        String::new(),
    ];

    for (i, section) in sections.iter().enumerate() {
        lines.push(format!("{}. [{}](#{})", i + 1, section.title, anchor(&section.title)));
    }
    lines.extend(["".to_string(), "---".to_string(), "".to_string()]);

    for section in sections {
        lines.push(format!("## {}", section.title));
        lines.push(String::new());
        lines.push(section.content.clone());
        lines.push(String::new());
    }

    if !sources.is_empty() {
        lines.extend([
            "---".to_string(),
            String::new(),
            "## Sources".to_string(),
            String::new(),
        ]);
        for (i, source) in sources.iter().enumerate() {
            if source.url.is_empty() {
                lines.push(format!("{}. {} *[{}]*", i + 1, source.title, source.kind));
            } else {
                lines.push(format!("{}. [{}]({}) *[{}]*", i + 1, source.title, source.url, source.kind));
            }
        }
    }

    lines.extend([
        String::new(),
        "---".to_string(),
        String::new(),
        "*Generated by conclave*".to_string(),
    ]);
    lines.join("\n")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_html(topic: &str, summary: &str, sections: &[Section], sources: &[Source]) -> String {
    let sections_html: String = sections
        .iter()
        .map(|s| {
            format!(
                "    <section>\n        <h2>{}</h2>\n        <p>{}</p>\n    </section>\n",
                escape_html(&s.title),
                escape_html(&s.content).replace('\n', "</p><p>")
            )
        })
        .collect();

    let sources_html: String = sources
        .iter()
        .map(|s| {
            if s.url.is_empty() {
                format!("<li>{}</li>", escape_html(&s.title))
            } else {
                format!(
                    "<li><a href=\"{}\" target=\"_blank\">{}</a></li>",
                    escape_html(&s.url),
                    escape_html(&s.title)
                )
            }
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
    <style>
        body {{ font-family: 'Segoe UI', Arial, sans-serif; max-width: 900px; margin: 0 auto; padding: 40px; line-height: 1.6; color: #333; }}
        h1 {{ color: #1a365d; border-bottom: 3px solid #3182ce; padding-bottom: 15px; }}
        h2 {{ color: #2c5282; margin-top: 40px; }}
        .meta {{ color: #718096; font-style: italic; }}
        .summary {{ background: #f7fafc; border-left: 4px solid #3182ce; padding: 20px; margin: 30px 0; }}
        .sources {{ background: #edf2f7; padding: 20px; border-radius: 8px; margin-top: 40px; }}
        footer {{ margin-top: 50px; padding-top: 20px; border-top: 1px solid #e2e8f0; color: #a0aec0; }}
    </style>
</head>
<body>
    <h1>{title}</h1>
    <p class="meta">Report generated on {date}</p>
    <div class="summary">
        <h2>Executive Summary</h2>
        <p>{summary}</p>
    </div>
{sections}    <div class="sources">
        <h2>Sources</h2>
        <ol>{sources}</ol>
    </div>
    <footer>Generated by conclave</footer>
</body>
</html>"#,
        title = escape_html(topic),
        date = Utc::now().format("%Y-%m-%d %H:%M UTC"),
        summary = escape_html(summary),
        sections = sections_html,
        sources = sources_html,
    )
}
