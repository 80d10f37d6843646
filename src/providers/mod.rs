//! Built-in capability providers
//!
//! | Provider | Default id | Actions |
//! |----------|------------|---------|
//! | [`ResearchAgent`] | `research_agent` | `web_search`, `news_search` |
//! | [`AnalysisAgent`] | `analysis_agent` | `analyze_data`, `extract_entities`, `fact_check` |
//! | [`SynthesisAgent`] | `synthesis_agent` | `create_report`, `create_summary` |

pub mod analysis;
pub mod json;
pub mod research;
pub mod synthesis;

pub use analysis::AnalysisAgent;
pub use research::ResearchAgent;
pub use synthesis::SynthesisAgent;

use crate::agents::{AgentRegistry, AgentRegistryBuilder};
use crate::llm::LLMClient;
use crate::tools::search::SearchBackend;
use crate::types::Result;
use crate::utils::config::ConclaveConfig;
use std::sync::Arc;

/// Registry holding the three built-in providers under the configured ids
pub fn standard_registry(
    config: &ConclaveConfig,
    llm: Arc<dyn LLMClient>,
    search: Arc<dyn SearchBackend>,
) -> Result<AgentRegistry> {
    let research = ResearchAgent::new(
        &config.agents.research,
        llm.clone(),
        search,
        config.search.clone(),
    )?;
    let analysis = AnalysisAgent::new(&config.agents.analysis, llm.clone())?;
    let synthesis = SynthesisAgent::new(&config.agents.synthesis, llm, config.output.dir.clone())?;

    Ok(AgentRegistryBuilder::new()
        .with_agent(Arc::new(research))
        .with_agent(Arc::new(analysis))
        .with_agent(Arc::new(synthesis))
        .build())
}
