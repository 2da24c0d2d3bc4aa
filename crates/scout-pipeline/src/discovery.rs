//! Web-search discovery of candidate channels through a search-capable model.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::PipelineError;
use crate::llm::{Completion, LlmClient};
use crate::types::DiscoveredChannel;

const DISCOVERY_SYSTEM_PROMPT: &str = r#"You are a market researcher for overseas video creators.
From web search results, extract promising YouTube channel names and handles (@handle).
Reply with JSON only, in exactly this shape:

{
  "discovered_channels": [
    {"name": "<channel or creator name>", "handle": "<@handle if known>", "justification": "<one sentence>"}
  ]
}"#;

#[derive(Deserialize)]
struct DiscoveryResponse {
    #[serde(default)]
    discovered_channels: Vec<DiscoveredChannel>,
}

/// Deduplicates by handle, falling back to name; entries with neither are dropped.
fn dedupe(channels: Vec<DiscoveredChannel>) -> Vec<DiscoveredChannel> {
    let mut seen = HashSet::new();
    channels
        .into_iter()
        .filter_map(|mut channel| {
            channel.handle = channel
                .handle
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty());
            channel.name = channel.name.trim().to_string();
            let key = channel
                .handle
                .clone()
                .unwrap_or_else(|| channel.name.clone());
            (!key.is_empty() && seen.insert(key)).then_some(channel)
        })
        .collect()
}

pub struct DiscoveryWorker {
    llm: Arc<dyn LlmClient>,
}

impl DiscoveryWorker {
    #[must_use]
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    async fn request(&self, keywords: &[String]) -> Result<Vec<DiscoveredChannel>, PipelineError> {
        let prompt = format!(
            "Use web search to find overseas YouTube channels that are currently getting \
             attention for these keywords: {}\n\
             List the channel names and handles (@handle) you find, each with a short reason \
             why it looks promising.",
            keywords.join(", ")
        );
        let content = self
            .llm
            .complete(&Completion {
                system: DISCOVERY_SYSTEM_PROMPT,
                user: &prompt,
                json: true,
            })
            .await?;

        let parsed: DiscoveryResponse = serde_json::from_str(&content)?;
        Ok(dedupe(parsed.discovered_channels))
    }

    /// Returns candidate channels for `keywords`. Failures are logged and
    /// yield an empty list.
    pub async fn discover(&self, keywords: &[String]) -> Vec<DiscoveredChannel> {
        match self.request(keywords).await {
            Ok(channels) => {
                tracing::info!(found = channels.len(), "discovery search finished");
                channels
            }
            Err(e) => {
                tracing::warn!(error = %e, "discovery search failed");
                Vec::new()
            }
        }
    }
}
