//! Report delivery to a chat webhook.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::PipelineError;
use crate::report::{split_report, MAX_REPORT_LEN};

/// A text sink that accepts one message per call.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the message could not be delivered.
    async fn send(&self, text: &str) -> Result<(), PipelineError>;
}

#[derive(Serialize)]
struct WebhookMessage<'a> {
    content: &'a str,
}

/// Discord incoming-webhook notifier.
pub struct DiscordNotifier {
    client: Client,
    webhook_url: String,
}

impl DiscordNotifier {
    /// # Errors
    ///
    /// Returns [`PipelineError::Http`] if the HTTP client cannot be built.
    pub fn new(webhook_url: &str, timeout_secs: u64) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            webhook_url: webhook_url.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, text: &str) -> Result<(), PipelineError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&WebhookMessage { content: text })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::Notify(format!(
                "webhook returned status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Splits `report` to the webhook limit and sends each non-blank chunk in
/// order, stopping at the first failure. Failures are logged, never returned.
///
/// Returns the number of chunks delivered.
pub async fn deliver_report(notifier: &dyn Notifier, report: &str) -> usize {
    let chunks = split_report(report, MAX_REPORT_LEN);
    let mut sent = 0;

    for chunk in chunks.iter().filter(|c| !c.text.trim().is_empty()) {
        if let Err(e) = notifier.send(&chunk.text).await {
            tracing::error!(error = %e, sent, total = chunks.len(), "failed to send report chunk");
            return sent;
        }
        sent += 1;
    }

    tracing::info!(sent, "report delivered");
    sent
}
