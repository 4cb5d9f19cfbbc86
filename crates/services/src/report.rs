use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use proctor_core::model::ParticipantId;
use storage::repository::{TestRecord, TrialRecord, UsernameRepository};

use crate::collaborators::ReportSink;

const PASSED_COLOR: u32 = 0x5f_ff58;
const FAILED_COLOR: u32 = 0xff_5858;

/// Posts session reports to a Discord-style webhook.
///
/// Delivery is fire-and-forget: failures are logged here and never surfaced
/// to the lifecycle controller.
pub struct WebhookReporter {
    client: Client,
    webhook: String,
    usernames: Arc<dyn UsernameRepository>,
}

impl WebhookReporter {
    #[must_use]
    pub fn new(webhook: String, usernames: Arc<dyn UsernameRepository>) -> Self {
        Self {
            client: Client::new(),
            webhook,
            usernames,
        }
    }

    async fn display_name(&self, participant: ParticipantId) -> String {
        match self.usernames.username_for(participant).await {
            Ok(Some(name)) => name,
            Ok(None) => participant.to_string(),
            Err(e) => {
                debug!(%participant, error = %e, "username lookup failed, using raw id");
                participant.to_string()
            }
        }
    }

    async fn post(&self, payload: &WebhookPayload) {
        let response = self.client.post(&self.webhook).json(payload).send().await;
        match response {
            Ok(response) if !response.status().is_success() => {
                warn!(status = %response.status(), "report webhook rejected the payload");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "report webhook delivery failed"),
        }
    }
}

#[async_trait]
impl ReportSink for WebhookReporter {
    async fn trial_report(&self, record: &TrialRecord, attempt: u32) {
        let trialer = self.display_name(record.trialer).await;
        let testificate = self.display_name(record.testificate).await;
        let passed = record.passed.unwrap_or(false);

        let mut lines = vec![
            format!("**Trialer**: {trialer}"),
            format!("**Attempt**: {attempt}"),
            format!("**Start**: <t:{}:F>", record.started_at.timestamp()),
            format!(
                "**End**: <t:{}:F>",
                record.ended_at.map(|t| t.timestamp()).unwrap_or(0)
            ),
            "**Notes**:".to_string(),
        ];
        for note in &record.notes {
            lines.push(format!("* {note}"));
        }

        let payload = WebhookPayload {
            embeds: vec![Embed {
                title: testificate,
                description: lines.join("\n"),
                url: Some(record.app.clone()),
                color: if passed { PASSED_COLOR } else { FAILED_COLOR },
                fields: vec![EmbedField {
                    name: "State",
                    value: state_label(passed),
                }],
            }],
        };
        self.post(&payload).await;
    }

    async fn test_report(&self, record: &TestRecord, attempt: u32) {
        let testificate = self.display_name(record.testificate).await;
        let passed = record.passed.unwrap_or(false);
        let wrong = record.wrong.unwrap_or(0);

        let lines = vec![
            format!("**Attempt**: {attempt}"),
            format!("**Start**: <t:{}:F>", record.started_at.timestamp()),
            format!(
                "**End**: <t:{}:F>",
                record.ended_at.map(|t| t.timestamp()).unwrap_or(0)
            ),
            format!("**Wrong answers**: {wrong}"),
        ];

        let payload = WebhookPayload {
            embeds: vec![Embed {
                title: testificate,
                description: lines.join("\n"),
                url: None,
                color: if passed { PASSED_COLOR } else { FAILED_COLOR },
                fields: vec![EmbedField {
                    name: "State",
                    value: state_label(passed),
                }],
            }],
        };
        self.post(&payload).await;
    }
}

fn state_label(passed: bool) -> &'static str {
    if passed { "*Passed*" } else { "*Failed*" }
}

#[derive(Debug, Serialize)]
struct WebhookPayload {
    embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
struct Embed {
    title: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    color: u32,
    fields: Vec<EmbedField>,
}

#[derive(Debug, Serialize)]
struct EmbedField {
    name: &'static str,
    value: &'static str,
}
