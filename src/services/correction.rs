//! Client for the correction webhook. Submission is fire-and-forget:
//! a 2xx means the grading workflow accepted the answers, and the
//! result arrives later through the `correction_results` table.

use std::time::Duration;

use anyhow::Context;
use reqwest::Client;
use serde_json::json;
use thiserror::Error;

use crate::core::config::Settings;
use crate::exam::answers::AnswerMap;

#[derive(Debug, Error)]
pub(crate) enum CorrectionSubmitError {
    #[error("correction webhook request failed: {0}")]
    Request(#[source] anyhow::Error),
    #[error("correction webhook rejected the submission (status {status}): {detail}")]
    Rejected { status: u16, detail: String },
}

#[derive(Debug, Clone)]
pub(crate) struct CorrectionService {
    client: Client,
    webhook_url: String,
}

impl CorrectionService {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(settings.webhooks().request_timeout_seconds);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .context("Failed to build correction HTTP client")?;

        Ok(Self { client, webhook_url: settings.webhooks().correction_url.clone() })
    }

    /// No retries here: a duplicate delivery would start a second
    /// grading run for the same submission.
    pub(crate) async fn submit(
        &self,
        student_id: &str,
        exam_id: &str,
        answers: &AnswerMap,
    ) -> Result<(), CorrectionSubmitError> {
        let payload = json!({
            "action": "start_correction",
            "student_id": student_id,
            "exam_id": exam_id,
            "answers": answers,
        });

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                CorrectionSubmitError::Request(
                    anyhow::anyhow!(err).context("Failed to call correction webhook"),
                )
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();
        Err(CorrectionSubmitError::Rejected {
            status: status.as_u16(),
            detail: detail.trim().chars().take(500).collect(),
        })
    }
}
