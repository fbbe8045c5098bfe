//! Client for the exam-generation webhook. The workflow service either
//! answers with the exam document inline or acknowledges and writes the
//! content to the attempt row later, in which case we poll the row.

use std::time::Duration;

use anyhow::Context;
use reqwest::Client;
use serde_json::{json, Value};
use sqlx::PgPool;
use thiserror::Error;

use crate::core::config::Settings;
use crate::db::types::AttemptStatus;
use crate::repositories::attempts;

const MAX_SUBMIT_RETRIES: u32 = 2;

#[derive(Debug, Error)]
pub(crate) enum GenerationError {
    #[error("generation webhook request failed: {0}")]
    Request(#[source] anyhow::Error),
    #[error("generation webhook rejected the request (status {status}): {detail}")]
    Rejected { status: u16, detail: String },
    #[error("exam generation timed out")]
    Timeout,
    #[error("exam generation failed")]
    Failed,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub(crate) struct GenerationService {
    client: Client,
    webhook_url: String,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

pub(crate) struct GenerateExamRequest<'a> {
    pub(crate) exam_id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) student_name: &'a str,
    pub(crate) track: &'a str,
    pub(crate) duration_minutes: u64,
}

impl GenerationService {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(settings.webhooks().request_timeout_seconds);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .context("Failed to build generation HTTP client")?;

        Ok(Self {
            client,
            webhook_url: settings.webhooks().generation_url.clone(),
            poll_interval: Duration::from_secs(settings.generation().poll_interval_seconds),
            max_poll_attempts: settings.generation().max_poll_attempts,
        })
    }

    /// Fire the generation request. Returns the raw exam document when
    /// the webhook answers with one inline, `None` when it only acks.
    pub(crate) async fn request_exam(
        &self,
        request: GenerateExamRequest<'_>,
    ) -> Result<Option<Value>, GenerationError> {
        let payload = json!({
            "exam_id": request.exam_id,
            "student_id": request.student_id,
            "student_name": request.student_name,
            "track": request.track,
            "duration_minutes": request.duration_minutes,
        });

        let mut last_error: Option<GenerationError> = None;

        for attempt in 0..=MAX_SUBMIT_RETRIES {
            let response = self.client.post(&self.webhook_url).json(&payload).send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let raw_body = resp
                        .text()
                        .await
                        .map_err(|err| GenerationError::Request(anyhow::anyhow!(err)))?;

                    if !status.is_success() {
                        last_error = Some(GenerationError::Rejected {
                            status: status.as_u16(),
                            detail: truncate_detail(&raw_body),
                        });
                    } else {
                        let body = raw_body.trim();
                        if body.is_empty() {
                            return Ok(None);
                        }
                        return Ok(serde_json::from_str::<Value>(body).ok());
                    }
                }
                Err(err) => {
                    last_error = Some(GenerationError::Request(
                        anyhow::anyhow!(err).context("Failed to call generation webhook"),
                    ));
                }
            }

            if attempt < MAX_SUBMIT_RETRIES {
                let backoff = Duration::from_secs(2_u64.pow(attempt));
                tokio::time::sleep(backoff).await;
            }
        }

        Err(last_error
            .unwrap_or_else(|| GenerationError::Request(anyhow::anyhow!("unknown submit error"))))
    }

    /// Wait for the attempt row to carry generated content. The webhook
    /// worker flips the row to `ready` out of band.
    pub(crate) async fn await_ready(
        &self,
        pool: &PgPool,
        exam_id: &str,
    ) -> Result<Value, GenerationError> {
        for attempt in 0..self.max_poll_attempts {
            if let Some(row) = attempts::find_by_id(pool, exam_id).await? {
                match row.status {
                    AttemptStatus::Failed => return Err(GenerationError::Failed),
                    _ => {
                        if let Some(content) = row.content {
                            return Ok(content.0);
                        }
                    }
                }
            }

            if attempt + 1 < self.max_poll_attempts {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        Err(GenerationError::Timeout)
    }
}

pub(crate) fn truncate_detail(raw: &str) -> String {
    const MAX: usize = 500;
    let trimmed = raw.trim();
    if trimmed.len() <= MAX {
        trimmed.to_string()
    } else {
        let mut end = MAX;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        trimmed[..end].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_detail_respects_char_boundaries() {
        let long = "é".repeat(600);
        let truncated = truncate_detail(&long);
        assert!(truncated.len() <= 500);
        assert!(truncated.chars().all(|c| c == 'é'));
    }
}
