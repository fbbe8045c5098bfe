//! Rendezvous with the asynchronous correction worker.
//!
//! After a submission the portal polls the result store until a row
//! newer than the submission shows up or the attempt budget runs out.
//! The store is a trait so the wait loop is testable without Postgres.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;

use crate::core::config::Settings;
use crate::exam::correction::CorrectionReport;
use crate::repositories::results;

#[derive(Debug, Error)]
pub(crate) enum RendezvousError {
    #[error("correction did not arrive within the polling budget")]
    Timeout,
    #[error("result store failed: {0}")]
    Store(#[source] anyhow::Error),
}

#[async_trait]
pub(crate) trait ResultStore: Send + Sync {
    /// Newest report for the pair, restricted to rows created strictly
    /// after `since` when given.
    async fn latest_since(
        &self,
        exam_id: &str,
        student_id: &str,
        since: Option<OffsetDateTime>,
    ) -> anyhow::Result<Option<CorrectionReport>>;
}

pub(crate) struct PgResultStore {
    pool: PgPool,
}

impl PgResultStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResultStore for PgResultStore {
    async fn latest_since(
        &self,
        exam_id: &str,
        student_id: &str,
        since: Option<OffsetDateTime>,
    ) -> anyhow::Result<Option<CorrectionReport>> {
        let row = results::latest_since(&self.pool, exam_id, student_id, since).await?;
        Ok(row.map(|row| row.into_report()))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CorrectionRendezvous {
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl CorrectionRendezvous {
    pub(crate) fn from_settings(settings: &Settings) -> Self {
        Self {
            poll_interval: Duration::from_secs(settings.correction().poll_interval_seconds),
            max_poll_attempts: settings.correction().max_poll_attempts,
        }
    }

    #[cfg(test)]
    pub(crate) fn new(poll_interval: Duration, max_poll_attempts: u32) -> Self {
        Self { poll_interval, max_poll_attempts }
    }

    /// First check happens immediately, so a result that is already
    /// present returns without sleeping.
    pub(crate) async fn await_result(
        &self,
        store: &dyn ResultStore,
        exam_id: &str,
        student_id: &str,
        since: Option<OffsetDateTime>,
    ) -> Result<CorrectionReport, RendezvousError> {
        for attempt in 0..self.max_poll_attempts {
            let found = store
                .latest_since(exam_id, student_id, since)
                .await
                .map_err(RendezvousError::Store)?;

            if let Some(report) = found {
                return Ok(report);
            }

            if attempt + 1 < self.max_poll_attempts {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        Err(RendezvousError::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct ScriptedStore {
        calls: AtomicU32,
        ready_after: u32,
        report: Mutex<Option<CorrectionReport>>,
    }

    impl ScriptedStore {
        fn new(ready_after: u32, report: CorrectionReport) -> Self {
            Self {
                calls: AtomicU32::new(0),
                ready_after,
                report: Mutex::new(Some(report)),
            }
        }
    }

    #[async_trait]
    impl ResultStore for ScriptedStore {
        async fn latest_since(
            &self,
            _exam_id: &str,
            _student_id: &str,
            _since: Option<OffsetDateTime>,
        ) -> anyhow::Result<Option<CorrectionReport>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call + 1 >= self.ready_after {
                Ok(self.report.lock().unwrap().take())
            } else {
                Ok(None)
            }
        }
    }

    fn report(exam_id: &str) -> CorrectionReport {
        CorrectionReport {
            exam_id: exam_id.to_string(),
            student_id: "marie.curie@exam.local".to_string(),
            score_total: Some(33.0),
            max_score: Some(40.0),
            feedback_general: None,
            detailed_correction: Vec::new(),
            student_responses: None,
        }
    }

    #[tokio::test]
    async fn returns_immediately_when_result_exists() {
        let store = ScriptedStore::new(1, report("exam-1"));
        let rendezvous = CorrectionRendezvous::new(Duration::from_millis(5), 3);

        let got = rendezvous
            .await_result(&store, "exam-1", "marie.curie@exam.local", None)
            .await
            .expect("report");
        assert_eq!(got.exam_id, "exam-1");
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn polls_until_result_arrives() {
        let store = ScriptedStore::new(3, report("exam-1"));
        let rendezvous = CorrectionRendezvous::new(Duration::from_millis(2), 5);

        let got = rendezvous
            .await_result(&store, "exam-1", "marie.curie@exam.local", None)
            .await
            .expect("report");
        assert_eq!(got.score_total, Some(33.0));
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn times_out_after_budget() {
        let store = ScriptedStore::new(u32::MAX, report("exam-1"));
        let rendezvous = CorrectionRendezvous::new(Duration::from_millis(1), 4);

        let err = rendezvous
            .await_result(&store, "exam-1", "marie.curie@exam.local", None)
            .await
            .expect_err("timeout");
        assert!(matches!(err, RendezvousError::Timeout));
        assert_eq!(store.calls.load(Ordering::SeqCst), 4);
    }
}
