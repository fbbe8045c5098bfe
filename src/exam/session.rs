//! Exam session state machine.
//!
//! One student's attempt moves through an explicit phase value; every
//! change goes through the pure [`transition`] function and is applied
//! under the registry lock, never through ambient mutable flags. The
//! registry is also the atomic guard that prevents two concurrent
//! submissions for the same attempt.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::RwLock;

use crate::exam::answers::{AnswerMap, AnswerStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Phase {
    LoggedOut,
    Browsing,
    Generating,
    Answering,
    Submitting,
    AwaitingCorrection,
    Reviewing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    LoggedIn,
    GenerationRequested,
    GenerationSucceeded,
    GenerationFailed,
    /// Resuming an existing ready attempt from storage.
    AttemptLoaded,
    /// Resuming an attempt that already has a correction.
    ResultLoaded,
    SubmitRequested,
    SubmissionDispatched,
    SubmissionFailed,
    CorrectionArrived,
    CorrectionTimedOut,
    CorrectionCancelled,
    ReviseRequested,
    ReturnedToBrowsing,
    LoggedOut,
}

#[derive(Debug, Error)]
pub(crate) enum SessionError {
    #[error("cannot apply {event:?} while {from:?}")]
    InvalidTransition { from: Phase, event: Event },
    #[error("no attempt is loaded in this session")]
    NoAttempt,
    #[error("cannot submit an empty answer set")]
    EmptyAnswers,
    #[error("a submission for this attempt is already in flight")]
    SubmissionInFlight,
    #[error("answers are read-only while {0:?}")]
    AnswersLocked(Phase),
}

/// Pure transition table. Loading an attempt from storage is allowed
/// from any idle phase (browsing, answering, reviewing) so a page
/// refresh or a switch from the attempt list never dead-ends; phases
/// with an operation in flight (generating, submitting, awaiting
/// correction) stay locked until that operation resolves.
pub(crate) fn transition(phase: Phase, event: Event) -> Result<Phase, SessionError> {
    use Event as E;
    use Phase as P;

    let next = match (phase, event) {
        (P::LoggedOut, E::LoggedIn) => P::Browsing,
        (P::Browsing, E::GenerationRequested) => P::Generating,
        (P::Generating, E::GenerationSucceeded) => P::Answering,
        (P::Generating, E::GenerationFailed) => P::Browsing,
        (P::Browsing | P::Answering | P::Reviewing, E::AttemptLoaded) => P::Answering,
        (P::Browsing | P::Answering | P::Reviewing, E::ResultLoaded) => P::Reviewing,
        (P::Answering, E::SubmitRequested) => P::Submitting,
        (P::Submitting, E::SubmissionDispatched) => P::AwaitingCorrection,
        (P::Submitting, E::SubmissionFailed) => P::Answering,
        (P::AwaitingCorrection, E::CorrectionArrived) => P::Reviewing,
        (P::AwaitingCorrection, E::CorrectionTimedOut) => P::Answering,
        (P::AwaitingCorrection, E::CorrectionCancelled) => P::Answering,
        (P::Reviewing, E::ReviseRequested) => P::Answering,
        (P::Answering | P::Reviewing, E::ReturnedToBrowsing) => P::Browsing,
        (_, E::LoggedOut) => P::LoggedOut,
        (from, event) => return Err(SessionError::InvalidTransition { from, event }),
    };

    Ok(next)
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AttemptRef {
    pub(crate) exam_id: String,
    pub(crate) track: String,
    pub(crate) submitted_once: bool,
}

#[derive(Debug)]
pub(crate) struct Session {
    pub(crate) student_id: String,
    pub(crate) phase: Phase,
    pub(crate) attempt: Option<AttemptRef>,
    pub(crate) answers: AnswerStore,
    /// Bumped on every applied event; an in-flight correction poll is
    /// only allowed to land if the revision it captured is still
    /// current.
    pub(crate) revision: u64,
    pending_track: Option<String>,
}

impl Session {
    fn new(student_id: &str) -> Self {
        Self {
            student_id: student_id.to_string(),
            phase: Phase::Browsing,
            attempt: None,
            answers: AnswerStore::new(),
            revision: 0,
            pending_track: None,
        }
    }

    fn apply(&mut self, event: Event) -> Result<(), SessionError> {
        self.phase = transition(self.phase, event)?;
        self.revision += 1;
        Ok(())
    }

    pub(crate) fn attempt_ref(&self) -> Result<&AttemptRef, SessionError> {
        self.attempt.as_ref().ok_or(SessionError::NoAttempt)
    }

    pub(crate) fn begin_generation(&mut self, track: &str) -> Result<(), SessionError> {
        self.apply(Event::GenerationRequested)?;
        self.pending_track = Some(track.to_string());
        self.attempt = None;
        self.answers.clear();
        Ok(())
    }

    pub(crate) fn generation_succeeded(&mut self, exam_id: &str) -> Result<(), SessionError> {
        self.apply(Event::GenerationSucceeded)?;
        let track = self.pending_track.take().unwrap_or_default();
        self.attempt =
            Some(AttemptRef { exam_id: exam_id.to_string(), track, submitted_once: false });
        Ok(())
    }

    pub(crate) fn generation_failed(&mut self) -> Result<(), SessionError> {
        self.pending_track = None;
        self.apply(Event::GenerationFailed)
    }

    pub(crate) fn load_attempt(
        &mut self,
        exam_id: &str,
        track: &str,
        saved: &AnswerMap,
        submitted_once: bool,
        has_correction: bool,
    ) -> Result<(), SessionError> {
        let event = if has_correction { Event::ResultLoaded } else { Event::AttemptLoaded };
        self.apply(event)?;
        self.attempt = Some(AttemptRef {
            exam_id: exam_id.to_string(),
            track: track.to_string(),
            submitted_once,
        });
        self.answers.clear();
        self.answers.load_from(saved);
        Ok(())
    }

    pub(crate) fn set_answer(&mut self, question_key: &str, text: &str) -> Result<(), SessionError> {
        if self.phase != Phase::Answering {
            return Err(SessionError::AnswersLocked(self.phase));
        }
        self.answers.set(question_key, text);
        Ok(())
    }

    /// Atomic submit guard: rejects empty answer sets and refuses a
    /// second submission while one is in flight.
    pub(crate) fn begin_submission(&mut self) -> Result<AnswerMap, SessionError> {
        if matches!(self.phase, Phase::Submitting | Phase::AwaitingCorrection) {
            return Err(SessionError::SubmissionInFlight);
        }
        self.attempt_ref()?;
        if self.answers.is_empty() {
            return Err(SessionError::EmptyAnswers);
        }
        self.apply(Event::SubmitRequested)?;
        Ok(self.answers.get_all())
    }

    pub(crate) fn submission_dispatched(&mut self) -> Result<u64, SessionError> {
        self.apply(Event::SubmissionDispatched)?;
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.submitted_once = true;
        }
        Ok(self.revision)
    }

    pub(crate) fn submission_failed(&mut self) -> Result<(), SessionError> {
        self.apply(Event::SubmissionFailed)
    }

    /// Apply a rendezvous outcome. A result from a cancelled or
    /// superseded poll, or for a different attempt, is discarded.
    pub(crate) fn correction_arrived(&mut self, exam_id: &str, captured_revision: u64) -> bool {
        if self.revision != captured_revision {
            return false;
        }
        let matches_attempt =
            self.attempt.as_ref().is_some_and(|attempt| attempt.exam_id == exam_id);
        if !matches_attempt {
            return false;
        }
        self.apply(Event::CorrectionArrived).is_ok()
    }

    pub(crate) fn correction_timed_out(&mut self) -> Result<(), SessionError> {
        self.apply(Event::CorrectionTimedOut)
    }

    pub(crate) fn cancel_correction(&mut self) -> Result<(), SessionError> {
        self.apply(Event::CorrectionCancelled)
    }

    pub(crate) fn revise(&mut self, saved: &AnswerMap) -> Result<(), SessionError> {
        self.apply(Event::ReviseRequested)?;
        self.answers.load_from(saved);
        Ok(())
    }

    pub(crate) fn return_to_browsing(&mut self) -> Result<(), SessionError> {
        self.apply(Event::ReturnedToBrowsing)?;
        self.attempt = None;
        self.answers.clear();
        Ok(())
    }
}

/// In-memory sessions, one per authenticated student id. All event
/// application happens under the write lock, which makes phase checks
/// and transitions atomic with respect to concurrent requests.
#[derive(Debug, Default)]
pub(crate) struct SessionRegistry {
    inner: RwLock<HashMap<String, Session>>,
}

impl SessionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn login(&self, student_id: &str) {
        let mut sessions = self.inner.write().await;
        sessions.insert(student_id.to_string(), Session::new(student_id));
    }

    pub(crate) async fn logout(&self, student_id: &str) {
        let mut sessions = self.inner.write().await;
        sessions.remove(student_id);
    }

    /// Run a closure against the student's session under the write
    /// lock. A missing entry (e.g. after a process restart with a still
    /// valid token) is recreated in the browsing phase so the student
    /// resumes from storage.
    pub(crate) async fn with_session<T>(
        &self,
        student_id: &str,
        apply: impl FnOnce(&mut Session) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        let mut sessions = self.inner.write().await;
        let session = sessions
            .entry(student_id.to_string())
            .or_insert_with(|| Session::new(student_id));
        apply(session)
    }

    pub(crate) async fn phase(&self, student_id: &str) -> Phase {
        let sessions = self.inner.read().await;
        sessions.get(student_id).map_or(Phase::LoggedOut, |session| session.phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers(pairs: &[(&str, &str)]) -> AnswerMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn answering_session() -> Session {
        let mut session = Session::new("s1");
        session.begin_generation("Science Physique").expect("generate");
        session.generation_succeeded("E1").expect("ready");
        session
    }

    #[test]
    fn full_forward_walk() {
        let mut session = answering_session();
        assert_eq!(session.phase, Phase::Answering);

        session.set_answer("comp_1_0", "Paris").expect("edit");
        session.begin_submission().expect("submit");
        assert_eq!(session.phase, Phase::Submitting);

        let revision = session.submission_dispatched().expect("dispatch");
        assert_eq!(session.phase, Phase::AwaitingCorrection);

        assert!(session.correction_arrived("E1", revision));
        assert_eq!(session.phase, Phase::Reviewing);

        session.return_to_browsing().expect("return");
        assert_eq!(session.phase, Phase::Browsing);
        assert!(session.attempt.is_none());
    }

    #[test]
    fn generation_failure_returns_to_browsing() {
        let mut session = Session::new("s1");
        session.begin_generation("SVT").expect("generate");
        session.generation_failed().expect("failed");
        assert_eq!(session.phase, Phase::Browsing);
        assert!(session.attempt.is_none());
    }

    #[test]
    fn empty_submission_is_rejected_in_answering() {
        let mut session = answering_session();
        let err = session.begin_submission().expect_err("must reject");
        assert!(matches!(err, SessionError::EmptyAnswers));
        assert_eq!(session.phase, Phase::Answering);
    }

    #[test]
    fn double_submission_is_guarded() {
        let mut session = answering_session();
        session.set_answer("writing_1", "essay").expect("edit");
        session.begin_submission().expect("first");
        let err = session.begin_submission().expect_err("second must fail");
        assert!(matches!(err, SessionError::SubmissionInFlight));
    }

    #[test]
    fn answers_are_locked_outside_answering() {
        let mut session = Session::new("s1");
        let err = session.set_answer("comp_1_0", "x").expect_err("locked");
        assert!(matches!(err, SessionError::AnswersLocked(Phase::Browsing)));
    }

    #[test]
    fn stale_correction_is_discarded() {
        let mut session = answering_session();
        session.set_answer("comp_1_0", "Paris").expect("edit");
        session.begin_submission().expect("submit");
        let revision = session.submission_dispatched().expect("dispatch");

        session.cancel_correction().expect("cancel");
        assert!(!session.correction_arrived("E1", revision));
        assert_eq!(session.phase, Phase::Answering);
    }

    #[test]
    fn mismatched_exam_correction_is_discarded() {
        let mut session = answering_session();
        session.set_answer("comp_1_0", "Paris").expect("edit");
        session.begin_submission().expect("submit");
        let revision = session.submission_dispatched().expect("dispatch");

        assert!(!session.correction_arrived("E2", revision));
        assert_eq!(session.phase, Phase::AwaitingCorrection);
    }

    #[test]
    fn timeout_returns_to_answering() {
        let mut session = answering_session();
        session.set_answer("comp_1_0", "Paris").expect("edit");
        session.begin_submission().expect("submit");
        session.submission_dispatched().expect("dispatch");

        session.correction_timed_out().expect("timeout");
        assert_eq!(session.phase, Phase::Answering);
    }

    #[test]
    fn revise_reloads_answers_with_migration() {
        let mut session = answering_session();
        session.set_answer("comp_1_0", "Paris").expect("edit");
        session.begin_submission().expect("submit");
        let revision = session.submission_dispatched().expect("dispatch");
        assert!(session.correction_arrived("E1", revision));

        session.revise(&answers(&[("lang_match_7", "1-a")])).expect("revise");
        assert_eq!(session.phase, Phase::Answering);
        assert_eq!(session.answers.get_all().get("lang_7_0").map(String::as_str), Some("1-a"));
        assert!(session.attempt.as_ref().unwrap().submitted_once);
    }

    #[test]
    fn reopening_attempt_while_answering_reloads_saved_answers() {
        let mut session = answering_session();
        session.set_answer("comp_1_0", "draft not yet flushed").expect("edit");

        // Page refresh: the handler reloads the same attempt from
        // storage.
        session
            .load_attempt("E1", "Science Physique", &answers(&[("comp_1_0", "Paris")]), false, false)
            .expect("reload");
        assert_eq!(session.phase, Phase::Answering);
        assert_eq!(session.answers.get_all().get("comp_1_0").map(String::as_str), Some("Paris"));
    }

    #[test]
    fn switching_attempts_from_reviewing_loads_the_other_attempt() {
        let mut session = answering_session();
        session.set_answer("comp_1_0", "Paris").expect("edit");
        session.begin_submission().expect("submit");
        let revision = session.submission_dispatched().expect("dispatch");
        assert!(session.correction_arrived("E1", revision));

        session.load_attempt("E2", "SVT", &answers(&[]), false, false).expect("switch");
        assert_eq!(session.phase, Phase::Answering);
        assert_eq!(session.attempt.as_ref().unwrap().exam_id, "E2");
        assert!(session.answers.is_empty());
    }

    #[test]
    fn answering_can_return_to_browsing() {
        let mut session = answering_session();
        session.return_to_browsing().expect("return");
        assert_eq!(session.phase, Phase::Browsing);
        assert!(session.attempt.is_none());
    }

    #[test]
    fn loads_stay_locked_while_awaiting_correction() {
        let mut session = answering_session();
        session.set_answer("comp_1_0", "Paris").expect("edit");
        session.begin_submission().expect("submit");
        session.submission_dispatched().expect("dispatch");

        let err = session
            .load_attempt("E2", "SVT", &answers(&[]), false, false)
            .expect_err("locked while awaiting");
        assert!(matches!(err, SessionError::InvalidTransition { .. }));
        assert_eq!(session.phase, Phase::AwaitingCorrection);
    }

    #[test]
    fn resume_with_existing_correction_goes_to_reviewing() {
        let mut session = Session::new("s1");
        session
            .load_attempt("E1", "SVT", &answers(&[("comp_1_0", "Paris")]), true, true)
            .expect("load");
        assert_eq!(session.phase, Phase::Reviewing);
    }

    #[test]
    fn invalid_transition_reports_phase_and_event() {
        let err = transition(Phase::Browsing, Event::SubmitRequested).expect_err("invalid");
        assert!(matches!(
            err,
            SessionError::InvalidTransition { from: Phase::Browsing, event: Event::SubmitRequested }
        ));
    }

    #[tokio::test]
    async fn registry_recreates_missing_sessions_in_browsing() {
        let registry = SessionRegistry::new();
        let phase = registry
            .with_session("ghost", |session| Ok(session.phase))
            .await
            .expect("session");
        assert_eq!(phase, Phase::Browsing);
    }

    #[tokio::test]
    async fn registry_login_and_logout() {
        let registry = SessionRegistry::new();
        registry.login("s1").await;
        assert_eq!(registry.phase("s1").await, Phase::Browsing);
        registry.logout("s1").await;
        assert_eq!(registry.phase("s1").await, Phase::LoggedOut);
    }
}
