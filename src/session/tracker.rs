//! Session store for per-operation AI call accounting
//!
//! Live sessions are keyed by id in a concurrent map whose per-entry locking
//! serializes mutation of the same session while unrelated sessions proceed
//! in parallel. Completed sessions move to a bounded ring buffer for
//! diagnostics and are evicted oldest-first.

use super::models::{
    AccountingError, AiCallRecord, CallKind, ProcessingSession, QualityTag, SessionSnapshot,
    SessionSummary,
};
use crate::metrics::METRICS;
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Session tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Completed sessions retained for diagnostics
    #[serde(default = "default_max_completed")]
    pub max_completed_sessions: usize,
}

fn default_max_completed() -> usize { 1000 }

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_completed_sessions: default_max_completed(),
        }
    }
}

impl SessionConfig {
    /// Load configuration overrides from environment variables
    pub fn from_env(mut self) -> Self {
        if let Ok(val) = std::env::var("AI_RELIABILITY_MAX_COMPLETED_SESSIONS") {
            if let Ok(max) = val.parse() {
                self.max_completed_sessions = max;
            }
        }
        self
    }
}

/// Tracks one [`ProcessingSession`] per logical caller operation
pub struct SessionTracker {
    config: SessionConfig,
    live: DashMap<Uuid, ProcessingSession>,
    completed: Mutex<VecDeque<Arc<ProcessingSession>>>,
}

impl SessionTracker {
    /// Create a new session tracker
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            live: DashMap::new(),
            completed: Mutex::new(VecDeque::new()),
        }
    }

    /// Start a session for one logical operation
    pub fn start_session(&self, operation_kind: &str) -> Uuid {
        let session = ProcessingSession::new(operation_kind);
        let id = session.id;
        self.live.insert(id, session);

        METRICS.sessions_started.inc();
        debug!("Session {} started for operation {}", id, operation_kind);

        id
    }

    /// Record the start of an AI call, returning its id
    pub fn record_call_start(
        &self,
        session_id: Uuid,
        model: &str,
        kind: CallKind,
    ) -> Result<Uuid, AccountingError> {
        self.with_live_session(session_id, |session| {
            let call = AiCallRecord::new(model, kind);
            let call_id = call.id;
            session.calls.push(call);
            Ok(call_id)
        })
    }

    /// Record the completion (successful or not) of an AI call
    #[allow(clippy::too_many_arguments)]
    pub fn record_call_end(
        &self,
        session_id: Uuid,
        call_id: Uuid,
        succeeded: bool,
        tokens_used: Option<u64>,
        error_message: Option<String>,
        quality_tag: Option<QualityTag>,
    ) -> Result<(), AccountingError> {
        self.with_live_session(session_id, |session| {
            let call = session
                .calls
                .iter_mut()
                .find(|c| c.id == call_id)
                .ok_or(AccountingError::CallNotFound { session_id, call_id })?;

            if !call.is_open() {
                return Err(AccountingError::CallAlreadyEnded { session_id, call_id });
            }

            call.ended_at = Some(Utc::now());
            call.succeeded = succeeded;
            call.tokens_used = tokens_used;
            call.error_message = error_message;
            call.quality_tag = quality_tag;

            METRICS.record_ai_call(call.kind.as_str(), succeeded, tokens_used);
            Ok(())
        })
    }

    /// Record the input-quality score derived from validation
    pub fn set_input_quality(&self, session_id: Uuid, score: f64) -> Result<(), AccountingError> {
        self.with_live_session(session_id, |session| {
            session.input_quality_score = Some(score.clamp(0.0, 100.0));
            Ok(())
        })
    }

    /// Record the final output confidence score
    pub fn set_output_confidence(&self, session_id: Uuid, score: f64) -> Result<(), AccountingError> {
        self.with_live_session(session_id, |session| {
            session.output_confidence_score = Some(score.clamp(0.0, 100.0));
            Ok(())
        })
    }

    /// Mark that the operation degraded. This is the single place the
    /// flag can be set, so call sites cannot forget it piecemeal.
    pub fn mark_fallback_used(&self, session_id: Uuid, reason: &str) -> Result<(), AccountingError> {
        self.with_live_session(session_id, |session| {
            session.fallback_used = true;
            session.fallback_reason = Some(reason.to_string());
            warn!("Session {} degraded: {}", session_id, reason);
            Ok(())
        })
    }

    /// Attach a metadata entry to a live session
    pub fn set_metadata(
        &self,
        session_id: Uuid,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), AccountingError> {
        self.with_live_session(session_id, |session| {
            session.metadata.insert(key.to_string(), value);
            Ok(())
        })
    }

    /// End a session: freeze it, compute its summary, and retain it in the
    /// completed ring buffer.
    ///
    /// Any call still open is closed as failed first, so a cancelled
    /// operation never silently drops an in-flight call record.
    pub fn end_session(&self, session_id: Uuid) -> Result<SessionSummary, AccountingError> {
        let (_, mut session) = match self.live.remove(&session_id) {
            Some(entry) => entry,
            None => {
                return Err(if self.in_completed(session_id) {
                    AccountingError::SessionEnded(session_id)
                } else {
                    AccountingError::SessionNotFound(session_id)
                });
            }
        };

        let now = Utc::now();
        for call in session.calls.iter_mut().filter(|c| c.is_open()) {
            call.ended_at = Some(now);
            call.succeeded = false;
            call.error_message = Some("aborted: session ended while call in flight".to_string());
            METRICS.record_ai_call(call.kind.as_str(), false, None);
            warn!(
                "Session {} ended with call {} still in flight; recorded as failed",
                session_id, call.id
            );
        }

        session.ended_at = Some(now);
        let summary = session.summary();

        METRICS.sessions_completed.inc();
        info!(
            "Session {} ended: {}/{} calls succeeded, {} tokens, {}ms",
            session_id,
            summary.succeeded_calls,
            summary.total_calls,
            summary.total_tokens,
            summary.duration_ms
        );

        let mut completed = self.completed.lock().unwrap();
        completed.push_back(Arc::new(session));
        while completed.len() > self.config.max_completed_sessions {
            completed.pop_front();
        }

        Ok(summary)
    }

    /// Read-only view of a live or recently-completed session
    pub fn get_metadata(&self, session_id: Uuid) -> Result<SessionSnapshot, AccountingError> {
        if let Some(session) = self.live.get(&session_id) {
            return Ok(session.snapshot());
        }

        self.completed
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == session_id)
            .map(|s| s.snapshot())
            .ok_or(AccountingError::SessionNotFound(session_id))
    }

    /// Frozen summary of a recently-completed session
    pub fn completed_summary(&self, session_id: Uuid) -> Result<SessionSummary, AccountingError> {
        self.completed
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == session_id)
            .map(|s| s.summary())
            .ok_or(AccountingError::SessionNotFound(session_id))
    }

    /// Number of live sessions
    pub fn live_sessions(&self) -> usize {
        self.live.len()
    }

    /// Number of retained completed sessions
    pub fn completed_sessions(&self) -> usize {
        self.completed.lock().unwrap().len()
    }

    fn in_completed(&self, session_id: Uuid) -> bool {
        self.completed
            .lock()
            .unwrap()
            .iter()
            .any(|s| s.id == session_id)
    }

    /// Run a mutation against a live session, distinguishing ended
    /// sessions from unknown ids in the error.
    fn with_live_session<T>(
        &self,
        session_id: Uuid,
        f: impl FnOnce(&mut ProcessingSession) -> Result<T, AccountingError>,
    ) -> Result<T, AccountingError> {
        match self.live.get_mut(&session_id) {
            Some(mut entry) => f(entry.value_mut()),
            None => Err(if self.in_completed(session_id) {
                AccountingError::SessionEnded(session_id)
            } else {
                AccountingError::SessionNotFound(session_id)
            }),
        }
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
