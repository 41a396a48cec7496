//! Data models for AI call accounting

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of AI call recorded against a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Embedding,
    Completion,
}

impl CallKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedding => "embedding",
            Self::Completion => "completion",
        }
    }
}

/// Caller-assessed quality of one AI response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTag {
    High,
    Medium,
    Low,
}

/// One AI call within a session. Owned exclusively by its parent session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiCallRecord {
    pub id: Uuid,
    pub model: String,
    pub kind: CallKind,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub tokens_used: Option<u64>,
    pub succeeded: bool,
    pub error_message: Option<String>,
    pub quality_tag: Option<QualityTag>,
}

impl AiCallRecord {
    pub fn new(model: &str, kind: CallKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            model: model.to_string(),
            kind,
            started_at: Utc::now(),
            ended_at: None,
            tokens_used: None,
            succeeded: false,
            error_message: None,
            quality_tag: None,
        }
    }

    /// True while the call has been started but not yet ended
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Accounting unit for one logical caller operation.
/// Single-writer while live; frozen once `ended_at` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingSession {
    pub id: Uuid,
    pub operation_kind: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub calls: Vec<AiCallRecord>,
    pub input_quality_score: Option<f64>,
    pub output_confidence_score: Option<f64>,
    pub fallback_used: bool,
    pub fallback_reason: Option<String>,
    pub metadata: IndexMap<String, serde_json::Value>,
}

impl ProcessingSession {
    pub fn new(operation_kind: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation_kind: operation_kind.to_string(),
            started_at: Utc::now(),
            ended_at: None,
            calls: Vec::new(),
            input_quality_score: None,
            output_confidence_score: None,
            fallback_used: false,
            fallback_reason: None,
            metadata: IndexMap::new(),
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Aggregate facts, computed when the session is frozen
    pub fn summary(&self) -> SessionSummary {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        let duration_ms = (end - self.started_at).num_milliseconds().max(0) as u64;

        let total_calls = self.calls.len();
        let succeeded_calls = self.calls.iter().filter(|c| c.succeeded).count();
        let success_rate = if total_calls == 0 {
            0.0
        } else {
            succeeded_calls as f64 / total_calls as f64
        };
        let total_tokens: u64 = self.calls.iter().filter_map(|c| c.tokens_used).sum();

        SessionSummary {
            session_id: self.id,
            operation_kind: self.operation_kind.clone(),
            duration_ms,
            total_calls,
            succeeded_calls,
            success_rate,
            total_tokens,
            fallback_used: self.fallback_used,
        }
    }

    /// Read-only view served by `get_metadata`
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            operation_kind: self.operation_kind.clone(),
            started_at: self.started_at,
            ended_at: self.ended_at,
            call_count: self.calls.len(),
            input_quality_score: self.input_quality_score,
            output_confidence_score: self.output_confidence_score,
            fallback_used: self.fallback_used,
            metadata: self.metadata.clone(),
        }
    }
}

/// Frozen aggregate facts for one completed session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub operation_kind: String,
    pub duration_ms: u64,
    pub total_calls: usize,
    pub succeeded_calls: usize,
    pub success_rate: f64,
    pub total_tokens: u64,
    pub fallback_used: bool,
}

/// Read-only session view for live and recently-completed sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub operation_kind: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub call_count: usize,
    pub input_quality_score: Option<f64>,
    pub output_confidence_score: Option<f64>,
    pub fallback_used: bool,
    pub metadata: IndexMap<String, serde_json::Value>,
}

/// Accounting errors: reported explicitly so callers can detect
/// programming errors, never silently ignored
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountingError {
    #[error("session {0} not found")]
    SessionNotFound(Uuid),

    #[error("session {0} already ended")]
    SessionEnded(Uuid),

    #[error("call {call_id} not found in session {session_id}")]
    CallNotFound { session_id: Uuid, call_id: Uuid },

    #[error("call {call_id} in session {session_id} already ended")]
    CallAlreadyEnded { session_id: Uuid, call_id: Uuid },
}
