//! Per-operation AI call accounting

pub mod models;
pub mod tracker;

pub use models::{
    AccountingError, AiCallRecord, CallKind, ProcessingSession, QualityTag, SessionSnapshot,
    SessionSummary,
};
pub use tracker::{SessionConfig, SessionTracker};
