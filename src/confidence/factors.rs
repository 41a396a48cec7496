//! Pure sub-score functions feeding [`ConfidenceFactors`]
//!
//! Each function is deterministic, local, and independently testable.
//! They produce three of the five factors; consistency and AI response
//! quality are assessed by the caller.

use crate::session::SessionSummary;

/// Placeholder and boilerplate markers penalized in AI output
const PLACEHOLDER_MARKERS: &[&str] = &[
    "lorem ipsum",
    "[insert",
    "[placeholder",
    "your text here",
    "to be determined",
    "tbd",
    "todo",
    "n/a",
    "xxx",
];

/// Input-quality factor from validation facts.
///
/// Word-count component up to 40 (scaled against a 300-word reference),
/// distinct-term component up to 30 (saturating at 10 hits), semantic
/// component up to 30.
pub fn input_quality_score(
    word_count: usize,
    professional_term_hits: usize,
    semantic_confidence: f64,
) -> f64 {
    let word_component = (word_count as f64 / 300.0).min(1.0) * 40.0;
    let term_component = (professional_term_hits.min(10) as f64 / 10.0) * 30.0;
    let semantic_component = semantic_confidence.clamp(0.0, 1.0) * 30.0;

    (word_component + term_component + semantic_component).clamp(0.0, 100.0)
}

/// Processing-success factor from a frozen session summary.
///
/// Success-rate component up to 40, elapsed-time component bucketed
/// against a realistic-latency window (full credit inside 500ms-30s),
/// and 30 points for completing without a fallback.
pub fn processing_success_score(summary: &SessionSummary) -> f64 {
    let success_component = summary.success_rate * 40.0;
    let time_component = elapsed_time_score(summary.duration_ms);
    let fallback_component = if summary.fallback_used { 0.0 } else { 30.0 };

    (success_component + time_component + fallback_component).clamp(0.0, 100.0)
}

/// Bucketed elapsed-time credit. Suspiciously fast and very slow
/// operations both earn less than the realistic window.
fn elapsed_time_score(duration_ms: u64) -> f64 {
    match duration_ms {
        0..=499 => 20.0,
        500..=30_000 => 30.0,
        30_001..=60_000 => 20.0,
        _ => 10.0,
    }
}

/// Output-quality factor for a structured AI result.
///
/// Starts at 100 and applies penalties: 20 per missing or empty required
/// field, 15 per detected placeholder marker, 10 per out-of-range numeric
/// claim (percentage outside [0, 100], negative count/years).
pub fn output_quality_score(output: &serde_json::Value, required_fields: &[&str]) -> f64 {
    let mut score = 100.0;

    for field in required_fields {
        if field_missing_or_empty(output, field) {
            score -= 20.0;
        }
    }

    let haystack = output.to_string().to_lowercase();
    for marker in PLACEHOLDER_MARKERS {
        if haystack.contains(marker) {
            score -= 15.0;
        }
    }

    score -= 10.0 * out_of_range_claims(output) as f64;

    score.clamp(0.0, 100.0)
}

fn field_missing_or_empty(output: &serde_json::Value, field: &str) -> bool {
    match output.get(field) {
        None => true,
        Some(serde_json::Value::Null) => true,
        Some(serde_json::Value::String(s)) => s.trim().is_empty(),
        Some(serde_json::Value::Array(a)) => a.is_empty(),
        Some(_) => false,
    }
}

/// Count numeric values whose key promises a range they violate
fn out_of_range_claims(value: &serde_json::Value) -> usize {
    let mut count = 0;
    walk_numeric_claims(value, None, &mut count);
    count
}

fn walk_numeric_claims(value: &serde_json::Value, key: Option<&str>, count: &mut usize) {
    match value {
        serde_json::Value::Object(map) => {
            for (k, v) in map {
                walk_numeric_claims(v, Some(k), count);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                walk_numeric_claims(item, key, count);
            }
        }
        serde_json::Value::Number(n) => {
            let Some(key) = key else { return };
            let Some(n) = n.as_f64() else { return };
            let key = key.to_lowercase();

            let is_percent =
                key.contains("percent") || key.ends_with("_pct") || key.contains("percentage");
            let is_count = key.contains("count") || key.contains("years");

            if is_percent && !(0.0..=100.0).contains(&n) {
                *count += 1;
            } else if is_count && n < 0.0 {
                *count += 1;
            }
        }
        _ => {}
    }
}
