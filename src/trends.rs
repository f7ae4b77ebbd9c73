use chrono::SecondsFormat;
use mcp_governance_controller_core::{EvaluationResult, Severity};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

const MAX_TREND_POINTS: usize = 100;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub timestamp: String,
    pub score: u32,
    pub findings: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// Append-only score history with a bounded tail. Recorded only by the
/// orchestrator; the read API copies the tail out under a short read-hold.
#[derive(Clone, Default)]
pub struct TrendHistory {
    points: Arc<RwLock<Vec<TrendPoint>>>,
}

impl TrendHistory {
    pub fn record(&self, result: &EvaluationResult) {
        let mut counts = [0usize; 4];
        for f in &result.findings {
            match f.severity {
                Severity::Critical => counts[0] += 1,
                Severity::High => counts[1] += 1,
                Severity::Medium => counts[2] += 1,
                Severity::Low => counts[3] += 1,
            }
        }
        let point = TrendPoint {
            timestamp: result.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            score: result.score,
            findings: result.findings.len(),
            critical: counts[0],
            high: counts[1],
            medium: counts[2],
            low: counts[3],
        };

        let mut points = self.points.write();
        points.push(point);
        let len = points.len();
        if len > MAX_TREND_POINTS {
            points.drain(..len - MAX_TREND_POINTS);
        }
    }

    pub fn points(&self) -> Vec<TrendPoint> {
        self.points.read().clone()
    }
}
