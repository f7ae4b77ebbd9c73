//! The AI scoring side-channel seam. The controller never interprets the
//! side-channel's output: a provider receives the evaluation inputs and
//! returns an opaque JSON value which is served back verbatim. What lives
//! here is the seam itself plus the pacing state that keeps providers from
//! being hammered.

use chrono::{DateTime, Duration, Utc};
use mcp_governance_controller_core::{ClusterState, EvaluationResult, Policy};

/// A provider for the AI scoring side-channel.
#[async_trait::async_trait]
pub trait AiScorer: Send + Sync {
    async fn evaluate(
        &self,
        state: &ClusterState,
        policy: &Policy,
        result: &EvaluationResult,
    ) -> anyhow::Result<serde_json::Value>;
}

const DEFAULT_MIN_INTERVAL_SECS: i64 = 300;
const MAX_BACKOFF_SECS: i64 = 1800;

/// Rate-limit and backoff bookkeeping for the side-channel: at most one run
/// per interval, exponential backoff on failure (doubled, capped at 30
/// minutes), reset on success. Provider failures only slow the side-channel
/// down; evaluation outputs are never affected.
pub struct AiGate {
    min_interval: Duration,
    backoff: Option<Duration>,
    last_run: Option<DateTime<Utc>>,
    pub paused: bool,
}

impl AiGate {
    pub fn new(scan_interval: &str, scan_enabled: bool) -> Self {
        let min_interval = parse_interval(scan_interval)
            .filter(|d| *d >= Duration::minutes(1))
            .unwrap_or_else(|| Duration::seconds(DEFAULT_MIN_INTERVAL_SECS));
        Self {
            min_interval,
            backoff: None,
            last_run: None,
            paused: !scan_enabled,
        }
    }

    /// Whether a periodic run may start now. Claims the slot when it returns
    /// true.
    pub fn should_run(&mut self, now: DateTime<Utc>) -> bool {
        if self.paused {
            return false;
        }
        let interval = self.backoff.map_or(self.min_interval, |b| b.max(self.min_interval));
        if let Some(last) = self.last_run {
            if now - last < interval {
                return false;
            }
        }
        self.last_run = Some(now);
        true
    }

    pub fn record_success(&mut self) {
        self.backoff = None;
    }

    pub fn record_failure(&mut self) {
        let next = match self.backoff {
            None => self.min_interval,
            Some(current) => (current * 2).min(Duration::seconds(MAX_BACKOFF_SECS)),
        };
        self.backoff = Some(next);
    }

    pub fn backoff(&self) -> Option<Duration> {
        self.backoff
    }
}

/// Parses intervals of the "30s" / "5m" / "1h" form.
fn parse_interval(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let (value, unit) = s.split_at(s.len() - 1);
    let value: i64 = value.parse().ok()?;
    match unit {
        "s" => Some(Duration::seconds(value)),
        "m" => Some(Duration::minutes(value)),
        "h" => Some(Duration::hours(value)),
        _ => None,
    }
}
