use crate::ai::{AiGate, AiScorer};
use crate::metrics::Metrics;
use crate::state::SharedState;
use crate::status::StatusWriter;
use crate::trends::TrendHistory;
use chrono::Utc;
use mcp_governance_controller_core::{evaluate, Policy};
use mcp_governance_controller_inventory::SharedInventory;
use mcp_governance_controller_k8s_discovery::{simulated_state, Discoverer};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Glues discovery, the pure pipeline, and the external collaborators:
/// one full evaluation per trigger, reconciles strictly serialised.
pub(crate) struct Orchestrator {
    /// None runs against the simulated snapshot (no reachable cluster).
    pub(crate) discoverer: Option<Discoverer>,
    pub(crate) shared: SharedState,
    pub(crate) trends: TrendHistory,
    pub(crate) inventory: SharedInventory,
    pub(crate) status_writer: Option<StatusWriter>,
    pub(crate) metrics: Metrics,
    pub(crate) ai_scorer: Option<Box<dyn AiScorer>>,
    pub(crate) ai_gate: Option<AiGate>,
    pub(crate) ai_result: Arc<RwLock<Option<serde_json::Value>>>,
}

impl Orchestrator {
    pub(crate) async fn run(mut self, mut triggers: mpsc::UnboundedReceiver<String>) {
        while let Some(reason) = triggers.recv().await {
            self.reconcile(&reason).await;
        }
    }

    pub(crate) async fn reconcile(&mut self, reason: &str) {
        let (state, policy) = match &self.discoverer {
            Some(discoverer) => (
                discoverer.snapshot().await,
                discoverer.resolve_policy().await,
            ),
            None => (simulated_state(), Policy::default()),
        };

        let filtered =
            state.filter_by_namespaces(&policy.target_namespaces, &policy.exclude_namespaces);
        let result = evaluate(&filtered, &policy, self.inventory.catalog_scores(), Utc::now());
        tracing::info!(
            %reason,
            score = result.score,
            findings = result.findings.len(),
            servers = result.mcp_server_views.len(),
            "evaluation complete",
        );

        self.metrics.observe(&result);
        self.trends.record(&result);

        if let Some(writer) = &self.status_writer {
            if let Err(error) = writer.update_policy_status(&policy.name, &result).await {
                tracing::warn!(%error, "failed to update policy status");
            }
        }

        if policy.ai_agent.enabled {
            if let Some(scorer) = &self.ai_scorer {
                let gate = self.ai_gate.get_or_insert_with(|| {
                    AiGate::new(&policy.ai_agent.scan_interval, policy.ai_agent.scan_enabled)
                });
                if gate.should_run(Utc::now()) {
                    match scorer.evaluate(&filtered, &policy, &result).await {
                        Ok(value) => {
                            gate.record_success();
                            *self.ai_result.write() = Some(value);
                        }
                        Err(error) => {
                            gate.record_failure();
                            tracing::warn!(%error, backoff = ?gate.backoff(), "AI evaluation failed");
                        }
                    }
                }
            }
        }

        self.shared.publish(state, policy, result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_governance_controller_core::{ClusterState, EvaluationResult};
    use mcp_governance_controller_inventory::{Inventory, ScoringPolicy};

    fn orchestrator() -> Orchestrator {
        Orchestrator {
            discoverer: None,
            shared: SharedState::default(),
            trends: TrendHistory::default(),
            inventory: Inventory::shared(ScoringPolicy::default(), None),
            status_writer: None,
            metrics: Metrics::default(),
            ai_scorer: None,
            ai_gate: None,
            ai_result: Arc::new(RwLock::new(None)),
        }
    }

    #[tokio::test]
    async fn simulated_reconcile_publishes_everything() {
        let mut orchestrator = orchestrator();
        orchestrator.reconcile("startup").await;

        let snapshot = orchestrator.shared.snapshot();
        let result = snapshot.result.expect("result published");
        assert!(result.score <= 100);
        assert!(!result.mcp_server_views.is_empty());
        assert_eq!(orchestrator.trends.points().len(), 1);
        assert!(snapshot.cluster.is_some());
    }

    #[tokio::test]
    async fn ai_scorer_output_is_stored_opaquely() {
        struct CannedScorer;
        #[async_trait::async_trait]
        impl AiScorer for CannedScorer {
            async fn evaluate(
                &self,
                _state: &ClusterState,
                _policy: &Policy,
                _result: &EvaluationResult,
            ) -> anyhow::Result<serde_json::Value> {
                Ok(serde_json::json!({"score": 85, "grade": "B"}))
            }
        }

        let mut orchestrator = orchestrator();
        orchestrator.ai_scorer = Some(Box::new(CannedScorer));
        // Simulated-mode policy does not enable the AI agent, so nothing is
        // stored even with a scorer wired in.
        orchestrator.reconcile("startup").await;
        assert!(orchestrator.ai_result.read().is_none());
    }
}
