use mcp_governance_controller_core::EvaluationResult;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

/// Evaluation metrics served from the admin endpoint.
#[derive(Clone, Debug, Default)]
pub(crate) struct Metrics {
    evaluations: Counter,
    score: Gauge,
    findings: Gauge,
    mcp_servers: Gauge,
}

impl Metrics {
    pub(crate) fn register(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register(
            "evaluations",
            "Completed governance evaluations",
            metrics.evaluations.clone(),
        );
        registry.register(
            "cluster_score",
            "Overall governance score of the last evaluation",
            metrics.score.clone(),
        );
        registry.register(
            "findings",
            "Findings in the last evaluation, post-suppression",
            metrics.findings.clone(),
        );
        registry.register(
            "mcp_servers",
            "MCP server views in the last evaluation",
            metrics.mcp_servers.clone(),
        );
        metrics
    }

    pub(crate) fn observe(&self, result: &EvaluationResult) {
        self.evaluations.inc();
        self.score.set(result.score as i64);
        self.findings.set(result.findings.len() as i64);
        self.mcp_servers.set(result.mcp_server_views.len() as i64);
    }
}
