use mcp_governance_controller_core::{ClusterState, EvaluationResult, Policy};
use parking_lot::RwLock;
use std::sync::Arc;

/// The last published result, cluster state, and policy: one logical atom.
/// Readers take a single read-hold and copy the handles out; the
/// orchestrator replaces all three together after each reconcile.
#[derive(Clone, Default)]
pub struct SharedState {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    result: Option<Arc<EvaluationResult>>,
    cluster: Option<Arc<ClusterState>>,
    policy: Policy,
}

/// A consistent read of the shared state, safe to iterate after the lock is
/// released.
#[derive(Clone)]
pub struct StateSnapshot {
    pub result: Option<Arc<EvaluationResult>>,
    pub cluster: Option<Arc<ClusterState>>,
    pub policy: Policy,
}

impl SharedState {
    pub fn publish(&self, cluster: ClusterState, policy: Policy, result: EvaluationResult) {
        let mut inner = self.inner.write();
        inner.result = Some(Arc::new(result));
        inner.cluster = Some(Arc::new(cluster));
        inner.policy = policy;
    }

    pub fn snapshot(&self) -> StateSnapshot {
        let inner = self.inner.read();
        StateSnapshot {
            result: inner.result.clone(),
            cluster: inner.cluster.clone(),
            policy: inner.policy.clone(),
        }
    }
}
