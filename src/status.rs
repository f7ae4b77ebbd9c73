use anyhow::Context;
use chrono::SecondsFormat;
use kube::api::{Api, DynamicObject, ListParams, Patch, PatchParams};
use kube::{Client, ResourceExt};
use mcp_governance_controller_core::EvaluationResult;
use mcp_governance_controller_k8s_api::ResourceKind;
use serde_json::json;
use std::time::Duration;

/// Writes evaluation results back onto the governance-policy object's status
/// subresource. Best-effort with a bounded deadline: failures are logged by
/// the caller at WARN and never affect the published result.
pub(crate) struct StatusWriter {
    client: Client,
    timeout: Duration,
}

impl StatusWriter {
    pub(crate) fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub(crate) async fn update_policy_status(
        &self,
        policy_name: &str,
        result: &EvaluationResult,
    ) -> anyhow::Result<()> {
        if policy_name.is_empty() {
            return Ok(());
        }
        tokio::time::timeout(self.timeout, self.patch(policy_name, result))
            .await
            .with_context(|| format!("patching policy {policy_name} status timed out"))?
    }

    async fn patch(&self, policy_name: &str, result: &EvaluationResult) -> anyhow::Result<()> {
        let patch = json!({
            "status": {
                "phase": phase_for(result.score),
                "clusterScore": result.score,
                "findingsCount": result.findings.len(),
                "lastEvaluationTime": result
                    .timestamp
                    .to_rfc3339_opts(SecondsFormat::Secs, true),
            },
        });

        // The policy object's namespace is not carried on the resolved
        // policy, so locate the object first and patch it where it lives.
        let resource = ResourceKind::GovernancePolicy.api_resource();
        let all: Api<DynamicObject> = Api::all_with(self.client.clone(), &resource);
        let list = all
            .list(&ListParams::default())
            .await
            .context("listing governance policies")?;
        let Some(obj) = list.items.iter().find(|obj| obj.name_any() == policy_name) else {
            tracing::debug!(policy = %policy_name, "policy object vanished; skipping status write");
            return Ok(());
        };

        let api: Api<DynamicObject> = match obj.namespace() {
            Some(namespace) => {
                Api::namespaced_with(self.client.clone(), &namespace, &resource)
            }
            None => all,
        };
        api.patch_status(policy_name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .with_context(|| format!("failed to patch policy {policy_name} status"))?;

        tracing::debug!(policy = %policy_name, score = result.score, "updated policy status");
        Ok(())
    }
}

pub(crate) fn phase_for(score: u32) -> &'static str {
    match score {
        90.. => "Compliant",
        70..=89 => "PartiallyCompliant",
        50..=69 => "NonCompliant",
        _ => "Critical",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_follow_thresholds() {
        assert_eq!(phase_for(95), "Compliant");
        assert_eq!(phase_for(90), "Compliant");
        assert_eq!(phase_for(70), "PartiallyCompliant");
        assert_eq!(phase_for(50), "NonCompliant");
        assert_eq!(phase_for(49), "Critical");
    }
}
