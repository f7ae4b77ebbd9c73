use crate::types::VerifiedResource;
use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use kube::api::{Api, DynamicObject, Patch, PatchParams};
use kube::Client;
use mcp_governance_controller_k8s_api::ResourceKind;
use serde_json::json;
use std::time::Duration;

const PUBLISHER_TRUST_THRESHOLD: u32 = 70;

/// Writes verified scores back onto catalog objects through the status
/// subresource. Best-effort: callers log failures and move on.
pub struct StatusPatcher {
    client: Client,
    timeout: Duration,
}

impl StatusPatcher {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Merge-patches `status.publisher` with the entry's verified score.
    pub async fn patch_catalog_status(&self, res: &VerifiedResource) -> anyhow::Result<()> {
        let score = &res.verified_score;
        let graded_at = res
            .last_scored
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let patch = json!({
            "status": {
                "publisher": {
                    "verifiedPublisher": score.publisher_score >= PUBLISHER_TRUST_THRESHOLD,
                    "verifiedOrganization": score.org_score >= PUBLISHER_TRUST_THRESHOLD,
                    "score": score.score,
                    "grade": score.grade,
                    "gradedAt": graded_at,
                },
            },
        });

        let api: Api<DynamicObject> = Api::namespaced_with(
            self.client.clone(),
            &res.namespace,
            &ResourceKind::McpServerCatalog.api_resource(),
        );
        let patched = tokio::time::timeout(
            self.timeout,
            api.patch_status(&res.name, &PatchParams::default(), &Patch::Merge(&patch)),
        )
        .await
        .with_context(|| format!("patching {}/{} status timed out", res.namespace, res.name))?;
        patched.with_context(|| format!("failed to patch {}/{} status", res.namespace, res.name))?;

        tracing::debug!(
            namespace = %res.namespace,
            name = %res.name,
            score = score.score,
            grade = %score.grade,
            "patched catalog status",
        );
        Ok(())
    }
}
