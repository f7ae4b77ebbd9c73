use chrono::{DateTime, Utc};
use mcp_governance_controller_core::{CatalogCheck, CatalogScore};
use serde::Serialize;

/// A catalog entry from the registry inventory, as scored by the controller.
/// Keyed by (namespace, name) in the inventory store.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedResource {
    pub name: String,
    pub namespace: String,
    pub catalog_name: String,
    pub title: String,
    pub description: String,
    pub version: String,

    // Origin labels stamped by the registry's discovery pipeline.
    pub source_kind: String,
    pub source_name: String,
    pub source_namespace: String,
    pub environment: String,
    pub cluster: String,

    pub published: bool,
    pub deployment_ready: bool,
    /// "external" (auto-discovered) or "managed" (registry-managed).
    pub management_type: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub transport: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub package_image: String,
    #[serde(rename = "remoteURL", skip_serializing_if = "String::is_empty")]
    pub remote_url: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_names: Vec<String>,
    pub tool_count: usize,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub used_by_agents: Vec<AgentUsage>,

    pub verified_score: VerifiedScore,

    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "mcp_governance_controller_core::timefmt::rfc3339_seconds_opt"
    )]
    pub last_scored: Option<DateTime<Utc>>,
    /// Used to drop no-op update events.
    pub resource_version: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentUsage {
    pub name: String,
    pub namespace: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_names: Vec<String>,
}

/// The verification result for a single catalog entry.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedScore {
    pub score: u32,
    pub grade: String,
    /// "Verified", "Unverified", or "Rejected".
    pub status: String,
    pub checks: Vec<VerifiedCheck>,
    pub findings: Vec<VerifiedFinding>,
    pub checks_passed: usize,
    pub checks_total: usize,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "mcp_governance_controller_core::timefmt::rfc3339_seconds_opt"
    )]
    pub last_evaluated: Option<DateTime<Utc>>,

    // Composite category scores, each 0-100.
    pub security_score: u32,
    pub trust_score: u32,
    pub compliance_score: u32,

    // Publisher trust sub-scores.
    pub org_score: u32,
    pub publisher_score: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub verified_org: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub verified_publisher: String,

    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedCheck {
    pub id: String,
    pub name: String,
    /// "publisher", "transport", "deployment", "toolScope", or "usage".
    pub category: String,
    pub passed: bool,
    pub score: u32,
    pub max_score: u32,
    pub description: String,
    pub detail: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedFinding {
    pub severity: String,
    pub category: String,
    pub title: String,
    pub description: String,
    pub remediation: String,
}

/// Cluster-level tallies across the inventory store.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedSummary {
    pub total_catalogs: usize,
    pub total_scored: usize,
    pub verified_count: usize,
    pub unverified_count: usize,
    pub rejected_count: usize,
    pub critical_count: usize,
    pub average_score: u32,
    pub total_tools: usize,
    pub total_agent_usages: usize,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "mcp_governance_controller_core::timefmt::rfc3339_seconds_opt"
    )]
    pub last_reconcile: Option<DateTime<Utc>>,
}

pub fn grade_from_score(score: u32) -> &'static str {
    match score {
        90.. => "A",
        70..=89 => "B",
        50..=69 => "C",
        30..=49 => "D",
        _ => "F",
    }
}

pub fn status_from_score(score: u32, verified_threshold: u32, unverified_threshold: u32) -> &'static str {
    if score >= verified_threshold {
        "Verified"
    } else if score >= unverified_threshold {
        "Unverified"
    } else {
        "Rejected"
    }
}

impl VerifiedResource {
    /// The embeddable form carried on evaluation results.
    pub fn catalog_score(&self) -> CatalogScore {
        CatalogScore {
            catalog_name: if self.catalog_name.is_empty() {
                self.name.clone()
            } else {
                self.catalog_name.clone()
            },
            namespace: self.namespace.clone(),
            resource_version: self.resource_version.clone(),
            status: self.verified_score.status.clone(),
            composite_score: self.verified_score.score,
            security_score: self.verified_score.security_score,
            trust_score: self.verified_score.trust_score,
            compliance_score: self.verified_score.compliance_score,
            checks: self
                .verified_score
                .checks
                .iter()
                .map(|c| CatalogCheck {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    points: c.score,
                    max_points: c.max_score,
                })
                .collect(),
            last_scored: self.last_scored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_thresholds() {
        assert_eq!(grade_from_score(100), "A");
        assert_eq!(grade_from_score(89), "B");
        assert_eq!(grade_from_score(69), "C");
        assert_eq!(grade_from_score(49), "D");
        assert_eq!(grade_from_score(29), "F");
    }

    #[test]
    fn status_thresholds() {
        assert_eq!(status_from_score(70, 70, 50), "Verified");
        assert_eq!(status_from_score(69, 70, 50), "Unverified");
        assert_eq!(status_from_score(50, 70, 50), "Unverified");
        assert_eq!(status_from_score(49, 70, 50), "Rejected");
        assert_eq!(status_from_score(80, 90, 60), "Unverified");
    }
}
