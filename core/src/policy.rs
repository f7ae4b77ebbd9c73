use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The resolved governance policy driving an evaluation.
///
/// Resolved from the cluster's governance-policy object when one exists,
/// otherwise [`Policy::default`]. Each `require_*` flag gates its category in
/// both the rule engine and the per-server scorer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Policy {
    /// Name of the policy object this configuration came from, used when
    /// writing evaluation results back to its status. Empty for the default.
    pub name: String,

    pub require_agent_gateway: bool,
    pub require_cors: bool,
    pub require_jwt_auth: bool,
    pub require_rbac: bool,
    pub require_prompt_guard: bool,
    pub require_tls: bool,
    pub require_rate_limit: bool,

    /// Tool-count thresholds. Zero disables the corresponding finding.
    pub max_tools_warning: usize,
    pub max_tools_critical: usize,

    /// Include-list of namespaces when non-empty.
    pub target_namespaces: Vec<String>,
    /// Always subtracted from the evaluated set.
    pub exclude_namespaces: Vec<String>,

    pub weights: ScoringWeights,
    pub severity_penalties: SeverityPenalties,

    pub ai_agent: AiAgentOptions,
    pub catalog_scoring: CatalogScoringOverrides,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            name: String::new(),
            require_agent_gateway: true,
            require_cors: true,
            require_jwt_auth: true,
            require_rbac: true,
            require_prompt_guard: false,
            require_tls: true,
            require_rate_limit: false,
            max_tools_warning: 10,
            max_tools_critical: 15,
            target_namespaces: Vec::new(),
            exclude_namespaces: default_exclude_namespaces(),
            weights: ScoringWeights::default(),
            severity_penalties: SeverityPenalties::default(),
            ai_agent: AiAgentOptions::default(),
            catalog_scoring: CatalogScoringOverrides::default(),
        }
    }
}

/// Integer weight per scoring category. Defaults sum to 100.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringWeights {
    pub agent_gateway_integration: u32,
    pub authentication: u32,
    pub authorization: u32,
    pub cors_policy: u32,
    pub tls_encryption: u32,
    pub prompt_guard: u32,
    pub rate_limit: u32,
    pub tool_scope: u32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            agent_gateway_integration: 25,
            authentication: 20,
            authorization: 15,
            cors_policy: 10,
            tls_encryption: 10,
            prompt_guard: 10,
            rate_limit: 5,
            tool_scope: 5,
        }
    }
}

/// Points deducted per finding severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeverityPenalties {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

impl Default for SeverityPenalties {
    fn default() -> Self {
        Self {
            critical: 40,
            high: 25,
            medium: 15,
            low: 5,
        }
    }
}

/// Knobs for the AI scoring side-channel. The core never interprets the
/// side-channel's output; these options only pace it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiAgentOptions {
    pub enabled: bool,
    /// Interval between AI evaluations, e.g. "5m". Empty uses the default.
    pub scan_interval: String,
    pub scan_enabled: bool,
}

impl Default for AiAgentOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            scan_interval: String::new(),
            scan_enabled: true,
        }
    }
}

/// User overrides for the verified-catalog scoring model. Zero values mean
/// "use the built-in default"; the inventory scorer applies the fallbacks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogScoringOverrides {
    pub security_weight: u32,
    pub trust_weight: u32,
    pub compliance_weight: u32,
    pub verified_threshold: u32,
    pub unverified_threshold: u32,
    /// Per-check max points, keyed by check id (e.g. "PUB-001").
    pub check_max_scores: BTreeMap<String, u32>,
}

/// The system namespaces excluded from scanning by default.
pub fn default_exclude_namespaces() -> Vec<String> {
    ["kube-system", "kube-public", "kube-node-lease", "local-path-storage"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_100() {
        let w = ScoringWeights::default();
        let sum = w.agent_gateway_integration
            + w.authentication
            + w.authorization
            + w.cors_policy
            + w.tls_encryption
            + w.prompt_guard
            + w.rate_limit
            + w.tool_scope;
        assert_eq!(sum, 100);
    }

    #[test]
    fn default_policy_gates() {
        let p = Policy::default();
        assert!(p.require_agent_gateway);
        assert!(p.require_jwt_auth);
        assert!(p.require_rbac);
        assert!(p.require_cors);
        assert!(p.require_tls);
        assert!(!p.require_prompt_guard);
        assert!(!p.require_rate_limit);
        assert_eq!(p.max_tools_warning, 10);
        assert_eq!(p.max_tools_critical, 15);
        assert_eq!(p.exclude_namespaces.len(), 4);
    }

    #[test]
    fn default_penalties() {
        let p = SeverityPenalties::default();
        assert_eq!((p.critical, p.high, p.medium, p.low), (40, 25, 15, 5));
    }
}
