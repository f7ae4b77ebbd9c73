//! Governance-policy resolution: the policy object's spec overlaid onto the
//! defaults, tolerating partially-specified and loosely-typed fields.

use mcp_governance_controller_core::Policy;
use mcp_governance_controller_k8s_api::value::{
    get_bool, get_i64, get_map, get_string, get_string_slice,
};
use serde_json::Value;

/// Maps a governance-policy object into a typed [`Policy`]. Recognised
/// fields override the defaults; anything absent or malformed keeps its
/// default value, so a broken policy degrades instead of failing.
pub(crate) fn from_object(data: &Value) -> Policy {
    let mut policy = Policy::default();
    let Some(spec) = data.get("spec") else {
        tracing::warn!("governance policy has no spec; using defaults");
        return policy;
    };

    for (key, target) in [
        ("requireAgentGateway", &mut policy.require_agent_gateway as &mut bool),
        ("requireCORS", &mut policy.require_cors),
        ("requireJWTAuth", &mut policy.require_jwt_auth),
        ("requireRBAC", &mut policy.require_rbac),
        ("requirePromptGuard", &mut policy.require_prompt_guard),
        ("requireTLS", &mut policy.require_tls),
        ("requireRateLimit", &mut policy.require_rate_limit),
    ] {
        if spec.get(key).map_or(false, Value::is_boolean) {
            *target = get_bool(spec, key);
        }
    }

    if let Some(v) = get_i64(spec, "maxToolsWarning") {
        policy.max_tools_warning = v.max(0) as usize;
    }
    if let Some(v) = get_i64(spec, "maxToolsCritical") {
        policy.max_tools_critical = v.max(0) as usize;
    }

    if spec.get("targetNamespaces").is_some() {
        policy.target_namespaces = get_string_slice(spec, "targetNamespaces");
    }
    if spec.get("excludeNamespaces").is_some() {
        policy.exclude_namespaces = get_string_slice(spec, "excludeNamespaces");
    }

    if let Some(weights) = spec.get("scoringWeights").filter(|v| v.is_object()) {
        let w = &mut policy.weights;
        for (key, target) in [
            ("agentGatewayIntegration", &mut w.agent_gateway_integration as &mut u32),
            ("authentication", &mut w.authentication),
            ("authorization", &mut w.authorization),
            ("corsPolicy", &mut w.cors_policy),
            ("tlsEncryption", &mut w.tls_encryption),
            ("promptGuard", &mut w.prompt_guard),
            ("rateLimit", &mut w.rate_limit),
            ("toolScope", &mut w.tool_scope),
        ] {
            if let Some(v) = get_i64(weights, key) {
                *target = v.max(0) as u32;
            }
        }
    }

    if let Some(penalties) = spec.get("severityPenalties").filter(|v| v.is_object()) {
        let p = &mut policy.severity_penalties;
        for (key, target) in [
            ("critical", &mut p.critical as &mut u32),
            ("high", &mut p.high),
            ("medium", &mut p.medium),
            ("low", &mut p.low),
        ] {
            if let Some(v) = get_i64(penalties, key) {
                *target = v.max(0) as u32;
            }
        }
    }

    if let Some(ai) = spec.get("aiAgent").filter(|v| v.is_object()) {
        policy.ai_agent.enabled = get_bool(ai, "enabled");
        policy.ai_agent.scan_interval = get_string(ai, "scanInterval");
        if ai.get("scanEnabled").map_or(false, Value::is_boolean) {
            policy.ai_agent.scan_enabled = get_bool(ai, "scanEnabled");
        }
    }

    if let Some(catalog) = spec.get("verifiedCatalogScoring").filter(|v| v.is_object()) {
        let c = &mut policy.catalog_scoring;
        for (key, target) in [
            ("securityWeight", &mut c.security_weight as &mut u32),
            ("trustWeight", &mut c.trust_weight),
            ("complianceWeight", &mut c.compliance_weight),
            ("verifiedThreshold", &mut c.verified_threshold),
            ("unverifiedThreshold", &mut c.unverified_threshold),
        ] {
            if let Some(v) = get_i64(catalog, key) {
                *target = v.max(0) as u32;
            }
        }
        if let Some(max_scores) = get_map(catalog, "checkMaxScores") {
            for (id, v) in max_scores {
                if let Some(points) = v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)) {
                    c.check_max_scores.insert(id.clone(), points.max(0) as u32);
                }
            }
        }
    }

    policy
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_spec_keeps_defaults() {
        let policy = from_object(&json!({"spec": {}}));
        assert_eq!(policy, Policy::default());
    }

    #[test]
    fn missing_spec_keeps_defaults() {
        let policy = from_object(&json!({}));
        assert_eq!(policy, Policy::default());
    }

    #[test]
    fn booleans_and_thresholds_override() {
        let policy = from_object(&json!({
            "spec": {
                "requireAgentGateway": false,
                "requirePromptGuard": true,
                "maxToolsWarning": 20,
                "maxToolsCritical": 30,
            },
        }));
        assert!(!policy.require_agent_gateway);
        assert!(policy.require_prompt_guard);
        // Untouched flags keep their defaults.
        assert!(policy.require_tls);
        assert_eq!(policy.max_tools_warning, 20);
        assert_eq!(policy.max_tools_critical, 30);
    }

    #[test]
    fn numeric_fields_coerce_from_floats() {
        let policy = from_object(&json!({
            "spec": {
                "maxToolsWarning": 12.0,
                "scoringWeights": {"authentication": 30.0},
                "severityPenalties": {"critical": 50.0},
            },
        }));
        assert_eq!(policy.max_tools_warning, 12);
        assert_eq!(policy.weights.authentication, 30);
        assert_eq!(policy.severity_penalties.critical, 50);
        // Unspecified weights keep defaults.
        assert_eq!(policy.weights.authorization, 15);
    }

    #[test]
    fn namespace_filters_override_defaults() {
        let policy = from_object(&json!({
            "spec": {
                "targetNamespaces": ["apps"],
                "excludeNamespaces": [],
            },
        }));
        assert_eq!(policy.target_namespaces, vec!["apps".to_string()]);
        // An explicit empty exclude list clears the default system set.
        assert!(policy.exclude_namespaces.is_empty());
    }

    #[test]
    fn catalog_scoring_overrides() {
        let policy = from_object(&json!({
            "spec": {
                "verifiedCatalogScoring": {
                    "verifiedThreshold": 80,
                    "checkMaxScores": {"PUB-001": 20, "SEC-001": 25.0},
                },
            },
        }));
        assert_eq!(policy.catalog_scoring.verified_threshold, 80);
        assert_eq!(policy.catalog_scoring.check_max_scores.get("PUB-001"), Some(&20));
        assert_eq!(policy.catalog_scoring.check_max_scores.get("SEC-001"), Some(&25));
    }

    #[test]
    fn ai_agent_options() {
        let policy = from_object(&json!({
            "spec": {
                "aiAgent": {"enabled": true, "scanInterval": "10m", "scanEnabled": false},
            },
        }));
        assert!(policy.ai_agent.enabled);
        assert_eq!(policy.ai_agent.scan_interval, "10m");
        assert!(!policy.ai_agent.scan_enabled);
    }

    #[test]
    fn malformed_fields_degrade_to_defaults() {
        let policy = from_object(&json!({
            "spec": {
                "requireTLS": "yes",
                "maxToolsWarning": "many",
                "scoringWeights": "heavy",
            },
        }));
        assert_eq!(policy, Policy::default());
    }
}
