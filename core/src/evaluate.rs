use crate::finding::{Finding, Severity};
use crate::policy::Policy;
use crate::rules::run_rules;
use crate::score::{
    build_summary, filter_findings, suppressed_finding_ids, McpServerSummary, ViewBreakdown,
};
use crate::state::ClusterState;
use crate::view::{build_views, McpServerView};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// The complete output of one evaluation cycle.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    #[serde(serialize_with = "crate::timefmt::rfc3339_seconds")]
    pub timestamp: DateTime<Utc>,
    pub score: u32,
    pub score_breakdown: ScoreBreakdown,
    pub findings: Vec<Finding>,
    pub resource_summary: ResourceSummary,
    pub namespace_scores: Vec<NamespaceScore>,
    pub mcp_server_views: Vec<McpServerView>,
    pub mcp_server_summary: McpServerSummary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub verified_catalog_scores: Vec<CatalogScore>,
}

/// Cluster-level per-category scores, derived from the per-server views.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub agent_gateway_score: u32,
    pub authentication_score: u32,
    pub authorization_score: u32,
    pub cors_score: u32,
    pub tls_score: u32,
    pub prompt_guard_score: u32,
    pub rate_limit_score: u32,
    pub tool_scope_score: u32,
    /// Categories whose zero score is caused by missing infrastructure
    /// rather than penalty overflow, keyed by display name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub infra_absent: BTreeMap<String, bool>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSummary {
    pub gateways_found: usize,
    pub agentgateway_backends: usize,
    pub agentgateway_policies: usize,
    pub http_routes: usize,
    pub agents: usize,
    pub mcp_servers: usize,
    pub remote_mcp_servers: usize,
    pub compliant_resources: usize,
    pub non_compliant_resources: usize,
    pub total_mcp_endpoints: usize,
    pub exposed_mcp_endpoints: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceScore {
    pub namespace: String,
    pub score: u32,
    pub findings: usize,
}

/// A verified-catalog score embedded in the evaluation result, produced by
/// the inventory subsystem.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogScore {
    pub catalog_name: String,
    pub namespace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
    pub status: String,
    pub composite_score: u32,
    pub security_score: u32,
    pub trust_score: u32,
    pub compliance_score: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<CatalogCheck>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "crate::timefmt::rfc3339_seconds_opt"
    )]
    pub last_scored: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogCheck {
    pub id: String,
    pub name: String,
    pub points: u32,
    pub max_points: u32,
}

/// Runs the full governance evaluation against an already-filtered snapshot.
///
/// Pure: the caller supplies the evaluation instant and any catalog scores to
/// embed, so identical inputs yield an identical result.
pub fn evaluate(
    state: &ClusterState,
    policy: &Policy,
    catalog_scores: Vec<CatalogScore>,
    now: DateTime<Utc>,
) -> EvaluationResult {
    let timestamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);

    let mut resource_summary = summarize_resources(state);
    let findings = run_rules(state, policy, &timestamp);
    let namespace_scores = calculate_namespace_scores(state, &findings, policy);

    let views = build_views(state, &findings, policy, &timestamp);
    let mcp_server_summary = build_summary(&views);

    // Drop findings invalidated by per-server correlation so the flat list
    // stays consistent with the views, then recount compliance.
    let suppressed = suppressed_finding_ids(&views, &findings);
    let findings = filter_findings(findings, &suppressed);
    recount_compliance(&mut resource_summary, &findings);

    let score_breakdown = aggregate_breakdown(&views, policy);
    let score = overall_score(&score_breakdown, policy);

    EvaluationResult {
        timestamp: now,
        score,
        score_breakdown,
        findings,
        resource_summary,
        namespace_scores,
        mcp_server_views: views,
        mcp_server_summary,
        verified_catalog_scores: catalog_scores,
    }
}

fn summarize_resources(state: &ClusterState) -> ResourceSummary {
    let mut total_mcp = state.mcp_servers.len() + state.remote_mcp_servers.len();
    for b in &state.backends {
        if b.backend_type == "mcp" {
            total_mcp += b.mcp_targets.len();
        }
    }
    ResourceSummary {
        gateways_found: state.gateways.len(),
        agentgateway_backends: state.backends.len(),
        agentgateway_policies: state.gateway_policies.len(),
        http_routes: state.http_routes.len(),
        agents: state.agents.len(),
        mcp_servers: state.mcp_servers.len(),
        remote_mcp_servers: state.remote_mcp_servers.len(),
        total_mcp_endpoints: total_mcp,
        ..Default::default()
    }
}

fn recount_compliance(summary: &mut ResourceSummary, findings: &[Finding]) {
    summary.non_compliant_resources = findings
        .iter()
        .filter(|f| matches!(f.severity, Severity::Critical | Severity::High))
        .count();
    let total = summary.agentgateway_backends
        + summary.mcp_servers
        + summary.agents
        + summary.remote_mcp_servers;
    summary.compliant_resources = total.saturating_sub(summary.non_compliant_resources);
}

fn calculate_namespace_scores(
    state: &ClusterState,
    findings: &[Finding],
    policy: &Policy,
) -> Vec<NamespaceScore> {
    let mut by_namespace: BTreeMap<&str, Vec<&Finding>> = BTreeMap::new();
    for f in findings {
        if let Some(ns) = &f.namespace {
            by_namespace.entry(ns.as_str()).or_default().push(f);
        }
    }

    state
        .namespaces
        .iter()
        .map(|ns| {
            let ns_findings = by_namespace.get(ns.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            let penalty: u32 = ns_findings
                .iter()
                .map(|f| f.severity.penalty(&policy.severity_penalties))
                .sum();
            NamespaceScore {
                namespace: ns.clone(),
                score: 100u32.saturating_sub(penalty),
                findings: ns_findings.len(),
            }
        })
        .collect()
}

struct CategoryAggregate {
    display_name: &'static str,
    required: bool,
    select: fn(&ViewBreakdown) -> u32,
}

/// The cluster breakdown is the integer mean of the views' per-category
/// scores. A category is infra-absent only when it is required and every
/// view scored it zero; with no views at all, every required category is
/// infra-absent.
fn aggregate_breakdown(views: &[McpServerView], policy: &Policy) -> ScoreBreakdown {
    let categories = [
        CategoryAggregate {
            display_name: "Agent Gateway",
            required: policy.require_agent_gateway,
            select: |bd| bd.gateway_routing,
        },
        CategoryAggregate {
            display_name: "Authentication",
            required: policy.require_jwt_auth,
            select: |bd| bd.authentication,
        },
        CategoryAggregate {
            display_name: "Authorization",
            required: policy.require_rbac,
            select: |bd| bd.authorization,
        },
        CategoryAggregate {
            display_name: "TLS Encryption",
            required: policy.require_tls,
            select: |bd| bd.tls,
        },
        CategoryAggregate {
            display_name: "CORS Policy",
            required: policy.require_cors,
            select: |bd| bd.cors,
        },
        CategoryAggregate {
            display_name: "Rate Limiting",
            required: policy.require_rate_limit,
            select: |bd| bd.rate_limit,
        },
        CategoryAggregate {
            display_name: "Prompt Guard",
            required: policy.require_prompt_guard,
            select: |bd| bd.prompt_guard,
        },
    ];

    let mut breakdown = ScoreBreakdown::default();
    if views.is_empty() {
        for c in &categories {
            if c.required {
                breakdown.infra_absent.insert(c.display_name.to_string(), true);
            }
        }
        return breakdown;
    }

    let n = views.len() as u32;
    let mean = |select: fn(&ViewBreakdown) -> u32| {
        views.iter().map(|v| select(&v.score_breakdown)).sum::<u32>() / n
    };
    breakdown.agent_gateway_score = mean(|bd| bd.gateway_routing);
    breakdown.authentication_score = mean(|bd| bd.authentication);
    breakdown.authorization_score = mean(|bd| bd.authorization);
    breakdown.tls_score = mean(|bd| bd.tls);
    breakdown.cors_score = mean(|bd| bd.cors);
    breakdown.rate_limit_score = mean(|bd| bd.rate_limit);
    breakdown.prompt_guard_score = mean(|bd| bd.prompt_guard);
    breakdown.tool_scope_score = mean(|bd| bd.tool_scope);

    for c in &categories {
        if !c.required || mean(c.select) != 0 {
            continue;
        }
        let all_zero = views.iter().all(|v| (c.select)(&v.score_breakdown) == 0);
        if all_zero {
            breakdown.infra_absent.insert(c.display_name.to_string(), true);
        }
    }

    breakdown
}

/// The weight-normalised sum over required categories. With nothing required
/// there is nothing to fail: the score is 100.
fn overall_score(breakdown: &ScoreBreakdown, policy: &Policy) -> u32 {
    let w = &policy.weights;
    let tool_scope_active = policy.max_tools_warning > 0 || policy.max_tools_critical > 0;
    let entries = [
        (breakdown.agent_gateway_score, w.agent_gateway_integration, policy.require_agent_gateway),
        (breakdown.authentication_score, w.authentication, policy.require_jwt_auth),
        (breakdown.authorization_score, w.authorization, policy.require_rbac),
        (breakdown.cors_score, w.cors_policy, policy.require_cors),
        (breakdown.tls_score, w.tls_encryption, policy.require_tls),
        (breakdown.prompt_guard_score, w.prompt_guard, policy.require_prompt_guard),
        (breakdown.rate_limit_score, w.rate_limit, policy.require_rate_limit),
        (breakdown.tool_scope_score, w.tool_scope, tool_scope_active),
    ];

    let mut total_weight = 0u32;
    let mut weighted = 0u32;
    for (score, weight, required) in entries {
        if required {
            total_weight += weight;
            weighted += score * weight;
        }
    }
    if total_weight == 0 {
        return 100;
    }
    weighted / total_weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::grade_for;
    use crate::state::{
        Agent, AgentTool, Backend, Gateway, GatewayPolicy, HttpRoute, McpServer, McpTarget,
        RemoteMcpServer, Service,
    };
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    fn fully_configured_state() -> ClusterState {
        ClusterState {
            gateways: vec![Gateway {
                name: "agentgateway".into(),
                namespace: "infra".into(),
                gateway_class_name: "agentgateway".into(),
                programmed: true,
                ..Default::default()
            }],
            backends: vec![Backend {
                name: "mcp-backend".into(),
                namespace: "infra".into(),
                backend_type: "mcp".into(),
                has_tls: true,
                mcp_targets: vec![
                    McpTarget {
                        name: "fetcher".into(),
                        host: "fetcher.apps.svc.cluster.local".into(),
                        port: 80,
                        protocol: "StreamableHTTP".into(),
                        has_auth: true,
                        has_rbac: true,
                    },
                    McpTarget {
                        name: "remote-tools".into(),
                        host: "remote-tools.apps.svc.cluster.local".into(),
                        port: 80,
                        protocol: "StreamableHTTP".into(),
                        has_auth: true,
                        has_rbac: true,
                    },
                ],
            }],
            gateway_policies: vec![GatewayPolicy {
                name: "hardened".into(),
                namespace: "infra".into(),
                has_jwt: true,
                jwt_mode: "Strict".into(),
                has_cors: true,
                has_csrf: true,
                has_rbac: true,
                has_rate_limit: true,
                has_prompt_guard: true,
                ..Default::default()
            }],
            http_routes: vec![HttpRoute {
                name: "mcp-route".into(),
                namespace: "infra".into(),
                parent_gateway: "agentgateway".into(),
                backend_refs: vec!["mcp-backend".into()],
                ..Default::default()
            }],
            agents: vec![Agent {
                name: "helper".into(),
                namespace: "apps".into(),
                agent_type: "Declarative".into(),
                ready: true,
                tools: vec![AgentTool {
                    tool_type: "McpServer".into(),
                    kind: "RemoteMCPServer".into(),
                    name: "fetcher".into(),
                    tool_names: (0..5).map(|i| format!("tool-{i}")).collect(),
                }],
            }],
            mcp_servers: vec![McpServer {
                name: "fetcher".into(),
                namespace: "apps".into(),
                transport: "streamablehttp".into(),
                port: 8080,
            }],
            remote_mcp_servers: vec![RemoteMcpServer {
                name: "remote-tools".into(),
                namespace: "apps".into(),
                url: "http://agentgateway.infra:8080/mcp/remote-tools".into(),
                tool_count: 5,
                tool_names: (0..5).map(|i| format!("remote-{i}")).collect(),
            }],
            services: vec![Service {
                name: "agentgateway".into(),
                namespace: "infra".into(),
                app_protocol: "kgateway.dev/mcp".into(),
                ports: vec![8080],
                is_mcp: true,
            }],
            namespaces: vec!["infra".into(), "apps".into()],
        }
    }

    #[test]
    fn empty_cluster_scores_near_zero_with_the_infrastructure_set() {
        let result = evaluate(&ClusterState::default(), &Policy::default(), Vec::new(), now());

        assert!(result.score <= 10, "score was {}", result.score);
        assert_eq!(grade_for(result.score), "F");
        for id in ["AGW-001", "AUTH-002", "TLS-002", "CORS-003", "RBAC-002"] {
            assert!(result.findings.iter().any(|f| f.id == id), "{id} expected");
        }
        assert!(result.mcp_server_views.is_empty());
        assert!(result.score_breakdown.infra_absent.contains_key("Agent Gateway"));
        assert!(result.score_breakdown.infra_absent.contains_key("Authentication"));
    }

    #[test]
    fn fully_configured_cluster_scores_high_without_criticals() {
        let state = fully_configured_state();
        let result = evaluate(&state, &Policy::default(), Vec::new(), now());

        assert!(result.score >= 80, "score was {}", result.score);
        assert!(
            !result.findings.iter().any(|f| f.severity == Severity::Critical),
            "unexpected criticals: {:?}",
            result
                .findings
                .iter()
                .filter(|f| f.severity == Severity::Critical)
                .map(|f| &f.id)
                .collect::<Vec<_>>()
        );
        assert_eq!(result.mcp_server_views.len(), 2);
        assert!(result.mcp_server_views.iter().all(|v| v.routed_through_gateway));
    }

    #[test]
    fn weak_jwt_halves_authentication() {
        let mut state = fully_configured_state();
        state.gateway_policies[0].jwt_mode = "Optional".into();
        let result = evaluate(&state, &Policy::default(), Vec::new(), now());

        let auth_finding = result
            .findings
            .iter()
            .find(|f| f.id == "AUTH-001-hardened")
            .expect("AUTH-001 finding");
        assert_eq!(auth_finding.severity, Severity::High);
        assert!(result.score_breakdown.authentication_score <= 50);
    }

    #[test]
    fn breakdown_is_integer_mean_of_views() {
        let state = fully_configured_state();
        let result = evaluate(&state, &Policy::default(), Vec::new(), now());

        let n = result.mcp_server_views.len() as u32;
        let mean_auth = result
            .mcp_server_views
            .iter()
            .map(|v| v.score_breakdown.authentication)
            .sum::<u32>()
            / n;
        assert_eq!(result.score_breakdown.authentication_score, mean_auth);
        let mean_gw = result
            .mcp_server_views
            .iter()
            .map(|v| v.score_breakdown.gateway_routing)
            .sum::<u32>()
            / n;
        assert_eq!(result.score_breakdown.agent_gateway_score, mean_gw);
    }

    #[test]
    fn all_scores_stay_in_range() {
        for state in [ClusterState::default(), fully_configured_state()] {
            let result = evaluate(&state, &Policy::default(), Vec::new(), now());
            assert!(result.score <= 100);
            for v in &result.mcp_server_views {
                let bd = &v.score_breakdown;
                for s in [
                    bd.gateway_routing,
                    bd.authentication,
                    bd.authorization,
                    bd.tls,
                    bd.cors,
                    bd.rate_limit,
                    bd.prompt_guard,
                    bd.tool_scope,
                ] {
                    assert!(s <= 100);
                }
            }
        }
    }

    #[test]
    fn namespace_scores_deduct_penalties() {
        let state = ClusterState {
            mcp_servers: vec![McpServer {
                name: "lonely".into(),
                namespace: "apps".into(),
                ..Default::default()
            }],
            namespaces: vec!["apps".into(), "quiet".into()],
            ..Default::default()
        };
        let result = evaluate(&state, &Policy::default(), Vec::new(), now());

        let apps = result.namespace_scores.iter().find(|s| s.namespace == "apps").unwrap();
        // AGW-100-lonely is Critical: 100 - 40.
        assert_eq!(apps.score, 60);
        assert_eq!(apps.findings, 1);
        let quiet = result.namespace_scores.iter().find(|s| s.namespace == "quiet").unwrap();
        assert_eq!(quiet.score, 100);
    }

    #[test]
    fn no_required_categories_means_compliant() {
        let policy = Policy {
            require_agent_gateway: false,
            require_cors: false,
            require_jwt_auth: false,
            require_rbac: false,
            require_tls: false,
            require_prompt_guard: false,
            require_rate_limit: false,
            max_tools_warning: 0,
            max_tools_critical: 0,
            ..Policy::default()
        };
        let result = evaluate(&ClusterState::default(), &policy, Vec::new(), now());
        assert_eq!(result.score, 100);
        assert!(result.findings.is_empty());
    }

    #[test]
    fn timestamp_serializes_with_second_precision() {
        let result = evaluate(&ClusterState::default(), &Policy::default(), Vec::new(), now());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["timestamp"], "2026-01-01T12:00:00Z");
    }

    #[test]
    fn catalog_scores_are_embedded_verbatim() {
        let scores = vec![CatalogScore {
            catalog_name: "kagent/fetcher".into(),
            namespace: "apps".into(),
            resource_version: "42".into(),
            status: "Verified".into(),
            composite_score: 95,
            security_score: 100,
            trust_score: 90,
            compliance_score: 92,
            checks: Vec::new(),
            last_scored: Some(now()),
        }];
        let result =
            evaluate(&ClusterState::default(), &Policy::default(), scores.clone(), now());
        assert_eq!(result.verified_catalog_scores, scores);
    }
}
