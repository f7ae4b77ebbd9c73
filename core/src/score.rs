use crate::explain::build_explanations;
use crate::finding::{Category, Finding, Severity};
use crate::policy::Policy;
use crate::rules::is_cluster_wide;
use crate::view::McpServerView;
use ahash::AHashSet as HashSet;
use serde::Serialize;
use std::collections::BTreeSet;

/// Per-category score for a single MCP server, each in [0, 100].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewBreakdown {
    pub gateway_routing: u32,
    pub authentication: u32,
    pub authorization: u32,
    pub tls: u32,
    pub cors: u32,
    pub rate_limit: u32,
    pub prompt_guard: u32,
    pub tool_scope: u32,
}

/// Cluster-level summary across all MCP server views.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServerSummary {
    pub total_mcp_servers: usize,
    pub routed_servers: usize,
    pub unrouted_servers: usize,
    pub secured_servers: usize,
    pub at_risk_servers: usize,
    pub critical_servers: usize,
    pub total_tools: usize,
    pub exposed_tools: usize,
    pub average_score: u32,
}

pub fn grade_for(score: u32) -> &'static str {
    match score {
        90.. => "A",
        70..=89 => "B",
        50..=69 => "C",
        30..=49 => "D",
        _ => "F",
    }
}

fn status_for(score: u32) -> &'static str {
    match score {
        90.. => "compliant",
        70..=89 => "warning",
        30..=69 => "failing",
        _ => "critical",
    }
}

/// Collects the view's findings, scores each category, computes the weighted
/// overall score, and attaches the explanations.
pub(crate) fn finalize_view(
    view: &mut McpServerView,
    all_findings: &[Finding],
    policy: &Policy,
    timestamp: &str,
) {
    view.findings = collect_view_findings(view, all_findings);

    let mut bd = ViewBreakdown {
        gateway_routing: 100,
        authentication: 100,
        authorization: 100,
        tls: 100,
        cors: 100,
        rate_limit: 100,
        prompt_guard: 100,
        tool_scope: 100,
    };

    if policy.require_agent_gateway {
        if !view.routed_through_gateway {
            bd.gateway_routing = 0;
        } else if view.related_backends.is_empty() {
            bd.gateway_routing = 30;
        }
    }

    if policy.require_jwt_auth {
        if !view.has_jwt && !view.has_auth {
            bd.authentication = 0;
        } else if view.has_jwt && view.jwt_mode.as_deref() == Some("Optional") {
            bd.authentication = 50;
        } else if view.has_auth && !view.has_jwt {
            bd.authentication = 70;
        }
    }

    if policy.require_rbac && !view.has_rbac {
        bd.authorization = 0;
    }

    if policy.require_tls && !view.has_tls {
        bd.tls = 0;
    }

    if policy.require_cors && !view.has_cors {
        bd.cors = 0;
    }

    // Rate limit and prompt guard charge zero when absent even if the policy
    // does not require them; the weighted average below only counts required
    // categories, so the breakdown can read 0 for a category the overall
    // score ignores. The explanations mark such categories "not-required".
    if !view.has_rate_limit {
        bd.rate_limit = 0;
    }
    if !view.has_prompt_guard {
        bd.prompt_guard = 0;
    }

    if view.tool_count == 0 {
        bd.tool_scope = 0;
        view.findings.push(
            Finding::new(
                format!("TOOLS-000-{}", view.name),
                Severity::High,
                Category::ToolScope,
                format!("MCP server {} has no tools", view.name),
                format!(
                    "The MCP server '{}' in namespace '{}' has 0 tools discovered. Tools should \
                     be attached to the MCP server for proper governance.",
                    view.name, view.namespace
                ),
                "Without tools, the MCP server cannot serve AI agents, and tool-level governance \
                 cannot be applied.",
                "Ensure the MCP server exposes tools and that tool discovery is working \
                 correctly.",
                timestamp,
            )
            .with_resource_ref(&view.id, &view.namespace),
        );
    } else if policy.max_tools_critical > 0 && view.effective_tool_count > policy.max_tools_critical
    {
        bd.tool_scope = 0;
    } else if policy.max_tools_warning > 0 && view.effective_tool_count > policy.max_tools_warning {
        bd.tool_scope = 50;
    }

    view.score_breakdown = bd;

    let w = &policy.weights;
    let tool_scope_active =
        policy.max_tools_warning > 0 || policy.max_tools_critical > 0 || view.tool_count == 0;
    let entries = [
        (bd.gateway_routing, w.agent_gateway_integration, policy.require_agent_gateway),
        (bd.authentication, w.authentication, policy.require_jwt_auth),
        (bd.authorization, w.authorization, policy.require_rbac),
        (bd.tls, w.tls_encryption, policy.require_tls),
        (bd.cors, w.cors_policy, policy.require_cors),
        (bd.rate_limit, w.rate_limit, policy.require_rate_limit),
        (bd.prompt_guard, w.prompt_guard, policy.require_prompt_guard),
        (bd.tool_scope, w.tool_scope, tool_scope_active),
    ];

    let mut total_weight = 0u32;
    let mut weighted = 0u32;
    for (score, weight, required) in entries {
        if required {
            total_weight += weight;
            weighted += score * weight;
        }
    }
    view.score = if total_weight > 0 { weighted / total_weight } else { 100 };

    view.grade = grade_for(view.score).to_string();
    view.status = status_for(view.score).to_string();
    if view.findings.iter().any(|f| f.severity == Severity::Critical) {
        view.status = "critical".to_string();
    }

    view.score_explanations = build_explanations(view, policy);
}

/// Gathers the findings relevant to one view: anything referencing the server
/// or its related resources, anything whose id embeds the server name, and
/// the cluster-wide set. Findings invalidated by correlation are skipped.
fn collect_view_findings(view: &McpServerView, all_findings: &[Finding]) -> Vec<Finding> {
    let mut refs: HashSet<String> = HashSet::new();
    refs.insert(view.id.clone());
    for r in &view.related_backends {
        refs.insert(format!("AgentgatewayBackend/{}/{}", r.namespace, r.name));
    }
    for r in &view.related_routes {
        refs.insert(format!("HTTPRoute/{}/{}", r.namespace, r.name));
    }
    for r in &view.related_gateways {
        refs.insert(format!("Gateway/{}/{}", r.namespace, r.name));
    }
    for r in &view.related_policies {
        refs.insert(format!("AgentgatewayPolicy/{}/{}", r.namespace, r.name));
    }
    for r in &view.related_agents {
        refs.insert(format!("Agent/{}/{}", r.namespace, r.name));
    }

    let mut result = Vec::new();
    for f in all_findings {
        if suppressed_for_view(view, f) {
            continue;
        }
        if let Some(resource_ref) = &f.resource_ref {
            if refs.contains(resource_ref) {
                result.push(f.clone());
                continue;
            }
        }
        if f.id.contains(&view.name) {
            result.push(f.clone());
            continue;
        }
        if f.resource_ref.is_none() && is_cluster_wide(&f.id) {
            result.push(f.clone());
        }
    }
    result
}

/// True when per-server correlation invalidates the finding for this view:
/// tool-sprawl findings once a policy restricts tools, exposure findings once
/// routing was established, and MCP-level auth/RBAC findings once the policy
/// level provides the control.
fn suppressed_for_view(view: &McpServerView, f: &Finding) -> bool {
    let names_server = f.id.contains(&view.name);
    (view.has_tool_restriction && f.id.starts_with("TOOLS-001-") && names_server)
        || (view.routed_through_gateway && f.id.starts_with("EXP-001-") && names_server)
        || (view.has_jwt && f.id.starts_with("AUTH-100-") && names_server)
        || (view.has_rbac && f.id.starts_with("RBAC-100-") && names_server)
}

/// The ids removed from the cluster-level finding list because per-server
/// correlation invalidated them. Computed once per evaluation and applied
/// everywhere the findings list is used.
pub fn suppressed_finding_ids(views: &[McpServerView], findings: &[Finding]) -> BTreeSet<String> {
    let mut suppressed = BTreeSet::new();
    for view in views {
        for f in findings {
            if suppressed_for_view(view, f) {
                suppressed.insert(f.id.clone());
            }
        }
    }
    suppressed
}

pub fn filter_findings(findings: Vec<Finding>, suppressed: &BTreeSet<String>) -> Vec<Finding> {
    if suppressed.is_empty() {
        return findings;
    }
    findings.into_iter().filter(|f| !suppressed.contains(&f.id)).collect()
}

pub(crate) fn build_summary(views: &[McpServerView]) -> McpServerSummary {
    let mut summary = McpServerSummary {
        total_mcp_servers: views.len(),
        ..Default::default()
    };
    let mut total_score = 0u32;
    for v in views {
        total_score += v.score;
        if v.routed_through_gateway {
            summary.routed_servers += 1;
        } else {
            summary.unrouted_servers += 1;
        }
        if v.score >= 70 {
            summary.secured_servers += 1;
        } else {
            summary.at_risk_servers += 1;
        }
        if v.score < 30 {
            summary.critical_servers += 1;
        }
        summary.total_tools += v.tool_count;
        summary.exposed_tools += v.effective_tool_count;
    }
    if !views.is_empty() {
        summary.average_score = total_score / views.len() as u32;
    }
    summary
}
