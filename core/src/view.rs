use crate::explain::ScoreExplanation;
use crate::finding::Finding;
use crate::policy::Policy;
use crate::score::{finalize_view, ViewBreakdown};
use crate::state::{
    url_references_service, Agent, Backend, ClusterState, Gateway, GatewayPolicy, McpServer,
    McpTarget, RemoteMcpServer,
};
use ahash::AHashSet as HashSet;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

/// Where a view's identity came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ServerSource {
    #[serde(rename = "MCPServer")]
    McpServer,
    #[serde(rename = "RemoteMCPServer")]
    RemoteMcpServer,
}

/// A reference to a resource the correlator associated with an MCP server.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedResource {
    pub kind: String,
    pub name: String,
    pub namespace: String,
    /// "healthy", "warning", or "critical".
    pub status: String,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

/// The unified per-server record produced by the correlator: identity,
/// related resources, derived security posture, and scoring.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServerView {
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub source: ServerSource,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub tool_count: usize,
    pub tool_names: Vec<String>,

    pub effective_tool_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub effective_tool_names: Vec<String>,
    pub has_tool_restriction: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tools_by_route: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tools_by_policy: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub path_tools: BTreeMap<String, Vec<String>>,

    pub related_backends: Vec<RelatedResource>,
    pub related_policies: Vec<RelatedResource>,
    pub related_routes: Vec<RelatedResource>,
    pub related_gateways: Vec<RelatedResource>,
    pub related_agents: Vec<RelatedResource>,
    pub related_services: Vec<RelatedResource>,

    pub routed_through_gateway: bool,
    pub has_tls: bool,
    pub has_auth: bool,
    pub has_jwt: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_mode: Option<String>,
    pub has_rbac: bool,
    pub has_cors: bool,
    pub has_rate_limit: bool,
    pub has_prompt_guard: bool,

    pub score: u32,
    pub grade: String,
    pub status: String,
    pub findings: Vec<Finding>,
    pub score_breakdown: ViewBreakdown,
    pub score_explanations: Vec<ScoreExplanation>,
}

impl McpServerView {
    fn new(id: String, name: &str, namespace: &str, source: ServerSource) -> Self {
        Self {
            id,
            name: name.to_string(),
            namespace: namespace.to_string(),
            source,
            transport: None,
            url: None,
            port: None,
            tool_count: 0,
            tool_names: Vec::new(),
            effective_tool_count: 0,
            effective_tool_names: Vec::new(),
            has_tool_restriction: false,
            tools_by_route: BTreeMap::new(),
            tools_by_policy: BTreeMap::new(),
            path_tools: BTreeMap::new(),
            related_backends: Vec::new(),
            related_policies: Vec::new(),
            related_routes: Vec::new(),
            related_gateways: Vec::new(),
            related_agents: Vec::new(),
            related_services: Vec::new(),
            routed_through_gateway: false,
            has_tls: false,
            has_auth: false,
            has_jwt: false,
            jwt_mode: None,
            has_rbac: false,
            has_cors: false,
            has_rate_limit: false,
            has_prompt_guard: false,
            score: 0,
            grade: String::new(),
            status: String::new(),
            findings: Vec::new(),
            score_breakdown: ViewBreakdown::default(),
            score_explanations: Vec::new(),
        }
    }

    fn local(mcp: &McpServer) -> Self {
        let mut view = Self::new(
            format!("MCPServer/{}/{}", mcp.namespace, mcp.name),
            &mcp.name,
            &mcp.namespace,
            ServerSource::McpServer,
        );
        if !mcp.transport.is_empty() {
            view.transport = Some(mcp.transport.clone());
        }
        if mcp.port != 0 {
            view.port = Some(mcp.port);
        }
        view
    }

    fn remote(rms: &RemoteMcpServer) -> Self {
        let mut view = Self::new(
            format!("RemoteMCPServer/{}/{}", rms.namespace, rms.name),
            &rms.name,
            &rms.namespace,
            ServerSource::RemoteMcpServer,
        );
        view.url = Some(rms.url.clone());
        view.tool_count = rms.tool_count;
        view.tool_names = rms.tool_names.clone();
        view
    }
}

/// Correlates the snapshot into one view per local and remote MCP server,
/// scoring each against the policy.
pub fn build_views(
    state: &ClusterState,
    findings: &[Finding],
    policy: &Policy,
    timestamp: &str,
) -> Vec<McpServerView> {
    let mut views = Vec::with_capacity(state.mcp_servers.len() + state.remote_mcp_servers.len());
    for mcp in &state.mcp_servers {
        let mut view = McpServerView::local(mcp);
        correlate(&mut view, state);
        finalize_view(&mut view, findings, policy, timestamp);
        views.push(view);
    }
    for rms in &state.remote_mcp_servers {
        let mut view = McpServerView::remote(rms);
        correlate(&mut view, state);
        finalize_view(&mut view, findings, policy, timestamp);
        views.push(view);
    }
    views
}

/// Joins every related resource onto the view and folds in the derived
/// posture flags. Relations are resolved against the immutable snapshot in a
/// single pass per resource kind.
fn correlate(view: &mut McpServerView, state: &ClusterState) {
    // Backends: one relation per matching MCP target.
    for b in &state.backends {
        if b.backend_type != "mcp" {
            continue;
        }
        for t in &b.mcp_targets {
            if !matches_target(view, t) {
                continue;
            }
            view.related_backends.push(RelatedResource {
                kind: "AgentgatewayBackend".into(),
                name: b.name.clone(),
                namespace: b.namespace.clone(),
                status: backend_status(b).into(),
                details: json!({
                    "backendType": b.backend_type,
                    "hasTLS": b.has_tls,
                    "targetName": t.name,
                    "hasAuth": t.has_auth,
                    "hasRBAC": t.has_rbac,
                }),
            });
            view.has_tls |= b.has_tls;
            view.has_auth |= t.has_auth;
            view.has_rbac |= t.has_rbac;
        }
    }

    // Routes: related when a backendRef names a related backend, or names the
    // server itself. Whether the matched ref is an AgentgatewayBackend is
    // recorded and marks the server as routed.
    let mut route_idxs: Vec<usize> = Vec::new();
    let mut seen_routes: HashSet<&str> = HashSet::new();
    for (idx, route) in state.http_routes.iter().enumerate() {
        let mut matched = false;
        let mut uses_agw_backend = false;
        for backend_ref in &route.backend_refs {
            if view.related_backends.iter().any(|rb| rb.name == *backend_ref) {
                matched = true;
                uses_agw_backend = true;
            }
            if *backend_ref == view.name {
                matched = true;
                if state.backends.iter().any(|b| b.name == *backend_ref) {
                    uses_agw_backend = true;
                }
            }
        }
        if matched && seen_routes.insert(route.name.as_str()) {
            route_idxs.push(idx);
            view.related_routes.push(RelatedResource {
                kind: "HTTPRoute".into(),
                name: route.name.clone(),
                namespace: route.namespace.clone(),
                status: "healthy".into(),
                details: json!({
                    "parentGateway": route.parent_gateway,
                    "parentGatewayNamespace": route.parent_gateway_namespace,
                    "hasCORSFilter": route.has_cors_filter,
                    "usesAGWBackend": uses_agw_backend,
                    "paths": route.paths,
                }),
            });
            view.has_cors |= route.has_cors_filter;
            view.routed_through_gateway |= uses_agw_backend;
        }
    }

    // Gateways: only those a related route names as parent. The parent
    // namespace defaults to the route's own namespace.
    let mut gateway_keys: HashSet<(&str, &str)> = HashSet::new();
    for &idx in &route_idxs {
        let route = &state.http_routes[idx];
        if route.parent_gateway.is_empty() {
            continue;
        }
        let ns = if route.parent_gateway_namespace.is_empty() {
            route.namespace.as_str()
        } else {
            route.parent_gateway_namespace.as_str()
        };
        gateway_keys.insert((route.parent_gateway.as_str(), ns));
    }
    for gw in &state.gateways {
        if !gateway_keys.contains(&(gw.name.as_str(), gw.namespace.as_str())) {
            continue;
        }
        view.related_gateways.push(RelatedResource {
            kind: "Gateway".into(),
            name: gw.name.clone(),
            namespace: gw.namespace.clone(),
            status: gateway_status(gw).into(),
            details: json!({
                "gatewayClassName": gw.gateway_class_name,
                "programmed": gw.programmed,
            }),
        });
        if gw.gateway_class_name == "agentgateway" && !view.related_backends.is_empty() {
            view.routed_through_gateway = true;
        }
    }

    // Policies: related when any targetRef (namespace defaulting to the
    // policy's own) names a related gateway, route, or backend. A policy
    // without targetRefs is cluster-wide.
    let mut contributing: Vec<(String, Vec<String>)> = Vec::new();
    for p in &state.gateway_policies {
        let mut related = p.target_refs.is_empty();
        for tr in &p.target_refs {
            let tr_ns = p.namespace.as_str();
            related |= tr.kind == "Gateway"
                && view
                    .related_gateways
                    .iter()
                    .any(|g| g.name == tr.name && g.namespace == tr_ns);
            related |= tr.kind == "HTTPRoute"
                && view
                    .related_routes
                    .iter()
                    .any(|r| r.name == tr.name && r.namespace == tr_ns);
            related |= tr.kind == "AgentgatewayBackend"
                && view
                    .related_backends
                    .iter()
                    .any(|b| b.name == tr.name && b.namespace == tr_ns);
        }
        if !related {
            continue;
        }
        view.related_policies.push(RelatedResource {
            kind: "AgentgatewayPolicy".into(),
            name: p.name.clone(),
            namespace: p.namespace.clone(),
            status: policy_status(p).into(),
            details: json!({
                "hasJWT": p.has_jwt,
                "jwtMode": p.jwt_mode,
                "hasCORS": p.has_cors,
                "hasRBAC": p.has_rbac,
                "hasRateLimit": p.has_rate_limit,
                "hasPromptGuard": p.has_prompt_guard,
                "allowedTools": p.allowed_tools,
            }),
        });
        if p.has_jwt {
            view.has_jwt = true;
            view.jwt_mode = Some(p.jwt_mode.clone());
        }
        view.has_cors |= p.has_cors;
        view.has_rbac |= p.has_rbac;
        view.has_rate_limit |= p.has_rate_limit;
        view.has_prompt_guard |= p.has_prompt_guard;
        if !p.allowed_tools.is_empty() {
            view.has_tool_restriction = true;
            contributing.push((p.name.clone(), p.allowed_tools.clone()));
        }
    }

    // Policy-level CORS covers the related routes too.
    let policy_cors = view
        .related_policies
        .iter()
        .any(|p| p.details.get("hasCORS").and_then(|v| v.as_bool()).unwrap_or(false));
    if policy_cors {
        for route in &mut view.related_routes {
            if let Some(details) = route.details.as_object_mut() {
                details.insert("hasCORSFromPolicy".into(), json!(true));
            }
        }
    }

    // Agents: one relation per tool entry naming this server. Agents also
    // backfill tool names when the server itself exposed none.
    for agent in &state.agents {
        for tool in &agent.tools {
            if tool.name != view.name {
                continue;
            }
            view.related_agents.push(RelatedResource {
                kind: "Agent".into(),
                name: agent.name.clone(),
                namespace: agent.namespace.clone(),
                status: agent_status(agent).into(),
                details: json!({
                    "type": agent.agent_type,
                    "ready": agent.ready,
                    "tools": tool.tool_names,
                }),
            });
            if view.tool_count == 0 && !tool.tool_names.is_empty() {
                view.tool_names.extend(tool.tool_names.iter().cloned());
                view.tool_count = view.tool_names.len();
            }
        }
    }

    // Services: exact (name, namespace) identity.
    for svc in &state.services {
        if svc.name == view.name && svc.namespace == view.namespace {
            view.related_services.push(RelatedResource {
                kind: "Service".into(),
                name: svc.name.clone(),
                namespace: svc.namespace.clone(),
                status: "healthy".into(),
                details: json!({
                    "appProtocol": svc.app_protocol,
                    "isMCP": svc.is_mcp,
                    "ports": svc.ports,
                }),
            });
        }
    }

    // A remote server whose URL names an agentgateway-class service is
    // routed even without a backend/route association.
    if view.source == ServerSource::RemoteMcpServer && !view.routed_through_gateway {
        if let Some(url) = &view.url {
            for gw in &state.gateways {
                if gw.gateway_class_name != "agentgateway" {
                    continue;
                }
                for svc in &state.services {
                    if (svc.name == "agentgateway" || svc.name == gw.name)
                        && url_references_service(url, &svc.name, &svc.namespace)
                    {
                        view.routed_through_gateway = true;
                    }
                }
            }
        }
    }

    compute_effective_tools(view, state, &route_idxs, &contributing);
}

/// Resolves the server's effective tool exposure.
///
/// When policies restrict tools, each related route's effective set is the
/// smallest contributing set (most restrictive rule wins per route) and the
/// server's effective set is the largest per-route set (least restrictive
/// route wins). Without restriction, effective equals discovered.
fn compute_effective_tools(
    view: &mut McpServerView,
    state: &ClusterState,
    route_idxs: &[usize],
    contributing: &[(String, Vec<String>)],
) {
    if !view.has_tool_restriction || view.related_policies.is_empty() {
        view.effective_tool_count = view.tool_count;
        view.effective_tool_names = view.tool_names.clone();
        return;
    }

    // Every contributing policy applies to every related route; per-route
    // contributions keep policy order.
    let mut sets_by_route: BTreeMap<&str, Vec<(&str, BTreeSet<&str>)>> = BTreeMap::new();
    for (policy_name, tools) in contributing {
        let set: BTreeSet<&str> = tools.iter().map(String::as_str).collect();
        for &idx in route_idxs {
            sets_by_route
                .entry(state.http_routes[idx].name.as_str())
                .or_default()
                .push((policy_name.as_str(), set.clone()));
        }
    }

    let paths_by_route: BTreeMap<&str, &[String]> = route_idxs
        .iter()
        .map(|&idx| {
            let route = &state.http_routes[idx];
            (route.name.as_str(), route.paths.as_slice())
        })
        .collect();

    let mut tools_by_route = BTreeMap::new();
    let mut tools_by_policy = BTreeMap::new();
    let mut path_tools = BTreeMap::new();
    let mut most_open: Option<BTreeSet<&str>> = None;
    for (route_name, policy_sets) in &sets_by_route {
        let mut by_policy: BTreeMap<String, Vec<String>> = BTreeMap::new();

        let mut min_set: Option<&BTreeSet<&str>> = None;
        for (i, (policy_name, set)) in policy_sets.iter().enumerate() {
            let tools: Vec<String> = set.iter().map(|t| t.to_string()).collect();
            by_policy.insert(policy_name.to_string(), tools.clone());

            // Each contributing policy corresponds to one route rule, in order.
            if let Some(path) = paths_by_route.get(route_name).and_then(|paths| paths.get(i)) {
                path_tools.insert(path.clone(), tools);
            }

            if min_set.map_or(true, |m| set.len() < m.len()) {
                min_set = Some(set);
            }
        }
        tools_by_policy.insert(route_name.to_string(), by_policy);

        if let Some(min_set) = min_set {
            tools_by_route.insert(
                route_name.to_string(),
                min_set.iter().map(|t| t.to_string()).collect::<Vec<String>>(),
            );
            if most_open.as_ref().map_or(true, |m| min_set.len() > m.len()) {
                most_open = Some(min_set.clone());
            }
        }
    }
    view.tools_by_route = tools_by_route;
    view.tools_by_policy = tools_by_policy;
    view.path_tools = path_tools;

    let effective: Vec<String> = match most_open {
        Some(set) => set.into_iter().map(String::from).collect(),
        // No route to pin the restriction to: fall back to the deduplicated
        // union of every contributed set.
        None => {
            let union: BTreeSet<&str> = contributing
                .iter()
                .flat_map(|(_, tools)| tools.iter().map(String::as_str))
                .collect();
            union.into_iter().map(String::from).collect()
        }
    };
    view.effective_tool_count = effective.len();
    view.effective_tool_names = effective;
}

fn matches_target(view: &McpServerView, target: &McpTarget) -> bool {
    if target.name == view.name {
        return true;
    }
    let expected_host = format!("{}.{}.svc.cluster.local", view.name, view.namespace);
    if target.host == expected_host || target.host == view.name {
        return true;
    }
    // Remote servers match when the target's short host occurs in the URL,
    // e.g. host "tools.apps.svc.cluster.local" against "http://tools.apps:8084/mcp".
    if let Some(url) = &view.url {
        if !target.host.is_empty() {
            let short_host = target
                .host
                .split(".svc.cluster.local")
                .next()
                .unwrap_or_default();
            if !short_host.is_empty() && url.contains(short_host) {
                return true;
            }
        }
    }
    false
}

fn backend_status(b: &Backend) -> &'static str {
    if b.has_tls {
        "healthy"
    } else {
        "warning"
    }
}

fn gateway_status(gw: &Gateway) -> &'static str {
    if gw.programmed && gw.gateway_class_name == "agentgateway" {
        "healthy"
    } else if !gw.programmed {
        "critical"
    } else {
        "warning"
    }
}

fn policy_status(p: &GatewayPolicy) -> &'static str {
    if p.has_jwt && p.has_rbac && p.has_cors && p.has_rate_limit {
        "healthy"
    } else if p.has_jwt {
        "warning"
    } else {
        "critical"
    }
}

fn agent_status(a: &Agent) -> &'static str {
    if a.ready {
        "healthy"
    } else {
        "warning"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{AgentTool, HttpRoute, PolicyTargetRef, Service};

    fn base_state() -> ClusterState {
        ClusterState {
            gateways: vec![Gateway {
                name: "agw".into(),
                namespace: "infra".into(),
                gateway_class_name: "agentgateway".into(),
                programmed: true,
                ..Default::default()
            }],
            backends: vec![Backend {
                name: "fetcher-backend".into(),
                namespace: "infra".into(),
                backend_type: "mcp".into(),
                has_tls: true,
                mcp_targets: vec![McpTarget {
                    name: "fetcher".into(),
                    host: "fetcher.apps.svc.cluster.local".into(),
                    port: 80,
                    protocol: "StreamableHTTP".into(),
                    has_auth: true,
                    has_rbac: true,
                }],
            }],
            http_routes: vec![HttpRoute {
                name: "fetcher-route".into(),
                namespace: "infra".into(),
                parent_gateway: "agw".into(),
                backend_refs: vec!["fetcher-backend".into()],
                paths: vec!["/ro".into(), "/rw".into()],
                ..Default::default()
            }],
            gateway_policies: vec![GatewayPolicy {
                name: "secure".into(),
                namespace: "infra".into(),
                target_refs: vec![PolicyTargetRef {
                    group: "gateway.networking.k8s.io".into(),
                    kind: "Gateway".into(),
                    name: "agw".into(),
                }],
                has_jwt: true,
                jwt_mode: "Strict".into(),
                has_cors: true,
                has_csrf: true,
                has_rbac: true,
                has_rate_limit: true,
                has_prompt_guard: true,
                ..Default::default()
            }],
            mcp_servers: vec![McpServer {
                name: "fetcher".into(),
                namespace: "apps".into(),
                transport: "streamablehttp".into(),
                port: 8080,
            }],
            namespaces: vec!["infra".into(), "apps".into()],
            ..Default::default()
        }
    }

    fn view_for<'v>(views: &'v [McpServerView], name: &str) -> &'v McpServerView {
        views.iter().find(|v| v.name == name).expect("view")
    }

    #[test]
    fn fully_wired_server_relates_everything() {
        let state = base_state();
        let views = build_views(&state, &[], &Policy::default(), "2026-01-01T00:00:00Z");
        let view = view_for(&views, "fetcher");

        assert_eq!(view.related_backends.len(), 1);
        assert_eq!(view.related_routes.len(), 1);
        assert_eq!(view.related_gateways.len(), 1);
        assert_eq!(view.related_policies.len(), 1);
        assert!(view.routed_through_gateway);
        assert!(view.has_tls && view.has_auth && view.has_rbac);
        assert!(view.has_jwt && view.has_cors && view.has_rate_limit && view.has_prompt_guard);
        assert_eq!(view.jwt_mode.as_deref(), Some("Strict"));
    }

    #[test]
    fn route_matching_by_literal_server_name() {
        let mut state = base_state();
        state.backends.clear();
        state.http_routes[0].backend_refs = vec!["fetcher".into()];
        let views = build_views(&state, &[], &Policy::default(), "2026-01-01T00:00:00Z");
        let view = view_for(&views, "fetcher");

        assert_eq!(view.related_routes.len(), 1);
        // The literal ref is not an AgentgatewayBackend and there is no
        // backend relation, so the server is not routed.
        assert!(!view.routed_through_gateway);
    }

    #[test]
    fn cluster_wide_policy_relates_to_every_server() {
        let mut state = base_state();
        state.gateway_policies[0].target_refs.clear();
        state.mcp_servers.push(McpServer {
            name: "other".into(),
            namespace: "apps".into(),
            transport: "stdio".into(),
            port: 0,
        });
        let views = build_views(&state, &[], &Policy::default(), "2026-01-01T00:00:00Z");
        assert!(views.iter().all(|v| v.related_policies.len() == 1));
    }

    #[test]
    fn policy_target_namespace_defaults_to_policy_namespace() {
        let mut state = base_state();
        // Policy lives in a different namespace than the gateway it names, so
        // the defaulted targetRef namespace no longer matches.
        state.gateway_policies[0].namespace = "elsewhere".into();
        let views = build_views(&state, &[], &Policy::default(), "2026-01-01T00:00:00Z");
        assert!(view_for(&views, "fetcher").related_policies.is_empty());
    }

    #[test]
    fn agent_tools_backfill_discovered_tools() {
        let mut state = base_state();
        state.agents = vec![Agent {
            name: "helper".into(),
            namespace: "apps".into(),
            agent_type: "Declarative".into(),
            ready: true,
            tools: vec![AgentTool {
                tool_type: "McpServer".into(),
                kind: "MCPServer".into(),
                name: "fetcher".into(),
                tool_names: vec!["fetch".into(), "crawl".into()],
            }],
        }];
        let views = build_views(&state, &[], &Policy::default(), "2026-01-01T00:00:00Z");
        let view = view_for(&views, "fetcher");
        assert_eq!(view.tool_count, 2);
        assert_eq!(view.related_agents.len(), 1);
        assert_eq!(view.effective_tool_count, 2);
    }

    #[test]
    fn remote_url_promotes_gateway_routing() {
        let mut state = base_state();
        state.backends.clear();
        state.http_routes.clear();
        state.services = vec![Service {
            name: "agentgateway".into(),
            namespace: "infra".into(),
            ..Default::default()
        }];
        state.remote_mcp_servers = vec![RemoteMcpServer {
            name: "remote".into(),
            namespace: "apps".into(),
            url: "http://agentgateway.infra:8080/mcp/backend".into(),
            tool_count: 3,
            tool_names: vec!["a".into(), "b".into(), "c".into()],
        }];
        let views = build_views(&state, &[], &Policy::default(), "2026-01-01T00:00:00Z");
        assert!(view_for(&views, "remote").routed_through_gateway);
    }

    #[test]
    fn remote_target_short_host_matches_url() {
        let mut state = base_state();
        state.mcp_servers.clear();
        state.backends[0].mcp_targets[0].host = "tools.apps.svc.cluster.local".into();
        state.remote_mcp_servers = vec![RemoteMcpServer {
            name: "remote".into(),
            namespace: "apps".into(),
            url: "http://tools.apps:8084/mcp".into(),
            tool_count: 1,
            tool_names: vec!["t".into()],
        }];
        let views = build_views(&state, &[], &Policy::default(), "2026-01-01T00:00:00Z");
        assert_eq!(view_for(&views, "remote").related_backends.len(), 1);
    }

    #[test]
    fn effective_tools_pick_least_restrictive_route_of_most_restrictive_sets() {
        let mut state = base_state();
        state.remote_mcp_servers = vec![RemoteMcpServer {
            name: "fetcher".into(),
            namespace: "apps".into(),
            url: "http://fetcher.apps:80/mcp".into(),
            tool_count: 10,
            tool_names: (0..10).map(|i| format!("tool-{i}")).collect(),
        }];
        state.mcp_servers.clear();
        state.gateway_policies = vec![
            GatewayPolicy {
                name: "ro".into(),
                namespace: "infra".into(),
                allowed_tools: vec!["read".into(), "list".into()],
                ..Default::default()
            },
            GatewayPolicy {
                name: "rw".into(),
                namespace: "infra".into(),
                allowed_tools: vec!["read".into(), "write".into(), "delete".into()],
                ..Default::default()
            },
        ];
        let views = build_views(&state, &[], &Policy::default(), "2026-01-01T00:00:00Z");
        let view = view_for(&views, "fetcher");

        assert!(view.has_tool_restriction);
        // One route; per-route minimum is the 2-tool set.
        assert_eq!(view.effective_tool_count, 2);
        assert_eq!(view.effective_tool_names, vec!["list".to_string(), "read".to_string()]);
        let route_tools = view.tools_by_route.get("fetcher-route").unwrap();
        assert_eq!(route_tools.len(), 2);
        let by_policy = view.tools_by_policy.get("fetcher-route").unwrap();
        assert_eq!(by_policy.get("ro").unwrap().len(), 2);
        assert_eq!(by_policy.get("rw").unwrap().len(), 3);
        // Policy i maps onto path i.
        assert_eq!(view.path_tools.get("/ro").unwrap().len(), 2);
        assert_eq!(view.path_tools.get("/rw").unwrap().len(), 3);
    }

    #[test]
    fn restriction_without_routes_falls_back_to_union() {
        let mut state = base_state();
        state.http_routes.clear();
        state.backends.clear();
        state.gateway_policies = vec![GatewayPolicy {
            name: "restrict".into(),
            namespace: "infra".into(),
            allowed_tools: vec!["b".into(), "a".into()],
            ..Default::default()
        }];
        let views = build_views(&state, &[], &Policy::default(), "2026-01-01T00:00:00Z");
        let view = view_for(&views, "fetcher");
        assert_eq!(view.effective_tool_names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn routes_annotated_with_policy_cors() {
        let state = base_state();
        let views = build_views(&state, &[], &Policy::default(), "2026-01-01T00:00:00Z");
        let view = view_for(&views, "fetcher");
        let route = &view.related_routes[0];
        assert_eq!(route.details.get("hasCORSFromPolicy"), Some(&json!(true)));
    }
}
