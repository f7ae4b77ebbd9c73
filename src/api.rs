//! The HTTP/JSON read API over the published evaluation results. Read-only:
//! every handler snapshots the shared state under one read-hold and encodes
//! from the copy.

use crate::state::SharedState;
use crate::status::phase_for;
use crate::trends::TrendHistory;
use crate::VERSION;
use futures::future;
use hyper::{Body, Method, Request, Response, StatusCode};
use mcp_governance_controller_core::{grade_for, Finding, Policy, ResourceSummary, Severity};
use mcp_governance_controller_inventory::SharedInventory;
use mcp_governance_controller_k8s_watch::Watcher;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct ApiState {
    pub(crate) shared: SharedState,
    pub(crate) trends: TrendHistory,
    pub(crate) inventory: SharedInventory,
    pub(crate) watcher: Option<Arc<Watcher>>,
    pub(crate) ai_result: Arc<RwLock<Option<serde_json::Value>>>,
}

pub(crate) async fn serve(
    addr: SocketAddr,
    state: ApiState,
    drain: drain::Watch,
) -> Result<(), hyper::Error> {
    let server =
        hyper::server::Server::bind(&addr).serve(hyper::service::make_service_fn(move |_conn| {
            let state = state.clone();
            future::ok::<_, hyper::Error>(hyper::service::service_fn(
                move |req: Request<Body>| future::ok::<_, hyper::Error>(handle(&state, req)),
            ))
        }));
    info!(%addr, "governance API listening");
    server
        .with_graceful_shutdown(async move {
            let _ = drain.signaled().await;
        })
        .await
}

fn handle(state: &ApiState, req: Request<Body>) -> Response<Body> {
    if req.method() == Method::OPTIONS {
        return with_cors(
            Response::builder()
                .status(StatusCode::OK)
                .body(Body::default())
                .unwrap(),
        );
    }
    if req.method() != Method::GET {
        return with_cors(
            Response::builder()
                .status(StatusCode::METHOD_NOT_ALLOWED)
                .body(Body::default())
                .unwrap(),
        );
    }

    let response = match req.uri().path() {
        "/api/health" => json_response(&json!({"status": "healthy", "version": VERSION})),
        "/api/governance/score" => handle_score(state),
        "/api/governance/findings" => handle_findings(state),
        "/api/governance/resources" => handle_resources(state),
        "/api/governance/resources/detail" => handle_resource_detail(state),
        "/api/governance/namespaces" => handle_namespaces(state),
        "/api/governance/breakdown" => handle_breakdown(state),
        "/api/governance/evaluation" => handle_evaluation(state),
        "/api/governance/trends" => json_response(&json!({"trends": state.trends.points()})),
        "/api/governance/catalog" => json_response(&json!({
            "resources": state.inventory.resources(),
            "summary": state.inventory.summary(),
        })),
        "/api/governance/watcher" => json_response(&json!({
            "watcher": state.watcher.as_ref().map(|w| w.stats()),
            "inventory": state.inventory.stats(),
        })),
        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::default())
            .unwrap(),
    };
    with_cors(response)
}

fn with_cors(mut response: Response<Body>) -> Response<Body> {
    let headers = response.headers_mut();
    headers.insert("access-control-allow-origin", "*".parse().unwrap());
    headers.insert("access-control-allow-methods", "GET, POST, OPTIONS".parse().unwrap());
    headers.insert(
        "access-control-allow-headers",
        "Content-Type, Authorization".parse().unwrap(),
    );
    response
}

fn json_response<T: Serialize>(data: &T) -> Response<Body> {
    match serde_json::to_vec(data) {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(hyper::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap(),
        Err(error) => Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Body::from(format!("encoding failed: {error}")))
            .unwrap(),
    }
}

fn status_label(score: u32) -> &'static str {
    match score {
        90.. => "passing",
        70..=89 => "warning",
        50..=69 => "failing",
        _ => "critical",
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CategoryDetail {
    category: &'static str,
    score: u32,
    weight: u32,
    weighted: f64,
    status: &'static str,
    infra_absent: bool,
}

fn handle_score(state: &ApiState) -> Response<Body> {
    let snapshot = state.shared.snapshot();
    let Some(result) = &snapshot.result else {
        return json_response(&json!({"score": 0, "grade": "F", "phase": "Unknown"}));
    };

    let policy = &snapshot.policy;
    let w = &policy.weights;
    let bd = &result.score_breakdown;
    let infra = |name: &str| bd.infra_absent.get(name).copied().unwrap_or(false);

    let mut categories = Vec::new();
    let mut push = |name: &'static str, score: u32, weight: u32, absent: bool| {
        categories.push(CategoryDetail {
            category: name,
            score,
            weight,
            weighted: 0.0,
            status: status_label(score),
            infra_absent: absent,
        });
    };
    if policy.require_agent_gateway {
        push("Agent Gateway", bd.agent_gateway_score, w.agent_gateway_integration, infra("Agent Gateway"));
    }
    if policy.require_jwt_auth {
        push("Authentication", bd.authentication_score, w.authentication, infra("Authentication"));
    }
    if policy.require_rbac {
        push("Authorization", bd.authorization_score, w.authorization, infra("Authorization"));
    }
    if policy.require_cors {
        push("CORS Policy", bd.cors_score, w.cors_policy, infra("CORS Policy"));
    }
    if policy.require_tls {
        push("TLS Encryption", bd.tls_score, w.tls_encryption, infra("TLS Encryption"));
    }
    if policy.require_prompt_guard {
        push("Prompt Guard", bd.prompt_guard_score, w.prompt_guard, infra("Prompt Guard"));
    }
    if policy.require_rate_limit {
        push("Rate Limiting", bd.rate_limit_score, w.rate_limit, infra("Rate Limiting"));
    }
    if policy.max_tools_warning > 0 || policy.max_tools_critical > 0 {
        push("Tool Scope", bd.tool_scope_score, w.tool_scope, false);
    }

    let total_weight: u32 = categories.iter().map(|c| c.weight).sum();
    let total_weight = if total_weight == 0 { 100 } else { total_weight };
    for c in &mut categories {
        c.weighted = f64::from(c.score * c.weight) / f64::from(total_weight);
    }

    let p = &policy.severity_penalties;
    let mut body = json!({
        "score": result.score,
        "grade": grade_for(result.score),
        "phase": phase_for(result.score),
        "timestamp": result.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        "categories": categories,
        "severityPenalties": {
            "Critical": p.critical,
            "High": p.high,
            "Medium": p.medium,
            "Low": p.low,
        },
        "explanation": format!(
            "Score is a weighted average of {} governance categories. Each category is scored \
             0-100 based on findings (Critical: -{}pts, High: -{}pts, Medium: -{}pts, Low: \
             -{}pts). The final score {}/100 = Grade {}.",
            categories.len(), p.critical, p.high, p.medium, p.low,
            result.score, grade_for(result.score),
        ),
        "aiAgentEnabled": policy.ai_agent.enabled,
    });
    if let Some(ai) = state.ai_result.read().clone() {
        body["aiScore"] = ai;
    }
    json_response(&body)
}

fn handle_findings(state: &ApiState) -> Response<Body> {
    let snapshot = state.shared.snapshot();
    let Some(result) = &snapshot.result else {
        return json_response(&json!({
            "findings": [],
            "total": 0,
            "bySeverity": {},
        }));
    };
    let mut by_severity: BTreeMap<String, usize> = BTreeMap::new();
    for f in &result.findings {
        *by_severity.entry(f.severity.to_string()).or_default() += 1;
    }
    json_response(&json!({
        "findings": result.findings,
        "total": result.findings.len(),
        "bySeverity": by_severity,
    }))
}

fn handle_resources(state: &ApiState) -> Response<Body> {
    let snapshot = state.shared.snapshot();
    match &snapshot.result {
        Some(result) => json_response(&result.resource_summary),
        None => json_response(&ResourceSummary::default()),
    }
}

fn handle_namespaces(state: &ApiState) -> Response<Body> {
    let snapshot = state.shared.snapshot();
    match &snapshot.result {
        Some(result) => json_response(&json!({"namespaces": result.namespace_scores})),
        None => json_response(&json!({"namespaces": []})),
    }
}

fn handle_breakdown(state: &ApiState) -> Response<Body> {
    let snapshot = state.shared.snapshot();
    let Some(result) = &snapshot.result else {
        return json_response(&json!({}));
    };
    let policy = &snapshot.policy;
    let bd = &result.score_breakdown;
    let mut body = serde_json::Map::new();
    if policy.require_agent_gateway {
        body.insert("agentGatewayScore".into(), bd.agent_gateway_score.into());
    }
    if policy.require_jwt_auth {
        body.insert("authenticationScore".into(), bd.authentication_score.into());
    }
    if policy.require_rbac {
        body.insert("authorizationScore".into(), bd.authorization_score.into());
    }
    if policy.require_cors {
        body.insert("corsScore".into(), bd.cors_score.into());
    }
    if policy.require_tls {
        body.insert("tlsScore".into(), bd.tls_score.into());
    }
    if policy.require_prompt_guard {
        body.insert("promptGuardScore".into(), bd.prompt_guard_score.into());
    }
    if policy.require_rate_limit {
        body.insert("rateLimitScore".into(), bd.rate_limit_score.into());
    }
    if policy.max_tools_warning > 0 || policy.max_tools_critical > 0 {
        body.insert("toolScopeScore".into(), bd.tool_scope_score.into());
    }
    json_response(&body)
}

fn handle_evaluation(state: &ApiState) -> Response<Body> {
    let snapshot = state.shared.snapshot();
    match &snapshot.result {
        Some(result) => json_response(result.as_ref()),
        None => Response::builder()
            .status(StatusCode::SERVICE_UNAVAILABLE)
            .body(Body::from("No evaluation available"))
            .unwrap(),
    }
}

/// Findings regrouped per individual resource, with a severity-penalty score
/// per resource and a virtual entry for cluster-wide findings.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResourceDetail {
    resource_ref: String,
    kind: String,
    name: String,
    namespace: String,
    status: &'static str,
    score: u32,
    findings: Vec<Finding>,
    critical: usize,
    high: usize,
    medium: usize,
    low: usize,
}

fn handle_resource_detail(state: &ApiState) -> Response<Body> {
    let snapshot = state.shared.snapshot();
    let (Some(result), Some(cluster)) = (&snapshot.result, &snapshot.cluster) else {
        return json_response(&json!({"resources": [], "total": 0}));
    };

    let mut by_ref: BTreeMap<&str, Vec<Finding>> = BTreeMap::new();
    let mut cluster_wide: Vec<Finding> = Vec::new();
    for f in &result.findings {
        match &f.resource_ref {
            Some(resource_ref) => by_ref.entry(resource_ref.as_str()).or_default().push(f.clone()),
            None => cluster_wide.push(f.clone()),
        }
    }
    let mut take = |resource_ref: &str| by_ref.remove(resource_ref).unwrap_or_default();

    let mut resources = Vec::new();
    for b in &cluster.backends {
        let resource_ref = format!("AgentgatewayBackend/{}/{}", b.namespace, b.name);
        let findings = take(&resource_ref);
        resources.push(resource_detail(
            resource_ref,
            "AgentgatewayBackend",
            &b.name,
            &b.namespace,
            findings,
            &snapshot.policy,
        ));
    }
    for p in &cluster.gateway_policies {
        let resource_ref = format!("AgentgatewayPolicy/{}/{}", p.namespace, p.name);
        let findings = take(&resource_ref);
        resources.push(resource_detail(
            resource_ref,
            "AgentgatewayPolicy",
            &p.name,
            &p.namespace,
            findings,
            &snapshot.policy,
        ));
    }
    for g in &cluster.gateways {
        let resource_ref = format!("Gateway/{}/{}", g.namespace, g.name);
        let findings = take(&resource_ref);
        resources.push(resource_detail(
            resource_ref,
            "Gateway",
            &g.name,
            &g.namespace,
            findings,
            &snapshot.policy,
        ));
    }
    for r in &cluster.http_routes {
        let resource_ref = format!("HTTPRoute/{}/{}", r.namespace, r.name);
        let findings = take(&resource_ref);
        resources.push(resource_detail(
            resource_ref,
            "HTTPRoute",
            &r.name,
            &r.namespace,
            findings,
            &snapshot.policy,
        ));
    }
    for a in &cluster.agents {
        let resource_ref = format!("Agent/{}/{}", a.namespace, a.name);
        let findings = take(&resource_ref);
        resources.push(resource_detail(
            resource_ref,
            "Agent",
            &a.name,
            &a.namespace,
            findings,
            &snapshot.policy,
        ));
    }
    for m in &cluster.mcp_servers {
        let resource_ref = format!("MCPServer/{}/{}", m.namespace, m.name);
        let findings = take(&resource_ref);
        resources.push(resource_detail(
            resource_ref,
            "MCPServer",
            &m.name,
            &m.namespace,
            findings,
            &snapshot.policy,
        ));
    }
    for r in &cluster.remote_mcp_servers {
        let resource_ref = format!("RemoteMCPServer/{}/{}", r.namespace, r.name);
        let findings = take(&resource_ref);
        resources.push(resource_detail(
            resource_ref,
            "RemoteMCPServer",
            &r.name,
            &r.namespace,
            findings,
            &snapshot.policy,
        ));
    }
    if !cluster_wide.is_empty() {
        resources.push(resource_detail(
            "cluster-wide".to_string(),
            "Cluster",
            "cluster-wide-policies",
            "",
            cluster_wide,
            &snapshot.policy,
        ));
    }

    json_response(&json!({"resources": resources, "total": resources.len()}))
}

fn resource_detail(
    resource_ref: String,
    kind: &str,
    name: &str,
    namespace: &str,
    findings: Vec<Finding>,
    policy: &Policy,
) -> ResourceDetail {
    let count = |severity: Severity| findings.iter().filter(|f| f.severity == severity).count();
    let critical = count(Severity::Critical);
    let high = count(Severity::High);
    let medium = count(Severity::Medium);
    let low = count(Severity::Low);

    // Any critical finding zeroes the resource; otherwise deduct penalties.
    let score = if critical > 0 {
        0
    } else {
        let p = &policy.severity_penalties;
        let penalty = high as u32 * p.high + medium as u32 * p.medium + low as u32 * p.low;
        100u32.saturating_sub(penalty)
    };

    let status = if findings.is_empty() {
        "compliant"
    } else if critical > 0 {
        "critical"
    } else if high > 0 {
        "failing"
    } else if medium > 0 {
        "warning"
    } else {
        "info"
    };

    ResourceDetail {
        resource_ref,
        kind: kind.to_string(),
        name: name.to_string(),
        namespace: namespace.to_string(),
        status,
        score,
        findings,
        critical,
        high,
        medium,
        low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_governance_controller_core::Category;

    fn finding(severity: Severity) -> Finding {
        Finding::new(
            "X-001",
            severity,
            Category::Tls,
            "t",
            "d",
            "i",
            "r",
            "2026-01-01T00:00:00Z",
        )
    }

    #[test]
    fn resource_detail_scoring() {
        let policy = Policy::default();

        let clean = resource_detail("r".into(), "K", "n", "ns", vec![], &policy);
        assert_eq!((clean.score, clean.status), (100, "compliant"));

        let critical =
            resource_detail("r".into(), "K", "n", "ns", vec![finding(Severity::Critical)], &policy);
        assert_eq!((critical.score, critical.status), (0, "critical"));

        let high = resource_detail(
            "r".into(),
            "K",
            "n",
            "ns",
            vec![finding(Severity::High), finding(Severity::Low)],
            &policy,
        );
        assert_eq!(high.score, 100 - 25 - 5);
        assert_eq!(high.status, "failing");
        assert_eq!((high.high, high.low), (1, 1));
    }

    #[test]
    fn status_labels() {
        assert_eq!(status_label(95), "passing");
        assert_eq!(status_label(75), "warning");
        assert_eq!(status_label(55), "failing");
        assert_eq!(status_label(5), "critical");
    }
}
