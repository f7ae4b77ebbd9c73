use crate::finding::{Category, Finding, Severity};
use crate::policy::Policy;
use crate::state::{url_references_service, ClusterState, McpServer};

/// A named governance rule. Each rule inspects the snapshot and produces zero
/// or more findings; the catalog is closed and ordered, so the finding list is
/// deterministic for a given (state, policy).
pub struct Rule {
    pub name: &'static str,
    pub category: Category,
    pub check: fn(&ClusterState, &Policy, &str) -> Vec<Finding>,
}

pub fn rule_catalog() -> &'static [Rule] {
    const RULES: &[Rule] = &[
        Rule {
            name: "agent-gateway-compliance",
            category: Category::AgentGateway,
            check: check_agent_gateway,
        },
        Rule {
            name: "authentication",
            category: Category::Authentication,
            check: check_authentication,
        },
        Rule {
            name: "authorization",
            category: Category::Authorization,
            check: check_authorization,
        },
        Rule {
            name: "cors",
            category: Category::Cors,
            check: check_cors,
        },
        Rule {
            name: "tls",
            category: Category::Tls,
            check: check_tls,
        },
        Rule {
            name: "prompt-guard",
            category: Category::PromptGuard,
            check: check_prompt_guard,
        },
        Rule {
            name: "rate-limit",
            category: Category::RateLimit,
            check: check_rate_limit,
        },
        Rule {
            name: "exposure",
            category: Category::Exposure,
            check: check_exposure,
        },
        Rule {
            name: "tool-count",
            category: Category::ToolScope,
            check: check_tool_count,
        },
    ];
    RULES
}

/// Runs every rule in catalog order against the filtered snapshot.
pub fn run_rules(state: &ClusterState, policy: &Policy, timestamp: &str) -> Vec<Finding> {
    rule_catalog()
        .iter()
        .flat_map(|rule| (rule.check)(state, policy, timestamp))
        .collect()
}

/// Finding ids that indicate the required infrastructure for a category is
/// completely missing. Their presence forces the category score to zero.
pub fn is_infrastructure_absence(id: &str) -> bool {
    matches!(
        id,
        "AGW-001"
            | "AGW-003"
            | "AGW-004"
            | "AUTH-002"
            | "RBAC-002"
            | "CORS-003"
            | "TLS-002"
            | "PG-002"
            | "RL-002"
    )
}

/// Findings without a resource ref that apply to every MCP server view.
pub fn is_cluster_wide(id: &str) -> bool {
    matches!(
        id,
        "AGW-001"
            | "AGW-003"
            | "AGW-004"
            | "AUTH-002"
            | "CORS-001"
            | "CORS-002"
            | "CORS-003"
            | "RL-001"
            | "RL-002"
            | "RBAC-001"
            | "RBAC-002"
            | "PG-001"
            | "PG-002"
            | "TLS-002"
    )
}

fn check_agent_gateway(state: &ClusterState, policy: &Policy, ts: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    if !policy.require_agent_gateway {
        return findings;
    }

    if state.gateways.is_empty() {
        findings.push(Finding::new(
            "AGW-001",
            Severity::Critical,
            Category::AgentGateway,
            "No agentgateway Gateway detected",
            "No Gateway resource with gatewayClassName 'agentgateway' was found in the cluster. \
             All MCP communication must be routed through agentgateway.",
            "MCP servers and agents have no centralized security enforcement point. All MCP \
             traffic is ungoverned.",
            "Deploy an agentgateway Gateway: kubectl apply -f gateway.yaml with \
             gatewayClassName: agentgateway",
            ts,
        ));
    }

    let mut has_agentgateway_class = false;
    for gw in &state.gateways {
        if gw.gateway_class_name == "agentgateway" {
            has_agentgateway_class = true;
            if !gw.programmed {
                findings.push(
                    Finding::new(
                        "AGW-002",
                        Severity::High,
                        Category::AgentGateway,
                        format!("agentgateway '{}' is not programmed", gw.name),
                        format!(
                            "Gateway '{}/{}' exists but is not in Programmed state. MCP traffic \
                             routing may be disrupted.",
                            gw.namespace, gw.name
                        ),
                        "MCP traffic cannot be properly routed through the agentgateway \
                         enforcement point.",
                        "Check agentgateway controller logs and verify the Gateway resource \
                         status.",
                        ts,
                    )
                    .with_resource("Gateway", &gw.namespace, &gw.name),
                );
            }
        }
    }
    if !has_agentgateway_class && !state.gateways.is_empty() {
        findings.push(Finding::new(
            "AGW-003",
            Severity::Critical,
            Category::AgentGateway,
            "No Gateway using agentgateway GatewayClass",
            "Gateway resources exist but none use the 'agentgateway' GatewayClass. MCP governance \
             requires agentgateway as the control plane.",
            "MCP traffic is not being processed by the agentgateway data plane.",
            "Create a Gateway with gatewayClassName: agentgateway",
            ts,
        ));
    }

    for mcp in &state.mcp_servers {
        if !is_mcp_server_routed(mcp, state) {
            findings.push(
                Finding::new(
                    format!("AGW-100-{}", mcp.name),
                    Severity::Critical,
                    Category::AgentGateway,
                    format!("MCPServer '{}' bypasses agentgateway", mcp.name),
                    format!(
                        "MCPServer '{}/{}' is deployed but has no AgentgatewayBackend or \
                         HTTPRoute routing traffic through agentgateway.",
                        mcp.namespace, mcp.name
                    ),
                    "This MCP server operates outside governance. No authentication, \
                     authorization, rate limiting, or observability is applied.",
                    "Create an AgentgatewayBackend with mcp targets pointing to this server's \
                     Service, and an HTTPRoute to route through agentgateway.",
                    ts,
                )
                .with_resource("MCPServer", &mcp.namespace, &mcp.name),
            );
        }
    }

    for agent in &state.agents {
        for tool in &agent.tools {
            if tool.tool_type == "McpServer" && tool.kind == "MCPServer" {
                findings.push(
                    Finding::new(
                        format!("AGW-200-{}-{}", agent.name, tool.name),
                        Severity::Medium,
                        Category::AgentGateway,
                        format!(
                            "Agent '{}' uses MCPServer '{}' - verify agentgateway routing",
                            agent.name, tool.name
                        ),
                        format!(
                            "Agent '{}/{}' references MCPServer '{}'. Ensure discovery is \
                             disabled on the server and traffic routes through agentgateway.",
                            agent.namespace, agent.name, tool.name
                        ),
                        "If MCP traffic bypasses agentgateway, security policies are not \
                         enforced.",
                        "Disable direct discovery on the MCPServer and configure \
                         AgentgatewayBackend routing.",
                        ts,
                    )
                    .with_resource("Agent", &agent.namespace, &agent.name),
                );
            }
        }
    }

    let mcp_backends = state.backends.iter().filter(|b| b.backend_type == "mcp").count();
    if mcp_backends == 0 && !(state.mcp_servers.is_empty() && state.remote_mcp_servers.is_empty()) {
        findings.push(Finding::new(
            "AGW-004",
            Severity::High,
            Category::AgentGateway,
            "No MCP-type AgentgatewayBackend configured",
            "MCP servers exist in the cluster but no AgentgatewayBackend of type 'mcp' is \
             configured to route their traffic.",
            "MCP servers are accessible directly without agentgateway governance.",
            "Create AgentgatewayBackend resources with spec.mcp.targets pointing to your MCP \
             server Services.",
            ts,
        ));
    }

    findings
}

fn check_authentication(state: &ClusterState, policy: &Policy, ts: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    if !policy.require_jwt_auth {
        return findings;
    }

    let mut has_jwt_policy = false;
    for p in &state.gateway_policies {
        if p.has_jwt {
            has_jwt_policy = true;
            if p.jwt_mode == "Optional" || p.jwt_mode == "Permissive" {
                findings.push(
                    Finding::new(
                        format!("AUTH-001-{}", p.name),
                        Severity::High,
                        Category::Authentication,
                        format!("JWT auth mode is '{}' on policy '{}'", p.jwt_mode, p.name),
                        format!(
                            "AgentgatewayPolicy '{}/{}' has JWT authentication in '{}' mode. This \
                             allows unauthenticated requests.",
                            p.namespace, p.name, p.jwt_mode
                        ),
                        "MCP endpoints accept requests without valid JWT tokens, allowing \
                         unauthorized access.",
                        "Set jwtAuthentication.mode to 'Strict' in the AgentgatewayPolicy.",
                        ts,
                    )
                    .with_resource("AgentgatewayPolicy", &p.namespace, &p.name),
                );
            }
        }
    }

    if !has_jwt_policy {
        findings.push(Finding::new(
            "AUTH-002",
            Severity::Critical,
            Category::Authentication,
            "No JWT authentication configured",
            "No AgentgatewayPolicy with JWT authentication was found. All MCP endpoints are \
             unauthenticated.",
            "Any client can access MCP tools without presenting valid credentials.",
            "Create an AgentgatewayPolicy with traffic.jwtAuthentication targeting your Gateway \
             or HTTPRoutes.",
            ts,
        ));
    }

    for b in &state.backends {
        if b.backend_type != "mcp" {
            continue;
        }
        for t in &b.mcp_targets {
            if !t.has_auth {
                findings.push(
                    Finding::new(
                        format!("AUTH-100-{}-{}", b.name, t.name),
                        Severity::Medium,
                        Category::Authentication,
                        format!("MCP target '{}' in backend '{}' has no MCP-level auth", t.name, b.name),
                        format!(
                            "AgentgatewayBackend '{}' MCP target '{}' does not configure MCP-spec \
                             authentication (OAuth/OIDC).",
                            b.name, t.name
                        ),
                        "MCP-level authentication is not enforced. Relies solely on \
                         transport-level auth.",
                        "Configure backend.mcp.authentication with a provider and issuer in the \
                         AgentgatewayBackend or AgentgatewayPolicy.",
                        ts,
                    )
                    .with_resource("AgentgatewayBackend", &b.namespace, &b.name),
                );
            }
        }
    }

    findings
}

fn check_authorization(state: &ClusterState, policy: &Policy, ts: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    if !policy.require_rbac {
        return findings;
    }

    if state.gateway_policies.is_empty() && state.backends.is_empty() {
        findings.push(Finding::new(
            "RBAC-002",
            Severity::Critical,
            Category::Authorization,
            "No agentgateway infrastructure for authorization enforcement",
            "RBAC is required by policy but no AgentgatewayPolicies or AgentgatewayBackends \
             exist. Authorization cannot be enforced without agentgateway infrastructure.",
            "All MCP tool access is completely unrestricted. No role-based access control is \
             possible.",
            "Deploy agentgateway with Gateway, AgentgatewayBackend, and AgentgatewayPolicy \
             resources with authorization rules.",
            ts,
        ));
        return findings;
    }

    let has_rbac_policy = state.gateway_policies.iter().any(|p| p.has_rbac);

    for b in &state.backends {
        if b.backend_type != "mcp" {
            continue;
        }
        for t in &b.mcp_targets {
            if !t.has_rbac {
                findings.push(
                    Finding::new(
                        format!("RBAC-100-{}-{}", b.name, t.name),
                        Severity::High,
                        Category::Authorization,
                        format!("No CEL-based tool access control on MCP target '{}'", t.name),
                        format!(
                            "MCP target '{}' in AgentgatewayBackend '{}' has no \
                             authorization.matchExpressions for tool-level access control.",
                            t.name, b.name
                        ),
                        "All authenticated users can access all tools on this MCP server without \
                         restriction.",
                        "Add authorization with CEL matchExpressions scoping tool access to the \
                         AgentgatewayPolicy targeting this backend.",
                        ts,
                    )
                    .with_resource("AgentgatewayBackend", &b.namespace, &b.name),
                );
            }
        }
    }

    if !has_rbac_policy && !state.backends.is_empty() {
        findings.push(Finding::new(
            "RBAC-001",
            Severity::High,
            Category::Authorization,
            "No authorization policies configured",
            "No AgentgatewayPolicy with authorization rules was found. MCP tool access is \
             unrestricted.",
            "Any authenticated user can access any MCP tool without role-based restrictions.",
            "Create an AgentgatewayPolicy with traffic.authorization targeting your MCP backends.",
            ts,
        ));
    }

    findings
}

fn check_cors(state: &ClusterState, policy: &Policy, ts: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    if !policy.require_cors {
        return findings;
    }

    if state.gateway_policies.is_empty() && state.http_routes.is_empty() {
        findings.push(Finding::new(
            "CORS-003",
            Severity::High,
            Category::Cors,
            "No agentgateway infrastructure for CORS enforcement",
            "CORS policy is required but no AgentgatewayPolicies or HTTPRoutes exist. CORS \
             headers cannot be enforced without agentgateway infrastructure.",
            "Browser-based MCP clients have no cross-origin protection.",
            "Deploy agentgateway with CORS configuration in AgentgatewayPolicy or HTTPRoute CORS \
             filters.",
            ts,
        ));
        return findings;
    }

    let has_cors = state.gateway_policies.iter().any(|p| p.has_cors)
        || state.http_routes.iter().any(|r| r.has_cors_filter);

    if !has_cors {
        findings.push(Finding::new(
            "CORS-001",
            Severity::Medium,
            Category::Cors,
            "No CORS policy configured for MCP endpoints",
            "No AgentgatewayPolicy or HTTPRoute with CORS configuration was found. MCP endpoints \
             may be vulnerable to cross-origin attacks.",
            "Browser-based MCP clients may be susceptible to cross-site request forgery.",
            "Add a CORS filter to your HTTPRoute or create an AgentgatewayPolicy with \
             traffic.cors configuration.",
            ts,
        ));
    }

    let has_csrf = state.gateway_policies.iter().any(|p| p.has_csrf);
    if !has_csrf && has_cors {
        findings.push(Finding::new(
            "CORS-002",
            Severity::Low,
            Category::Cors,
            "CSRF protection not configured alongside CORS",
            "CORS is configured but no CSRF protection (AgentgatewayPolicy traffic.csrf) was \
             found.",
            "Cross-site request forgery attacks may still be possible.",
            "Add traffic.csrf configuration to your AgentgatewayPolicy.",
            ts,
        ));
    }

    findings
}

fn check_tls(state: &ClusterState, policy: &Policy, ts: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    if !policy.require_tls {
        return findings;
    }

    if state.backends.is_empty() {
        findings.push(Finding::new(
            "TLS-002",
            Severity::High,
            Category::Tls,
            "No agentgateway backends for TLS enforcement",
            "TLS is required by policy but no AgentgatewayBackends exist. TLS encryption cannot \
             be enforced on MCP traffic without agentgateway infrastructure.",
            "MCP traffic is not encrypted. Data in transit is exposed.",
            "Deploy agentgateway with AgentgatewayBackend resources configured with TLS.",
            ts,
        ));
        return findings;
    }

    for b in &state.backends {
        if !b.has_tls {
            findings.push(
                Finding::new(
                    format!("TLS-001-{}", b.name),
                    Severity::High,
                    Category::Tls,
                    format!("Backend '{}' does not enforce TLS", b.name),
                    format!(
                        "AgentgatewayBackend '{}/{}' does not configure TLS for backend \
                         connections.",
                        b.namespace, b.name
                    ),
                    "MCP traffic between agentgateway and backend MCP servers is unencrypted.",
                    "Configure policies.tls in the AgentgatewayBackend or attach an \
                     AgentgatewayPolicy with backend TLS settings.",
                    ts,
                )
                .with_resource("AgentgatewayBackend", &b.namespace, &b.name),
            );
        }
    }

    findings
}

fn check_prompt_guard(state: &ClusterState, policy: &Policy, ts: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    if !policy.require_prompt_guard {
        return findings;
    }

    if state.gateway_policies.is_empty() {
        findings.push(Finding::new(
            "PG-002",
            Severity::High,
            Category::PromptGuard,
            "No agentgateway infrastructure for prompt guard enforcement",
            "Prompt guard is required by policy but no AgentgatewayPolicies exist. Prompt \
             injection and sensitive data detection cannot be enforced without agentgateway.",
            "LLM requests and responses are not inspected for sensitive data or prompt injection \
             attacks.",
            "Deploy agentgateway with AgentgatewayPolicy resources configured with prompt guard \
             rules.",
            ts,
        ));
        return findings;
    }

    if !state.gateway_policies.iter().any(|p| p.has_prompt_guard) {
        findings.push(Finding::new(
            "PG-001",
            Severity::Medium,
            Category::PromptGuard,
            "No prompt guard policies configured",
            "No AgentgatewayPolicy with prompt guard (regex matching, content moderation) was \
             found for AI backends.",
            "LLM requests may contain sensitive data without detection or masking.",
            "Add backend.ai.promptGuard with request/response regex rules or moderation to your \
             AgentgatewayPolicy.",
            ts,
        ));
    }

    findings
}

fn check_rate_limit(state: &ClusterState, policy: &Policy, ts: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    if !policy.require_rate_limit {
        return findings;
    }

    if state.gateway_policies.is_empty() {
        findings.push(Finding::new(
            "RL-002",
            Severity::High,
            Category::RateLimit,
            "No agentgateway infrastructure for rate limit enforcement",
            "Rate limiting is required by policy but no AgentgatewayPolicies exist. Rate limiting \
             cannot be enforced without agentgateway.",
            "MCP endpoints have no request rate controls and are vulnerable to abuse and \
             resource exhaustion.",
            "Deploy agentgateway with AgentgatewayPolicy resources configured with rate limit \
             rules.",
            ts,
        ));
        return findings;
    }

    if !state.gateway_policies.iter().any(|p| p.has_rate_limit) {
        findings.push(Finding::new(
            "RL-001",
            Severity::Medium,
            Category::RateLimit,
            "No rate limiting configured for MCP endpoints",
            "No AgentgatewayPolicy with rate limiting was found. MCP endpoints are vulnerable to \
             abuse.",
            "Unbounded request rates to MCP tools may lead to resource exhaustion or cost \
             overruns.",
            "Add traffic.rateLimit with local or global rate limiting rules to your \
             AgentgatewayPolicy.",
            ts,
        ));
    }

    findings
}

fn check_exposure(state: &ClusterState, policy: &Policy, ts: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    if !policy.require_agent_gateway {
        return findings;
    }

    let has_agentgateway = state
        .gateways
        .iter()
        .any(|gw| gw.gateway_class_name == "agentgateway");
    // Exposure is unrecoverable when there is no gateway to route through.
    let severity = if has_agentgateway { Severity::High } else { Severity::Critical };

    for rms in &state.remote_mcp_servers {
        let mut routed = false;
        for gw in &state.gateways {
            if gw.gateway_class_name != "agentgateway" {
                continue;
            }
            for svc in &state.services {
                if (svc.name == "agentgateway" || svc.name == gw.name)
                    && url_references_service(&rms.url, &svc.name, &svc.namespace)
                {
                    routed = true;
                }
            }
        }

        if !routed {
            findings.push(
                Finding::new(
                    format!("EXP-001-{}", rms.name),
                    severity,
                    Category::Exposure,
                    format!("RemoteMCPServer '{}' not routed through agentgateway", rms.name),
                    format!(
                        "RemoteMCPServer '{}/{}' has URL '{}' which does not point to \
                         agentgateway. MCP traffic should be routed through agentgateway for \
                         governance enforcement.",
                        rms.namespace, rms.name, rms.url
                    ),
                    "MCP tool calls bypass agentgateway governance. No authentication, \
                     authorization, or rate limiting is applied.",
                    "Update the RemoteMCPServer URL to point at the agentgateway service \
                     endpoint.",
                    ts,
                )
                .with_resource("RemoteMCPServer", &rms.namespace, &rms.name),
            );
        }
    }

    findings
}

fn check_tool_count(state: &ClusterState, policy: &Policy, ts: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    if policy.max_tools_warning == 0 && policy.max_tools_critical == 0 {
        return findings;
    }

    for rms in &state.remote_mcp_servers {
        if rms.tool_count == 0 {
            continue;
        }

        if policy.max_tools_critical > 0 && rms.tool_count > policy.max_tools_critical {
            findings.push(
                Finding::new(
                    format!("TOOLS-001-{}", rms.name),
                    Severity::Critical,
                    Category::ToolScope,
                    format!(
                        "RemoteMCPServer '{}' exposes {} tools (threshold: {})",
                        rms.name, rms.tool_count, policy.max_tools_critical
                    ),
                    format!(
                        "RemoteMCPServer '{}/{}' has {} discovered tools, exceeding the critical \
                         threshold of {}. Excessive tool exposure increases the attack surface \
                         and makes authorization harder to manage.",
                        rms.namespace, rms.name, rms.tool_count, policy.max_tools_critical
                    ),
                    "Large tool surface increases risk of unauthorized tool invocation and makes \
                     least-privilege access control impractical.",
                    format!(
                        "Split the MCP server into smaller, focused servers with at most {} tools \
                         each, or restrict exposed tools via authorization policies.",
                        policy.max_tools_critical
                    ),
                    ts,
                )
                .with_resource("RemoteMCPServer", &rms.namespace, &rms.name),
            );
        } else if policy.max_tools_warning > 0 && rms.tool_count > policy.max_tools_warning {
            findings.push(
                Finding::new(
                    format!("TOOLS-001-{}", rms.name),
                    Severity::Medium,
                    Category::ToolScope,
                    format!(
                        "RemoteMCPServer '{}' exposes {} tools (threshold: {})",
                        rms.name, rms.tool_count, policy.max_tools_warning
                    ),
                    format!(
                        "RemoteMCPServer '{}/{}' has {} discovered tools, exceeding the warning \
                         threshold of {}. Consider splitting into focused MCP servers.",
                        rms.namespace, rms.name, rms.tool_count, policy.max_tools_warning
                    ),
                    "Moderately large tool surface may make authorization management complex and \
                     increases potential attack vectors.",
                    format!(
                        "Review the tools exposed by this MCP server and consider splitting into \
                         focused servers with at most {} tools each.",
                        policy.max_tools_warning
                    ),
                    ts,
                )
                .with_resource("RemoteMCPServer", &rms.namespace, &rms.name),
            );
        }
    }

    findings
}

fn is_mcp_server_routed(mcp: &McpServer, state: &ClusterState) -> bool {
    let expected_host = format!("{}.{}.svc.cluster.local", mcp.name, mcp.namespace);
    state.backends.iter().any(|b| {
        b.backend_type == "mcp"
            && b.mcp_targets
                .iter()
                .any(|t| t.host == expected_host || t.host == mcp.name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        Backend, Gateway, GatewayPolicy, HttpRoute, McpTarget, RemoteMcpServer, Service,
    };

    const TS: &str = "2026-01-01T00:00:00Z";

    fn ids(findings: &[Finding]) -> Vec<&str> {
        findings.iter().map(|f| f.id.as_str()).collect()
    }

    fn find<'f>(findings: &'f [Finding], id: &str) -> &'f Finding {
        findings
            .iter()
            .find(|f| f.id == id)
            .unwrap_or_else(|| panic!("finding {id} missing from {:?}", ids(findings)))
    }

    fn mk_gateway(name: &str, class: &str, programmed: bool) -> Gateway {
        Gateway {
            name: name.into(),
            namespace: "infra".into(),
            gateway_class_name: class.into(),
            programmed,
            ..Default::default()
        }
    }

    fn mk_backend(name: &str, has_tls: bool, targets: Vec<McpTarget>) -> Backend {
        Backend {
            name: name.into(),
            namespace: "infra".into(),
            backend_type: "mcp".into(),
            mcp_targets: targets,
            has_tls,
        }
    }

    #[test]
    fn empty_cluster_raises_the_infrastructure_set() {
        let state = ClusterState::default();
        let findings = run_rules(&state, &Policy::default(), TS);
        for id in ["AGW-001", "AUTH-002", "RBAC-002", "CORS-003", "TLS-002"] {
            assert!(ids(&findings).contains(&id), "{id} expected");
        }
        // Rate limit and prompt guard are off by default.
        assert!(!ids(&findings).contains(&"RL-002"));
        assert!(!ids(&findings).contains(&"PG-002"));
    }

    #[test]
    fn unprogrammed_gateway_is_high() {
        let state = ClusterState {
            gateways: vec![mk_gateway("gw", "agentgateway", false)],
            ..Default::default()
        };
        let findings = check_agent_gateway(&state, &Policy::default(), TS);
        let f = find(&findings, "AGW-002");
        assert_eq!(f.severity, Severity::High);
        assert_eq!(f.resource_ref.as_deref(), Some("Gateway/infra/gw"));
    }

    #[test]
    fn wrong_gateway_class_is_critical() {
        let state = ClusterState {
            gateways: vec![mk_gateway("gw", "istio", true)],
            ..Default::default()
        };
        let findings = check_agent_gateway(&state, &Policy::default(), TS);
        assert_eq!(find(&findings, "AGW-003").severity, Severity::Critical);
        assert!(!ids(&findings).contains(&"AGW-001"));
    }

    #[test]
    fn unrouted_mcp_server_is_critical() {
        let state = ClusterState {
            gateways: vec![mk_gateway("gw", "agentgateway", true)],
            backends: vec![mk_backend(
                "other",
                true,
                vec![McpTarget {
                    host: "something-else.ns.svc.cluster.local".into(),
                    ..Default::default()
                }],
            )],
            mcp_servers: vec![McpServer {
                name: "lonely".into(),
                namespace: "apps".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let findings = check_agent_gateway(&state, &Policy::default(), TS);
        assert_eq!(find(&findings, "AGW-100-lonely").severity, Severity::Critical);
    }

    #[test]
    fn routed_mcp_server_by_host_pattern() {
        let state = ClusterState {
            gateways: vec![mk_gateway("gw", "agentgateway", true)],
            backends: vec![mk_backend(
                "be",
                true,
                vec![McpTarget {
                    host: "fetcher.apps.svc.cluster.local".into(),
                    ..Default::default()
                }],
            )],
            mcp_servers: vec![McpServer {
                name: "fetcher".into(),
                namespace: "apps".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let findings = check_agent_gateway(&state, &Policy::default(), TS);
        assert!(!ids(&findings).iter().any(|id| id.starts_with("AGW-100-")));
    }

    #[test]
    fn optional_jwt_mode_is_flagged_high() {
        let state = ClusterState {
            gateway_policies: vec![GatewayPolicy {
                name: "auth".into(),
                namespace: "infra".into(),
                has_jwt: true,
                jwt_mode: "Optional".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let findings = check_authentication(&state, &Policy::default(), TS);
        assert_eq!(find(&findings, "AUTH-001-auth").severity, Severity::High);
        assert!(!ids(&findings).contains(&"AUTH-002"));
    }

    #[test]
    fn strict_jwt_raises_nothing_at_policy_level() {
        let state = ClusterState {
            gateway_policies: vec![GatewayPolicy {
                name: "auth".into(),
                namespace: "infra".into(),
                has_jwt: true,
                jwt_mode: "Strict".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let findings = check_authentication(&state, &Policy::default(), TS);
        assert!(findings.is_empty());
    }

    #[test]
    fn mcp_target_without_auth_is_medium() {
        let state = ClusterState {
            gateway_policies: vec![GatewayPolicy {
                name: "auth".into(),
                has_jwt: true,
                jwt_mode: "Strict".into(),
                ..Default::default()
            }],
            backends: vec![mk_backend(
                "be",
                true,
                vec![McpTarget {
                    name: "t0".into(),
                    ..Default::default()
                }],
            )],
            ..Default::default()
        };
        let findings = check_authentication(&state, &Policy::default(), TS);
        assert_eq!(find(&findings, "AUTH-100-be-t0").severity, Severity::Medium);
    }

    #[test]
    fn rbac_without_infrastructure_short_circuits() {
        let findings = check_authorization(&ClusterState::default(), &Policy::default(), TS);
        assert_eq!(ids(&findings), vec!["RBAC-002"]);
    }

    #[test]
    fn missing_rbac_policy_and_target_rules() {
        let state = ClusterState {
            backends: vec![mk_backend(
                "be",
                true,
                vec![McpTarget {
                    name: "t0".into(),
                    ..Default::default()
                }],
            )],
            ..Default::default()
        };
        let findings = check_authorization(&state, &Policy::default(), TS);
        assert_eq!(find(&findings, "RBAC-100-be-t0").severity, Severity::High);
        assert_eq!(find(&findings, "RBAC-001").severity, Severity::High);
    }

    #[test]
    fn cors_present_without_csrf_is_low() {
        let state = ClusterState {
            http_routes: vec![HttpRoute {
                name: "r".into(),
                has_cors_filter: true,
                ..Default::default()
            }],
            ..Default::default()
        };
        let findings = check_cors(&state, &Policy::default(), TS);
        assert_eq!(ids(&findings), vec!["CORS-002"]);
        assert_eq!(findings[0].severity, Severity::Low);
    }

    #[test]
    fn backend_without_tls_is_flagged_per_backend() {
        let state = ClusterState {
            backends: vec![
                mk_backend("plain", false, vec![]),
                mk_backend("secure", true, vec![]),
            ],
            ..Default::default()
        };
        let findings = check_tls(&state, &Policy::default(), TS);
        assert_eq!(ids(&findings), vec!["TLS-001-plain"]);
    }

    #[test]
    fn prompt_guard_and_rate_limit_follow_their_gates() {
        let mut policy = Policy::default();
        policy.require_prompt_guard = true;
        policy.require_rate_limit = true;

        let findings = check_prompt_guard(&ClusterState::default(), &policy, TS);
        assert_eq!(ids(&findings), vec!["PG-002"]);
        let findings = check_rate_limit(&ClusterState::default(), &policy, TS);
        assert_eq!(ids(&findings), vec!["RL-002"]);

        let configured = ClusterState {
            gateway_policies: vec![GatewayPolicy {
                name: "all".into(),
                has_prompt_guard: true,
                has_rate_limit: true,
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(check_prompt_guard(&configured, &policy, TS).is_empty());
        assert!(check_rate_limit(&configured, &policy, TS).is_empty());
    }

    #[test]
    fn exposure_severity_depends_on_gateway_presence() {
        let rms = RemoteMcpServer {
            name: "remote".into(),
            namespace: "apps".into(),
            url: "http://somewhere.example.com/mcp".into(),
            ..Default::default()
        };

        let no_gw = ClusterState {
            remote_mcp_servers: vec![rms.clone()],
            ..Default::default()
        };
        let findings = check_exposure(&no_gw, &Policy::default(), TS);
        assert_eq!(find(&findings, "EXP-001-remote").severity, Severity::Critical);

        let with_gw = ClusterState {
            gateways: vec![mk_gateway("gw", "agentgateway", true)],
            remote_mcp_servers: vec![rms],
            ..Default::default()
        };
        let findings = check_exposure(&with_gw, &Policy::default(), TS);
        assert_eq!(find(&findings, "EXP-001-remote").severity, Severity::High);
    }

    #[test]
    fn exposure_suppressed_when_url_names_gateway_service() {
        let state = ClusterState {
            gateways: vec![mk_gateway("gw", "agentgateway", true)],
            services: vec![Service {
                name: "agentgateway".into(),
                namespace: "infra".into(),
                ..Default::default()
            }],
            remote_mcp_servers: vec![RemoteMcpServer {
                name: "remote".into(),
                namespace: "apps".into(),
                url: "http://agentgateway.infra:8080/mcp/backend".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(check_exposure(&state, &Policy::default(), TS).is_empty());
    }

    #[test]
    fn tool_count_thresholds() {
        let mk = |count: usize| ClusterState {
            remote_mcp_servers: vec![RemoteMcpServer {
                name: "remote".into(),
                namespace: "apps".into(),
                tool_count: count,
                ..Default::default()
            }],
            ..Default::default()
        };
        let policy = Policy::default();

        assert!(check_tool_count(&mk(5), &policy, TS).is_empty());
        assert!(check_tool_count(&mk(0), &policy, TS).is_empty());

        let warn = check_tool_count(&mk(12), &policy, TS);
        assert_eq!(find(&warn, "TOOLS-001-remote").severity, Severity::Medium);

        let crit = check_tool_count(&mk(25), &policy, TS);
        assert_eq!(find(&crit, "TOOLS-001-remote").severity, Severity::Critical);

        let disabled = Policy {
            max_tools_warning: 0,
            max_tools_critical: 0,
            ..Policy::default()
        };
        assert!(check_tool_count(&mk(100), &disabled, TS).is_empty());
    }

    #[test]
    fn catalog_is_closed_and_ordered() {
        let names: Vec<&str> = rule_catalog().iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "agent-gateway-compliance",
                "authentication",
                "authorization",
                "cors",
                "tls",
                "prompt-guard",
                "rate-limit",
                "exposure",
                "tool-count",
            ]
        );
        assert_eq!(rule_catalog()[0].category, Category::AgentGateway);
        assert_eq!(rule_catalog()[7].category, Category::Exposure);
    }

    #[test]
    fn infrastructure_absence_ids_are_cluster_wide() {
        // Every id that marks missing infrastructure applies to all views.
        for id in [
            "AGW-001", "AGW-003", "AGW-004", "AUTH-002", "RBAC-002", "CORS-003", "TLS-002",
            "PG-002", "RL-002",
        ] {
            assert!(is_infrastructure_absence(id), "{id}");
            assert!(is_cluster_wide(id), "{id}");
        }
        assert!(!is_infrastructure_absence("AGW-002"));
        assert!(!is_infrastructure_absence("TLS-001-backend"));
        assert!(is_cluster_wide("CORS-001"));
        assert!(!is_cluster_wide("AGW-100-server"));
    }

    #[test]
    fn rules_are_deterministic() {
        let state = ClusterState {
            gateways: vec![mk_gateway("gw", "agentgateway", false)],
            backends: vec![mk_backend("be", false, vec![])],
            mcp_servers: vec![McpServer {
                name: "s".into(),
                namespace: "apps".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let policy = Policy::default();
        let a = run_rules(&state, &policy, TS);
        let b = run_rules(&state, &policy, TS);
        assert_eq!(a, b);
    }
}
