use ahash::AHashSet as HashSet;

/// An immutable snapshot of the MCP-related resources observed in a cluster.
///
/// Snapshots are produced by discovery, filtered once per reconcile, and never
/// mutated during an evaluation cycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClusterState {
    pub gateways: Vec<Gateway>,
    pub backends: Vec<Backend>,
    pub gateway_policies: Vec<GatewayPolicy>,
    pub http_routes: Vec<HttpRoute>,

    pub agents: Vec<Agent>,
    pub mcp_servers: Vec<McpServer>,
    pub remote_mcp_servers: Vec<RemoteMcpServer>,

    pub services: Vec<Service>,
    pub namespaces: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Gateway {
    pub name: String,
    pub namespace: String,
    pub gateway_class_name: String,
    pub listeners: Vec<Listener>,
    pub programmed: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Listener {
    pub name: String,
    pub port: u16,
    pub protocol: String,
}

/// An agentgateway backend. Only backends of type `mcp` carry targets.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Backend {
    pub name: String,
    pub namespace: String,
    /// One of "mcp", "ai", "static", "dynamicForwardProxy".
    pub backend_type: String,
    pub mcp_targets: Vec<McpTarget>,
    pub has_tls: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct McpTarget {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub protocol: String,
    pub has_auth: bool,
    pub has_rbac: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GatewayPolicy {
    pub name: String,
    pub namespace: String,
    pub target_refs: Vec<PolicyTargetRef>,
    pub has_jwt: bool,
    /// "Strict", "Optional", or "Permissive". Empty when JWT is absent.
    pub jwt_mode: String,
    pub has_cors: bool,
    pub has_csrf: bool,
    pub has_rbac: bool,
    pub has_rate_limit: bool,
    pub has_prompt_guard: bool,
    /// Tool names extracted from authorization CEL match expressions.
    pub allowed_tools: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PolicyTargetRef {
    pub group: String,
    pub kind: String,
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct HttpRoute {
    pub name: String,
    pub namespace: String,
    pub parent_gateway: String,
    /// Defaults to the route's own namespace when empty.
    pub parent_gateway_namespace: String,
    pub backend_refs: Vec<String>,
    pub has_cors_filter: bool,
    /// Path values extracted from the route rules, in rule order.
    pub paths: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Agent {
    pub name: String,
    pub namespace: String,
    pub agent_type: String,
    pub tools: Vec<AgentTool>,
    pub ready: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AgentTool {
    pub tool_type: String,
    pub kind: String,
    pub name: String,
    pub tool_names: Vec<String>,
}

/// A locally-deployed MCP server.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct McpServer {
    pub name: String,
    pub namespace: String,
    /// One of "stdio", "sse", "streamablehttp".
    pub transport: String,
    pub port: u16,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RemoteMcpServer {
    pub name: String,
    pub namespace: String,
    pub url: String,
    pub tool_count: usize,
    pub tool_names: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Service {
    pub name: String,
    pub namespace: String,
    pub app_protocol: String,
    pub ports: Vec<u16>,
    pub is_mcp: bool,
}

impl ClusterState {
    /// Returns a copy of this state containing only resources whose namespace
    /// survives the (target - exclude) filter. Cluster-scoped Gateways are
    /// kept unconditionally. An empty target list means "all discovered
    /// namespaces"; the exclude list always subtracts.
    pub fn filter_by_namespaces(&self, target: &[String], exclude: &[String]) -> ClusterState {
        if target.is_empty() && exclude.is_empty() {
            return self.clone();
        }

        let mut allowed: HashSet<&str> = if target.is_empty() {
            self.namespaces.iter().map(String::as_str).collect()
        } else {
            target.iter().map(String::as_str).collect()
        };
        for ns in exclude {
            allowed.remove(ns.as_str());
        }

        let keep = |ns: &String| allowed.contains(ns.as_str());
        ClusterState {
            gateways: self.gateways.clone(),
            backends: self.backends.iter().filter(|r| keep(&r.namespace)).cloned().collect(),
            gateway_policies: self
                .gateway_policies
                .iter()
                .filter(|r| keep(&r.namespace))
                .cloned()
                .collect(),
            http_routes: self.http_routes.iter().filter(|r| keep(&r.namespace)).cloned().collect(),
            agents: self.agents.iter().filter(|r| keep(&r.namespace)).cloned().collect(),
            mcp_servers: self.mcp_servers.iter().filter(|r| keep(&r.namespace)).cloned().collect(),
            remote_mcp_servers: self
                .remote_mcp_servers
                .iter()
                .filter(|r| keep(&r.namespace))
                .cloned()
                .collect(),
            services: self.services.iter().filter(|r| keep(&r.namespace)).cloned().collect(),
            namespaces: self.namespaces.iter().filter(|ns| keep(ns)).cloned().collect(),
        }
    }
}

/// Checks whether `url` references the service `name` in `namespace` by the
/// conventional in-cluster host pattern.
pub(crate) fn url_references_service(url: &str, name: &str, namespace: &str) -> bool {
    if url.is_empty() || name.is_empty() {
        return false;
    }
    url.contains(&format!("{name}.{namespace}"))
}
