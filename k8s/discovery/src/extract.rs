//! Per-kind extraction from dynamic objects into snapshot value types.

use k8s_openapi::api::core::v1::Service as CoreService;
use kube::api::DynamicObject;
use kube::ResourceExt;
use mcp_governance_controller_core::{
    Agent, AgentTool, Backend, Gateway, GatewayPolicy, HttpRoute, Listener, McpServer, McpTarget,
    PolicyTargetRef, RemoteMcpServer, Service,
};
use mcp_governance_controller_k8s_api::value::{
    get_i64, get_map, get_slice, get_str, get_string, get_string_slice, nested,
};
use serde_json::Value;

pub(crate) fn gateway(obj: &DynamicObject) -> Gateway {
    let mut gw = Gateway {
        name: obj.name_any(),
        namespace: obj.namespace().unwrap_or_default(),
        ..Default::default()
    };

    if let Some(spec) = obj.data.get("spec") {
        gw.gateway_class_name = get_string(spec, "gatewayClassName");
        for listener in get_slice(spec, "listeners").into_iter().flatten() {
            gw.listeners.push(Listener {
                name: get_string(listener, "name"),
                protocol: get_string(listener, "protocol"),
                port: get_i64(listener, "port").unwrap_or(0) as u16,
            });
        }
    }

    if let Some(status) = obj.data.get("status") {
        for condition in get_slice(status, "conditions").into_iter().flatten() {
            if get_str(condition, "type") == Some("Programmed")
                && get_str(condition, "status") == Some("True")
            {
                gw.programmed = true;
            }
        }
    }

    gw
}

pub(crate) fn http_route(obj: &DynamicObject) -> HttpRoute {
    let mut route = HttpRoute {
        name: obj.name_any(),
        namespace: obj.namespace().unwrap_or_default(),
        ..Default::default()
    };

    let Some(spec) = obj.data.get("spec") else {
        return route;
    };

    for parent in get_slice(spec, "parentRefs").into_iter().flatten() {
        route.parent_gateway = get_string(parent, "name");
        route.parent_gateway_namespace = get_string(parent, "namespace");
    }

    for rule in get_slice(spec, "rules").into_iter().flatten() {
        for backend_ref in get_slice(rule, "backendRefs").into_iter().flatten() {
            route.backend_refs.push(get_string(backend_ref, "name"));
        }
        for filter in get_slice(rule, "filters").into_iter().flatten() {
            if get_str(filter, "type") == Some("ExtensionRef") {
                route.has_cors_filter = true;
            }
        }
        // One path per rule, in rule order.
        if let Some(path) = get_slice(rule, "matches")
            .into_iter()
            .flatten()
            .find_map(|m| nested(m, &["path", "value"]).and_then(Value::as_str))
        {
            route.paths.push(path.to_string());
        }
    }

    route
}

pub(crate) fn backend(obj: &DynamicObject) -> Backend {
    let mut backend = Backend {
        name: obj.name_any(),
        namespace: obj.namespace().unwrap_or_default(),
        ..Default::default()
    };

    let Some(spec) = obj.data.get("spec") else {
        return backend;
    };
    backend.backend_type = get_string(spec, "type");

    for target in nested(spec, &["mcp", "targets"])
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        backend.mcp_targets.push(McpTarget {
            name: get_string(target, "name"),
            host: get_string(target, "host"),
            port: get_i64(target, "port").unwrap_or(0) as u16,
            protocol: get_string(target, "protocol"),
            has_auth: get_map(target, "authentication").is_some(),
            has_rbac: get_map(target, "authorization").is_some(),
        });
    }

    backend.has_tls = nested(spec, &["policies", "tls"]).is_some();
    backend
}

pub(crate) fn gateway_policy(obj: &DynamicObject) -> GatewayPolicy {
    let mut policy = GatewayPolicy {
        name: obj.name_any(),
        namespace: obj.namespace().unwrap_or_default(),
        ..Default::default()
    };

    let Some(spec) = obj.data.get("spec") else {
        return policy;
    };

    // Either a single targetRef or a targetRefs list.
    for target_ref in get_slice(spec, "targetRefs").into_iter().flatten() {
        policy.target_refs.push(extract_target_ref(target_ref));
    }
    if policy.target_refs.is_empty() {
        if let Some(target_ref) = spec.get("targetRef").filter(|v| v.is_object()) {
            policy.target_refs.push(extract_target_ref(target_ref));
        }
    }

    if let Some(defaults) = spec.get("default") {
        if let Some(jwt) = defaults.get("jwt").filter(|v| v.is_object()) {
            policy.has_jwt = true;
            let mode = get_string(jwt, "mode");
            policy.jwt_mode = if mode.is_empty() { "Strict".to_string() } else { mode };
        }
        policy.has_cors = get_map(defaults, "cors").is_some();
        policy.has_csrf = get_map(defaults, "csrf").is_some();
        policy.has_rate_limit = get_map(defaults, "rateLimit").is_some();
        policy.has_rbac = get_map(defaults, "rbac").is_some();
        policy.has_prompt_guard = get_map(defaults, "promptGuard").is_some();

        if let Some(authorization) = defaults.get("authorization") {
            policy.allowed_tools = allowed_tools_from(authorization);
            // CEL tool authorization is tool-level access control.
            if !policy.allowed_tools.is_empty() {
                policy.has_rbac = true;
            }
        }
    }

    policy
}

fn extract_target_ref(value: &Value) -> PolicyTargetRef {
    PolicyTargetRef {
        group: get_string(value, "group"),
        kind: get_string(value, "kind"),
        name: get_string(value, "name"),
    }
}

/// Collects tool names from authorization CEL expressions anywhere under the
/// authorization value, preserving first-seen order.
fn allowed_tools_from(authorization: &Value) -> Vec<String> {
    let mut tools = Vec::new();
    collect_expressions(authorization, &mut |expr| {
        for tool in tools_from_expression(expr) {
            if !tools.contains(&tool) {
                tools.push(tool);
            }
        }
    });
    tools
}

fn collect_expressions(value: &Value, visit: &mut impl FnMut(&str)) {
    match value {
        Value::String(s) => {
            if s.contains("mcp.tool.name") {
                visit(s);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_expressions(item, visit);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_expressions(item, visit);
            }
        }
        _ => {}
    }
}

/// Pulls the quoted tool names out of one CEL expression. Handles equality
/// comparisons and `in [...]` membership lists.
fn tools_from_expression(expr: &str) -> Vec<String> {
    let mut tools = Vec::new();
    let mut rest = expr;
    while let Some(pos) = rest.find("mcp.tool.name") {
        rest = &rest[pos + "mcp.tool.name".len()..];
        let clause = rest.trim_start();
        if let Some(list) = clause.strip_prefix("in") {
            if let Some(end) = list.find(']') {
                tools.extend(quoted_strings(&list[..end]));
                rest = &list[end..];
                continue;
            }
        }
        // Equality comparison: take the first quoted literal.
        if let Some(tool) = quoted_strings(clause).into_iter().next() {
            tools.push(tool);
        }
    }
    tools
}

fn quoted_strings(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut chars = s.char_indices();
    while let Some((start, c)) = chars.next() {
        if c != '"' && c != '\'' {
            continue;
        }
        if let Some(len) = s[start + 1..].find(c) {
            out.push(s[start + 1..start + 1 + len].to_string());
            // Skip past the closing quote.
            for _ in 0..=len {
                chars.next();
            }
        }
    }
    out
}

pub(crate) fn agent(obj: &DynamicObject) -> Agent {
    let mut agent = Agent {
        name: obj.name_any(),
        namespace: obj.namespace().unwrap_or_default(),
        ..Default::default()
    };

    if let Some(spec) = obj.data.get("spec") {
        agent.agent_type = get_string(spec, "type");
        // Tools live under spec.tools or spec.declarative.tools.
        let tools = get_slice(spec, "tools")
            .or_else(|| nested(spec, &["declarative", "tools"]).and_then(Value::as_array));
        for tool in tools.into_iter().flatten() {
            let mut tool_ref = AgentTool {
                tool_type: get_string(tool, "type"),
                ..Default::default()
            };
            if let Some(mcp_server) = tool.get("mcpServer") {
                tool_ref.kind = get_string(mcp_server, "kind");
                tool_ref.name = get_string(mcp_server, "name");
                if tool_ref.kind.is_empty() {
                    if let Some(reference) = mcp_server.get("ref") {
                        tool_ref.kind = get_string(reference, "kind");
                        tool_ref.name = get_string(reference, "name");
                    }
                }
                tool_ref.tool_names = get_string_slice(mcp_server, "toolNames");
            }
            agent.tools.push(tool_ref);
        }
    }

    if let Some(status) = obj.data.get("status") {
        for condition in get_slice(status, "conditions").into_iter().flatten() {
            if get_str(condition, "type") == Some("Ready")
                && get_str(condition, "status") == Some("True")
            {
                agent.ready = true;
            }
        }
    }

    agent
}

pub(crate) fn mcp_server(obj: &DynamicObject) -> McpServer {
    let mut server = McpServer {
        name: obj.name_any(),
        namespace: obj.namespace().unwrap_or_default(),
        ..Default::default()
    };

    if let Some(spec) = obj.data.get("spec") {
        if spec.get("stdioTransport").is_some() {
            server.transport = "stdio".to_string();
        }
        if let Some(sse) = spec.get("sseTransport") {
            server.transport = "sse".to_string();
            server.port = get_i64(sse, "port").unwrap_or(0) as u16;
        }
        if spec.get("streamableHttpTransport").is_some() {
            server.transport = "streamablehttp".to_string();
        }
    }

    server
}

pub(crate) fn remote_mcp_server(obj: &DynamicObject) -> RemoteMcpServer {
    let mut server = RemoteMcpServer {
        name: obj.name_any(),
        namespace: obj.namespace().unwrap_or_default(),
        ..Default::default()
    };

    if let Some(spec) = obj.data.get("spec") {
        server.url = get_string(spec, "url");
    }

    if let Some(tools) = nested(&obj.data, &["status", "discoveredTools"]).and_then(Value::as_array)
    {
        server.tool_count = tools.len();
        server.tool_names = tools
            .iter()
            .filter_map(|t| get_str(t, "name"))
            .map(String::from)
            .collect();
    }

    server
}

pub(crate) fn service(svc: &CoreService) -> Service {
    let mut service = Service {
        name: svc.name_any(),
        namespace: svc.namespace().unwrap_or_default(),
        ..Default::default()
    };

    let mut is_mcp = false;
    if let Some(spec) = &svc.spec {
        for port in spec.ports.iter().flatten() {
            service.ports.push(port.port as u16);
            if let Some(app_protocol) = &port.app_protocol {
                service.app_protocol = app_protocol.clone();
                if app_protocol.contains("mcp") {
                    is_mcp = true;
                }
            }
        }
    }
    if let Some(labels) = &svc.metadata.labels {
        for (key, value) in labels {
            if key.contains("mcp") || value.contains("mcp") {
                is_mcp = true;
            }
        }
    }
    service.is_mcp = is_mcp;
    service
}
