//! The canned snapshot used when the controller runs without a reachable
//! cluster: a small topology with deliberate gaps so every scoring path has
//! something to chew on.

use mcp_governance_controller_core::{
    Agent, AgentTool, Backend, ClusterState, Gateway, GatewayPolicy, HttpRoute, Listener,
    McpServer, McpTarget, PolicyTargetRef, RemoteMcpServer, Service,
};

pub fn simulated_state() -> ClusterState {
    ClusterState {
        namespaces: vec![
            "default".into(),
            "agentgateway-system".into(),
            "kagent".into(),
            "mcp-apps".into(),
        ],

        gateways: vec![Gateway {
            name: "agentgateway-proxy".into(),
            namespace: "agentgateway-system".into(),
            gateway_class_name: "agentgateway".into(),
            programmed: true,
            listeners: vec![Listener {
                name: "http".into(),
                port: 80,
                protocol: "HTTP".into(),
            }],
        }],

        backends: vec![
            Backend {
                name: "github-mcp-backend".into(),
                namespace: "agentgateway-system".into(),
                backend_type: "mcp".into(),
                has_tls: false,
                mcp_targets: vec![McpTarget {
                    name: "github-mcp".into(),
                    host: "mcp-github-server.mcp-apps.svc.cluster.local".into(),
                    port: 80,
                    protocol: "StreamableHTTP".into(),
                    has_auth: false,
                    has_rbac: false,
                }],
            },
            Backend {
                name: "fetch-mcp-backend".into(),
                namespace: "agentgateway-system".into(),
                backend_type: "mcp".into(),
                has_tls: false,
                mcp_targets: vec![McpTarget {
                    name: "fetch-mcp".into(),
                    host: "mcp-website-fetcher.default.svc.cluster.local".into(),
                    port: 80,
                    protocol: "SSE".into(),
                    has_auth: false,
                    has_rbac: false,
                }],
            },
            Backend {
                name: "openai-backend".into(),
                namespace: "agentgateway-system".into(),
                backend_type: "ai".into(),
                has_tls: true,
                mcp_targets: Vec::new(),
            },
        ],

        // Intentionally weak: Optional JWT and nothing else.
        gateway_policies: vec![GatewayPolicy {
            name: "basic-auth".into(),
            namespace: "agentgateway-system".into(),
            has_jwt: true,
            jwt_mode: "Optional".into(),
            target_refs: vec![PolicyTargetRef {
                group: "gateway.networking.k8s.io".into(),
                kind: "Gateway".into(),
                name: "agentgateway-proxy".into(),
            }],
            ..Default::default()
        }],

        http_routes: vec![
            HttpRoute {
                name: "mcp-github".into(),
                namespace: "agentgateway-system".into(),
                parent_gateway: "agentgateway-proxy".into(),
                backend_refs: vec!["github-mcp-backend".into()],
                ..Default::default()
            },
            HttpRoute {
                name: "mcp-fetcher".into(),
                namespace: "agentgateway-system".into(),
                parent_gateway: "agentgateway-proxy".into(),
                backend_refs: vec!["fetch-mcp-backend".into()],
                ..Default::default()
            },
        ],

        agents: vec![
            Agent {
                name: "k8s-agent".into(),
                namespace: "kagent".into(),
                agent_type: "Declarative".into(),
                ready: true,
                tools: vec![AgentTool {
                    tool_type: "McpServer".into(),
                    kind: "RemoteMCPServer".into(),
                    name: "kagent-tool-server".into(),
                    tool_names: vec!["k8s_get_resources".into()],
                }],
            },
            Agent {
                name: "fetch-agent".into(),
                namespace: "kagent".into(),
                agent_type: "Declarative".into(),
                ready: true,
                tools: vec![AgentTool {
                    tool_type: "McpServer".into(),
                    kind: "MCPServer".into(),
                    name: "mcp-website-fetcher".into(),
                    tool_names: vec!["fetch".into()],
                }],
            },
        ],

        mcp_servers: vec![
            McpServer {
                name: "mcp-website-fetcher".into(),
                namespace: "kagent".into(),
                transport: "stdio".into(),
                port: 3000,
            },
            McpServer {
                name: "unrouted-mcp-server".into(),
                namespace: "mcp-apps".into(),
                transport: "sse".into(),
                port: 8080,
            },
        ],

        remote_mcp_servers: vec![RemoteMcpServer {
            name: "kagent-tool-server".into(),
            namespace: "kagent".into(),
            url: "http://kagent-tool-server.kagent.svc:3000".into(),
            tool_count: 0,
            tool_names: Vec::new(),
        }],

        services: vec![
            Service {
                name: "mcp-website-fetcher".into(),
                namespace: "default".into(),
                app_protocol: "kgateway.dev/mcp".into(),
                ports: vec![80],
                is_mcp: true,
            },
            Service {
                name: "standalone-mcp-svc".into(),
                namespace: "mcp-apps".into(),
                app_protocol: "kgateway.dev/mcp".into(),
                ports: vec![8080],
                is_mcp: true,
            },
        ],
    }
}
