use kube::api::{Api, DynamicObject};
use kube::core::{ApiResource, GroupVersionKind};
use kube::Client;
use std::fmt;
use std::str::FromStr;

/// The closed set of resource kinds this controller recognises, mapped to
/// their group/version/plural coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Gateway,
    HttpRoute,
    AgentgatewayBackend,
    AgentgatewayPolicy,
    McpServer,
    RemoteMcpServer,
    Agent,
    GovernancePolicy,
    McpServerCatalog,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 9] = [
        ResourceKind::Gateway,
        ResourceKind::HttpRoute,
        ResourceKind::AgentgatewayBackend,
        ResourceKind::AgentgatewayPolicy,
        ResourceKind::McpServer,
        ResourceKind::RemoteMcpServer,
        ResourceKind::Agent,
        ResourceKind::GovernancePolicy,
        ResourceKind::McpServerCatalog,
    ];

    /// The logical name used in configuration and logs.
    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Gateway => "Gateway",
            ResourceKind::HttpRoute => "HTTPRoute",
            ResourceKind::AgentgatewayBackend => "AgentgatewayBackend",
            ResourceKind::AgentgatewayPolicy => "AgentgatewayPolicy",
            ResourceKind::McpServer => "MCPServer",
            ResourceKind::RemoteMcpServer => "RemoteMCPServer",
            ResourceKind::Agent => "Agent",
            ResourceKind::GovernancePolicy => "MCPGovernancePolicy",
            ResourceKind::McpServerCatalog => "MCPServerCatalog",
        }
    }

    pub fn group(self) -> &'static str {
        match self {
            ResourceKind::Gateway | ResourceKind::HttpRoute => "gateway.networking.k8s.io",
            ResourceKind::AgentgatewayBackend | ResourceKind::AgentgatewayPolicy => {
                "agentgateway.dev"
            }
            ResourceKind::McpServer | ResourceKind::RemoteMcpServer | ResourceKind::Agent => {
                "kagent.dev"
            }
            ResourceKind::GovernancePolicy => "governance.mcp.io",
            ResourceKind::McpServerCatalog => "agentregistry.dev",
        }
    }

    pub fn version(self) -> &'static str {
        match self {
            ResourceKind::Gateway | ResourceKind::HttpRoute => "v1",
            ResourceKind::AgentgatewayBackend
            | ResourceKind::AgentgatewayPolicy
            | ResourceKind::McpServer
            | ResourceKind::GovernancePolicy
            | ResourceKind::McpServerCatalog => "v1alpha1",
            ResourceKind::RemoteMcpServer | ResourceKind::Agent => "v1alpha2",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            ResourceKind::Gateway => "gateways",
            ResourceKind::HttpRoute => "httproutes",
            ResourceKind::AgentgatewayBackend => "agentgatewaybackends",
            ResourceKind::AgentgatewayPolicy => "agentgatewaypolicies",
            ResourceKind::McpServer => "mcpservers",
            ResourceKind::RemoteMcpServer => "remotemcpservers",
            ResourceKind::Agent => "agents",
            ResourceKind::GovernancePolicy => "mcpgovernancepolicies",
            ResourceKind::McpServerCatalog => "mcpservercatalogs",
        }
    }

    pub fn api_resource(self) -> ApiResource {
        let gvk = GroupVersionKind::gvk(self.group(), self.version(), self.name());
        ApiResource::from_gvk_with_plural(&gvk, self.plural())
    }

    /// The kinds whose changes trigger a governance reconcile.
    pub fn default_watched() -> Vec<ResourceKind> {
        Self::ALL.to_vec()
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name().fmt(f)
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| Error::UnknownResourceKind {
                name: s.to_string(),
                known: Self::ALL.map(|k| k.name()).join(", "),
            })
    }
}

/// Configuration errors surfaced at watcher setup. These are the only
/// user-visible failures in the controller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unrecognized resource kind {name:?}; recognized kinds are: {known}")]
    UnknownResourceKind { name: String, known: String },
}

/// An all-namespaces dynamic API handle for the kind.
pub fn dynamic_api(client: Client, kind: ResourceKind) -> Api<DynamicObject> {
    Api::all_with(client, &kind.api_resource())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_round_trips_by_name() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.name().parse::<ResourceKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_lists_the_catalog() {
        let err = "FluxCapacitor".parse::<ResourceKind>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("FluxCapacitor"));
        assert!(msg.contains("MCPServerCatalog"));
        assert!(msg.contains("Gateway"));
    }

    #[test]
    fn coordinates_are_stable() {
        assert_eq!(ResourceKind::Gateway.group(), "gateway.networking.k8s.io");
        assert_eq!(ResourceKind::Gateway.version(), "v1");
        assert_eq!(ResourceKind::McpServer.group(), "kagent.dev");
        assert_eq!(ResourceKind::McpServer.version(), "v1alpha1");
        assert_eq!(ResourceKind::RemoteMcpServer.version(), "v1alpha2");
        assert_eq!(ResourceKind::GovernancePolicy.plural(), "mcpgovernancepolicies");
        assert_eq!(ResourceKind::McpServerCatalog.group(), "agentregistry.dev");
    }

    #[test]
    fn api_resource_carries_the_plural() {
        let ar = ResourceKind::AgentgatewayPolicy.api_resource();
        assert_eq!(ar.plural, "agentgatewaypolicies");
        assert_eq!(ar.kind, "AgentgatewayPolicy");
    }
}
