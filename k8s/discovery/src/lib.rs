#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Best-effort snapshot discovery over the dynamic client, plus resolution
//! of the governance-policy object into a typed [`Policy`].
//!
//! Discovery never fails an evaluation: a kind whose CRD is not installed
//! yields an empty list and a log line, and a cluster that cannot be reached
//! at all is handled by the caller substituting the simulated snapshot.

mod extract;
mod policy;
mod sim;

pub use self::sim::simulated_state;

use k8s_openapi::api::core::v1::{Namespace, Service};
use kube::api::{Api, DynamicObject, ListParams};
use kube::{Client, ResourceExt};
use mcp_governance_controller_core::{ClusterState, Policy};
use mcp_governance_controller_k8s_api::{dynamic_api, ResourceKind};

const SYSTEM_NAMESPACES: [&str; 4] =
    ["kube-system", "kube-public", "kube-node-lease", "local-path-storage"];

#[derive(Clone)]
pub struct Discoverer {
    client: Client,
}

impl Discoverer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Probes the API server with a cheap list call. Used once at startup to
    /// decide between live discovery and the simulated snapshot.
    pub async fn probe(&self) -> bool {
        let api: Api<Namespace> = Api::all(self.client.clone());
        match api.list(&ListParams::default().limit(1)).await {
            Ok(_) => true,
            Err(error) => {
                tracing::warn!(%error, "cluster unreachable; live discovery disabled");
                false
            }
        }
    }

    /// Reads the full snapshot. Each kind degrades independently.
    pub async fn snapshot(&self) -> ClusterState {
        let state = ClusterState {
            namespaces: self.discover_namespaces().await,
            gateways: self
                .list(ResourceKind::Gateway)
                .await
                .iter()
                .map(extract::gateway)
                .collect(),
            http_routes: self
                .list(ResourceKind::HttpRoute)
                .await
                .iter()
                .map(extract::http_route)
                .collect(),
            backends: self
                .list(ResourceKind::AgentgatewayBackend)
                .await
                .iter()
                .map(extract::backend)
                .collect(),
            gateway_policies: self
                .list(ResourceKind::AgentgatewayPolicy)
                .await
                .iter()
                .map(extract::gateway_policy)
                .collect(),
            agents: self
                .list(ResourceKind::Agent)
                .await
                .iter()
                .map(extract::agent)
                .collect(),
            mcp_servers: self
                .list(ResourceKind::McpServer)
                .await
                .iter()
                .map(extract::mcp_server)
                .collect(),
            remote_mcp_servers: self
                .list(ResourceKind::RemoteMcpServer)
                .await
                .iter()
                .map(extract::remote_mcp_server)
                .collect(),
            services: self.discover_services().await,
        };

        tracing::info!(
            gateways = state.gateways.len(),
            backends = state.backends.len(),
            policies = state.gateway_policies.len(),
            routes = state.http_routes.len(),
            agents = state.agents.len(),
            mcp_servers = state.mcp_servers.len(),
            remote_mcp_servers = state.remote_mcp_servers.len(),
            services = state.services.len(),
            namespaces = state.namespaces.len(),
            "discovered cluster state",
        );
        state
    }

    /// Resolves the governance policy, falling back to the default when no
    /// policy object exists or it cannot be read.
    pub async fn resolve_policy(&self) -> Policy {
        let objects = self.list(ResourceKind::GovernancePolicy).await;
        match objects.first() {
            Some(obj) => {
                let mut resolved = policy::from_object(&obj.data);
                resolved.name = obj.name_any();
                tracing::info!(policy = %resolved.name, "resolved governance policy");
                resolved
            }
            None => {
                tracing::info!("no governance policy found; using defaults");
                Policy::default()
            }
        }
    }

    async fn list(&self, kind: ResourceKind) -> Vec<DynamicObject> {
        let api = dynamic_api(self.client.clone(), kind);
        match api.list(&ListParams::default()).await {
            Ok(list) => list.items,
            Err(error) => {
                tracing::info!(kind = %kind, %error, "kind not available; treating as empty");
                Vec::new()
            }
        }
    }

    async fn discover_namespaces(&self) -> Vec<String> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        match api.list(&ListParams::default()).await {
            Ok(list) => list
                .items
                .iter()
                .map(|ns| ns.name_any())
                .filter(|name| !SYSTEM_NAMESPACES.contains(&name.as_str()))
                .collect(),
            Err(error) => {
                tracing::warn!(%error, "failed to list namespaces");
                vec!["default".to_string()]
            }
        }
    }

    async fn discover_services(&self) -> Vec<mcp_governance_controller_core::Service> {
        let api: Api<Service> = Api::all(self.client.clone());
        match api.list(&ListParams::default()).await {
            Ok(list) => list
                .items
                .iter()
                .filter(|svc| {
                    !SYSTEM_NAMESPACES.contains(&svc.namespace().unwrap_or_default().as_str())
                })
                .map(extract::service)
                .collect(),
            Err(error) => {
                tracing::warn!(%error, "failed to list services");
                Vec::new()
            }
        }
    }
}
