use crate::types::{AgentUsage, VerifiedResource};
use kube::api::DynamicObject;
use mcp_governance_controller_k8s_api::value::{
    get_bool, get_slice, get_str, get_string, nested,
};
use std::collections::BTreeSet;

const LABEL_SOURCE_KIND: &str = "agentregistry.dev/source-kind";
const LABEL_SOURCE_NAME: &str = "agentregistry.dev/source-name";
const LABEL_SOURCE_NAMESPACE: &str = "agentregistry.dev/source-namespace";
const LABEL_ENVIRONMENT: &str = "agentregistry.dev/environment";
const LABEL_CLUSTER: &str = "agentregistry.dev/cluster";

/// Pulls the typed catalog-entry fields out of a raw catalog object.
pub fn extract_resource(obj: &DynamicObject) -> VerifiedResource {
    let mut res = VerifiedResource {
        name: obj.metadata.name.clone().unwrap_or_default(),
        namespace: obj.metadata.namespace.clone().unwrap_or_default(),
        resource_version: obj.metadata.resource_version.clone().unwrap_or_default(),
        ..Default::default()
    };

    if let Some(labels) = &obj.metadata.labels {
        let label = |key: &str| labels.get(key).cloned().unwrap_or_default();
        res.source_kind = label(LABEL_SOURCE_KIND);
        res.source_name = label(LABEL_SOURCE_NAME);
        res.source_namespace = label(LABEL_SOURCE_NAMESPACE);
        res.environment = label(LABEL_ENVIRONMENT);
        res.cluster = label(LABEL_CLUSTER);
    }

    if let Some(spec) = obj.data.get("spec") {
        res.catalog_name = get_string(spec, "name");
        res.title = get_string(spec, "title");
        res.description = get_string(spec, "description");
        res.version = get_string(spec, "version");

        for package in get_slice(spec, "packages").into_iter().flatten() {
            if res.package_image.is_empty() {
                if let Some(image) = get_str(package, "identifier") {
                    res.package_image = image.to_string();
                }
            }
            if res.transport.is_empty() {
                if let Some(t) = nested(package, &["transport", "type"]).and_then(|v| v.as_str()) {
                    res.transport = t.to_string();
                }
            }
        }

        for remote in get_slice(spec, "remotes").into_iter().flatten() {
            if res.remote_url.is_empty() {
                if let Some(url) = get_str(remote, "url") {
                    res.remote_url = url.to_string();
                }
            }
            if res.transport.is_empty() {
                if let Some(t) = get_str(remote, "type") {
                    res.transport = t.to_string();
                }
            }
        }
    }

    if let Some(status) = obj.data.get("status") {
        res.published = get_bool(status, "published");
        res.management_type = get_string(status, "managementType");
        res.deployment_ready = nested(status, &["deployment", "ready"])
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        for used_by in get_slice(status, "usedBy").into_iter().flatten() {
            let usage = AgentUsage {
                name: get_string(used_by, "name"),
                namespace: get_string(used_by, "namespace"),
                tool_names: get_slice(used_by, "toolNames")
                    .map(|tools| {
                        tools
                            .iter()
                            .filter_map(|t| t.as_str())
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default(),
            };
            res.tool_count += usage.tool_names.len();
            res.used_by_agents.push(usage);
        }

        let tool_set: BTreeSet<&str> = res
            .used_by_agents
            .iter()
            .flat_map(|u| u.tool_names.iter().map(String::as_str))
            .collect();
        res.tool_names = tool_set.into_iter().map(String::from).collect();
        if res.tool_count == 0 {
            res.tool_count = res.tool_names.len();
        }
    }

    res
}

#[cfg(test)]
pub(crate) fn mk_catalog_object(value: serde_json::Value) -> DynamicObject {
    serde_json::from_value(value).expect("catalog fixture")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> DynamicObject {
        mk_catalog_object(json!({
            "apiVersion": "agentregistry.dev/v1alpha1",
            "kind": "MCPServerCatalog",
            "metadata": {
                "name": "fetcher",
                "namespace": "apps",
                "resourceVersion": "42",
                "generation": 3,
                "labels": {
                    "agentregistry.dev/source-kind": "RemoteMCPServer",
                    "agentregistry.dev/source-name": "fetcher",
                    "agentregistry.dev/source-namespace": "apps",
                    "agentregistry.dev/environment": "production",
                    "agentregistry.dev/cluster": "east",
                },
            },
            "spec": {
                "name": "registry/fetcher",
                "title": "Fetcher",
                "description": "Fetches web pages",
                "version": "v1.2.0",
                "packages": [
                    {"identifier": "ghcr.io/example/fetcher:v1.2.0", "transport": {"type": "stdio"}},
                ],
                "remotes": [
                    {"url": "https://fetcher.example.com/mcp", "type": "streamable-http"},
                ],
            },
            "status": {
                "published": true,
                "managementType": "managed",
                "deployment": {"ready": true},
                "usedBy": [
                    {"name": "helper", "namespace": "apps", "toolNames": ["fetch", "crawl"]},
                    {"name": "other", "namespace": "apps", "toolNames": ["fetch"]},
                ],
            },
        }))
    }

    #[test]
    fn extracts_identity_and_labels() {
        let res = extract_resource(&fixture());
        assert_eq!(res.name, "fetcher");
        assert_eq!(res.namespace, "apps");
        assert_eq!(res.resource_version, "42");
        assert_eq!(res.source_kind, "RemoteMCPServer");
        assert_eq!(res.environment, "production");
        assert_eq!(res.cluster, "east");
    }

    #[test]
    fn extracts_spec_packages_and_remotes() {
        let res = extract_resource(&fixture());
        assert_eq!(res.catalog_name, "registry/fetcher");
        assert_eq!(res.version, "v1.2.0");
        assert_eq!(res.package_image, "ghcr.io/example/fetcher:v1.2.0");
        // The first transport wins: the package's stdio.
        assert_eq!(res.transport, "stdio");
        assert_eq!(res.remote_url, "https://fetcher.example.com/mcp");
    }

    #[test]
    fn extracts_status_and_usage() {
        let res = extract_resource(&fixture());
        assert!(res.published);
        assert!(res.deployment_ready);
        assert_eq!(res.management_type, "managed");
        assert_eq!(res.used_by_agents.len(), 2);
        // Tool count sums per-usage names; the name list is deduplicated.
        assert_eq!(res.tool_count, 3);
        assert_eq!(res.tool_names, vec!["crawl".to_string(), "fetch".to_string()]);
    }

    #[test]
    fn tolerates_minimal_objects() {
        let obj = mk_catalog_object(json!({
            "apiVersion": "agentregistry.dev/v1alpha1",
            "kind": "MCPServerCatalog",
            "metadata": {"name": "bare", "namespace": "apps"},
        }));
        let res = extract_resource(&obj);
        assert_eq!(res.name, "bare");
        assert!(res.transport.is_empty());
        assert_eq!(res.tool_count, 0);
        assert!(!res.published);
    }
}
