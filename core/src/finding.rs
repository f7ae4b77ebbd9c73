use crate::policy::SeverityPenalties;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn penalty(self, penalties: &SeverityPenalties) -> u32 {
        match self {
            Severity::Critical => penalties.critical,
            Severity::High => penalties.high,
            Severity::Medium => penalties.medium,
            Severity::Low => penalties.low,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => "Critical".fmt(f),
            Severity::High => "High".fmt(f),
            Severity::Medium => "Medium".fmt(f),
            Severity::Low => "Low".fmt(f),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    AgentGateway,
    Authentication,
    Authorization,
    #[serde(rename = "CORS")]
    Cors,
    #[serde(rename = "TLS")]
    Tls,
    PromptGuard,
    RateLimit,
    Exposure,
    ToolScope,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::AgentGateway => "AgentGateway".fmt(f),
            Category::Authentication => "Authentication".fmt(f),
            Category::Authorization => "Authorization".fmt(f),
            Category::Cors => "CORS".fmt(f),
            Category::Tls => "TLS".fmt(f),
            Category::PromptGuard => "PromptGuard".fmt(f),
            Category::RateLimit => "RateLimit".fmt(f),
            Category::Exposure => "Exposure".fmt(f),
            Category::ToolScope => "ToolScope".fmt(f),
        }
    }
}

/// A single governance finding. Finding ids are stable: fixed ids for
/// cluster-wide conditions, `<RULE>-<resource>` suffixed ids for per-resource
/// conditions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub id: String,
    pub severity: Severity,
    pub category: Category,
    pub title: String,
    pub description: String,
    pub impact: String,
    pub remediation: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub resource_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub namespace: Option<String>,
    pub timestamp: String,
}

impl Finding {
    pub fn new(
        id: impl Into<String>,
        severity: Severity,
        category: Category,
        title: impl Into<String>,
        description: impl Into<String>,
        impact: impl Into<String>,
        remediation: impl Into<String>,
        timestamp: &str,
    ) -> Self {
        Self {
            id: id.into(),
            severity,
            category,
            title: title.into(),
            description: description.into(),
            impact: impact.into(),
            remediation: remediation.into(),
            resource_ref: None,
            namespace: None,
            timestamp: timestamp.to_string(),
        }
    }

    pub fn with_resource(self, kind: &str, namespace: &str, name: &str) -> Self {
        let resource_ref = format!("{kind}/{namespace}/{name}");
        self.with_resource_ref(&resource_ref, namespace)
    }

    pub fn with_resource_ref(mut self, resource_ref: &str, namespace: &str) -> Self {
        self.resource_ref = Some(resource_ref.to_string());
        self.namespace = Some(namespace.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_serializes_as_capitalized_word() {
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"Critical\"");
        assert_eq!(serde_json::to_string(&Severity::Low).unwrap(), "\"Low\"");
    }

    #[test]
    fn category_serializes_acronyms() {
        assert_eq!(serde_json::to_string(&Category::Cors).unwrap(), "\"CORS\"");
        assert_eq!(serde_json::to_string(&Category::Tls).unwrap(), "\"TLS\"");
        assert_eq!(serde_json::to_string(&Category::ToolScope).unwrap(), "\"ToolScope\"");
    }

    #[test]
    fn finding_json_is_camel_case_and_omits_empty_refs() {
        let f = Finding::new(
            "AGW-001",
            Severity::Critical,
            Category::AgentGateway,
            "t",
            "d",
            "i",
            "r",
            "2026-01-01T00:00:00Z",
        );
        let json = serde_json::to_value(&f).unwrap();
        assert!(json.get("resourceRef").is_none());
        assert_eq!(json["id"], "AGW-001");

        let f = f.with_resource("Gateway", "ns", "gw");
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["resourceRef"], "Gateway/ns/gw");
        assert_eq!(json["namespace"], "ns");
    }

    #[test]
    fn penalties_follow_policy() {
        let p = SeverityPenalties {
            critical: 50,
            high: 20,
            medium: 10,
            low: 1,
        };
        assert_eq!(Severity::Critical.penalty(&p), 50);
        assert_eq!(Severity::Low.penalty(&p), 1);
    }
}
