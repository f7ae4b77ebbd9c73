use crate::types::{
    grade_from_score, status_from_score, VerifiedCheck, VerifiedFinding, VerifiedResource,
    VerifiedScore,
};
use chrono::{DateTime, Utc};
use mcp_governance_controller_core::CatalogScoringOverrides;
use std::collections::BTreeMap;

/// Thresholds and per-check overrides for verified-catalog scoring.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScoringPolicy {
    pub max_tools_warning: usize,
    pub max_tools_critical: usize,

    // Category weights, retained as configuration surface for API consumers.
    pub security_weight: u32,
    pub trust_weight: u32,
    pub compliance_weight: u32,

    pub verified_threshold: u32,
    pub unverified_threshold: u32,

    /// Per-check max points, keyed by check id. Missing ids use built-ins.
    pub check_max_scores: BTreeMap<String, u32>,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            max_tools_warning: 10,
            max_tools_critical: 20,
            security_weight: 50,
            trust_weight: 30,
            compliance_weight: 20,
            verified_threshold: 70,
            unverified_threshold: 50,
            check_max_scores: BTreeMap::new(),
        }
    }
}

impl ScoringPolicy {
    /// Applies user overrides from the governance policy; zero values keep
    /// the built-in defaults.
    pub fn from_overrides(overrides: &CatalogScoringOverrides) -> Self {
        let defaults = Self::default();
        Self {
            security_weight: pick(overrides.security_weight, defaults.security_weight),
            trust_weight: pick(overrides.trust_weight, defaults.trust_weight),
            compliance_weight: pick(overrides.compliance_weight, defaults.compliance_weight),
            verified_threshold: pick(overrides.verified_threshold, defaults.verified_threshold),
            unverified_threshold: pick(
                overrides.unverified_threshold,
                defaults.unverified_threshold,
            ),
            check_max_scores: overrides.check_max_scores.clone(),
            ..defaults
        }
    }

    fn max_for(&self, id: &str, builtin: u32) -> u32 {
        match self.check_max_scores.get(id) {
            Some(&v) if v > 0 => v,
            _ => builtin,
        }
    }
}

fn pick(value: u32, fallback: u32) -> u32 {
    if value > 0 {
        value
    } else {
        fallback
    }
}

/// Scores one catalog entry against the closed check set.
///
/// Overall score is the earned-over-max ratio scaled to 100 and clamped.
/// Composite categories regroup the checks: security = transport and
/// deployment, trust = publisher, compliance = tool scope and usage.
pub fn score_catalog(
    res: &VerifiedResource,
    policy: &ScoringPolicy,
    now: DateTime<Utc>,
) -> VerifiedScore {
    let checks = vec![
        check_publisher_source(res, policy),
        check_environment_labels(res, policy),
        check_management_type(res, policy),
        check_transport_security(res, policy),
        check_remote_endpoint_tls(res, policy),
        check_published(res, policy),
        check_deployment_ready(res, policy),
        check_versioning(res, policy),
        check_tool_count(res, policy),
        check_agent_usage(res, policy),
    ];

    let earned: u32 = checks.iter().map(|c| c.score).sum();
    let max: u32 = checks.iter().map(|c| c.max_score).sum();
    let passed = checks.iter().filter(|c| c.passed).count();
    let score = if max > 0 { ((earned * 100) / max).min(100) } else { 0 };

    let findings: Vec<VerifiedFinding> = checks
        .iter()
        .filter(|c| !c.passed)
        .map(|c| VerifiedFinding {
            severity: severity_for_check(c).to_string(),
            category: c.category.clone(),
            title: format!("{} - {}", c.name, c.detail),
            description: c.description.clone(),
            remediation: remediation_for_check(&c.id).to_string(),
        })
        .collect();

    let composites = compute_category_scores(&checks);

    let verified_org = res.environment.clone();
    let verified_publisher = if res.source_kind.is_empty() {
        res.source_name.clone()
    } else {
        format!("{}/{}", res.source_kind, res.source_name)
    };

    let status =
        status_from_score(score, policy.verified_threshold, policy.unverified_threshold);
    let reason = build_reason(score, &composites, findings.len(), status);

    VerifiedScore {
        score,
        grade: grade_from_score(score).to_string(),
        status: status.to_string(),
        checks_passed: passed,
        checks_total: checks.len(),
        checks,
        findings,
        last_evaluated: Some(now),
        security_score: composites.security,
        trust_score: composites.trust,
        compliance_score: composites.compliance,
        org_score: composites.org,
        publisher_score: composites.publisher,
        verified_org,
        verified_publisher,
        reason,
    }
}

struct CompositeScores {
    security: u32,
    trust: u32,
    compliance: u32,
    org: u32,
    publisher: u32,
}

fn compute_category_scores(checks: &[VerifiedCheck]) -> CompositeScores {
    let sum = |pred: &dyn Fn(&VerifiedCheck) -> bool| -> (u32, u32) {
        checks
            .iter()
            .filter(|c| pred(c))
            .fold((0, 0), |(e, m), c| (e + c.score, m + c.max_score))
    };
    let norm = |(earned, max): (u32, u32)| -> u32 {
        if max == 0 {
            0
        } else {
            ((earned * 100) / max).min(100)
        }
    };

    CompositeScores {
        security: norm(sum(&|c| c.category == "transport" || c.category == "deployment")),
        trust: norm(sum(&|c| c.category == "publisher")),
        compliance: norm(sum(&|c| c.category == "toolScope" || c.category == "usage")),
        org: norm(sum(&|c| c.id == "PUB-002")),
        publisher: norm(sum(&|c| c.category == "publisher" && c.id != "PUB-002")),
    }
}

fn build_reason(
    overall: u32,
    composites: &CompositeScores,
    finding_count: usize,
    status: &str,
) -> String {
    let mut parts = vec![format!("Overall score {overall}/100 ({status})")];
    if composites.security < 50 {
        parts.push(format!("Security needs attention ({}%)", composites.security));
    }
    if composites.trust < 50 {
        parts.push(format!("Trust verification incomplete ({}%)", composites.trust));
    }
    if composites.compliance < 50 {
        parts.push(format!("Compliance gaps detected ({}%)", composites.compliance));
    }
    if finding_count > 0 {
        parts.push(format!("{finding_count} finding(s) require review"));
    }
    if finding_count == 0 && overall >= 70 {
        parts.push("All governance checks passed".to_string());
    }
    format!("{}.", parts.join(". "))
}

fn check_publisher_source(res: &VerifiedResource, policy: &ScoringPolicy) -> VerifiedCheck {
    let max = policy.max_for("PUB-001", 10);
    let mut c = VerifiedCheck {
        id: "PUB-001".into(),
        name: "Source Kind Tracked".into(),
        category: "publisher".into(),
        max_score: max,
        description: "Catalog entry has a known source kind from discovery".into(),
        ..Default::default()
    };
    if !res.source_kind.is_empty() && !res.source_name.is_empty() {
        c.passed = true;
        c.score = max;
        c.detail = format!(
            "Source: {}/{}/{}",
            res.source_kind, res.source_namespace, res.source_name
        );
    } else {
        c.detail = "No source tracking labels found - origin unknown".into();
    }
    c
}

fn check_environment_labels(res: &VerifiedResource, policy: &ScoringPolicy) -> VerifiedCheck {
    let max = policy.max_for("PUB-002", 10);
    let mut c = VerifiedCheck {
        id: "PUB-002".into(),
        name: "Environment Labelled".into(),
        category: "publisher".into(),
        max_score: max,
        description: "Catalog entry has environment and cluster labels for traceability".into(),
        ..Default::default()
    };
    let has_env = !res.environment.is_empty();
    let has_cluster = !res.cluster.is_empty();
    if has_env && has_cluster {
        c.passed = true;
        c.score = max;
        c.detail = format!("Environment: {}, Cluster: {}", res.environment, res.cluster);
    } else if has_env || has_cluster {
        c.passed = true;
        c.score = max / 2;
        c.detail = "Partial labels - missing environment or cluster".into();
    } else {
        c.detail = "No environment/cluster labels - cannot trace origin".into();
    }
    c
}

fn check_management_type(res: &VerifiedResource, policy: &ScoringPolicy) -> VerifiedCheck {
    let max = policy.max_for("PUB-003", 10);
    let mut c = VerifiedCheck {
        id: "PUB-003".into(),
        name: "Management Type Set".into(),
        category: "publisher".into(),
        max_score: max,
        description: "Catalog entry has a management type (external or managed)".into(),
        ..Default::default()
    };
    if !res.management_type.is_empty() {
        c.passed = true;
        c.score = max;
        c.detail = format!("Management type: {}", res.management_type);
    } else {
        c.detail = "No management type - lifecycle ownership unclear".into();
    }
    c
}

fn check_transport_security(res: &VerifiedResource, policy: &ScoringPolicy) -> VerifiedCheck {
    let max = policy.max_for("SEC-001", 15);
    let mut c = VerifiedCheck {
        id: "SEC-001".into(),
        name: "Transport Type".into(),
        category: "transport".into(),
        max_score: max,
        description: "MCP server uses a recognized transport type".into(),
        passed: true,
        ..Default::default()
    };
    match res.transport.to_lowercase().as_str() {
        "streamable-http" | "http" => {
            c.score = max;
            c.detail = format!("Transport: {} (HTTP-based, can be secured with TLS)", res.transport);
        }
        "stdio" => {
            c.score = (max * 2) / 3;
            c.detail = "Transport: stdio (local process, no network exposure)".into();
        }
        "sse" => {
            c.score = (max * 4) / 5;
            c.detail = "Transport: SSE (server-sent events, HTTP-based)".into();
        }
        "" => {
            if !res.remote_url.is_empty() {
                c.score = (max * 4) / 5;
                c.detail = "Remote endpoint configured (transport inferred from URL)".into();
            } else if !res.package_image.is_empty() {
                c.score = (max * 2) / 3;
                c.detail = "Package image configured (likely stdio transport)".into();
            } else {
                c.score = max / 3;
                c.detail = "No explicit transport - may use default".into();
            }
        }
        _ => {
            c.score = max / 3;
            c.detail = format!("Unknown transport type: {}", res.transport);
        }
    }
    c
}

fn check_remote_endpoint_tls(res: &VerifiedResource, policy: &ScoringPolicy) -> VerifiedCheck {
    let max = policy.max_for("SEC-002", 10);
    let mut c = VerifiedCheck {
        id: "SEC-002".into(),
        name: "Remote Endpoint TLS".into(),
        category: "transport".into(),
        max_score: max,
        description: "Remote MCP server endpoints use HTTPS/TLS".into(),
        ..Default::default()
    };
    if res.remote_url.is_empty() {
        c.passed = true;
        c.score = max;
        c.detail = "No remote endpoint - local/stdio transport (TLS not applicable)".into();
    } else if res.remote_url.starts_with("https://") {
        c.passed = true;
        c.score = max;
        c.detail = format!("Remote URL uses HTTPS: {}", res.remote_url);
    } else if res.remote_url.starts_with("http://") {
        c.score = 0;
        c.detail = format!("Remote URL uses unencrypted HTTP: {}", res.remote_url);
    } else {
        c.passed = true;
        c.score = max / 2;
        c.detail = format!("Remote URL scheme unclear: {}", res.remote_url);
    }
    c
}

fn check_published(res: &VerifiedResource, policy: &ScoringPolicy) -> VerifiedCheck {
    let max = policy.max_for("DEP-001", 5);
    let mut c = VerifiedCheck {
        id: "DEP-001".into(),
        name: "Published".into(),
        category: "deployment".into(),
        max_score: max,
        description: "Catalog entry is published and visible in the registry".into(),
        ..Default::default()
    };
    if res.published {
        c.passed = true;
        c.score = max;
        c.detail = "Published and active".into();
    } else {
        c.detail = "Not published - not visible in registry".into();
    }
    c
}

fn check_deployment_ready(res: &VerifiedResource, policy: &ScoringPolicy) -> VerifiedCheck {
    let max = policy.max_for("DEP-002", 10);
    let mut c = VerifiedCheck {
        id: "DEP-002".into(),
        name: "Deployment Ready".into(),
        category: "deployment".into(),
        max_score: max,
        description: "The backing MCP server deployment is healthy and ready".into(),
        ..Default::default()
    };
    if res.deployment_ready {
        c.passed = true;
        c.score = max;
        c.detail = "Deployment is ready".into();
    } else {
        c.detail = "Deployment is not ready or health unknown".into();
    }
    c
}

fn check_versioning(res: &VerifiedResource, policy: &ScoringPolicy) -> VerifiedCheck {
    let max = policy.max_for("DEP-003", 5);
    let mut c = VerifiedCheck {
        id: "DEP-003".into(),
        name: "Versioned".into(),
        category: "deployment".into(),
        max_score: max,
        description: "Catalog entry has a meaningful version (not just 'latest')".into(),
        ..Default::default()
    };
    let v = res.version.trim();
    if v.is_empty() || v == "latest" || v == "unknown" {
        c.detail = format!("Version is '{v}' - no semantic versioning");
    } else if v.starts_with('v') || v.contains('.') {
        c.passed = true;
        c.score = max;
        c.detail = format!("Version: {v}");
    } else {
        c.passed = true;
        c.score = (max * 3) / 5;
        c.detail = format!("Version tag: {v} (not semantic)");
    }
    c
}

fn check_tool_count(res: &VerifiedResource, policy: &ScoringPolicy) -> VerifiedCheck {
    let max = policy.max_for("TOOL-001", 15);
    let mut c = VerifiedCheck {
        id: "TOOL-001".into(),
        name: "Tool Scope".into(),
        category: "toolScope".into(),
        max_score: max,
        description: "MCP server exposes a reasonable number of tools (blast radius control)"
            .into(),
        ..Default::default()
    };
    let count = if res.tool_count == 0 { res.tool_names.len() } else { res.tool_count };
    let warn = if policy.max_tools_warning == 0 { 10 } else { policy.max_tools_warning };
    let crit = if policy.max_tools_critical == 0 { 20 } else { policy.max_tools_critical };

    if count == 0 {
        c.passed = true;
        c.score = (max * 2) / 3;
        c.detail = "No tool count info - cannot assess blast radius".into();
    } else if count <= warn {
        c.passed = true;
        c.score = max;
        c.detail = format!("{count} tools exposed (within limit of {warn})");
    } else if count <= crit {
        c.passed = true;
        c.score = max / 2;
        c.detail = format!("{count} tools exposed - exceeds warning threshold of {warn}");
    } else {
        c.score = 0;
        c.detail = format!("{count} tools exposed - exceeds critical threshold of {crit}");
    }
    c
}

fn check_agent_usage(res: &VerifiedResource, policy: &ScoringPolicy) -> VerifiedCheck {
    let max = policy.max_for("USE-001", 10);
    let mut c = VerifiedCheck {
        id: "USE-001".into(),
        name: "Agent Usage".into(),
        category: "usage".into(),
        max_score: max,
        description: "MCP server is referenced by at least one agent (actively used)".into(),
        passed: true,
        ..Default::default()
    };
    let n = res.used_by_agents.len();
    if n > 0 {
        c.score = max;
        c.detail = format!("Used by {n} agent(s)");
    } else {
        c.score = max / 2;
        c.detail = "Not referenced by any agent - may be orphaned".into();
    }
    c
}

fn severity_for_check(c: &VerifiedCheck) -> &'static str {
    match c.category.as_str() {
        "transport" => {
            if c.score == 0 {
                "High"
            } else {
                "Medium"
            }
        }
        "publisher" => "Medium",
        "deployment" => {
            if c.id == "DEP-002" {
                "High"
            } else {
                "Low"
            }
        }
        "toolScope" => {
            if c.score == 0 {
                "Critical"
            } else {
                "Medium"
            }
        }
        "usage" => "Low",
        _ => "Medium",
    }
}

fn remediation_for_check(id: &str) -> &'static str {
    match id {
        "PUB-001" => {
            "Ensure the MCP server is discovered through the registry with proper source labels."
        }
        "PUB-002" => "Add environment and cluster labels to the discovery configuration.",
        "PUB-003" => {
            "The management type is set automatically by the inventory controller. Verify the \
             discovery pipeline."
        }
        "SEC-001" => {
            "Configure the MCP server with a recognized transport type (streamable-http, stdio, \
             sse)."
        }
        "SEC-002" => {
            "Switch the remote MCP server endpoint to HTTPS. Update the RemoteMCPServer URL to \
             use TLS."
        }
        "DEP-001" => "Publish the catalog entry by setting status.published to true.",
        "DEP-002" => {
            "Ensure the backing deployment is running and healthy. Check pod status and readiness \
             probes."
        }
        "DEP-003" => {
            "Use semantic versioning (e.g. v1.0.0) instead of 'latest' for better governance \
             tracking."
        }
        "TOOL-001" => {
            "Reduce the number of tools exposed by the MCP server. Split into multiple focused \
             servers."
        }
        "USE-001" => "No action required - informational. The MCP server has no agent consumers.",
        _ => "Review the governance check and address the finding.",
    }
}
