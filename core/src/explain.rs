use crate::policy::Policy;
use crate::view::McpServerView;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ExplanationStatus {
    #[serde(rename = "pass")]
    Pass,
    #[serde(rename = "partial")]
    Partial,
    #[serde(rename = "fail")]
    Fail,
    #[serde(rename = "not-required")]
    NotRequired,
}

/// Describes how one security-control score was calculated: what contributed,
/// what would improve it, and which resources provide the control.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreExplanation {
    pub category: String,
    pub score: u32,
    pub max_score: u32,
    pub status: ExplanationStatus,
    pub reasons: Vec<String>,
    pub suggestions: Vec<String>,
    pub sources: Vec<String>,
}

impl ScoreExplanation {
    fn new(category: &str, score: u32) -> Self {
        Self {
            category: category.to_string(),
            score,
            max_score: 100,
            status: ExplanationStatus::Fail,
            reasons: Vec::new(),
            suggestions: Vec::new(),
            sources: Vec::new(),
        }
    }

    fn not_required(mut self, reason: &str) -> Self {
        self.status = ExplanationStatus::NotRequired;
        self.reasons = vec![reason.to_string()];
        self
    }
}

fn status_from_score(score: u32) -> ExplanationStatus {
    if score >= 100 {
        ExplanationStatus::Pass
    } else if score > 0 {
        ExplanationStatus::Partial
    } else {
        ExplanationStatus::Fail
    }
}

fn refs(resources: &[crate::view::RelatedResource]) -> Vec<String> {
    resources.iter().map(|r| format!("{}/{}", r.kind, r.name)).collect()
}

/// Builds the per-category explanations for one view. The output is
/// deterministic for a given (view, policy) and is the primary surface behind
/// the read API's per-server score detail.
pub(crate) fn build_explanations(view: &McpServerView, policy: &Policy) -> Vec<ScoreExplanation> {
    let bd = &view.score_breakdown;
    let policy_refs = refs(&view.related_policies);
    let backend_refs = refs(&view.related_backends);
    let route_refs = refs(&view.related_routes);
    let gateway_refs = refs(&view.related_gateways);

    let mut explanations = Vec::with_capacity(8);

    // Gateway routing.
    let exp = if !policy.require_agent_gateway {
        ScoreExplanation::new("Gateway Routing", bd.gateway_routing)
            .not_required("Gateway routing is not required by the governance policy.")
    } else {
        let mut exp = ScoreExplanation::new("Gateway Routing", bd.gateway_routing);
        exp.status = status_from_score(bd.gateway_routing);
        if view.routed_through_gateway {
            exp.reasons.push("MCP server is routed through agentgateway.".into());
            exp.sources.extend(gateway_refs.iter().cloned());
            exp.sources.extend(route_refs.iter().cloned());
            if !view.related_backends.is_empty() {
                exp.reasons.push("AgentgatewayBackend provides proxy configuration.".into());
                exp.sources.extend(backend_refs.iter().cloned());
            } else {
                exp.suggestions
                    .push("Create an AgentgatewayBackend for full proxy control.".into());
            }
        } else {
            exp.reasons.push("MCP server is NOT routed through agentgateway.".into());
            exp.suggestions.push(
                "Create a Gateway (agentgateway class), AgentgatewayBackend, and HTTPRoute to \
                 proxy traffic through agentgateway."
                    .into(),
            );
        }
        exp
    };
    explanations.push(exp);

    // Authentication.
    let exp = if !policy.require_jwt_auth {
        ScoreExplanation::new("Authentication", bd.authentication)
            .not_required("JWT authentication is not required by the governance policy.")
    } else {
        let mut exp = ScoreExplanation::new("Authentication", bd.authentication);
        exp.status = status_from_score(bd.authentication);
        if view.has_jwt {
            let mode = view.jwt_mode.as_deref().filter(|m| !m.is_empty()).unwrap_or("Strict");
            exp.reasons.push(format!("JWT authentication is enabled in {mode} mode."));
            exp.sources = policy_refs.clone();
            if mode == "Optional" {
                exp.suggestions.push(
                    "Switch JWT mode from Optional to Strict for full enforcement.".into(),
                );
            }
        } else if view.has_auth {
            exp.reasons.push("Backend-level authentication is configured but not JWT.".into());
            exp.sources = backend_refs.clone();
            exp.suggestions.push(
                "Add JWT authentication via an AgentgatewayPolicy with traffic.jwtAuthentication \
                 for stronger auth."
                    .into(),
            );
        } else {
            exp.reasons.push("No authentication is configured.".into());
            exp.suggestions.push(
                "Create an AgentgatewayPolicy with traffic.jwtAuthentication targeting your \
                 Gateway or HTTPRoute."
                    .into(),
            );
        }
        exp
    };
    explanations.push(exp);

    // Authorization.
    let exp = if !policy.require_rbac {
        ScoreExplanation::new("Authorization", bd.authorization)
            .not_required("RBAC authorization is not required by the governance policy.")
    } else {
        let mut exp = ScoreExplanation::new("Authorization", bd.authorization);
        exp.status = status_from_score(bd.authorization);
        if view.has_rbac {
            exp.reasons.push("RBAC/CEL-based authorization is enabled.".into());
            exp.sources = policy_refs.clone();
            if view.has_tool_restriction {
                exp.reasons.push(format!(
                    "Tool access is restricted to {} of {} tools via CEL policy.",
                    view.effective_tool_count, view.tool_count
                ));
            }
        } else {
            exp.reasons.push("No RBAC authorization is configured.".into());
            exp.suggestions.push(
                "Add an AgentgatewayPolicy with traffic.authorization using CEL matchExpressions \
                 for tool-level access control."
                    .into(),
            );
        }
        exp
    };
    explanations.push(exp);

    // TLS.
    let exp = if !policy.require_tls {
        ScoreExplanation::new("TLS Encryption", bd.tls)
            .not_required("TLS encryption is not required by the governance policy.")
    } else {
        let mut exp = ScoreExplanation::new("TLS Encryption", bd.tls);
        exp.status = status_from_score(bd.tls);
        if view.has_tls {
            exp.reasons.push("TLS is enabled on the backend connection.".into());
            exp.sources = backend_refs.clone();
        } else {
            exp.reasons.push("No TLS encryption is configured.".into());
            exp.suggestions.push(
                "Add spec.policies.tls with an SNI to the AgentgatewayBackend for encrypted \
                 backend connections."
                    .into(),
            );
        }
        exp
    };
    explanations.push(exp);

    // CORS.
    let exp = if !policy.require_cors {
        ScoreExplanation::new("CORS Policy", bd.cors)
            .not_required("CORS policy is not required by the governance policy.")
    } else {
        let mut exp = ScoreExplanation::new("CORS Policy", bd.cors);
        exp.status = status_from_score(bd.cors);
        if view.has_cors {
            let from_policy = view.related_policies.iter().any(|p| {
                p.details.get("hasCORS").and_then(|v| v.as_bool()).unwrap_or(false)
            });
            let from_route = view.related_routes.iter().any(|r| {
                r.details.get("hasCORSFilter").and_then(|v| v.as_bool()).unwrap_or(false)
            });
            if from_policy && from_route {
                exp.reasons.push(
                    "CORS is configured at both the AgentgatewayPolicy and HTTPRoute levels."
                        .into(),
                );
            } else if from_policy {
                exp.reasons
                    .push("CORS is configured via the AgentgatewayPolicy (traffic.cors).".into());
                exp.sources = policy_refs.clone();
            } else if from_route {
                exp.reasons.push("CORS is configured via the HTTPRoute CORS filter.".into());
                exp.sources = route_refs.clone();
            } else {
                exp.reasons.push("CORS is enabled.".into());
            }
        } else {
            exp.reasons.push("No CORS policy is configured.".into());
            exp.suggestions.push(
                "Add traffic.cors to an AgentgatewayPolicy or add a CORS filter to the HTTPRoute."
                    .into(),
            );
        }
        exp
    };
    explanations.push(exp);

    // Rate limiting.
    let exp = if !policy.require_rate_limit {
        ScoreExplanation::new("Rate Limiting", bd.rate_limit)
            .not_required("Rate limiting is not required by the governance policy.")
    } else {
        let mut exp = ScoreExplanation::new("Rate Limiting", bd.rate_limit);
        exp.status = status_from_score(bd.rate_limit);
        if view.has_rate_limit {
            exp.reasons.push("Rate limiting is enabled via AgentgatewayPolicy.".into());
            exp.sources = policy_refs.clone();
        } else {
            exp.reasons.push("No rate limiting is configured.".into());
            exp.suggestions.push(
                "Add traffic.rateLimit.local to an AgentgatewayPolicy to enforce request rate \
                 limits."
                    .into(),
            );
        }
        exp
    };
    explanations.push(exp);

    // Prompt guard.
    let exp = if !policy.require_prompt_guard {
        ScoreExplanation::new("Prompt Guard", bd.prompt_guard)
            .not_required("Prompt guard is not required by the governance policy.")
    } else {
        let mut exp = ScoreExplanation::new("Prompt Guard", bd.prompt_guard);
        exp.status = status_from_score(bd.prompt_guard);
        if view.has_prompt_guard {
            exp.reasons.push("Prompt guard is enabled with request/response inspection.".into());
            exp.sources = policy_refs.clone();
        } else {
            exp.reasons.push("No prompt guard is configured.".into());
            exp.suggestions.push(
                "Add backend.ai.promptGuard to an AgentgatewayPolicy with regex reject/mask \
                 patterns for injection protection."
                    .into(),
            );
        }
        exp
    };
    explanations.push(exp);

    // Tool scope.
    let has_tool_policy = policy.max_tools_warning > 0 || policy.max_tools_critical > 0;
    let exp = if !has_tool_policy {
        ScoreExplanation::new("Tool Scope", bd.tool_scope)
            .not_required("Tool scope limits are not configured in the governance policy.")
    } else if view.tool_count == 0 {
        let mut exp = ScoreExplanation::new("Tool Scope", bd.tool_scope);
        exp.status = ExplanationStatus::Fail;
        exp.reasons = vec!["No tools discovered for this MCP server.".into()];
        exp.suggestions = vec![
            "Ensure the MCP server exposes tools and that tool discovery is working correctly."
                .into(),
        ];
        exp
    } else {
        let mut exp = ScoreExplanation::new("Tool Scope", bd.tool_scope);
        exp.status = status_from_score(bd.tool_scope);
        if view.has_tool_restriction {
            exp.reasons.push(format!(
                "Tool access restricted to {} tools (out of {} discovered) via CEL authorization \
                 policy.",
                view.effective_tool_count, view.tool_count
            ));
            exp.sources = policy_refs;
        }
        if bd.tool_scope >= 100 {
            exp.reasons.push(format!(
                "Effective tool count ({}) is within governance limits (warning: {}, critical: \
                 {}).",
                view.effective_tool_count, policy.max_tools_warning, policy.max_tools_critical
            ));
        } else if bd.tool_scope >= 50 {
            exp.reasons.push(format!(
                "Effective tool count ({}) exceeds warning threshold ({}).",
                view.effective_tool_count, policy.max_tools_warning
            ));
            exp.suggestions.push(
                "Reduce the number of exposed tools by adding stricter CEL authorization rules."
                    .into(),
            );
        } else {
            exp.reasons.push(format!(
                "Effective tool count ({}) exceeds critical threshold ({}).",
                view.effective_tool_count, policy.max_tools_critical
            ));
            exp.suggestions
                .push("Urgently restrict tool exposure via CEL authorization policies.".into());
        }
        exp
    };
    explanations.push(exp);

    explanations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ClusterState, McpServer};
    use crate::view::build_views;

    fn explanations_for(policy: &Policy) -> Vec<ScoreExplanation> {
        let state = ClusterState {
            mcp_servers: vec![McpServer {
                name: "srv".into(),
                namespace: "apps".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let views = build_views(&state, &[], policy, "2026-01-01T00:00:00Z");
        views.into_iter().next().unwrap().score_explanations
    }

    #[test]
    fn eight_categories_in_stable_order() {
        let cats: Vec<String> = explanations_for(&Policy::default())
            .into_iter()
            .map(|e| e.category)
            .collect();
        assert_eq!(
            cats,
            vec![
                "Gateway Routing",
                "Authentication",
                "Authorization",
                "TLS Encryption",
                "CORS Policy",
                "Rate Limiting",
                "Prompt Guard",
                "Tool Scope",
            ]
        );
    }

    #[test]
    fn dropped_categories_surface_not_required() {
        // Rate limit and prompt guard are not required by default, yet the
        // breakdown still charges 0; the explanation must say not-required.
        let exps = explanations_for(&Policy::default());
        let rate = exps.iter().find(|e| e.category == "Rate Limiting").unwrap();
        assert_eq!(rate.status, ExplanationStatus::NotRequired);
        assert_eq!(rate.score, 0);
        let pg = exps.iter().find(|e| e.category == "Prompt Guard").unwrap();
        assert_eq!(pg.status, ExplanationStatus::NotRequired);
    }

    #[test]
    fn failing_required_categories_fail_with_suggestions() {
        let exps = explanations_for(&Policy::default());
        let auth = exps.iter().find(|e| e.category == "Authentication").unwrap();
        assert_eq!(auth.status, ExplanationStatus::Fail);
        assert!(!auth.suggestions.is_empty());
    }

    #[test]
    fn status_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&ExplanationStatus::NotRequired).unwrap(),
            "\"not-required\""
        );
        assert_eq!(serde_json::to_string(&ExplanationStatus::Pass).unwrap(), "\"pass\"");
    }
}
