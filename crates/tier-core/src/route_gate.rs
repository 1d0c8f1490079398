//! ============================================================================
//! Route Gate - Request boundary checks
//! ============================================================================
//! Classifies each request path and applies the matching check:
//! - Public routes pass through untouched
//! - Protected routes need a signed-in principal; otherwise the identity
//!   provider's own sign-in challenge takes over
//! - Admin-only routes need a signed-in administrator; any doubt about admin
//!   status redirects to the public fallback path
//!
//! One evaluation per request, no retries.
//! ============================================================================

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::access::{AdminAllowlist, AdminResolver};
use crate::config::ConfigError;
use crate::gateway::{fetch_principal, IdentityGateway};

/// Path prefixes the gate always runs for, even if they look like assets
const ALWAYS_GATED_PREFIXES: &[&str] = &["/api", "/trpc"];

/// Route classification configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutePolicy {
    /// Patterns that require a signed-in principal
    pub protected: Vec<String>,
    /// Patterns that require an administrator
    pub admin_only: Vec<String>,
    /// Where non-admins are sent when they hit an admin-only route
    pub fallback_path: String,
    /// Framework-internal prefixes the gate never runs for
    pub skip_prefixes: Vec<String>,
    /// Static asset extensions skipped on public routes
    pub skip_extensions: Vec<String>,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self {
            protected: vec!["/dashboard(.*)".to_string(), "/lessons(.*)".to_string()],
            admin_only: vec!["/admin(.*)".to_string()],
            fallback_path: "/".to_string(),
            skip_prefixes: vec!["/_next".to_string()],
            skip_extensions: [
                "html", "htm", "css", "js", "jpg", "jpeg", "webp", "png", "gif", "svg", "ttf",
                "woff", "woff2", "ico", "csv", "doc", "docx", "xls", "xlsx", "zip", "webmanifest",
            ]
            .iter()
            .map(|ext| ext.to_string())
            .collect(),
        }
    }
}

/// Route classes, strictest last
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    Public,
    Protected,
    AdminOnly,
}

/// What the gate learned about the requester
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Unauthenticated,
    AuthenticatedNonAdmin,
    AuthenticatedAdmin,
}

/// Terminal outcome of one evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "location")]
pub enum GateOutcome {
    /// Let the request through
    Allow,
    /// Hand the request to the identity provider's sign-in challenge
    RedirectToAuth,
    /// Send the request to a public path
    RedirectToFallback(String),
}

/// Result of a route gate evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub class: RouteClass,
    /// Set on every redirect and on every admin-route outcome. A signed-in
    /// pass on a protected route never checks admin status and leaves it unset.
    pub state: Option<AuthState>,
    pub outcome: GateOutcome,
    pub reason: String,
}

impl RouteDecision {
    pub fn is_allowed(&self) -> bool {
        self.outcome == GateOutcome::Allow
    }
}

/// Compiled route classifier plus admin resolution
#[derive(Debug, Clone)]
pub struct RouteGate {
    protected: Vec<Regex>,
    admin_only: Vec<Regex>,
    fallback_path: String,
    skip_prefixes: Vec<String>,
    skip_extensions: Vec<String>,
    admins: AdminResolver,
}

impl RouteGate {
    /// Compile a policy. Patterns are anchored to the whole path.
    pub fn new(policy: &RoutePolicy, allowlist: Arc<AdminAllowlist>) -> Result<Self, ConfigError> {
        Ok(Self {
            protected: compile_patterns(&policy.protected)?,
            admin_only: compile_patterns(&policy.admin_only)?,
            fallback_path: policy.fallback_path.clone(),
            skip_prefixes: policy.skip_prefixes.clone(),
            skip_extensions: policy
                .skip_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            admins: AdminResolver::new(allowlist),
        })
    }

    pub fn fallback_path(&self) -> &str {
        &self.fallback_path
    }

    /// Whether the gate runs for this path at all. Protected and admin-only
    /// paths are always gated, whatever their extension.
    pub fn applies_to(&self, path: &str) -> bool {
        if self.classify(path) != RouteClass::Public {
            return true;
        }
        !self.is_static_asset(strip_query(path))
    }

    fn is_static_asset(&self, path: &str) -> bool {
        if ALWAYS_GATED_PREFIXES.iter().any(|p| has_segment_prefix(path, p)) {
            return false;
        }
        if self.skip_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            return true;
        }

        let last_segment = path.rsplit('/').next().unwrap_or_default();
        match last_segment.rsplit_once('.') {
            Some((_, ext)) => self.skip_extensions.contains(&ext.to_lowercase()),
            None => false,
        }
    }

    /// Classify a path. Admin-only patterns are checked before protected ones
    /// so the stricter class wins when both match.
    pub fn classify(&self, path: &str) -> RouteClass {
        let path = strip_query(path);
        if self.admin_only.iter().any(|re| re.is_match(path)) {
            RouteClass::AdminOnly
        } else if self.protected.iter().any(|re| re.is_match(path)) {
            RouteClass::Protected
        } else {
            RouteClass::Public
        }
    }

    /// Evaluate one request
    pub async fn evaluate<G>(&self, path: &str, gateway: &G) -> RouteDecision
    where
        G: IdentityGateway + ?Sized,
    {
        if !self.applies_to(path) {
            return RouteDecision {
                class: RouteClass::Public,
                state: None,
                outcome: GateOutcome::Allow,
                reason: "Static asset".into(),
            };
        }

        let decision = match self.classify(path) {
            RouteClass::Public => RouteDecision {
                class: RouteClass::Public,
                state: None,
                outcome: GateOutcome::Allow,
                reason: "Public route".into(),
            },
            RouteClass::Protected => self.check_protected(gateway).await,
            RouteClass::AdminOnly => self.check_admin(gateway).await,
        };

        match decision.outcome {
            GateOutcome::Allow => debug!("Route {} allowed: {}", path, decision.reason),
            _ => info!("Route {} -> {:?}: {}", path, decision.outcome, decision.reason),
        }
        decision
    }

    async fn check_protected<G>(&self, gateway: &G) -> RouteDecision
    where
        G: IdentityGateway + ?Sized,
    {
        let signed_in = match fetch_principal(gateway).await {
            Ok(principal) => principal.is_some(),
            Err(e) => {
                warn!("Principal lookup failed on protected route: {}", e);
                false
            }
        };

        if signed_in {
            RouteDecision {
                class: RouteClass::Protected,
                state: None,
                outcome: GateOutcome::Allow,
                reason: "Signed in".into(),
            }
        } else {
            RouteDecision {
                class: RouteClass::Protected,
                state: Some(AuthState::Unauthenticated),
                outcome: GateOutcome::RedirectToAuth,
                reason: "Sign-in required".into(),
            }
        }
    }

    async fn check_admin<G>(&self, gateway: &G) -> RouteDecision
    where
        G: IdentityGateway + ?Sized,
    {
        let principal = match fetch_principal(gateway).await {
            Ok(principal) => principal,
            Err(e) => {
                warn!("Principal lookup failed on admin route, denying: {}", e);
                return self.fallback(None, "Identity lookup failed");
            }
        };

        let Some(principal) = principal else {
            return RouteDecision {
                class: RouteClass::AdminOnly,
                state: Some(AuthState::Unauthenticated),
                outcome: GateOutcome::RedirectToAuth,
                reason: "Sign-in required".into(),
            };
        };

        // Decide on the principal already fetched; a second lookup could disagree
        if self.admins.allowlist().is_admin_principal(&principal) {
            info!("Admin access granted to {:?}", principal.id);
            RouteDecision {
                class: RouteClass::AdminOnly,
                state: Some(AuthState::AuthenticatedAdmin),
                outcome: GateOutcome::Allow,
                reason: "Administrator".into(),
            }
        } else {
            self.fallback(Some(AuthState::AuthenticatedNonAdmin), "Not an administrator")
        }
    }

    fn fallback(&self, state: Option<AuthState>, reason: &str) -> RouteDecision {
        RouteDecision {
            class: RouteClass::AdminOnly,
            state,
            outcome: GateOutcome::RedirectToFallback(self.fallback_path.clone()),
            reason: reason.to_string(),
        }
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })
        })
        .collect()
}

fn strip_query(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or(path)
}

/// `/api` matches `/api` and `/api/...` but not `/apiary`
fn has_segment_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}
