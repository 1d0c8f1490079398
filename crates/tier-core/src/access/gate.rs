//! ============================================================================
//! Access Gate - Authoritative tier checks for server-side logic
//! ============================================================================
//! Resolves tiers against the live identity provider on every call. Nothing
//! is cached across evaluations; this is the only context allowed to gate
//! real access.
//! ============================================================================

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::admin::{AdminAllowlist, AdminResolver};
use super::resolver::{resolve_tier, ServerTierSource};
use super::types::{has_access, RequiredTier, Tier};
use crate::gateway::IdentityGateway;

/// Errors raised by the `require_*` helpers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Admin access required")]
    AdminRequired,

    #[error("Access denied. Content requires {required} tier, you have {held} tier")]
    TierRequired { required: RequiredTier, held: Tier },
}

/// Server-side access checks bound to one identity provider
pub struct AccessGate<G> {
    gateway: G,
    admins: AdminResolver,
}

impl<G> AccessGate<G>
where
    G: IdentityGateway,
{
    pub fn new(gateway: G, allowlist: Arc<AdminAllowlist>) -> Self {
        Self {
            gateway,
            admins: AdminResolver::new(allowlist),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn admins(&self) -> &AdminResolver {
        &self.admins
    }

    /// Fail-closed admin check
    pub async fn is_admin(&self) -> bool {
        self.admins.is_admin(&self.gateway).await
    }

    /// `None` when nobody is signed in
    pub async fn admin_status(&self) -> Option<bool> {
        self.admins.admin_status(&self.gateway).await
    }

    pub async fn require_admin(&self) -> Result<(), AccessError> {
        match self.admin_status().await {
            None => Err(AccessError::Unauthenticated),
            Some(false) => Err(AccessError::AdminRequired),
            Some(true) => Ok(()),
        }
    }

    /// Resolve the current principal's tier
    pub async fn user_tier(&self) -> Tier {
        let source = ServerTierSource::load(&self.gateway, self.admins.allowlist()).await;
        let tier = resolve_tier(&source).await;
        debug!(
            "Resolved tier for {:?}: {}",
            source.principal().and_then(|p| p.id.as_deref()),
            tier
        );
        tier
    }

    /// Whether the current principal may see content requiring `required`.
    /// Unrestricted content never touches the identity provider.
    pub async fn has_access_to_tier(&self, required: Option<&RequiredTier>) -> bool {
        if required.map_or(true, RequiredTier::is_unrestricted) {
            return true;
        }
        has_access(self.user_tier().await, required)
    }

    /// Gate content - returns Ok(tier) if allowed, Err with the shortfall if not
    pub async fn gate_content(&self, required: Option<&RequiredTier>) -> Result<Tier, AccessError> {
        let tier = self.user_tier().await;

        if !has_access(tier, required) {
            let required = required.cloned().unwrap_or(RequiredTier::Free);
            warn!("Access denied: {} tier does not satisfy {}", tier, required);
            return Err(AccessError::TierRequired {
                required,
                held: tier,
            });
        }

        info!("Access granted at {} tier", tier);
        Ok(tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::PlanKey;
    use crate::gateway::{FailureModes, StaticGateway, TIER_ATTRIBUTE};

    fn gate(gateway: StaticGateway) -> AccessGate<StaticGateway> {
        AccessGate::new(gateway, Arc::new(AdminAllowlist::parse("a@x.com")))
    }

    #[tokio::test]
    async fn test_admin_gets_ultra() {
        let gate = gate(
            StaticGateway::signed_in("u", "A@X.COM")
                .with_attribute(TIER_ATTRIBUTE, serde_json::json!("free")),
        );
        assert_eq!(gate.user_tier().await, Tier::Ultra);
        assert!(gate.has_access_to_tier(Some(&RequiredTier::Ultra)).await);
        assert!(gate.require_admin().await.is_ok());
    }

    #[tokio::test]
    async fn test_require_admin_errors() {
        let anon = gate(StaticGateway::anonymous());
        assert_eq!(anon.require_admin().await, Err(AccessError::Unauthenticated));

        let user = gate(StaticGateway::signed_in("u", "b@x.com"));
        assert_eq!(user.require_admin().await, Err(AccessError::AdminRequired));
    }

    #[tokio::test]
    async fn test_unrestricted_skips_provider() {
        let gate = gate(StaticGateway::signed_in("u", "b@x.com").failing(FailureModes {
            principal: true,
            claims: true,
            store: false,
        }));
        assert!(gate.has_access_to_tier(None).await);
        assert!(gate.has_access_to_tier(Some(&RequiredTier::Free)).await);
        assert!(!gate.has_access_to_tier(Some(&RequiredTier::Pro)).await);
    }

    #[tokio::test]
    async fn test_gate_content_reports_shortfall() {
        let gate = gate(StaticGateway::signed_in("u", "b@x.com").with_claims(&[PlanKey::Pro]));

        assert_eq!(gate.gate_content(Some(&RequiredTier::Pro)).await, Ok(Tier::Pro));
        let err = gate.gate_content(Some(&RequiredTier::Ultra)).await.unwrap_err();
        assert_eq!(
            err,
            AccessError::TierRequired {
                required: RequiredTier::Ultra,
                held: Tier::Pro,
            }
        );
        assert!(err.to_string().contains("ultra"));
    }
}
