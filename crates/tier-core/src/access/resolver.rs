//! ============================================================================
//! Tier Resolver - Precedence rules for the resolved tier
//! ============================================================================
//! One precedence function, `resolve_tier`, shared by the authoritative
//! server context and the optimistic snapshot context. First match wins:
//! 1. admin                      -> ultra
//! 2. tier override attribute    -> the override, verbatim
//! 3. claims, highest plan first -> ultra / pro / free
//! 4. nothing                    -> free
//! ============================================================================

use async_trait::async_trait;
use tracing::{debug, warn};

use super::admin::AdminAllowlist;
use super::types::{PlanKey, Tier};
use crate::gateway::{fetch_principal, IdentityGateway, Principal};

/// Inputs to tier resolution. Every method is infallible; a source absorbs
/// its own lookup failures and answers with the safe default.
#[async_trait]
pub trait TierSource: Send + Sync {
    async fn is_admin(&self) -> bool;

    async fn tier_override(&self) -> Option<Tier>;

    async fn has_claim(&self, plan: PlanKey) -> bool;
}

/// Resolve the tier held by whatever principal `source` describes
pub async fn resolve_tier<S>(source: &S) -> Tier
where
    S: TierSource + ?Sized,
{
    if source.is_admin().await {
        return Tier::Ultra;
    }

    if let Some(tier) = source.tier_override().await {
        return tier;
    }

    for plan in PlanKey::DESCENDING {
        if source.has_claim(plan).await {
            return plan.tier();
        }
    }

    Tier::Free
}

/// Authoritative context: one principal fetched per evaluation, claims
/// queried from the provider on demand
pub struct ServerTierSource<'a, G: ?Sized> {
    gateway: &'a G,
    allowlist: &'a AdminAllowlist,
    principal: Option<Principal>,
}

impl<'a, G> ServerTierSource<'a, G>
where
    G: IdentityGateway + ?Sized,
{
    /// Fetch the current principal. A failed lookup degrades to anonymous.
    pub async fn load(gateway: &'a G, allowlist: &'a AdminAllowlist) -> Self {
        let principal = match fetch_principal(gateway).await {
            Ok(principal) => principal,
            Err(e) => {
                warn!("Principal lookup failed, resolving as anonymous: {}", e);
                None
            }
        };
        Self::with_principal(gateway, allowlist, principal)
    }

    /// Use an already-fetched principal
    pub fn with_principal(
        gateway: &'a G,
        allowlist: &'a AdminAllowlist,
        principal: Option<Principal>,
    ) -> Self {
        Self {
            gateway,
            allowlist,
            principal,
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }
}

#[async_trait]
impl<'a, G> TierSource for ServerTierSource<'a, G>
where
    G: IdentityGateway + ?Sized,
{
    async fn is_admin(&self) -> bool {
        self.principal
            .as_ref()
            .is_some_and(|p| self.allowlist.is_admin_principal(p))
    }

    async fn tier_override(&self) -> Option<Tier> {
        self.principal.as_ref().and_then(|p| p.tier_override)
    }

    async fn has_claim(&self, plan: PlanKey) -> bool {
        let Some(principal) = self.principal.as_ref() else {
            return false;
        };
        match self.gateway.has_claim(principal, plan).await {
            Ok(held) => {
                debug!("Claim {} for {:?}: {}", plan, principal.id, held);
                held
            }
            Err(e) => {
                warn!("Claim lookup for {} failed, treating as absent: {}", plan, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{FailureModes, StaticGateway, TIER_ATTRIBUTE};
    use std::collections::BTreeSet;

    /// Fixed inputs for exercising the precedence function directly
    struct Facts {
        admin: bool,
        tier_override: Option<Tier>,
        claims: BTreeSet<PlanKey>,
    }

    #[async_trait]
    impl TierSource for Facts {
        async fn is_admin(&self) -> bool {
            self.admin
        }

        async fn tier_override(&self) -> Option<Tier> {
            self.tier_override
        }

        async fn has_claim(&self, plan: PlanKey) -> bool {
            self.claims.contains(&plan)
        }
    }

    fn facts(admin: bool, tier_override: Option<Tier>, claims: &[PlanKey]) -> Facts {
        Facts {
            admin,
            tier_override,
            claims: claims.iter().copied().collect(),
        }
    }

    #[tokio::test]
    async fn test_admin_supremacy() {
        for tier_override in [None, Some(Tier::Free), Some(Tier::Pro)] {
            let source = facts(true, tier_override, &[PlanKey::FreeUser]);
            assert_eq!(resolve_tier(&source).await, Tier::Ultra);
        }
    }

    #[tokio::test]
    async fn test_override_beats_claims() {
        let source = facts(false, Some(Tier::Pro), &[PlanKey::Ultra]);
        assert_eq!(resolve_tier(&source).await, Tier::Pro);

        let source = facts(false, Some(Tier::Free), &[PlanKey::Ultra, PlanKey::Pro]);
        assert_eq!(resolve_tier(&source).await, Tier::Free);
    }

    #[tokio::test]
    async fn test_claims_highest_first() {
        let source = facts(false, None, &[PlanKey::Pro, PlanKey::Ultra]);
        assert_eq!(resolve_tier(&source).await, Tier::Ultra);

        let source = facts(false, None, &[PlanKey::FreeUser, PlanKey::Pro]);
        assert_eq!(resolve_tier(&source).await, Tier::Pro);

        let source = facts(false, None, &[PlanKey::FreeUser]);
        assert_eq!(resolve_tier(&source).await, Tier::Free);
    }

    #[tokio::test]
    async fn test_default_is_free() {
        assert_eq!(resolve_tier(&facts(false, None, &[])).await, Tier::Free);
    }

    #[tokio::test]
    async fn test_server_source_reads_gateway() {
        let allowlist = AdminAllowlist::parse("a@x.com");
        let gateway = StaticGateway::signed_in("user_1", "b@x.com")
            .with_claims(&[PlanKey::Pro])
            .with_attribute(TIER_ATTRIBUTE, serde_json::json!("ultra"));

        let source = ServerTierSource::load(&gateway, &allowlist).await;
        assert_eq!(source.tier_override().await, Some(Tier::Ultra));
        assert!(source.has_claim(PlanKey::Pro).await);
        assert_eq!(resolve_tier(&source).await, Tier::Ultra);
    }

    #[tokio::test]
    async fn test_claim_failure_degrades_to_free() {
        let allowlist = AdminAllowlist::empty();
        let gateway = StaticGateway::signed_in("user_1", "b@x.com")
            .with_claims(&[PlanKey::Ultra])
            .failing(FailureModes {
                claims: true,
                ..FailureModes::default()
            });

        let source = ServerTierSource::load(&gateway, &allowlist).await;
        assert_eq!(resolve_tier(&source).await, Tier::Free);
    }

    #[tokio::test]
    async fn test_principal_failure_resolves_anonymous() {
        let allowlist = AdminAllowlist::parse("a@x.com");
        let gateway = StaticGateway::signed_in("user_1", "a@x.com").failing(FailureModes {
            principal: true,
            ..FailureModes::default()
        });

        let source = ServerTierSource::load(&gateway, &allowlist).await;
        assert!(source.principal().is_none());
        assert_eq!(resolve_tier(&source).await, Tier::Free);
    }

    #[tokio::test]
    async fn test_anonymous_has_no_claims() {
        let allowlist = AdminAllowlist::empty();
        let gateway = StaticGateway::anonymous().with_claims(&[PlanKey::Ultra]);
        let source = ServerTierSource::load(&gateway, &allowlist).await;
        assert!(!source.has_claim(PlanKey::Ultra).await);
        assert_eq!(resolve_tier(&source).await, Tier::Free);
    }
}
