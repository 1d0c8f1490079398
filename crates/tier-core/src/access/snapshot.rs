//! ============================================================================
//! Principal Snapshot - Optimistic tier resolution
//! ============================================================================
//! Client-side rendering resolves tiers from a locally cached copy of the
//! principal before the authoritative answer arrives. The snapshot feeds the
//! same `resolve_tier` precedence as the server; only its inputs may be stale.
//! Results are for presentation only and cannot be turned into an access grant.
//! ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use super::admin::AdminAllowlist;
use super::resolver::{resolve_tier, TierSource};
use super::types::{has_access, PlanKey, RequiredTier, Tier};
use crate::gateway::Principal;

/// Locally cached principal and claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrincipalSnapshot {
    pub principal: Option<Principal>,
    #[serde(default)]
    pub claims: BTreeSet<PlanKey>,
    pub captured_at: DateTime<Utc>,
}

impl PrincipalSnapshot {
    /// Snapshot taken now
    pub fn capture(principal: Option<Principal>, claims: impl IntoIterator<Item = PlanKey>) -> Self {
        Self::captured_at(principal, claims, Utc::now())
    }

    pub fn captured_at(
        principal: Option<Principal>,
        claims: impl IntoIterator<Item = PlanKey>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            principal: principal.filter(|p| !p.is_anonymous()),
            claims: claims.into_iter().collect(),
            captured_at,
        }
    }

    /// Nothing loaded yet
    pub fn anonymous() -> Self {
        Self::capture(None, std::iter::empty::<PlanKey>())
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.captured_at
    }

    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.age() > max_age
    }
}

/// `TierSource` over a snapshot plus the client's copy of the allowlist
pub struct SnapshotTierSource<'a> {
    snapshot: &'a PrincipalSnapshot,
    allowlist: &'a AdminAllowlist,
}

impl<'a> SnapshotTierSource<'a> {
    pub fn new(snapshot: &'a PrincipalSnapshot, allowlist: &'a AdminAllowlist) -> Self {
        Self {
            snapshot,
            allowlist,
        }
    }
}

#[async_trait]
impl<'a> TierSource for SnapshotTierSource<'a> {
    async fn is_admin(&self) -> bool {
        self.snapshot
            .principal
            .as_ref()
            .is_some_and(|p| self.allowlist.is_admin_principal(p))
    }

    async fn tier_override(&self) -> Option<Tier> {
        self.snapshot.principal.as_ref().and_then(|p| p.tier_override)
    }

    async fn has_claim(&self, plan: PlanKey) -> bool {
        self.snapshot.principal.is_some() && self.snapshot.claims.contains(&plan)
    }
}

/// Tier resolved from a snapshot. Presentation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OptimisticTier {
    tier: Tier,
    captured_at: DateTime<Utc>,
}

impl OptimisticTier {
    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Whether to render content as unlocked. Enforcement must still go
    /// through the server-side `AccessGate`.
    pub fn shows_unlocked(&self, required: Option<&RequiredTier>) -> bool {
        has_access(self.tier, required)
    }

    /// Next tier to advertise, if any
    pub fn upsell(&self) -> Option<Tier> {
        self.tier.next()
    }
}

/// Client-side resolver holding its own copy of the allowlist
#[derive(Debug, Clone)]
pub struct OptimisticResolver {
    allowlist: Arc<AdminAllowlist>,
}

impl OptimisticResolver {
    pub fn new(allowlist: Arc<AdminAllowlist>) -> Self {
        Self { allowlist }
    }

    pub async fn resolve(&self, snapshot: &PrincipalSnapshot) -> OptimisticTier {
        let source = SnapshotTierSource::new(snapshot, &self.allowlist);
        OptimisticTier {
            tier: resolve_tier(&source).await,
            captured_at: snapshot.captured_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> OptimisticResolver {
        OptimisticResolver::new(Arc::new(AdminAllowlist::parse("a@x.com")))
    }

    #[tokio::test]
    async fn test_snapshot_admin() {
        let snapshot = PrincipalSnapshot::capture(
            Some(Principal::authenticated("u", Some("A@x.com")).with_override(Tier::Free)),
            [PlanKey::FreeUser],
        );
        assert_eq!(resolver().resolve(&snapshot).await.tier(), Tier::Ultra);
    }

    #[tokio::test]
    async fn test_snapshot_override_and_claims() {
        let snapshot = PrincipalSnapshot::capture(
            Some(Principal::authenticated("u", Some("b@x.com")).with_override(Tier::Pro)),
            [PlanKey::Ultra],
        );
        let resolved = resolver().resolve(&snapshot).await;
        assert_eq!(resolved.tier(), Tier::Pro);
        assert!(resolved.shows_unlocked(Some(&RequiredTier::Pro)));
        assert!(!resolved.shows_unlocked(Some(&RequiredTier::Ultra)));
        assert_eq!(resolved.upsell(), Some(Tier::Ultra));
    }

    #[tokio::test]
    async fn test_anonymous_snapshot_ignores_claims() {
        let snapshot = PrincipalSnapshot::capture(None, [PlanKey::Ultra]);
        assert_eq!(resolver().resolve(&snapshot).await.tier(), Tier::Free);
        assert_eq!(
            resolver().resolve(&PrincipalSnapshot::anonymous()).await.tier(),
            Tier::Free
        );
    }

    #[tokio::test]
    async fn test_stale_snapshot_keeps_old_answer() {
        let captured = Utc::now() - Duration::minutes(10);
        let snapshot = PrincipalSnapshot::captured_at(
            Some(Principal::authenticated("u", Some("b@x.com"))),
            [PlanKey::Pro],
            captured,
        );
        assert!(snapshot.is_stale(Duration::minutes(5)));
        assert!(!snapshot.is_stale(Duration::minutes(30)));

        let resolved = resolver().resolve(&snapshot).await;
        assert_eq!(resolved.tier(), Tier::Pro);
        assert_eq!(resolved.captured_at(), captured);
    }
}
