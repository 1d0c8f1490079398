//! ============================================================================
//! Access Module - Tier resolution and access policy
//! ============================================================================
//! Answers two questions for any request or render: which tier does the
//! principal hold, and does that tier satisfy a resource's required tier.
//!
//! ## Tiers
//! - **Free**: everyone, including anonymous visitors
//! - **Pro**: `pro` plan holders
//! - **Ultra**: `ultra` plan holders and every administrator
//!
//! ## Usage
//! ```rust,ignore
//! use tier_core::access::{AccessGate, AdminAllowlist, RequiredTier};
//!
//! let gate = AccessGate::new(gateway, Arc::new(AdminAllowlist::from_env()));
//! let allowed = gate.has_access_to_tier(Some(&RequiredTier::Pro)).await;
//! ```
//! ============================================================================

mod admin;
mod gate;
mod resolver;
mod snapshot;
mod types;

// Re-export public types
pub use admin::{AdminAllowlist, AdminResolver, ADMIN_EMAILS_ENV, DEFAULT_ADMIN_EMAIL};
pub use gate::{AccessError, AccessGate};
pub use resolver::{resolve_tier, ServerTierSource, TierSource};
pub use snapshot::{OptimisticResolver, OptimisticTier, PrincipalSnapshot, SnapshotTierSource};
pub use types::{has_access, PlanKey, RequiredTier, Tier, UnknownTier};
