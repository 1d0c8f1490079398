//! ============================================================================
//! TIER-CORE: Entitlement resolution and access policy
//! ============================================================================
//! This crate decides who may see what on the learning platform:
//! - Admin allowlist checks (fail closed)
//! - Tier resolution: admin > override attribute > plan claims > free
//! - Access policy: monotonic comparison on free < pro < ultra
//! - Route gate for public / protected / admin-only paths
//! ============================================================================

pub mod access;
pub mod config;
pub mod content;
pub mod gateway;
pub mod route_gate;
pub mod session;
pub mod upgrade;

// Re-export main types for convenience
pub use access::{
    has_access, resolve_tier, AccessError, AccessGate, AdminAllowlist, AdminResolver,
    OptimisticResolver, PlanKey, PrincipalSnapshot, RequiredTier, Tier,
};
pub use config::{AccessConfig, AccessRuntime, ConfigError};
pub use content::{Course, Lesson, LessonAccess};
pub use gateway::{
    GatewayError, IdentityGateway, OverrideStore, Principal, PrincipalRecord, StaticGateway,
};
pub use route_gate::{GateOutcome, RouteClass, RouteDecision, RouteGate, RoutePolicy};
pub use session::{landing_path, DebugReport};
pub use upgrade::{upgrade_tier, UpgradeError, UpgradeReceipt, UpgradeRequest};
