//! ============================================================================
//! Access Types - Subscription tiers and the access policy
//! ============================================================================
//! Defines the totally ordered tier enumeration, the tier a resource demands,
//! and the plan keys the billing provider asserts claims for.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Subscription tiers, ordered `free < pro < ultra`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Everyone, including anonymous visitors
    #[default]
    Free,
    /// Paid tier
    Pro,
    /// Top tier - also granted unconditionally to administrators
    Ultra,
}

impl Tier {
    /// All tiers in ascending order
    pub const ALL: [Tier; 3] = [Tier::Free, Tier::Pro, Tier::Ultra];

    /// Get the numeric rank for comparison
    fn rank(&self) -> u8 {
        match self {
            Tier::Free => 0,
            Tier::Pro => 1,
            Tier::Ultra => 2,
        }
    }

    /// Wire name, as stored in user attributes and content documents
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
            Tier::Ultra => "ultra",
        }
    }

    /// Get human-readable tier name
    pub fn display_name(&self) -> &'static str {
        match self {
            Tier::Free => "Free",
            Tier::Pro => "Pro",
            Tier::Ultra => "Ultra",
        }
    }

    /// Next tier up, if any
    pub fn next(&self) -> Option<Tier> {
        match self {
            Tier::Free => Some(Tier::Pro),
            Tier::Pro => Some(Tier::Ultra),
            Tier::Ultra => None,
        }
    }
}

impl PartialOrd for Tier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of `free`, `pro`, `ultra`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid tier '{0}'. Must be 'free', 'pro', or 'ultra'")]
pub struct UnknownTier(pub String);

impl FromStr for Tier {
    type Err = UnknownTier;

    /// Exact match on the lowercase wire names; attribute values are not
    /// case-folded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Tier::Free),
            "pro" => Ok(Tier::Pro),
            "ultra" => Ok(Tier::Ultra),
            other => Err(UnknownTier(other.to_string())),
        }
    }
}

/// Tier a content resource demands.
///
/// Values outside the three known tiers are kept as `Unrecognized` so the
/// policy can refuse them instead of failing to load the document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RequiredTier {
    Free,
    Pro,
    Ultra,
    Unrecognized(String),
}

impl RequiredTier {
    /// Parse a raw document attribute. Absent and empty values mean
    /// "no restriction" and yield `None`.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        match raw {
            None | Some("") => None,
            Some(s) => Some(Self::from(s.to_string())),
        }
    }

    /// The known tier this requirement corresponds to
    pub fn tier(&self) -> Option<Tier> {
        match self {
            RequiredTier::Free => Some(Tier::Free),
            RequiredTier::Pro => Some(Tier::Pro),
            RequiredTier::Ultra => Some(Tier::Ultra),
            RequiredTier::Unrecognized(_) => None,
        }
    }

    /// Whether this requirement places no restriction on access
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, RequiredTier::Free)
    }
}

impl From<Tier> for RequiredTier {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::Free => RequiredTier::Free,
            Tier::Pro => RequiredTier::Pro,
            Tier::Ultra => RequiredTier::Ultra,
        }
    }
}

impl From<String> for RequiredTier {
    fn from(raw: String) -> Self {
        match raw.parse::<Tier>() {
            Ok(tier) => tier.into(),
            Err(_) if raw.is_empty() => RequiredTier::Free,
            Err(_) => RequiredTier::Unrecognized(raw),
        }
    }
}

impl From<RequiredTier> for String {
    fn from(required: RequiredTier) -> Self {
        match required {
            RequiredTier::Unrecognized(raw) => raw,
            known => known.tier().map(|t| t.as_str()).unwrap_or_default().to_string(),
        }
    }
}

impl fmt::Display for RequiredTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequiredTier::Unrecognized(raw) => f.write_str(raw),
            known => f.write_str(known.tier().map(|t| t.as_str()).unwrap_or_default()),
        }
    }
}

/// Plan keys the billing provider asserts subscription claims for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKey {
    FreeUser,
    Pro,
    Ultra,
}

impl PlanKey {
    /// Claims in the order resolution queries them (highest first)
    pub const DESCENDING: [PlanKey; 3] = [PlanKey::Ultra, PlanKey::Pro, PlanKey::FreeUser];

    /// Provider-side plan key
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanKey::FreeUser => "free_user",
            PlanKey::Pro => "pro",
            PlanKey::Ultra => "ultra",
        }
    }

    /// Tier a claim on this plan grants
    pub fn tier(&self) -> Tier {
        match self {
            PlanKey::FreeUser => Tier::Free,
            PlanKey::Pro => Tier::Pro,
            PlanKey::Ultra => Tier::Ultra,
        }
    }
}

impl fmt::Display for PlanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check whether a resolved tier satisfies a resource's required tier.
///
/// This is the single place the tier ordering is enforced. Absent or `free`
/// requirements always pass; unrecognized requirements never do.
pub fn has_access(resolved: Tier, required: Option<&RequiredTier>) -> bool {
    match required {
        None | Some(RequiredTier::Free) => true,
        Some(RequiredTier::Pro) => resolved >= Tier::Pro,
        Some(RequiredTier::Ultra) => resolved == Tier::Ultra,
        Some(RequiredTier::Unrecognized(_)) => false,
    }
}
