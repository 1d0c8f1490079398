//! ============================================================================
//! Gateway - Identity and billing provider interfaces
//! ============================================================================
//! The core never verifies sessions or processes payments. It consumes:
//! - `IdentityGateway`: the current principal plus subscription claims
//! - `OverrideStore`: writes the per-user tier override attribute
//!
//! `StaticGateway` is an in-memory implementation loaded from JSON, used by
//! the CLI and tests.
//! ============================================================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::access::{PlanKey, Tier};

/// User attribute that carries the tier override
pub const TIER_ATTRIBUTE: &str = "tier";

/// User attribute that marks an override as set through an admin upgrade
pub const ADMIN_UPGRADE_ATTRIBUTE: &str = "adminUpgrade";

/// Failures reported by the identity or billing provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum GatewayError {
    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),

    #[error("Provider rejected the request: {0}")]
    Rejected(String),

    #[error("Malformed provider payload: {0}")]
    Malformed(String),
}

/// Raw principal as supplied by the identity provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrincipalRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Arbitrary per-user attributes (public metadata)
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

/// Principal after boundary validation.
///
/// The override attribute has been coerced into `Tier`; anything the provider
/// stored that is not a known tier is dropped here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Option<String>,
    pub email: Option<String>,
    pub tier_override: Option<Tier>,
}

impl Principal {
    /// The anonymous visitor
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Authenticated principal without an override
    pub fn authenticated(id: impl Into<String>, email: Option<&str>) -> Self {
        Self {
            id: Some(id.into()),
            email: email.map(str::to_string),
            tier_override: None,
        }
    }

    pub fn with_override(mut self, tier: Tier) -> Self {
        self.tier_override = Some(tier);
        self
    }

    /// Validate a provider record, coercing the override attribute
    pub fn from_record(record: PrincipalRecord) -> Self {
        let tier_override = match record.attributes.get(TIER_ATTRIBUTE) {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(raw)) if raw.is_empty() => None,
            Some(serde_json::Value::String(raw)) => match raw.parse::<Tier>() {
                Ok(tier) => Some(tier),
                Err(e) => {
                    warn!("Ignoring tier override for {:?}: {}", record.id, e);
                    None
                }
            },
            Some(other) => {
                warn!(
                    "Ignoring non-string tier override for {:?}: {}",
                    record.id, other
                );
                None
            }
        };

        Self {
            id: record.id.filter(|id| !id.is_empty()),
            email: record.email.filter(|email| !email.is_empty()),
            tier_override,
        }
    }

    /// Whether this principal is an anonymous visitor
    pub fn is_anonymous(&self) -> bool {
        self.id.is_none()
    }

    /// Lowercased email, if any
    pub fn normalized_email(&self) -> Option<String> {
        self.email.as_deref().map(|e| e.trim().to_lowercase())
    }
}

/// Identity and billing provider, as the core sees it
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// Current principal, or `None` for an anonymous request
    async fn current_principal(&self) -> Result<Option<PrincipalRecord>, GatewayError>;

    /// Does `principal` hold a subscription claim on `plan`
    async fn has_claim(&self, principal: &Principal, plan: PlanKey) -> Result<bool, GatewayError>;
}

/// Writes the tier override attribute on a user
#[async_trait]
pub trait OverrideStore: Send + Sync {
    async fn set_tier_override(
        &self,
        user_id: &str,
        tier: Tier,
        admin_upgrade: bool,
    ) -> Result<(), GatewayError>;
}

/// Fetch and validate the current principal in one step
pub async fn fetch_principal<G>(gateway: &G) -> Result<Option<Principal>, GatewayError>
where
    G: IdentityGateway + ?Sized,
{
    let record = gateway.current_principal().await?;
    Ok(record
        .map(Principal::from_record)
        .filter(|principal| !principal.is_anonymous()))
}

// ============================================================================
// StaticGateway
// ============================================================================

/// Failure injection switches for `StaticGateway`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureModes {
    /// `current_principal` returns an error
    #[serde(default)]
    pub principal: bool,
    /// `has_claim` returns an error
    #[serde(default)]
    pub claims: bool,
    /// `set_tier_override` returns an error
    #[serde(default)]
    pub store: bool,
}

/// JSON form of a `StaticGateway`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayFixture {
    #[serde(default)]
    pub principal: Option<PrincipalRecord>,
    #[serde(default)]
    pub claims: BTreeSet<PlanKey>,
    #[serde(default)]
    pub fail: FailureModes,
}

/// In-memory identity provider holding one principal
#[derive(Debug, Default)]
pub struct StaticGateway {
    state: RwLock<GatewayFixture>,
}

impl StaticGateway {
    pub fn new(fixture: GatewayFixture) -> Self {
        Self {
            state: RwLock::new(fixture),
        }
    }

    /// Gateway with no signed-in principal
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Gateway with an authenticated principal
    pub fn signed_in(id: &str, email: &str) -> Self {
        Self::new(GatewayFixture {
            principal: Some(PrincipalRecord {
                id: Some(id.to_string()),
                email: Some(email.to_string()),
                attributes: serde_json::Map::new(),
            }),
            ..GatewayFixture::default()
        })
    }

    /// Load a fixture from a JSON file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let fixture: GatewayFixture = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("Invalid gateway fixture {}: {}", path.display(), e))?;
        Ok(Self::new(fixture))
    }

    pub fn with_claims(mut self, claims: &[PlanKey]) -> Self {
        self.state.get_mut().claims.extend(claims);
        self
    }

    pub fn with_attribute(mut self, key: &str, value: serde_json::Value) -> Self {
        if let Some(record) = self.state.get_mut().principal.as_mut() {
            record.attributes.insert(key.to_string(), value);
        }
        self
    }

    pub fn failing(mut self, fail: FailureModes) -> Self {
        self.state.get_mut().fail = fail;
        self
    }

    /// Current attribute value on the principal
    pub async fn attribute(&self, key: &str) -> Option<serde_json::Value> {
        let state = self.state.read().await;
        state
            .principal
            .as_ref()
            .and_then(|record| record.attributes.get(key).cloned())
    }

    /// Snapshot of the fixture
    pub async fn fixture(&self) -> GatewayFixture {
        self.state.read().await.clone()
    }
}

#[async_trait]
impl IdentityGateway for StaticGateway {
    async fn current_principal(&self) -> Result<Option<PrincipalRecord>, GatewayError> {
        let state = self.state.read().await;
        if state.fail.principal {
            return Err(GatewayError::Unavailable("principal lookup disabled".into()));
        }
        Ok(state.principal.clone())
    }

    async fn has_claim(&self, principal: &Principal, plan: PlanKey) -> Result<bool, GatewayError> {
        let state = self.state.read().await;
        if state.fail.claims {
            return Err(GatewayError::Unavailable("claim lookup disabled".into()));
        }
        let same_user = state
            .principal
            .as_ref()
            .and_then(|record| record.id.as_ref())
            .is_some_and(|id| Some(id) == principal.id.as_ref());
        Ok(same_user && state.claims.contains(&plan))
    }
}

#[async_trait]
impl OverrideStore for StaticGateway {
    async fn set_tier_override(
        &self,
        user_id: &str,
        tier: Tier,
        admin_upgrade: bool,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.write().await;
        if state.fail.store {
            return Err(GatewayError::Unavailable("metadata store disabled".into()));
        }
        let record = state
            .principal
            .as_mut()
            .filter(|record| record.id.as_deref() == Some(user_id))
            .ok_or_else(|| GatewayError::Rejected(format!("unknown user {}", user_id)))?;

        record
            .attributes
            .insert(TIER_ATTRIBUTE.to_string(), serde_json::json!(tier.as_str()));
        record
            .attributes
            .insert(ADMIN_UPGRADE_ATTRIBUTE.to_string(), serde_json::json!(admin_upgrade));

        debug!("Stored tier override {} for {}", tier, user_id);
        Ok(())
    }
}
