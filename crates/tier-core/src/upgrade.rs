//! ============================================================================
//! Admin Upgrade - Tier override without payment
//! ============================================================================
//! Lets a signed-in administrator set their own tier override for testing.
//! The override is written with an `adminUpgrade` marker so it can be told
//! apart from overrides set by other tooling.
//! ============================================================================

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::access::{AdminAllowlist, Tier};
use crate::gateway::{fetch_principal, GatewayError, IdentityGateway, OverrideStore};

/// Upgrade failures, each with an HTTP-style status
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpgradeError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Admin access required")]
    AdminRequired,

    #[error("Invalid tier. Must be 'free', 'pro', or 'ultra'")]
    InvalidTier(String),

    #[error("Failed to upgrade tier: {0}")]
    Store(#[from] GatewayError),
}

impl UpgradeError {
    pub fn status_code(&self) -> u16 {
        match self {
            UpgradeError::Unauthorized => 401,
            UpgradeError::AdminRequired => 403,
            UpgradeError::InvalidTier(_) => 400,
            UpgradeError::Store(_) => 500,
        }
    }
}

/// Upgrade request body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpgradeRequest {
    #[serde(default)]
    pub tier: Option<String>,
}

/// Successful upgrade response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeReceipt {
    pub success: bool,
    pub tier: Tier,
    pub message: String,
}

/// Set the signed-in administrator's tier override.
///
/// Checks run in order: signed in, administrator, valid tier, then the write.
pub async fn upgrade_tier<G>(
    gateway: &G,
    allowlist: &AdminAllowlist,
    request: &UpgradeRequest,
) -> Result<UpgradeReceipt, UpgradeError>
where
    G: IdentityGateway + OverrideStore + ?Sized,
{
    let principal = fetch_principal(gateway).await?.ok_or(UpgradeError::Unauthorized)?;
    let user_id = principal.id.as_deref().ok_or(UpgradeError::Unauthorized)?;

    if !allowlist.is_admin_principal(&principal) {
        warn!("Tier upgrade refused for non-admin {}", user_id);
        return Err(UpgradeError::AdminRequired);
    }

    let raw = request.tier.as_deref().unwrap_or_default();
    let tier: Tier = raw
        .parse()
        .map_err(|_| UpgradeError::InvalidTier(raw.to_string()))?;

    if let Err(e) = gateway.set_tier_override(user_id, tier, true).await {
        error!("Error upgrading tier for {}: {}", user_id, e);
        return Err(e.into());
    }

    info!("Admin {} set tier override to {}", user_id, tier);
    Ok(UpgradeReceipt {
        success: true,
        tier,
        message: format!("Successfully upgraded to {} tier", tier),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{FailureModes, StaticGateway, ADMIN_UPGRADE_ATTRIBUTE, TIER_ATTRIBUTE};

    fn request(tier: &str) -> UpgradeRequest {
        UpgradeRequest {
            tier: Some(tier.to_string()),
        }
    }

    fn admins() -> AdminAllowlist {
        AdminAllowlist::parse("a@x.com")
    }

    #[tokio::test]
    async fn test_admin_upgrade_writes_override() {
        let gateway = StaticGateway::signed_in("user_1", "a@x.com");
        let receipt = upgrade_tier(&gateway, &admins(), &request("pro")).await.unwrap();

        assert!(receipt.success);
        assert_eq!(receipt.tier, Tier::Pro);
        assert_eq!(receipt.message, "Successfully upgraded to pro tier");
        assert_eq!(gateway.attribute(TIER_ATTRIBUTE).await, Some(serde_json::json!("pro")));
        assert_eq!(
            gateway.attribute(ADMIN_UPGRADE_ATTRIBUTE).await,
            Some(serde_json::json!(true))
        );
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let err = upgrade_tier(&StaticGateway::anonymous(), &admins(), &request("pro"))
            .await
            .unwrap_err();
        assert_eq!(err, UpgradeError::Unauthorized);
        assert_eq!(err.status_code(), 401);
    }

    #[tokio::test]
    async fn test_non_admin_forbidden() {
        let gateway = StaticGateway::signed_in("user_1", "b@x.com");
        let err = upgrade_tier(&gateway, &admins(), &request("ultra")).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert_eq!(gateway.attribute(TIER_ATTRIBUTE).await, None);
    }

    #[tokio::test]
    async fn test_invalid_tier() {
        let gateway = StaticGateway::signed_in("user_1", "a@x.com");
        for bad in [request("gold"), request("PRO"), UpgradeRequest::default()] {
            let err = upgrade_tier(&gateway, &admins(), &bad).await.unwrap_err();
            assert_eq!(err.status_code(), 400);
        }
    }

    #[tokio::test]
    async fn test_store_failure() {
        let gateway = StaticGateway::signed_in("user_1", "a@x.com").failing(FailureModes {
            store: true,
            ..FailureModes::default()
        });
        let err = upgrade_tier(&gateway, &admins(), &request("ultra")).await.unwrap_err();
        assert!(matches!(err, UpgradeError::Store(_)));
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn test_identity_failure_is_server_error() {
        let gateway = StaticGateway::signed_in("user_1", "a@x.com").failing(FailureModes {
            principal: true,
            ..FailureModes::default()
        });
        let err = upgrade_tier(&gateway, &admins(), &request("ultra")).await.unwrap_err();
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_request_json() {
        let req: UpgradeRequest = serde_json::from_str(r#"{ "tier": "ultra" }"#).unwrap();
        assert_eq!(req.tier.as_deref(), Some("ultra"));
        let req: UpgradeRequest = serde_json::from_str("{}").unwrap();
        assert!(req.tier.is_none());
    }
}
