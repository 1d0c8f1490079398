//! ============================================================================
//! Session Helpers - Post-sign-in landing and access diagnostics
//! ============================================================================
//! Where a principal lands after sign-in, and a report explaining why they
//! are or are not an administrator.
//! ============================================================================

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::access::AdminAllowlist;
use crate::gateway::{fetch_principal, GatewayError, IdentityGateway};

/// Landing path for anonymous visitors
pub const HOME_PATH: &str = "/";
/// Landing path for administrators
pub const ADMIN_HOME_PATH: &str = "/admin";
/// Landing path for everyone else, and for any lookup failure
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Where to send a principal right after sign-in
pub async fn landing_path<G>(gateway: &G, allowlist: &AdminAllowlist) -> &'static str
where
    G: IdentityGateway + ?Sized,
{
    match fetch_principal(gateway).await {
        Ok(None) => HOME_PATH,
        Ok(Some(principal)) if allowlist.is_admin_principal(&principal) => {
            debug!("Landing admin {:?} on {}", principal.id, ADMIN_HOME_PATH);
            ADMIN_HOME_PATH
        }
        Ok(Some(_)) => DASHBOARD_PATH,
        Err(e) => {
            warn!("Landing lookup failed, using dashboard: {}", e);
            DASHBOARD_PATH
        }
    }
}

/// Explains the current principal's admin status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugReport {
    pub authenticated: bool,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub email_lowercase: Option<String>,
    pub admin: bool,
    pub message: String,
    pub admin_emails: Vec<String>,
}

impl DebugReport {
    pub async fn collect<G>(gateway: &G, allowlist: &AdminAllowlist) -> Result<Self, GatewayError>
    where
        G: IdentityGateway + ?Sized,
    {
        let admin_emails: Vec<String> = allowlist.emails().map(str::to_string).collect();

        let Some(principal) = fetch_principal(gateway).await? else {
            return Ok(Self {
                authenticated: false,
                user_id: None,
                email: None,
                email_lowercase: None,
                admin: false,
                message: "Not signed in".into(),
                admin_emails,
            });
        };

        let admin = allowlist.is_admin_principal(&principal);
        let message = if admin {
            "You have admin access".to_string()
        } else {
            format!(
                "Email \"{}\" is not in the admin list. Add it to ADMIN_EMAILS",
                principal.email.as_deref().unwrap_or_default()
            )
        };

        Ok(Self {
            authenticated: true,
            user_id: principal.id.clone(),
            email_lowercase: principal.normalized_email(),
            email: principal.email,
            admin,
            message,
            admin_emails,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{FailureModes, StaticGateway};

    fn admins() -> AdminAllowlist {
        AdminAllowlist::parse("a@x.com")
    }

    #[tokio::test]
    async fn test_landing_paths() {
        assert_eq!(landing_path(&StaticGateway::anonymous(), &admins()).await, "/");
        assert_eq!(
            landing_path(&StaticGateway::signed_in("u", "A@x.com"), &admins()).await,
            "/admin"
        );
        assert_eq!(
            landing_path(&StaticGateway::signed_in("u", "b@x.com"), &admins()).await,
            "/dashboard"
        );

        let broken = StaticGateway::signed_in("u", "a@x.com").failing(FailureModes {
            principal: true,
            ..FailureModes::default()
        });
        assert_eq!(landing_path(&broken, &admins()).await, "/dashboard");
    }

    #[tokio::test]
    async fn test_report_for_admin() {
        let report = DebugReport::collect(&StaticGateway::signed_in("u", "A@X.com"), &admins())
            .await
            .unwrap();
        assert!(report.authenticated);
        assert!(report.admin);
        assert_eq!(report.email.as_deref(), Some("A@X.com"));
        assert_eq!(report.email_lowercase.as_deref(), Some("a@x.com"));
        assert_eq!(report.admin_emails, vec!["a@x.com".to_string()]);
    }

    #[tokio::test]
    async fn test_report_for_non_admin() {
        let report = DebugReport::collect(&StaticGateway::signed_in("u", "b@x.com"), &admins())
            .await
            .unwrap();
        assert!(!report.admin);
        assert!(report.message.contains("b@x.com"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["emailLowercase"], "b@x.com");
        assert_eq!(json["userId"], "u");
    }

    #[tokio::test]
    async fn test_report_anonymous_and_failure() {
        let report = DebugReport::collect(&StaticGateway::anonymous(), &admins())
            .await
            .unwrap();
        assert!(!report.authenticated);
        assert_eq!(report.message, "Not signed in");

        let broken = StaticGateway::anonymous().failing(FailureModes {
            principal: true,
            ..FailureModes::default()
        });
        assert!(DebugReport::collect(&broken, &admins()).await.is_err());
    }
}
