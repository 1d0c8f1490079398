//! ============================================================================
//! Admin Resolver - Operator allowlist checks
//! ============================================================================
//! Decides whether a principal is an administrator by matching its email
//! against an allowlist built once at startup. Every lookup fails closed.
//! ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::gateway::{fetch_principal, GatewayError, IdentityGateway, Principal};

/// Environment variable holding the comma-separated admin emails
pub const ADMIN_EMAILS_ENV: &str = "ADMIN_EMAILS";

/// Built-in administrator used when `ADMIN_EMAILS` is unset
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@example.com";

/// Immutable set of lowercase administrator emails
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminAllowlist {
    emails: BTreeSet<String>,
}

impl AdminAllowlist {
    /// Build from raw entries; entries are trimmed, lowercased and empty ones
    /// dropped
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let emails = emails
            .into_iter()
            .map(|e| e.as_ref().trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self { emails }
    }

    /// No administrators configured
    pub fn empty() -> Self {
        Self {
            emails: BTreeSet::new(),
        }
    }

    /// Parse a comma-separated value
    pub fn parse(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    /// Read `ADMIN_EMAILS`, falling back to the built-in default when it is
    /// unset or empty
    pub fn from_env() -> Self {
        Self::from_value(std::env::var(ADMIN_EMAILS_ENV).ok().as_deref())
    }

    /// Same as `from_env`, for an already-read value
    pub fn from_value(raw: Option<&str>) -> Self {
        match raw {
            Some(raw) if !raw.is_empty() => Self::parse(raw),
            _ => Self::new([DEFAULT_ADMIN_EMAIL]),
        }
    }

    /// Case-insensitive membership check
    pub fn contains(&self, email: &str) -> bool {
        self.emails.contains(&email.trim().to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn emails(&self) -> impl Iterator<Item = &str> {
        self.emails.iter().map(String::as_str)
    }

    /// Whether an already-fetched principal is an administrator.
    /// Anonymous principals and principals without an email never are.
    pub fn is_admin_principal(&self, principal: &Principal) -> bool {
        if principal.is_anonymous() {
            return false;
        }
        principal
            .email
            .as_deref()
            .is_some_and(|email| self.contains(email))
    }
}

impl Default for AdminAllowlist {
    fn default() -> Self {
        Self::from_value(None)
    }
}

/// Resolves admin status for the current request's principal
#[derive(Debug, Clone)]
pub struct AdminResolver {
    allowlist: Arc<AdminAllowlist>,
}

impl AdminResolver {
    pub fn new(allowlist: Arc<AdminAllowlist>) -> Self {
        Self { allowlist }
    }

    pub fn allowlist(&self) -> &AdminAllowlist {
        &self.allowlist
    }

    /// Fallible lookup, surfacing gateway errors to callers that must react
    /// to them (the route gate)
    pub async fn check<G>(&self, gateway: &G) -> Result<bool, GatewayError>
    where
        G: IdentityGateway + ?Sized,
    {
        let principal = match fetch_principal(gateway).await? {
            Some(principal) => principal,
            None => return Ok(false),
        };
        let admin = self.allowlist.is_admin_principal(&principal);
        debug!("Admin check for {:?}: {}", principal.id, admin);
        Ok(admin)
    }

    /// Fail-closed admin check. Any gateway error yields `false`.
    pub async fn is_admin<G>(&self, gateway: &G) -> bool
    where
        G: IdentityGateway + ?Sized,
    {
        match self.check(gateway).await {
            Ok(admin) => admin,
            Err(e) => {
                warn!("Admin check failed, treating as non-admin: {}", e);
                false
            }
        }
    }

    /// `None` when nobody is signed in, otherwise the fail-closed admin status
    pub async fn admin_status<G>(&self, gateway: &G) -> Option<bool>
    where
        G: IdentityGateway + ?Sized,
    {
        match fetch_principal(gateway).await {
            Ok(None) => None,
            Ok(Some(principal)) => Some(self.allowlist.is_admin_principal(&principal)),
            Err(e) => {
                warn!("Admin status lookup failed: {}", e);
                Some(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{FailureModes, StaticGateway};

    fn resolver(emails: &[&str]) -> AdminResolver {
        AdminResolver::new(Arc::new(AdminAllowlist::new(emails.iter().copied())))
    }

    #[test]
    fn test_allowlist_normalization() {
        let list = AdminAllowlist::parse(" A@X.com, b@y.org ,,");
        assert_eq!(list.len(), 2);
        assert!(list.contains("a@x.com"));
        assert!(list.contains("B@Y.ORG"));
        assert!(!list.contains("c@z.net"));
    }

    #[test]
    fn test_default_when_unset_or_empty() {
        assert!(AdminAllowlist::from_value(None).contains(DEFAULT_ADMIN_EMAIL));
        assert!(AdminAllowlist::from_value(Some("")).contains(DEFAULT_ADMIN_EMAIL));
        assert!(!AdminAllowlist::from_value(Some("ops@x.com")).contains(DEFAULT_ADMIN_EMAIL));
    }

    #[test]
    fn test_empty_allowlist_has_no_admins() {
        let list = AdminAllowlist::empty();
        assert!(list.is_empty());
        assert!(!list.is_admin_principal(&Principal::authenticated("u", Some("a@x.com"))));
    }

    #[test]
    fn test_anonymous_never_admin() {
        let list = AdminAllowlist::parse("a@x.com");
        let anon = Principal {
            email: Some("a@x.com".into()),
            ..Principal::anonymous()
        };
        assert!(!list.is_admin_principal(&anon));
        assert!(!list.is_admin_principal(&Principal::authenticated("u", None)));
    }

    #[tokio::test]
    async fn test_case_insensitive_admin() {
        let gateway = StaticGateway::signed_in("user_1", "A@X.COM");
        assert!(resolver(&["a@x.com"]).is_admin(&gateway).await);
    }

    #[tokio::test]
    async fn test_non_admin() {
        let gateway = StaticGateway::signed_in("user_1", "someone@x.com");
        assert!(!resolver(&["a@x.com"]).is_admin(&gateway).await);
    }

    #[tokio::test]
    async fn test_fails_closed_on_gateway_error() {
        let gateway = StaticGateway::signed_in("user_1", "a@x.com").failing(FailureModes {
            principal: true,
            ..FailureModes::default()
        });
        let resolver = resolver(&["a@x.com"]);

        assert!(resolver.check(&gateway).await.is_err());
        assert!(!resolver.is_admin(&gateway).await);
        assert_eq!(resolver.admin_status(&gateway).await, Some(false));
    }

    #[tokio::test]
    async fn test_admin_status() {
        let resolver = resolver(&["a@x.com"]);
        assert_eq!(resolver.admin_status(&StaticGateway::anonymous()).await, None);
        assert_eq!(
            resolver
                .admin_status(&StaticGateway::signed_in("u", "a@x.com"))
                .await,
            Some(true)
        );
        assert_eq!(
            resolver
                .admin_status(&StaticGateway::signed_in("u", "b@x.com"))
                .await,
            Some(false)
        );
    }
}
