// ============================================================================
// AccessConfig — process-wide configuration
// ============================================================================
// Built once at startup and shared read-only afterwards.
// Admin emails come from the config file when it lists them, otherwise from
// ADMIN_EMAILS (comma-separated), otherwise the built-in default.
// ============================================================================

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::access::AdminAllowlist;
use crate::route_gate::{RouteGate, RoutePolicy};

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid route pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Failed to read config {path}: {message}")]
    Read { path: String, message: String },

    #[error("Invalid config {path}: {message}")]
    Parse { path: String, message: String },
}

/// On-disk configuration (JSON)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Explicit admin list; `None` defers to the environment
    pub admin_emails: Option<Vec<String>>,
    pub routes: RoutePolicy,
}

impl AccessConfig {
    /// Load from a JSON file, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        info!("Loaded access config from {}", path.display());
        Ok(config)
    }

    /// Build the allowlist this configuration describes
    pub fn allowlist(&self) -> AdminAllowlist {
        match &self.admin_emails {
            Some(emails) => AdminAllowlist::new(emails),
            None => AdminAllowlist::from_env(),
        }
    }

    /// Build everything request handling needs, sharing one allowlist
    pub fn build(&self) -> Result<AccessRuntime, ConfigError> {
        let allowlist = Arc::new(self.allowlist());
        info!("Admin allowlist loaded with {} entries", allowlist.len());
        let routes = RouteGate::new(&self.routes, allowlist.clone())?;
        Ok(AccessRuntime { allowlist, routes })
    }
}

/// Startup products of an `AccessConfig`
#[derive(Debug, Clone)]
pub struct AccessRuntime {
    pub allowlist: Arc<AdminAllowlist>,
    pub routes: RouteGate,
}
