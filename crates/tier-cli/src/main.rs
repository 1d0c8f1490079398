// ============================================================================
// tiergate — evaluate access decisions from the command line
// ============================================================================
// Usage:
//   tiergate classify PATH                             Show the route class
//   tiergate route PATH --principal FILE               Evaluate the route gate
//   tiergate tier --principal FILE                     Show the resolved tier
//   tiergate check --principal FILE --required TIER    Allow/deny for a tier
//   tiergate whoami --principal FILE                   Admin diagnostics (JSON)
//   tiergate lesson --principal FILE --lesson FILE     Lesson lock state
//   tiergate upgrade --principal FILE --tier TIER      Admin self-upgrade
//
// FILE is a principal fixture:
//   { "principal": { "id": "...", "email": "...", "attributes": {} },
//     "claims": ["pro"], "fail": { "principal": false, "claims": false } }
// ============================================================================

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tier_core::{
    upgrade_tier, AccessConfig, AccessGate, DebugReport, GateOutcome, Lesson, RequiredTier,
    StaticGateway, UpgradeRequest,
};
use tracing::debug;

/// Tier resolution and route gating tool
#[derive(Parser)]
#[command(name = "tiergate", version, about = "Evaluate tier access and route gating decisions")]
struct Cli {
    /// Access config file (JSON); ADMIN_EMAILS applies when it lists no admins
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how a path is classified
    Classify {
        path: String,
    },

    /// Evaluate the route gate for a path
    Route {
        path: String,
        /// Principal fixture file
        #[arg(long)]
        principal: PathBuf,
    },

    /// Show the resolved tier
    Tier {
        #[arg(long)]
        principal: PathBuf,
    },

    /// Check access against a required tier
    Check {
        #[arg(long)]
        principal: PathBuf,
        /// Required tier: free, pro, ultra (anything else is denied)
        #[arg(long)]
        required: Option<String>,
    },

    /// Print admin diagnostics as JSON
    Whoami {
        #[arg(long)]
        principal: PathBuf,
    },

    /// Show whether a lesson document is unlocked
    Lesson {
        #[arg(long)]
        principal: PathBuf,
        /// Lesson document file (JSON)
        #[arg(long)]
        lesson: PathBuf,
    },

    /// Set the signed-in admin's tier override without payment
    Upgrade {
        #[arg(long)]
        principal: PathBuf,
        /// Target tier: free, pro, ultra
        #[arg(long)]
        tier: String,
        /// Write the updated fixture back to the principal file
        #[arg(long)]
        save: bool,
    },
}

fn init_logging() {
    // Load environment variables from .env file
    let dotenv = dotenvy::dotenv();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in ["tier_core=info", "tiergate=info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = dotenv {
        debug!("No .env file loaded: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = AccessConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Classify { path } => cmd_classify(&config, &path),
        Commands::Route { path, principal } => cmd_route(&config, &path, &principal).await,
        Commands::Tier { principal } => cmd_tier(&config, &principal).await,
        Commands::Check {
            principal,
            required,
        } => cmd_check(&config, &principal, required.as_deref()).await,
        Commands::Whoami { principal } => cmd_whoami(&config, &principal).await,
        Commands::Lesson { principal, lesson } => cmd_lesson(&config, &principal, &lesson).await,
        Commands::Upgrade {
            principal,
            tier,
            save,
        } => cmd_upgrade(&config, &principal, tier, save).await,
    }
}

fn load_gate(config: &AccessConfig, principal: &Path) -> Result<AccessGate<StaticGateway>> {
    let gateway = StaticGateway::from_file(principal)?;
    Ok(AccessGate::new(gateway, Arc::new(config.allowlist())))
}

fn cmd_classify(config: &AccessConfig, path: &str) -> Result<()> {
    let runtime = config.build()?;
    if !runtime.routes.applies_to(path) {
        println!("{}: skipped (static asset)", path);
        return Ok(());
    }
    println!("{}: {:?}", path, runtime.routes.classify(path));
    Ok(())
}

async fn cmd_route(config: &AccessConfig, path: &str, principal: &Path) -> Result<()> {
    let runtime = config.build()?;
    let gateway = StaticGateway::from_file(principal)?;
    let decision = runtime.routes.evaluate(path, &gateway).await;

    let outcome = match &decision.outcome {
        GateOutcome::Allow => "allow".to_string(),
        GateOutcome::RedirectToAuth => "redirect to sign-in".to_string(),
        GateOutcome::RedirectToFallback(location) => format!("redirect to {}", location),
    };
    println!("{:<10} {:?}", "CLASS", decision.class);
    println!("{:<10} {}", "OUTCOME", outcome);
    println!("{:<10} {}", "REASON", decision.reason);
    if let Some(state) = decision.state {
        println!("{:<10} {:?}", "STATE", state);
    }
    Ok(())
}

async fn cmd_tier(config: &AccessConfig, principal: &Path) -> Result<()> {
    let gate = load_gate(config, principal)?;
    let tier = gate.user_tier().await;
    println!("{} ({})", tier, tier.display_name());
    Ok(())
}

async fn cmd_check(config: &AccessConfig, principal: &Path, required: Option<&str>) -> Result<()> {
    let gate = load_gate(config, principal)?;
    let required = RequiredTier::parse(required);
    let tier = gate.user_tier().await;
    let allowed = gate.has_access_to_tier(required.as_ref()).await;

    let required_name = required
        .as_ref()
        .map(|r| r.to_string())
        .unwrap_or_else(|| "unrestricted".into());
    println!(
        "{}: holds {}, requires {}",
        if allowed { "ALLOW" } else { "DENY" },
        tier,
        required_name
    );
    Ok(())
}

async fn cmd_whoami(config: &AccessConfig, principal: &Path) -> Result<()> {
    let gateway = StaticGateway::from_file(principal)?;
    let report = DebugReport::collect(&gateway, &config.allowlist())
        .await
        .context("Failed to check user")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn cmd_lesson(config: &AccessConfig, principal: &Path, lesson: &Path) -> Result<()> {
    let gate = load_gate(config, principal)?;
    let raw = std::fs::read_to_string(lesson)
        .with_context(|| format!("Failed to read lesson {}", lesson.display()))?;
    let lesson: Lesson = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid lesson document {}", lesson.display()))?;

    let tier = gate.user_tier().await;
    let access = lesson.access(tier);
    println!("{}", serde_json::to_string_pretty(&access)?);
    Ok(())
}

async fn cmd_upgrade(config: &AccessConfig, principal: &Path, tier: String, save: bool) -> Result<()> {
    let gateway = StaticGateway::from_file(principal)?;
    let request = UpgradeRequest { tier: Some(tier) };

    let receipt = match upgrade_tier(&gateway, &config.allowlist(), &request).await {
        Ok(receipt) => receipt,
        Err(e) => anyhow::bail!("{} ({})", e, e.status_code()),
    };
    println!("{}", serde_json::to_string_pretty(&receipt)?);

    if save {
        let fixture = gateway.fixture().await;
        std::fs::write(principal, serde_json::to_string_pretty(&fixture)?)
            .with_context(|| format!("Failed to write {}", principal.display()))?;
        println!("Saved {}", principal.display());
    }
    Ok(())
}
