//! # Command Line Interface
//!
//! Operator commands against one Vault connection: health checks, issuing and
//! revoking wrapped tokens, and resolving secret references.

pub mod output;

use crate::auth::build_authentication;
use crate::config::{AppConfig, ObservabilityConfig};
use crate::handoff::{LeasedWrappedTokenInfo, TokenHandoff};
use crate::observability::{init_logging, log_config_info};
use crate::parameters::{ParameterResolver, PasswordReplacer};
use crate::resolver::QueryResolver;
use crate::secrets::SecretString;
use crate::session::{RefreshTrigger, SessionManager};
use crate::vault::VaultHttpClient;
use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "buildvault")]
#[command(about = "Build-time secret resolution against HashiCorp Vault")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, global = true, env = "BUILDVAULT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check that the Vault server is reachable and unsealed
    Health,

    /// Log in with response wrapping and print the wrapped token envelope
    Wrap,

    /// Resolve %vault:...% references in build parameters
    Resolve {
        /// Parameter as KEY=VALUE; may be repeated
        #[arg(long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,
    },

    /// Resolve raw references such as /secret/data/app!/password
    Query {
        #[arg(required = true)]
        references: Vec<String>,
    },

    /// Revoke a token by its accessor
    Revoke {
        #[arg(long)]
        accessor: String,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    initialise_logging(&config.observability, cli.verbose);
    log_config_info(&config);

    match cli.command {
        Commands::Health => handle_health(&config).await,
        Commands::Wrap => handle_wrap(&config).await,
        Commands::Resolve { params } => handle_resolve(&config, params.into_iter().collect()).await,
        Commands::Query { references } => handle_query(&config, &references).await,
        Commands::Revoke { accessor } => handle_revoke(&config, accessor).await,
    }
}

fn initialise_logging(config: &ObservabilityConfig, verbose: bool) {
    let mut config = config.clone();
    if verbose {
        config.log_level = "debug".to_string();
    }
    // Already installed when running under a test harness
    let _ = init_logging(&config);
}

fn client(config: &AppConfig) -> anyhow::Result<VaultHttpClient> {
    Ok(VaultHttpClient::from_settings(&config.vault, config.retry.to_policy())?)
}

fn session(config: &AppConfig) -> anyhow::Result<SessionManager> {
    Ok(SessionManager::builder(client(config)?, build_authentication(&config.vault.auth))
        .refresh_trigger(RefreshTrigger::new(config.session.refresh_lead_time()))
        .build())
}

async fn handle_health(config: &AppConfig) -> anyhow::Result<()> {
    let health = client(config)?.health().await?;
    output::print_json(&health)?;
    if !health.is_ready() {
        anyhow::bail!("Vault at {} is not ready (status {})", config.vault.url, health.status_code);
    }
    Ok(())
}

async fn handle_wrap(config: &AppConfig) -> anyhow::Result<()> {
    let handoff = TokenHandoff::new(config.retry.to_policy(), config.session.wrap_ttl.clone());
    let envelope = handoff.request_wrapped_token(&config.vault).await?;
    output::print_json(&envelope.to_json())
}

async fn handle_resolve(config: &AppConfig, parameters: BTreeMap<String, String>) -> anyhow::Result<()> {
    let session = session(config)?;
    let resolver =
        ParameterResolver::new(config.vault.clone(), config.resolver.clone(), Arc::new(PasswordReplacer::new()));

    let outcome = resolver.resolve(&session, &parameters).await;
    session.destroy().await;
    let outcome = outcome?;

    for (reference, error) in &outcome.errors {
        tracing::warn!(reference = %reference, error = %error, "Unresolved reference");
    }
    let env: Vec<&String> = outcome.env.keys().collect();
    output::print_json(&json!({ "parameters": &outcome.parameters, "env": env }))?;

    outcome.into_result(config.vault.fail_on_error)?;
    Ok(())
}

async fn handle_query(config: &AppConfig, references: &[String]) -> anyhow::Result<()> {
    let session = session(config)?;
    let token = match session.get_session_token().await {
        Ok(token) => token,
        Err(error) => {
            session.destroy().await;
            return Err(error.into());
        }
    };

    let resolver = QueryResolver::new(session.client().clone(), config.resolver.clone());
    let result = resolver.resolve_references(references, &token).await;
    session.destroy().await;

    let mut values = Map::new();
    for (reference, value) in &result.replacements {
        values.insert(reference.clone(), Value::String(value.expose_secret().to_string()));
    }
    let errors: BTreeMap<&String, String> = result.errors.iter().map(|(r, e)| (r, e.to_string())).collect();
    output::print_json(&json!({ "values": values, "errors": errors }))?;

    if config.vault.fail_on_error && !result.is_complete() {
        anyhow::bail!("{} of {} references could not be resolved", result.errors.len(), references.len());
    }
    Ok(())
}

async fn handle_revoke(config: &AppConfig, accessor: String) -> anyhow::Result<()> {
    let handoff = TokenHandoff::new(config.retry.to_policy(), config.session.wrap_ttl.clone());
    let info =
        LeasedWrappedTokenInfo { wrapped_token: SecretString::default(), accessor, settings: config.vault.clone() };

    if !handoff.revoke_by_accessor(&info).await {
        anyhow::bail!("Failed to revoke token with accessor {}", info.accessor);
    }
    println!("Revoked token with accessor {}", info.accessor);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_resolve_params() {
        let cli = Cli::try_parse_from([
            "buildvault",
            "resolve",
            "--param",
            "url=db://%vault:/secret/db!/user%@host",
            "--param",
            "empty=",
        ])
        .unwrap();

        match cli.command {
            Commands::Resolve { params } => {
                assert_eq!(params[0], ("url".to_string(), "db://%vault:/secret/db!/user%@host".to_string()));
                assert_eq!(params[1], ("empty".to_string(), String::new()));
            }
            _ => panic!("expected resolve"),
        }
    }

    #[test]
    fn test_rejects_param_without_key() {
        assert!(Cli::try_parse_from(["buildvault", "resolve", "--param", "=value"]).is_err());
        assert!(Cli::try_parse_from(["buildvault", "resolve", "--param", "novalue"]).is_err());
    }

    #[test]
    fn test_query_requires_reference() {
        assert!(Cli::try_parse_from(["buildvault", "query"]).is_err());
        let cli = Cli::try_parse_from(["buildvault", "--verbose", "query", "/secret/app!/key"]).unwrap();
        assert!(cli.verbose);
    }
}
