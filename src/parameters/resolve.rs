//! Resolving every Vault reference of one namespace in a parameter map.

use crate::config::{ConnectionSettings, ResolverSettings};
use crate::errors::{Result, VaultError};
use crate::parameters::redaction::RedactionSink;
use crate::parameters::references::{collect_references, reference_path, substitute, DEPENDENCY_PREFIX};
use crate::resolver::{QueryResolver, VaultQuery};
use crate::secrets::SecretString;
use crate::session::SessionManager;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Environment variable suffix for the exposed session token
pub const ENV_VAULT_TOKEN: &str = "VAULT_TOKEN";
/// Environment variable suffix for the exposed Vault address
pub const ENV_VAULT_ADDR: &str = "VAULT_ADDR";

/// Parameters after substitution, plus whatever could not be resolved
#[derive(Debug, Default)]
pub struct ResolutionOutcome {
    pub parameters: BTreeMap<String, String>,
    /// Keyed by reference, e.g. `vault:/secret/app!/key`
    pub errors: BTreeMap<String, VaultError>,
    pub env: BTreeMap<String, SecretString>,
}

impl ResolutionOutcome {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Turn unresolved references into an error when the connection is configured to fail
    pub fn into_result(self, fail_on_error: bool) -> Result<Self> {
        if !fail_on_error || self.errors.is_empty() {
            return Ok(self);
        }

        let references: Vec<&str> = self.errors.keys().map(String::as_str).collect();
        let details: Vec<String> = self.errors.values().map(ToString::to_string).collect();
        let noun = if self.errors.len() == 1 { "Error" } else { "Errors" };
        Err(VaultError::resolution(
            references.join(", "),
            format!("{} while fetching data from HashiCorp Vault: {}", noun, details.join("; ")),
        ))
    }
}

/// Resolves the references of one connection's namespace
pub struct ParameterResolver {
    connection: ConnectionSettings,
    settings: ResolverSettings,
    sink: Arc<dyn RedactionSink>,
}

impl ParameterResolver {
    pub fn new(connection: ConnectionSettings, settings: ResolverSettings, sink: Arc<dyn RedactionSink>) -> Self {
        Self { connection, settings, sink }
    }

    pub fn namespace(&self) -> &str {
        &self.connection.id
    }

    /// Resolve and substitute every reference of this namespace.
    ///
    /// Values are registered with the redaction sink before any substitution
    /// happens. Parameters under `dep.` are copied unchanged.
    pub async fn resolve(
        &self,
        session: &SessionManager,
        parameters: &BTreeMap<String, String>,
    ) -> Result<ResolutionOutcome> {
        let namespace = self.namespace();
        let references = collect_references(parameters, namespace);

        let mut outcome = ResolutionOutcome { parameters: parameters.clone(), ..Default::default() };
        if references.is_empty() && !self.connection.expose_env {
            tracing::info!(namespace = %namespace, "There's nothing to resolve");
            return Ok(outcome);
        }

        let token = session.get_session_token().await?;
        self.sink.add_secret(token.secret());

        if self.connection.expose_env {
            let prefix = self.connection.env_prefix();
            outcome.env.insert(format!("{}{}", prefix, ENV_VAULT_TOKEN), token.secret().clone());
            outcome
                .env
                .insert(format!("{}{}", prefix, ENV_VAULT_ADDR), SecretString::new(session.client().address()));
        }

        if references.is_empty() {
            return Ok(outcome);
        }

        tracing::info!(namespace = %namespace, count = references.len(), "References to resolve");

        let mut queries: Vec<(String, VaultQuery)> = Vec::with_capacity(references.len());
        for reference in &references {
            match VaultQuery::parse(&reference_path(reference, namespace), self.settings.write_engines_enabled) {
                Ok(query) => queries.push((reference.clone(), query)),
                Err(error) => {
                    outcome.errors.insert(reference.clone(), error);
                }
            }
        }

        let resolver = QueryResolver::new(session.client().clone(), self.settings.clone());
        let parsed: Vec<VaultQuery> = queries.iter().map(|(_, q)| q.clone()).collect();
        let result = resolver.resolve_all(&parsed, &token).await;

        let mut replacements = BTreeMap::new();
        for (reference, query) in &queries {
            if let Some(value) = result.replacements.get(query.reference()) {
                self.sink.add_secret(value);
                replacements.insert(reference.clone(), value.expose_secret().to_string());
            } else if let Some(error) = result.errors.get(query.reference()) {
                let error = error.for_reference(reference);
                tracing::warn!(namespace = %namespace, reference = %reference, error = %error, "Cannot resolve reference");
                outcome.errors.insert(reference.clone(), error);
            }
        }

        for (key, value) in outcome.parameters.iter_mut() {
            if key.starts_with(DEPENDENCY_PREFIX) {
                continue;
            }
            *value = substitute(value, &replacements);
        }

        Ok(outcome)
    }
}
