//! Batch resolution of secret references.

use crate::auth::VaultToken;
use crate::config::ResolverSettings;
use crate::errors::{Result, VaultError};
use crate::resolver::extract::extract_value;
use crate::resolver::query::VaultQuery;
use crate::secrets::SecretString;
use crate::vault::VaultHttpClient;
use futures::stream::{self, StreamExt};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::Instrument;

/// Outcome of one resolution pass, keyed by the reference as written
#[derive(Debug, Default)]
pub struct ResolvingResult {
    pub replacements: BTreeMap<String, SecretString>,
    pub errors: BTreeMap<String, VaultError>,
}

impl ResolvingResult {
    /// Every reference resolved
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn value(&self, reference: &str) -> Option<&str> {
        self.replacements.get(reference).map(SecretString::expose_secret)
    }

    fn fail(&mut self, reference: &str, reason: impl Into<String>) {
        self.errors.insert(reference.to_string(), VaultError::resolution(reference, reason));
    }
}

/// Resolves references with one Vault call per distinct `(path, write)` pair
#[derive(Debug, Clone)]
pub struct QueryResolver {
    client: VaultHttpClient,
    settings: ResolverSettings,
}

impl QueryResolver {
    pub fn new(client: VaultHttpClient, settings: ResolverSettings) -> Self {
        Self { client, settings }
    }

    pub fn client(&self) -> &VaultHttpClient {
        &self.client
    }

    pub fn write_engines_enabled(&self) -> bool {
        self.settings.write_engines_enabled
    }

    /// Parse a reference with this resolver's write-engine setting
    pub fn parse(&self, reference: &str) -> Result<VaultQuery> {
        VaultQuery::parse(reference, self.settings.write_engines_enabled)
    }

    /// Parse and resolve raw references. Unparseable references become errors.
    pub async fn resolve_references<I, S>(&self, references: I, token: &VaultToken) -> ResolvingResult
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut queries = Vec::new();
        let mut parse_errors = BTreeMap::new();
        for reference in references {
            let reference = reference.as_ref();
            match self.parse(reference) {
                Ok(query) => queries.push(query),
                Err(error) => {
                    parse_errors.insert(reference.to_string(), error);
                }
            }
        }

        let mut result = self.resolve_all(&queries, token).await;
        result.errors.extend(parse_errors);
        result
    }

    /// Resolve parsed queries.
    ///
    /// Queries are grouped by `(path, is_write_engine)`; each group costs exactly
    /// one read or write and groups run concurrently. A failure only affects the
    /// references of its own group or field.
    pub async fn resolve_all(&self, queries: &[VaultQuery], token: &VaultToken) -> ResolvingResult {
        let mut groups: BTreeMap<(&str, bool), Vec<&VaultQuery>> = BTreeMap::new();
        for query in queries {
            groups.entry(query.group_key()).or_default().push(query);
        }

        let group_count = groups.len();
        let fetched: Vec<_> = stream::iter(groups)
            .map(|((path, is_write), members)| async move {
                let span = crate::vault_span!("fetch_secret", path = %path, write = is_write);
                let outcome = self.fetch(path, is_write, token).instrument(span).await;
                (path, members, outcome)
            })
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let mut result = ResolvingResult::default();
        for (path, members, outcome) in fetched {
            match outcome {
                Ok(Some(data)) => {
                    for query in members {
                        match extract_value(&data, query.field()) {
                            Ok(value) => {
                                result.replacements.insert(query.reference().to_string(), SecretString::new(value));
                            }
                            Err(reason) => result.fail(query.reference(), reason),
                        }
                    }
                }
                Ok(None) => {
                    for query in members {
                        result.fail(query.reference(), format!("Failed to fetch data for path '/{}'", path));
                    }
                }
                Err(error) => {
                    tracing::warn!(path = %path, error = %error, "Failed to fetch data for path");
                    for query in members {
                        result.errors.insert(query.reference().to_string(), error.for_reference(query.reference()));
                    }
                }
            }
        }

        tracing::info!(
            references = queries.len(),
            paths = group_count,
            resolved = result.replacements.len(),
            failed = result.errors.len(),
            "Resolved HashiCorp Vault references"
        );
        result
    }

    /// Write engines are called once: a retried POST could issue a second lease.
    async fn fetch(&self, path: &str, is_write: bool, token: &VaultToken) -> Result<Option<Map<String, Value>>> {
        tracing::debug!(path = %path, write = is_write, "Fetching secret");

        let response = if is_write {
            self.client.write_once(path, Some(token.secret()), Some(&json!({}))).await?
        } else {
            self.client.read(path, Some(token.secret())).await?
        };
        Ok(response.and_then(|r| r.data))
    }
}
