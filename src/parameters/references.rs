//! `%vault:...%` references embedded in build parameter values.

use crate::resolver::WRITE_PREFIX;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

/// Prefix of a Vault reference, without the surrounding `%`
pub const VAULT_PARAMETER_PREFIX: &str = "vault:";

/// Parameters whose key starts with this prefix belong to dependencies and are never resolved
pub const DEPENDENCY_PREFIX: &str = "dep.";

static REFERENCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%(vault:[^%\s]+)%").expect("reference pattern is a valid regex"));

/// Namespace a reference belongs to: the text between `vault:` and the first `:`,
/// unless a `/` comes first. `""` is the default namespace. A leading `write:`
/// marks a write-engine query, so `write` cannot name a namespace.
pub fn reference_namespace(reference: &str) -> &str {
    let value = reference.strip_prefix(VAULT_PARAMETER_PREFIX).unwrap_or(reference);
    if value.starts_with(WRITE_PREFIX) {
        return "";
    }
    match (value.find(':'), value.find('/')) {
        (Some(colon), Some(slash)) if slash < colon => "",
        (Some(colon), _) => &value[..colon],
        (None, _) => "",
    }
}

/// The query part of a reference: `/<path>[!/<field>]`, or `write:/<path>...`
pub fn reference_path(reference: &str, namespace: &str) -> String {
    let value = reference.strip_prefix(VAULT_PARAMETER_PREFIX).unwrap_or(reference);
    let value = if namespace.is_empty() {
        value
    } else {
        value.strip_prefix(namespace).and_then(|v| v.strip_prefix(':')).unwrap_or(value)
    };
    if value.starts_with('/') || value.starts_with(WRITE_PREFIX) {
        value.to_string()
    } else {
        format!("/{}", value)
    }
}

/// Build a `%vault:[<ns>:]<query>%` reference
pub fn make_reference(namespace: &str, query: &str) -> String {
    if namespace.is_empty() {
        format!("%{}{}%", VAULT_PARAMETER_PREFIX, query)
    } else {
        format!("%{}{}:{}%", VAULT_PARAMETER_PREFIX, namespace, query)
    }
}

/// References found in one value that belong to `namespace`
pub fn references_in<'a>(value: &'a str, namespace: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    REFERENCE_PATTERN
        .captures_iter(value)
        .filter_map(|captures| captures.get(1))
        .map(|m| m.as_str())
        .filter(move |reference| reference_namespace(reference) == namespace)
}

/// Collect the distinct references of `namespace` used by `parameters`, skipping `dep.` keys
pub fn collect_references(parameters: &BTreeMap<String, String>, namespace: &str) -> BTreeSet<String> {
    parameters
        .iter()
        .filter(|(key, _)| !key.starts_with(DEPENDENCY_PREFIX))
        .flat_map(|(_, value)| references_in(value, namespace))
        .map(str::to_string)
        .collect()
}

/// Whether any value references one of `namespaces`
pub fn has_references(parameters: &BTreeMap<String, String>, namespaces: &[&str]) -> bool {
    parameters.values().any(|value| namespaces.iter().any(|ns| references_in(value, ns).next().is_some()))
}

/// Replace every `%<reference>%` whose reference has a replacement; others stay as written
pub fn substitute(value: &str, replacements: &BTreeMap<String, String>) -> String {
    REFERENCE_PATTERN
        .replace_all(value, |captures: &regex::Captures<'_>| {
            let whole = &captures[0];
            replacements.get(&captures[1]).cloned().unwrap_or_else(|| whole.to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_reference_namespace() {
        assert_eq!(reference_namespace("vault:/secret/app!/key"), "");
        assert_eq!(reference_namespace("vault:prod:/secret/app"), "prod");
        assert_eq!(reference_namespace("vault:secret/app:8200"), "");
        assert_eq!(reference_namespace("vault:secret/app"), "");
        assert_eq!(reference_namespace("vault:write:/database/creds/ro"), "");
        assert_eq!(reference_namespace("vault:prod:write:/database/creds/ro"), "prod");
    }

    #[test]
    fn test_reference_path() {
        assert_eq!(reference_path("vault:/secret/app!/key", ""), "/secret/app!/key");
        assert_eq!(reference_path("vault:secret/app", ""), "/secret/app");
        assert_eq!(reference_path("vault:prod:/secret/app", "prod"), "/secret/app");
        assert_eq!(reference_path("vault:prod:secret/app", "prod"), "/secret/app");
        assert_eq!(reference_path("vault:write:/database/creds/ro", ""), "write:/database/creds/ro");
        assert_eq!(reference_path("vault:prod:write:/db/creds", "prod"), "write:/db/creds");
    }

    #[test]
    fn test_make_reference() {
        assert_eq!(make_reference("", "/secret/app"), "%vault:/secret/app%");
        assert_eq!(make_reference("prod", "/secret/app"), "%vault:prod:/secret/app%");
    }

    #[test]
    fn test_collect_filters_namespace_and_dependencies() {
        let parameters = params(&[
            ("env.DB_PASSWORD", "%vault:/secret/db!/password%"),
            ("url", "postgres://%vault:/secret/db!/user%:%vault:/secret/db!/password%@db"),
            ("other", "%vault:prod:/secret/api%"),
            ("dep.upstream.token", "%vault:/secret/upstream%"),
            ("plain", "no references"),
        ]);

        let default: Vec<_> = collect_references(&parameters, "").into_iter().collect();
        assert_eq!(default, vec!["vault:/secret/db!/password", "vault:/secret/db!/user"]);

        let prod: Vec<_> = collect_references(&parameters, "prod").into_iter().collect();
        assert_eq!(prod, vec!["vault:prod:/secret/api"]);

        assert!(has_references(&parameters, &["prod"]));
        assert!(!has_references(&params(&[("a", "b")]), &[""]));
    }

    #[test]
    fn test_substitute_leaves_unknown_references() {
        let replacements: BTreeMap<_, _> =
            [("vault:/secret/db!/user".to_string(), "svc".to_string())].into_iter().collect();
        let value = substitute("%vault:/secret/db!/user%:%vault:/secret/db!/password%", &replacements);
        assert_eq!(value, "svc:%vault:/secret/db!/password%");
    }
}
