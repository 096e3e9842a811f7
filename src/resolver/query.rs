//! Secret reference syntax: `[write:]<path>[!/<field>]`.

use crate::errors::{Result, VaultError};
use std::fmt;

/// Marks a reference whose path must be written to (dynamic secret engines)
pub const WRITE_PREFIX: &str = "write:";

/// Separates the secret path from the requested field
pub const FIELD_SEPARATOR: &str = "!/";

/// A parsed secret reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VaultQuery {
    reference: String,
    path: String,
    field: Option<String>,
    is_write_engine: bool,
}

impl VaultQuery {
    /// Parse a reference.
    ///
    /// The path is split from the field on the last `!/`. A leading `write:` marks a
    /// write-engine query only when `write_engines_enabled` is set; otherwise the
    /// marker is dropped and the query is a plain read. Paths are normalized to
    /// start with `/`.
    pub fn parse(reference: &str, write_engines_enabled: bool) -> Result<Self> {
        let trimmed = reference.trim();
        let (has_write_marker, rest) = match trimmed.strip_prefix(WRITE_PREFIX) {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (path, field) = match rest.rfind(FIELD_SEPARATOR) {
            Some(index) => (&rest[..index], Some(&rest[index + FIELD_SEPARATOR.len()..])),
            None => (rest, None),
        };

        let path = path.trim();
        if path.trim_matches('/').is_empty() {
            return Err(VaultError::resolution(reference, "reference has an empty path"));
        }
        if field.is_some_and(|f| f.trim().is_empty()) {
            return Err(VaultError::resolution(reference, "reference has an empty field after '!/'"));
        }

        let path = if path.starts_with('/') { path.to_string() } else { format!("/{}", path) };

        Ok(Self {
            reference: reference.to_string(),
            path,
            field: field.map(|f| f.trim().to_string()),
            is_write_engine: has_write_marker && write_engines_enabled,
        })
    }

    /// The reference exactly as written
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Secret path, always starting with `/`
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn is_write_engine(&self) -> bool {
        self.is_write_engine
    }

    /// Path relative to the API root, as sent to Vault
    pub fn request_path(&self) -> &str {
        self.path.trim_start_matches('/')
    }

    /// Queries with equal keys are served by one Vault call
    pub fn group_key(&self) -> (&str, bool) {
        (self.request_path(), self.is_write_engine)
    }

    /// `/<path>[!/<field>]`, without the write marker
    pub fn full(&self) -> String {
        match &self.field {
            Some(field) => format!("{}{}{}", self.path, FIELD_SEPARATOR, field),
            None => self.path.clone(),
        }
    }
}

impl fmt::Display for VaultQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_write_engine {
            write!(f, "{}", WRITE_PREFIX)?;
        }
        write!(f, "{}", self.path)?;
        if let Some(field) = &self.field {
            write!(f, "{}{}", FIELD_SEPARATOR, field)?;
        }
        Ok(())
    }
}
