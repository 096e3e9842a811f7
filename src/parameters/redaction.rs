//! Masking resolved secrets in build output.

use crate::secrets::SecretString;
use std::sync::{PoisonError, RwLock};

/// Replacement text for a masked secret
pub const PASSWORD_MASK: &str = "*******";

/// Receives every secret value before it is handed to a build
pub trait RedactionSink: Send + Sync {
    fn add_secret(&self, secret: &SecretString);
}

/// Masks registered secrets in arbitrary text
#[derive(Debug, Default)]
pub struct PasswordReplacer {
    secrets: RwLock<Vec<SecretString>>,
}

impl PasswordReplacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.secrets.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mask every registered secret in `text`, longest first so that overlapping
    /// secrets are hidden completely.
    pub fn replace(&self, text: &str) -> String {
        let secrets = self.secrets.read().unwrap_or_else(PoisonError::into_inner);
        let mut ordered: Vec<&SecretString> = secrets.iter().collect();
        ordered.sort_by_key(|s| std::cmp::Reverse(s.expose_secret().len()));

        ordered.into_iter().fold(text.to_string(), |acc, secret| secret.mask_in(&acc, PASSWORD_MASK))
    }
}

impl RedactionSink for PasswordReplacer {
    fn add_secret(&self, secret: &SecretString) {
        if secret.is_empty() {
            return;
        }
        let mut secrets = self.secrets.write().unwrap_or_else(PoisonError::into_inner);
        if !secrets.contains(secret) {
            secrets.push(secret.clone());
        }
    }
}
