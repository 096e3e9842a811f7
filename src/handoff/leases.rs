//! Tokens issued per build, kept until the build finishes.

use crate::handoff::{RevokeTarget, TokenHandoff};
use dashmap::DashMap;
use std::sync::Arc;

/// Concurrent registry from build id to the tokens issued for it
#[derive(Debug, Clone, Default)]
pub struct TokenLeases {
    leases: Arc<DashMap<String, Vec<RevokeTarget>>>,
}

impl TokenLeases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, build_id: impl Into<String>, target: RevokeTarget) {
        self.leases.entry(build_id.into()).or_default().push(target);
    }

    /// Remove and return everything issued for a build
    pub fn take(&self, build_id: &str) -> Vec<RevokeTarget> {
        self.leases.remove(build_id).map(|(_, targets)| targets).unwrap_or_default()
    }

    /// Number of builds holding tokens
    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }

    /// Revoke everything issued for a build. Returns `true` when every revocation settled.
    pub async fn revoke_build(&self, handoff: &TokenHandoff, build_id: &str) -> bool {
        let mut settled = true;
        for target in self.take(build_id) {
            settled &= handoff.revoke(target, false).await;
        }
        settled
    }

    /// Revoke everything for every build, e.g. on server shutdown. Returns the number of failures.
    pub async fn revoke_all(&self, handoff: &TokenHandoff) -> usize {
        let build_ids: Vec<String> = self.leases.iter().map(|entry| entry.key().clone()).collect();

        let mut failures = 0;
        for build_id in build_ids {
            for target in self.take(&build_id) {
                if !handoff.revoke(target, false).await {
                    failures += 1;
                }
            }
        }

        if failures > 0 {
            tracing::warn!(failures, "Some HashiCorp Vault tokens could not be revoked");
        }
        failures
    }
}
