//! Lifecycle-aware owner of the Vault session token.
//!
//! The token lives in a single guarded slot with an explicit state:
//!
//! ```text
//! NoToken -> Active -> Renewing -> Active
//!                               -> NoToken
//! any     -> Revoked (terminal)
//! ```
//!
//! Logins are serialized by an async mutex and double-checked, so callers that
//! arrive while a login is in flight wait for it and share its token. A renewal
//! chain is started for renewable tokens; each link renews once and schedules the
//! next link only when the renewal succeeded. At most one chain is live: starting
//! a chain or dropping the token cancels the previous one.

use crate::auth::{ClientAuthentication, VaultToken};
use crate::errors::{AuthErrorKind, Result, VaultError};
use crate::session::scheduler::{TaskScheduler, TokioScheduler};
use crate::session::trigger::RefreshTrigger;
use crate::vault::VaultHttpClient;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

pub const RENEW_SELF_PATH: &str = "auth/token/renew-self";
pub const REVOKE_SELF_PATH: &str = "auth/token/revoke-self";

/// Observable state of a [`SessionManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoToken,
    Active,
    Renewing,
    Revoked,
}

enum Slot {
    Empty,
    Active(VaultToken),
    Renewing(VaultToken),
    Revoked,
}

impl Slot {
    fn token(&self) -> Option<&VaultToken> {
        match self {
            Slot::Active(token) | Slot::Renewing(token) => Some(token),
            Slot::Empty | Slot::Revoked => None,
        }
    }

    fn state(&self) -> SessionState {
        match self {
            Slot::Empty => SessionState::NoToken,
            Slot::Active(_) => SessionState::Active,
            Slot::Renewing(_) => SessionState::Renewing,
            Slot::Revoked => SessionState::Revoked,
        }
    }
}

struct Inner {
    client: VaultHttpClient,
    authentication: Arc<dyn ClientAuthentication>,
    trigger: RefreshTrigger,
    scheduler: Arc<dyn TaskScheduler>,
    slot: Mutex<Slot>,
    login_lock: tokio::sync::Mutex<()>,
    renewals: CancellationToken,
    /// Cancels the live renewal chain. Locked only while `slot` is held.
    chain: Mutex<CancellationToken>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.renewals.cancel();
    }
}

/// Builder for [`SessionManager`]
pub struct SessionManagerBuilder {
    client: VaultHttpClient,
    authentication: Arc<dyn ClientAuthentication>,
    trigger: RefreshTrigger,
    scheduler: Arc<dyn TaskScheduler>,
}

impl SessionManagerBuilder {
    pub fn refresh_trigger(mut self, trigger: RefreshTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn TaskScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn build(self) -> SessionManager {
        let renewals = CancellationToken::new();
        let chain = renewals.child_token();
        chain.cancel();
        SessionManager {
            inner: Arc::new(Inner {
                client: self.client,
                authentication: self.authentication,
                trigger: self.trigger,
                scheduler: self.scheduler,
                slot: Mutex::new(Slot::Empty),
                login_lock: tokio::sync::Mutex::new(()),
                renewals,
                chain: Mutex::new(chain),
            }),
        }
    }
}

/// Owns the current Vault token: logs in lazily, renews in the background and
/// revokes on [`destroy`](SessionManager::destroy).
///
/// Cloning is cheap and clones share the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn builder(client: VaultHttpClient, authentication: Arc<dyn ClientAuthentication>) -> SessionManagerBuilder {
        SessionManagerBuilder {
            client,
            authentication,
            trigger: RefreshTrigger::default(),
            scheduler: Arc::new(TokioScheduler),
        }
    }

    pub fn new(client: VaultHttpClient, authentication: Arc<dyn ClientAuthentication>) -> Self {
        Self::builder(client, authentication).build()
    }

    pub fn client(&self) -> &VaultHttpClient {
        &self.inner.client
    }

    pub fn refresh_trigger(&self) -> &RefreshTrigger {
        &self.inner.trigger
    }

    pub fn state(&self) -> SessionState {
        self.slot().state()
    }

    /// The cached token, without logging in
    pub fn current_token(&self) -> Option<VaultToken> {
        self.slot().token().cloned()
    }

    /// Whether the cached token can be renewed
    pub fn is_token_renewable(&self) -> bool {
        self.slot().token().is_some_and(VaultToken::is_renewable)
    }

    /// Return the cached token, logging in first when there is none.
    pub async fn get_session_token(&self) -> Result<VaultToken> {
        if let Some(token) = self.cached()? {
            return Ok(token);
        }

        let _guard = self.inner.login_lock.lock().await;
        if let Some(token) = self.cached()? {
            return Ok(token);
        }

        tracing::debug!(method = %self.inner.authentication.method(), "Logging in to HashiCorp Vault");
        let method = self.inner.authentication.method();
        let token = self
            .inner
            .authentication
            .login(&self.inner.client)
            .instrument(crate::vault_span!("login", method = %method))
            .await?;

        let destroyed = {
            let mut slot = self.slot();
            if matches!(*slot, Slot::Revoked) {
                true
            } else {
                *slot = Slot::Active(token.clone());
                false
            }
        };

        if destroyed {
            if token.is_login() {
                self.revoke(&token).await;
            }
            return Err(session_closed());
        }

        if token.is_renewable() {
            self.schedule_renewal();
        }
        Ok(token)
    }

    /// Renew the cached token once.
    ///
    /// Returns `false` when there is no token, when the renewal fails, or when the
    /// renewed lease is too short to be useful. In the last two cases the token is
    /// dropped so the next [`get_session_token`](Self::get_session_token) logs in again.
    pub async fn renew_token(&self) -> bool {
        let token = {
            let mut slot = self.slot();
            match slot.token().cloned() {
                Some(token) => {
                    *slot = Slot::Renewing(token.clone());
                    token
                }
                None => return false,
            }
        };

        tracing::info!("Renewing HashiCorp Vault token");

        match self.inner.client.write_once(RENEW_SELF_PATH, Some(token.secret()), None).await {
            Ok(Some(response)) => match response.auth {
                Some(auth) => {
                    let accessor = auth.accessor.clone().or_else(|| token.accessor().map(str::to_string));
                    let renewed = VaultToken::from_auth(&auth).with_accessor(accessor);

                    if self.inner.trigger.is_below_threshold(renewed.lease_duration()) {
                        tracing::warn!(
                            lease_seconds = renewed.lease_duration().as_secs(),
                            threshold_seconds = self.inner.trigger.min_valid_threshold().as_secs(),
                            "Token TTL exceeded validity threshold, dropping token"
                        );
                        self.discard();
                        return false;
                    }

                    self.replace(renewed);
                    true
                }
                None => {
                    tracing::warn!("Token renewal response carried no auth block, dropping token");
                    self.discard();
                    false
                }
            },
            Ok(None) => {
                tracing::warn!("Token renewal returned no content, dropping token");
                self.discard();
                false
            }
            Err(error) => {
                tracing::warn!(error = %error, "Cannot renew token, resetting token and performing re-login");
                self.discard();
                false
            }
        }
    }

    /// Start a renewal chain for the cached token, cancelling any chain already running.
    pub fn schedule_renewal(&self) {
        let (token, chain) = {
            let slot = self.slot();
            let token = match slot.token() {
                Some(token) if token.is_renewable() => token.clone(),
                _ => return,
            };
            let chain = self.inner.renewals.child_token();
            let previous = std::mem::replace(&mut *self.chain(), chain.clone());
            previous.cancel();
            (token, chain)
        };

        self.schedule_link(&token, chain);
    }

    fn schedule_link(&self, token: &VaultToken, chain: CancellationToken) {
        let at = self.inner.trigger.next_execution_time(token, Utc::now());
        tracing::debug!(fire_at = %at, lease_seconds = token.lease_duration().as_secs(), "Scheduling token renewal");

        let weak = Arc::downgrade(&self.inner);
        let link = chain.clone();
        let task = Box::pin(async move {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if link.is_cancelled() {
                return;
            }
            let manager = SessionManager { inner };
            if manager.is_token_renewable() && manager.renew_token().await && !link.is_cancelled() {
                if let Some(token) = manager.current_token() {
                    manager.schedule_link(&token, link);
                }
            }
        });

        self.inner.scheduler.schedule(at, chain, task);
    }

    /// Drop the token, stop renewals and revoke login tokens. Safe to call repeatedly.
    pub async fn destroy(&self) {
        let previous = std::mem::replace(&mut *self.slot(), Slot::Revoked);
        self.inner.renewals.cancel();

        match previous {
            Slot::Revoked => tracing::debug!("Session already destroyed"),
            Slot::Empty => tracing::debug!("Session destroyed before any login"),
            Slot::Active(token) | Slot::Renewing(token) => {
                if token.is_login() {
                    self.revoke(&token).await;
                }
            }
        }
    }

    async fn revoke(&self, token: &VaultToken) {
        match self.inner.client.write_once(REVOKE_SELF_PATH, Some(token.secret()), None).await {
            Ok(_) => tracing::info!("Revoked HashiCorp Vault token"),
            Err(error) => tracing::warn!(error = %error, "Cannot revoke HashiCorp Vault token"),
        }
    }

    fn cached(&self) -> Result<Option<VaultToken>> {
        let slot = self.slot();
        match &*slot {
            Slot::Revoked => Err(session_closed()),
            other => Ok(other.token().cloned()),
        }
    }

    fn discard(&self) {
        let mut slot = self.slot();
        if !matches!(*slot, Slot::Revoked) {
            *slot = Slot::Empty;
        }
        self.chain().cancel();
    }

    fn replace(&self, token: VaultToken) {
        let mut slot = self.slot();
        if !matches!(*slot, Slot::Revoked) {
            *slot = Slot::Active(token);
        }
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.inner.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn chain(&self) -> MutexGuard<'_, CancellationToken> {
        self.inner.chain.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn session_closed() -> VaultError {
    VaultError::auth("Vault session has been destroyed", AuthErrorKind::SessionClosed)
}
