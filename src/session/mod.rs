//! # Session Lifecycle
//!
//! [`SessionManager`] owns the Vault token for one connection: lazy login,
//! background renewal driven by a [`RefreshTrigger`], and revocation on
//! shutdown. Renewal timers go through a [`TaskScheduler`] so callers can
//! swap the tokio timer for their own.
//!
//! ## Example
//!
//! ```rust,ignore
//! let session = SessionManager::builder(client, build_authentication(&settings.auth))
//!     .refresh_trigger(RefreshTrigger::new(Duration::from_secs(15)))
//!     .build();
//!
//! let token = session.get_session_token().await?;
//! // ... use the token ...
//! session.destroy().await;
//! ```

pub mod manager;
pub mod scheduler;
pub mod trigger;

pub use manager::{SessionManager, SessionManagerBuilder, SessionState};
pub use scheduler::{ManualScheduler, TaskScheduler, TokioScheduler};
pub use trigger::RefreshTrigger;
