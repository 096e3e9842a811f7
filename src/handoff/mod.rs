//! # Token Handoff
//!
//! Lets a privileged server identity obtain a token for an untrusted build agent
//! without the agent ever seeing the server's long-term credentials.
//!
//! 1. The server logs in with its AppRole/LDAP credentials while asking Vault to
//!    response-wrap the reply (`X-Vault-Wrap-TTL`). Vault returns a single-use
//!    wrapping token plus the accessor of the real token inside it.
//! 2. The agent receives only the wrapping token and unwraps it once
//!    ([`CubbyholeAuthentication`](crate::auth::CubbyholeAuthentication)).
//! 3. When the build finishes the server revokes the real token by accessor,
//!    which works whether or not the agent ever unwrapped it.

pub mod leases;
pub mod protocol;

pub use leases::TokenLeases;
pub use protocol::{
    LeasedTokenInfo, LeasedWrappedTokenInfo, RevokeTarget, TokenHandoff, WrappedTokenEnvelope,
    REVOKE_ACCESSOR_PATH,
};
