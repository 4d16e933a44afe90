//! Authentication module for the client session.
//!
//! This module provides:
//! - `SessionManager`: the session state machine (unknown, absent, present)
//! - `TokenDecoder`/`Claims`: identity decoded from the backend's token
//! - `TokenStore`: durable storage for the token (file, keychain, memory)
//!
//! Tokens are decoded client-side without signature verification and
//! rejected once their `exp` claim has passed.

pub mod claims;
pub mod session;
pub mod store;

pub use claims::{Claims, ParseRoleError, Role, TokenDecoder, TokenError};
pub use session::{Identity, SessionEvent, SessionManager, SessionState};
pub use store::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};
