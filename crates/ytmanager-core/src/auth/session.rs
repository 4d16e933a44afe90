use std::fmt;

use chrono::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::claims::{Claims, Role, TokenDecoder};
use super::store::TokenStore;
use crate::routes::{self, GuardDecision, Route};

/// Capacity of the session event channel.
/// Events are small and consumers drain them promptly; 16 covers bursts.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// A token together with the claims decoded from it.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    token: String,
    claims: Claims,
}

impl Identity {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn role(&self) -> Role {
        self.claims.role
    }

    pub fn display_name(&self) -> &str {
        self.claims.display_name()
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("token", &"[REDACTED]")
            .field("claims", &self.claims)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Persisted storage has not been read yet
    Unknown,
    Absent,
    Present(Identity),
}

/// Notifications about session changes and recovered failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A persisted token was loaded at startup
    Restored { role: Role },
    LoggedIn { role: Role },
    LoggedOut,
    /// A token could not be decoded; the session is logged out
    DecodeFailed { reason: String },
    /// The storage slot could not be read or written
    StorageFailed { reason: String },
}

/// Owns the session state for one running client.
///
/// All transitions go through `initialize`, `login` and `logout`. Decode and
/// storage failures are logged and published on the event channel; none of
/// them are returned to the caller.
pub struct SessionManager<S> {
    store: S,
    decoder: TokenDecoder,
    state: SessionState,
    events: broadcast::Sender<SessionEvent>,
}

impl<S: TokenStore> SessionManager<S> {
    pub fn new(store: S) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            decoder: TokenDecoder::default(),
            state: SessionState::Unknown,
            events,
        }
    }

    /// Override the clock-skew allowance used when checking token expiry.
    pub fn with_expiry_leeway(mut self, leeway: Duration) -> Self {
        self.decoder = TokenDecoder::with_leeway(leeway);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Load the persisted token. Runs once; later calls are ignored.
    pub fn initialize(&mut self) {
        if self.is_resolved() {
            warn!("Session already initialized, ignoring");
            return;
        }

        let stored = match self.store.load() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted token");
                self.notify(SessionEvent::StorageFailed {
                    reason: format!("{:#}", e),
                });
                None
            }
        };

        let Some(token) = stored.map(|t| t.trim().to_string()) else {
            debug!("No persisted token");
            self.state = SessionState::Absent;
            return;
        };

        match self.decoder.decode(&token) {
            Ok(claims) => {
                let role = claims.role;
                info!(%role, "Restored session from storage");
                self.state = SessionState::Present(Identity { token, claims });
                self.notify(SessionEvent::Restored { role });
            }
            Err(e) => {
                warn!(error = %e, "Discarding persisted token");
                self.discard_stored_token();
                self.state = SessionState::Absent;
                self.notify(SessionEvent::DecodeFailed {
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Accept a token issued by the backend.
    ///
    /// A token that cannot be decoded ends the session rather than leaving a
    /// logged-in state with no claims.
    pub fn login(&mut self, token: impl Into<String>) {
        let token = token.into().trim().to_string();

        let claims = match self.decoder.decode(&token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "Failed to decode login token");
                self.discard_stored_token();
                self.state = SessionState::Absent;
                self.notify(SessionEvent::DecodeFailed {
                    reason: e.to_string(),
                });
                return;
            }
        };

        if let Err(e) = self.store.save(&token) {
            warn!(error = %e, "Failed to persist token, session will not survive restart");
            self.notify(SessionEvent::StorageFailed {
                reason: format!("{:#}", e),
            });
        }

        let role = claims.role;
        info!(%role, "Logged in");
        self.state = SessionState::Present(Identity { token, claims });
        self.notify(SessionEvent::LoggedIn { role });
    }

    pub fn logout(&mut self) {
        self.discard_stored_token();
        let was_present = matches!(self.state, SessionState::Present(_));
        self.state = SessionState::Absent;
        if was_present {
            info!("Logged out");
            self.notify(SessionEvent::LoggedOut);
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// False while the persisted token has not been read yet.
    pub fn is_resolved(&self) -> bool {
        !matches!(self.state, SessionState::Unknown)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Present(_))
    }

    pub fn identity(&self) -> Option<&Identity> {
        match &self.state {
            SessionState::Present(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.identity().map(Identity::token)
    }

    pub fn role(&self) -> Option<Role> {
        self.identity().map(Identity::role)
    }

    pub fn display_name(&self) -> Option<&str> {
        self.identity().map(Identity::display_name)
    }

    pub fn guard(&self, route: &Route) -> GuardDecision {
        routes::guard(&self.state, route)
    }

    fn discard_stored_token(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear persisted token");
            self.notify(SessionEvent::StorageFailed {
                reason: format!("{:#}", e),
            });
        }
    }

    fn notify(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
