//! Decoding of the identity claims carried by a backend-issued token.
//!
//! The backend signs an HS256 JWT. The client has no key, so only the
//! payload segment is decoded; the backend verifies the signature on every
//! authenticated request.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default allowance for clock skew when checking `exp`.
pub const DEFAULT_EXPIRY_LEEWAY_SECS: i64 = 30;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token: expected 3 segments, got {0}")]
    Malformed(usize),

    #[error("token payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("token payload is not valid claims JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("token expired (exp {0})")]
    Expired(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Editor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Editor => "editor",
        }
    }

    /// Owners manage their editors; editors only see the clients they work for.
    pub fn can_manage_editors(&self) -> bool {
        matches!(self, Role::Owner)
    }

    /// Label for the people list shown next to the channel list.
    pub fn partner_label(&self) -> &'static str {
        match self {
            Role::Owner => "Editors",
            Role::Editor => "Clients",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown role '{0}', expected 'owner' or 'editor'")]
pub struct ParseRoleError(String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" => Ok(Role::Owner),
            "editor" => Ok(Role::Editor),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

/// Claims the backend puts in the token payload. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub role: Role,
    /// Expiry as seconds since the Unix epoch
    #[serde(default)]
    pub exp: Option<i64>,
}

impl Claims {
    /// The `name` claim, falling back to `email`.
    pub fn display_name(&self) -> &str {
        [self.name.as_deref(), self.email.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .unwrap_or("")
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

/// Decodes token payloads and applies the client-side expiry check.
#[derive(Debug, Clone, Copy)]
pub struct TokenDecoder {
    leeway: Duration,
}

impl Default for TokenDecoder {
    fn default() -> Self {
        Self {
            leeway: Duration::seconds(DEFAULT_EXPIRY_LEEWAY_SECS),
        }
    }
}

impl TokenDecoder {
    pub fn with_leeway(leeway: Duration) -> Self {
        Self { leeway }
    }

    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        self.decode_at(token, Utc::now())
    }

    pub fn decode_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let segments: Vec<&str> = token.trim().split('.').collect();
        if segments.len() != 3 {
            return Err(TokenError::Malformed(segments.len()));
        }

        // Some issuers pad the segments even though JWT forbids it
        let payload = URL_SAFE_NO_PAD.decode(segments[1].trim_end_matches('='))?;
        let claims: Claims = serde_json::from_slice(&payload)?;

        if let Some(exp) = claims.exp {
            if self.is_expired(exp, now) {
                return Err(TokenError::Expired(exp));
            }
        }

        Ok(claims)
    }

    /// An `exp` outside chrono's range, or whose deadline overflows, is
    /// expired iff it lies before the epoch.
    fn is_expired(&self, exp: i64, now: DateTime<Utc>) -> bool {
        match DateTime::from_timestamp(exp, 0).and_then(|at| at.checked_add_signed(self.leeway)) {
            Some(deadline) => deadline < now,
            None => exp < 0,
        }
    }
}

/// Builds an unsigned token around `payload`, shaped like the backend's.
#[cfg(test)]
pub(crate) fn encode_test_token(payload: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.c2lnbmF0dXJl", header, body)
}
