//! Session lookup for incoming connections.
//!
//! Authentication itself happens elsewhere; by the time a browser opens the
//! live-update socket it already holds a session token. The server pulls
//! that token out of the upgrade request and asks a [`SessionVerifier`]
//! who it belongs to.

use std::collections::HashMap;
use std::sync::RwLock;

use shoplist_core::UserIdentity;
use tokio_tungstenite::tungstenite::http::{header, HeaderMap};

/// Resolves a session token to the user it was issued for.
pub trait SessionVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Option<UserIdentity>;
}

/// Fixed token table, for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct StaticSessions {
    tokens: RwLock<HashMap<String, UserIdentity>>,
}

impl StaticSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, token: impl Into<String>, user: UserIdentity) -> Self {
        self.insert(token, user);
        self
    }

    pub fn insert(&self, token: impl Into<String>, user: UserIdentity) {
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.insert(token.into(), user);
        }
    }

    /// Invalidate a token (sign-out).
    pub fn revoke(&self, token: &str) -> Option<UserIdentity> {
        self.tokens.write().ok()?.remove(token)
    }
}

impl SessionVerifier for StaticSessions {
    fn verify(&self, token: &str) -> Option<UserIdentity> {
        self.tokens.read().ok()?.get(token).cloned()
    }
}

/// Extract a session token from upgrade request headers.
///
/// The named cookie wins; `Authorization: Bearer …` is the fallback for
/// non-browser clients.
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, token)| token.to_owned());

    from_cookie.filter(|t| !t.is_empty()).or_else(|| {
        headers
            .get(header::AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
    })
}
