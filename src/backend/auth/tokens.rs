//! Bearer token verification
//!
//! The identity provider is external and opaque: the server only checks the
//! HS256 signature and expiry of presented JWTs against `AUTH_SECRET_KEY`
//! and extracts the subject. When no secret is configured every token is
//! treated as unverified and callers fall through to the anonymous path.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// JWT claims the server cares about.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Token subject: the external user id.
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at time (Unix timestamp)
    pub iat: u64,
}

/// Verifies bearer tokens against an optional shared secret.
#[derive(Clone)]
pub struct TokenVerifier {
    secret: Option<String>,
}

impl TokenVerifier {
    /// `secret = None` disables verification entirely: [`Self::verify`]
    /// then answers "no verified user" for every token.
    pub fn new(secret: Option<String>) -> Self {
        Self { secret }
    }

    /// Whether a shared secret is configured at all.
    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Verify a token and return its subject, or `None` when the token is
    /// absent, unverifiable, expired, or no secret is configured.
    pub fn verify(&self, token: Option<&str>) -> Option<String> {
        let secret = self.secret.as_deref()?;
        let token = token?;

        let key = DecodingKey::from_secret(secret.as_bytes());
        match decode::<Claims>(token, &key, &Validation::default()) {
            Ok(data) => Some(data.claims.sub),
            Err(e) => {
                tracing::debug!("[Auth] token rejected: {e}");
                None
            }
        }
    }

    /// Issue a token for `sub`. Used by tests and local tooling; the
    /// production issuer is the external identity provider.
    pub fn issue(&self, sub: &str, ttl_secs: u64) -> Option<String> {
        let secret = self.secret.as_deref()?;
        let now = chrono::Utc::now().timestamp() as u64;
        let claims = Claims {
            sub: sub.to_string(),
            exp: now + ttl_secs,
            iat: now,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .ok()
    }
}
