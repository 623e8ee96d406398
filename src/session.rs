use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;

pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Accepts ids made of ASCII letters, digits, `-` and `_` only, since the
    /// id becomes a document path segment.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty()
            || raw.len() > 128
            || !raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cookie value `<user_id>.<hex hmac-sha256(user_id)>` for `user`.
pub fn sign_session(user: &UserId, secret: &str) -> Option<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(user.as_str().as_bytes());
    let digest = mac.finalize().into_bytes();
    Some(format!("{}.{}", user, hex::encode(digest)))
}

/// Verify a session cookie value and return the user it names.
pub fn verify_session(value: &str, secret: &str) -> Option<UserId> {
    let (raw_user, sig_hex) = value.rsplit_once('.')?;
    let user = UserId::parse(raw_user)?;
    let expected = hex::decode(sig_hex).ok()?;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(user.as_str().as_bytes());
    let computed = mac.finalize().into_bytes();

    (expected.len() == computed.len() && constant_time_eq(&computed, &expected)).then_some(user)
}
