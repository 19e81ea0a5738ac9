use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Student,
    Teacher,
    Moderator,
    Admin,
}

/// Signed token claims. `exp` is seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: i64,
}

/// Why a presented token was rejected. "Expired" is the only kind
/// eligible for refresh, so callers must be able to tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Missing,
    Invalid,
    Expired,
}

impl TokenError {
    pub fn message(self) -> &'static str {
        match self {
            TokenError::Missing => "No authentication token provided",
            TokenError::Invalid => "Invalid authentication token",
            TokenError::Expired => "Authentication token expired",
        }
    }
}

/// Token format: `base64url(claims JSON).hex(hmac-sha256(signing input))`.
pub fn sign(secret: &str, claims: &Claims) -> String {
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap_or_default());
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    format!("{payload}.{signature}")
}

/// Verify signature first, then expiry, so a forged token can never be
/// reported as merely expired.
pub fn verify(secret: &str, token: &str) -> Result<Claims, TokenError> {
    let (payload, signature) = token.split_once('.').ok_or(TokenError::Invalid)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| TokenError::Invalid)?;
    mac.update(payload.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());
    if !constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
        return Err(TokenError::Invalid);
    }

    let raw = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| TokenError::Invalid)?;
    let claims: Claims = serde_json::from_slice(&raw).map_err(|_| TokenError::Invalid)?;

    if claims.exp < chrono::Utc::now().timestamp() {
        return Err(TokenError::Expired);
    }
    Ok(claims)
}

/// Issue an access token for a user, expiring `ttl_secs` from now.
pub fn issue(secret: &str, user_id: &str, role: Role, ttl_secs: i64) -> String {
    sign(
        secret,
        &Claims {
            sub: user_id.to_string(),
            role,
            exp: chrono::Utc::now().timestamp() + ttl_secs,
        },
    )
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
