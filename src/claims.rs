//! Operator access token claims.
//!
//! The token is JWT shaped. Its signature is checked by the server that
//! issued it; here the payload is only decoded and its expiry checked, to
//! decide which capabilities the console exposes.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::InvalidToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub subject: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether the operator may reboot cameras
    pub can_restart_camera: bool,
}

#[derive(Deserialize)]
struct RawClaims {
    sub: Option<String>,
    exp: Option<i64>,
    #[serde(default)]
    admin: bool,
}

/// Decode and validate a token against `now`.
pub fn validate(token: &str, now: DateTime<Utc>) -> Result<Claims, InvalidToken> {
    let mut parts = token.trim().split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(InvalidToken::Malformed);
    };

    // Some issuers keep the padding even in url-safe form.
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
    let raw: RawClaims = serde_json::from_slice(&bytes)?;

    let expires_at = match raw.exp {
        Some(exp) => Some(DateTime::from_timestamp(exp, 0).ok_or(InvalidToken::Malformed)?),
        None => None,
    };
    if let Some(expires_at) = expires_at {
        if now >= expires_at {
            return Err(InvalidToken::Expired(expires_at));
        }
    }

    Ok(Claims {
        subject: raw.sub,
        expires_at,
        can_restart_camera: raw.admin,
    })
}
