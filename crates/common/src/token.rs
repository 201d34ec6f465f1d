use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const HEADER: &[u8] = b"{\"alg\":\"HS256\",\"typ\":\"JWT\"}";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
}

fn mac(secret: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length")
}

pub fn create_token(secret: &[u8], subject: &str, expires_at_ms: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(HEADER);
    let claims = serde_json::json!({
        "sub": subject,
        "exp": expires_at_ms / 1000,
    });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
    let unsigned = format!("{header}.{payload}");
    let mut mac = mac(secret);
    mac.update(unsigned.as_bytes());
    let sig = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    format!("{unsigned}.{sig}")
}

/// Returns the `sub` claim of a valid, unexpired token.
pub fn validate_token(secret: &[u8], token: &str, now_ms: i64) -> Result<String, TokenError> {
    let mut parts = token.split('.');
    let (Some(header), Some(payload), Some(sig), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };

    let sig_bytes = URL_SAFE_NO_PAD
        .decode(sig)
        .map_err(|_| TokenError::Malformed)?;
    let mut mac = mac(secret);
    mac.update(header.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    mac.verify_slice(&sig_bytes)
        .map_err(|_| TokenError::InvalidSignature)?;

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| TokenError::Malformed)?;
    let claims: serde_json::Value =
        serde_json::from_slice(&payload_bytes).map_err(|_| TokenError::Malformed)?;

    let sub = claims["sub"]
        .as_str()
        .filter(|s| !s.is_empty())
        .ok_or(TokenError::Malformed)?
        .to_string();

    if let Some(exp) = claims["exp"].as_i64() {
        if now_ms / 1000 > exp {
            return Err(TokenError::Expired);
        }
    }

    Ok(sub)
}
