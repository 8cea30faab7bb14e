//! HS256 token encoding and verification.
//!
//! Tokens are JWT-shaped: `base64url(header).base64url(claims).base64url(mac)`
//! without padding, where `mac` is HMAC-SHA256 over the first two segments.

use crate::error::{AuthError, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Issuer stamped into every token
pub const ISSUER: &str = "goTorrentServer";

/// Length of generated signing keys in bytes
pub const SIGNING_KEY_LEN: usize = 32;

const ALGORITHM: &str = "HS256";

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default)]
    typ: Option<String>,
}

/// Token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Name of the client the token was issued to
    #[serde(rename = "ClientName")]
    pub client_name: String,
    /// Issuer
    pub iss: String,
}

impl Claims {
    /// Claims for a client, issued by this server
    pub fn for_client(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            iss: ISSUER.to_string(),
        }
    }
}

/// Fresh random signing key
pub fn generate_signing_key() -> Vec<u8> {
    let mut key = vec![0u8; SIGNING_KEY_LEN];
    rand::rngs::OsRng.fill_bytes(&mut key);
    key
}

fn mac_for(key: &[u8]) -> Result<HmacSha256> {
    if key.is_empty() {
        return Err(AuthError::MissingSigningKey.into());
    }
    HmacSha256::new_from_slice(key).map_err(|_| AuthError::MissingSigningKey.into())
}

/// Encode and sign claims
pub fn sign(claims: &Claims, key: &[u8]) -> Result<String> {
    let header = Header {
        alg: ALGORITHM.to_string(),
        typ: Some("JWT".to_string()),
    };
    let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
    let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
    let signing_input = format!("{}.{}", header, body);

    let mut mac = mac_for(key)?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", signing_input, signature))
}

fn decode_segment(segment: &str, what: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| AuthError::MalformedToken(format!("{} is not base64url: {}", what, e)).into())
}

/// Check a token against `key` and return its claims
///
/// Rejects tokens whose header is not HS256, whose signature does not match
/// (compared in constant time), whose issuer is not [`ISSUER`], or whose
/// client name is empty.
pub fn verify(token: &str, key: &[u8]) -> Result<Claims> {
    let token = token.trim();
    let malformed = || AuthError::MalformedToken("expected three segments".into());

    let (signing_input, signature) = token.rsplit_once('.').ok_or_else(malformed)?;
    let mut parts = signing_input.split('.');
    let (Some(header), Some(body), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(malformed().into());
    };

    let header: Header = serde_json::from_slice(&decode_segment(header, "header")?)
        .map_err(|e| AuthError::MalformedToken(format!("header: {}", e)))?;
    if header.alg != ALGORITHM {
        return Err(AuthError::UnsupportedAlgorithm(header.alg).into());
    }

    let signature = decode_segment(signature, "signature")?;
    let mut mac = mac_for(key)?;
    mac.update(signing_input.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| AuthError::SignatureMismatch)?;

    let claims: Claims = serde_json::from_slice(&decode_segment(body, "claims")?)
        .map_err(|e| AuthError::InvalidClaims(e.to_string()))?;
    if claims.iss != ISSUER {
        return Err(AuthError::InvalidClaims(format!("unexpected issuer '{}'", claims.iss)).into());
    }
    if claims.client_name.trim().is_empty() {
        return Err(AuthError::InvalidClaims("empty client name".into()).into());
    }

    Ok(claims)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn key() -> Vec<u8> {
        b"0123456789abcdef0123456789abcdef".to_vec()
    }

    #[test]
    fn signed_token_verifies() {
        let token = sign(&Claims::for_client("goTorrentWebUI"), &key()).unwrap();
        let claims = verify(&token, &key()).unwrap();
        assert_eq!(claims.client_name, "goTorrentWebUI");
        assert_eq!(claims.iss, ISSUER);
    }

    #[test]
    fn header_is_standard_hs256_jwt() {
        let token = sign(&Claims::for_client("x"), &key()).unwrap();
        let header = token.split('.').next().unwrap();
        assert_eq!(header, "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9");
    }

    #[test]
    fn claims_use_client_field_names() {
        let token = sign(&Claims::for_client("phone"), &key()).unwrap();
        let body = token.split('.').nth(1).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(body).unwrap()).unwrap();
        assert_eq!(json["ClientName"], "phone");
        assert_eq!(json["iss"], "goTorrentServer");
    }

    #[test]
    fn wrong_key_is_signature_mismatch() {
        let token = sign(&Claims::for_client("x"), &key()).unwrap();
        let other = generate_signing_key();
        assert!(matches!(
            verify(&token, &other),
            Err(Error::Auth(AuthError::SignatureMismatch))
        ));
    }

    #[test]
    fn tampered_claims_are_rejected() {
        let token = sign(&Claims::for_client("x"), &key()).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged_body = URL_SAFE_NO_PAD.encode(br#"{"ClientName":"admin","iss":"goTorrentServer"}"#);
        let forged = format!("{}.{}.{}", parts[0], forged_body, parts[2]);
        assert!(matches!(
            verify(&forged, &key()),
            Err(Error::Auth(AuthError::SignatureMismatch))
        ));
    }

    #[test]
    fn none_algorithm_is_rejected() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(br#"{"ClientName":"x","iss":"goTorrentServer"}"#);
        let token = format!("{}.{}.", header, body);
        assert!(matches!(
            verify(&token, &key()),
            Err(Error::Auth(AuthError::UnsupportedAlgorithm(alg))) if alg == "none"
        ));
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let claims = Claims {
            client_name: "x".into(),
            iss: "someone-else".into(),
        };
        let token = sign(&claims, &key()).unwrap();
        assert!(matches!(
            verify(&token, &key()),
            Err(Error::Auth(AuthError::InvalidClaims(_)))
        ));
    }

    #[test]
    fn empty_client_name_is_rejected() {
        let token = sign(&Claims::for_client(""), &key()).unwrap();
        assert!(matches!(
            verify(&token, &key()),
            Err(Error::Auth(AuthError::InvalidClaims(_)))
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        for token in ["", "abc", "a.b", "a.b.c.d", "!!!.???.***"] {
            assert!(
                matches!(verify(token, &key()), Err(Error::Auth(AuthError::MalformedToken(_)))),
                "token {:?} should be malformed",
                token
            );
        }
    }

    #[test]
    fn empty_key_cannot_sign() {
        assert!(matches!(
            sign(&Claims::for_client("x"), &[]),
            Err(Error::Auth(AuthError::MissingSigningKey))
        ));
    }

    #[test]
    fn generated_keys_differ() {
        let a = generate_signing_key();
        let b = generate_signing_key();
        assert_eq!(a.len(), SIGNING_KEY_LEN);
        assert_ne!(a, b);
    }
}
