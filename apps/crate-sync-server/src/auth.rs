//! Bearer token gate for the write path.
//!
//! Tokens are compact JWTs signed with a shared secret (HS256, HS384 or
//! HS512). When no secret is configured the gate is not installed and pushes
//! are accepted from anyone; pulls are never gated.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use hmac::{digest::KeyInit, Hmac, Mac};
use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::{Sha256, Sha384, Sha512};
use thiserror::Error;

use crate::error::AppError;

/// Claims of a verified token
pub type Claims = Map<String, Value>;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingBearer,

    #[error("malformed token: {0}")]
    Malformed(&'static str),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("token not valid yet")]
    NotYetValid,
}

#[derive(Deserialize)]
struct TokenHeader {
    alg: String,
}

/// Verifies HMAC-signed JWTs against one shared secret
#[derive(Clone)]
pub struct JwtVerifier {
    secret: Vec<u8>,
}

impl JwtVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Check signature and time claims, returning the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    fn verify_at(&self, token: &str, now: i64) -> Result<Claims, AuthError> {
        let (signing_input, signature) = token
            .rsplit_once('.')
            .ok_or(AuthError::Malformed("expected three segments"))?;
        let (header, payload) = signing_input
            .split_once('.')
            .ok_or(AuthError::Malformed("expected three segments"))?;
        if payload.contains('.') {
            return Err(AuthError::Malformed("expected three segments"));
        }

        let header: TokenHeader = decode_segment(header)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::Malformed("signature is not base64url"))?;

        match header.alg.as_str() {
            "HS256" => verify_mac::<Hmac<Sha256>>(&self.secret, signing_input, &signature)?,
            "HS384" => verify_mac::<Hmac<Sha384>>(&self.secret, signing_input, &signature)?,
            "HS512" => verify_mac::<Hmac<Sha512>>(&self.secret, signing_input, &signature)?,
            other => return Err(AuthError::UnsupportedAlgorithm(other.to_string())),
        }

        let claims: Claims = decode_segment(payload)?;
        check_time_claims(&claims, now)?;
        Ok(claims)
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::Malformed("segment is not base64url"))?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::Malformed("segment is not JSON"))
}

fn verify_mac<M>(secret: &[u8], signing_input: &str, signature: &[u8]) -> Result<(), AuthError>
where
    M: Mac + KeyInit,
{
    let mut mac = <M as Mac>::new_from_slice(secret).map_err(|_| AuthError::InvalidSignature)?;
    mac.update(signing_input.as_bytes());
    mac.verify_slice(signature)
        .map_err(|_| AuthError::InvalidSignature)
}

fn check_time_claims(claims: &Claims, now: i64) -> Result<(), AuthError> {
    let now = now as f64;
    if let Some(exp) = numeric_claim(claims, "exp")? {
        if now >= exp {
            return Err(AuthError::Expired);
        }
    }
    if let Some(nbf) = numeric_claim(claims, "nbf")? {
        if now < nbf {
            return Err(AuthError::NotYetValid);
        }
    }
    if let Some(iat) = numeric_claim(claims, "iat")? {
        if now < iat {
            return Err(AuthError::NotYetValid);
        }
    }
    Ok(())
}

fn numeric_claim(claims: &Claims, name: &'static str) -> Result<Option<f64>, AuthError> {
    match claims.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or(AuthError::Malformed("time claim is not a number")),
    }
}

/// Token part of an `Authorization: Bearer <token>` value; the scheme is case-insensitive.
pub fn bearer_token(value: &str) -> Option<&str> {
    let scheme = value.get(..7)?;
    if !scheme.eq_ignore_ascii_case("bearer ") {
        return None;
    }
    let token = value[7..].trim();
    (!token.is_empty()).then_some(token)
}

/// Middleware rejecting requests without a valid bearer token
pub async fn require_bearer(
    State(verifier): State<Arc<JwtVerifier>>,
    request: Request,
    next: Next,
) -> Response {
    let verified = match request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
    {
        Some(token) => verifier.verify(token).map(|_| ()),
        None => Err(AuthError::MissingBearer),
    };

    match verified {
        Ok(()) => next.run(request).await,
        Err(e) => AppError::from(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &[u8] = b"test-secret-key-32-bytes-long!!";
    const NOW: i64 = 1_700_000_000;

    fn verifier() -> JwtVerifier {
        JwtVerifier::new(SECRET)
    }

    fn sign_with<M: Mac + KeyInit>(secret: &[u8], alg: &str, claims: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(json!({"alg": alg, "typ": "JWT"}).to_string());
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        let signing_input = format!("{}.{}", header, payload);
        let mut mac = <M as Mac>::new_from_slice(secret).unwrap();
        mac.update(signing_input.as_bytes());
        format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
        )
    }

    fn sign(claims: &Value) -> String {
        sign_with::<Hmac<Sha256>>(SECRET, "HS256", claims)
    }

    #[test]
    fn test_sign_and_verify() {
        let token = sign(&json!({"sub": "device-1", "exp": NOW + 60}));
        let claims = verifier().verify_at(&token, NOW).unwrap();
        assert_eq!(claims["sub"], "device-1");
    }

    #[test]
    fn test_wider_hmac_algorithms() {
        let claims = json!({"sub": "device-1"});
        let hs384 = sign_with::<Hmac<Sha384>>(SECRET, "HS384", &claims);
        let hs512 = sign_with::<Hmac<Sha512>>(SECRET, "HS512", &claims);
        assert!(verifier().verify_at(&hs384, NOW).is_ok());
        assert!(verifier().verify_at(&hs512, NOW).is_ok());
    }

    #[test]
    fn test_reject_wrong_secret() {
        let token = sign_with::<Hmac<Sha256>>(b"other", "HS256", &json!({"sub": "x"}));
        assert!(matches!(
            verifier().verify_at(&token, NOW),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn test_reject_tampered_payload() {
        let token = sign(&json!({"sub": "device-1"}));
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(json!({"sub": "admin"}).to_string());
        parts[1] = &forged;
        assert!(matches!(
            verifier().verify_at(&parts.join("."), NOW),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn test_reject_alg_none() {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(r#"{"sub":"x"}"#);
        let token = format!("{}.{}.", header, payload);
        assert!(matches!(
            verifier().verify_at(&token, NOW),
            Err(AuthError::UnsupportedAlgorithm(alg)) if alg == "none"
        ));
    }

    #[test]
    fn test_time_claims() {
        let expired = sign(&json!({"exp": NOW}));
        assert!(matches!(
            verifier().verify_at(&expired, NOW),
            Err(AuthError::Expired)
        ));

        let early = sign(&json!({"nbf": NOW + 30}));
        assert!(matches!(
            verifier().verify_at(&early, NOW),
            Err(AuthError::NotYetValid)
        ));

        let future_issue = sign(&json!({"iat": NOW + 30}));
        assert!(verifier().verify_at(&future_issue, NOW).is_err());

        let bad_exp = sign(&json!({"exp": "tomorrow"}));
        assert!(matches!(
            verifier().verify_at(&bad_exp, NOW),
            Err(AuthError::Malformed(_))
        ));
    }

    #[test]
    fn test_malformed_tokens() {
        for token in ["", "abc", "a.b", "a.b.c.d", "!!.??.**"] {
            assert!(
                matches!(verifier().verify_at(token, NOW), Err(AuthError::Malformed(_))),
                "{:?} should be malformed",
                token
            );
        }
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("bearer   xyz "), Some("xyz"));
        assert_eq!(bearer_token("BEARER t"), Some("t"));
        assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Bear"), None);
    }
}
