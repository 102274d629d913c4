//! Compact signed tokens: `base64(header).base64(claims).base64(signature)`.
//!
//! Segments use the URL-safe base64 alphabet without padding. Plain base64
//! input is rejected rather than accepted as an alternate spelling.
//! The signature is HMAC-SHA-512 over `"<header>.<claims>"` and the header
//! carries a random `kid` so that equal claims never yield equal tokens.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, Rng};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::Sha512;
use thiserror::Error;
use tracing::debug;

type HmacSha512 = Hmac<Sha512>;

pub const ALGORITHM: &str = "sha512";
pub const TOKEN_TYPE: &str = "JWT";

pub type Claims = Map<String, Value>;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Wrong number of JWT segments!")]
    SegmentCount,
    #[error("Invalid token header!")]
    InvalidHeader,
    #[error("Invalid token payload!")]
    InvalidPayload,
    #[error("Invalid token signature!")]
    InvalidSignature,
    #[error("Empty token algorithm!")]
    MissingAlgorithm,
    #[error("Unsupported token algorithm!")]
    UnsupportedAlgorithm,
    #[error("Token signature verification failed!")]
    VerificationFailed,
    #[error("Invalid token key!")]
    InvalidKey,
    #[error("Can not serialize token segment: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl TokenError {
    /// Failures caused by the token being unreadable, as opposed to a bad signature.
    pub fn is_format_error(&self) -> bool {
        !matches!(
            self,
            TokenError::VerificationFailed | TokenError::InvalidKey | TokenError::Serialize(_)
        )
    }
}

#[derive(Serialize)]
struct Header<'a> {
    alg: &'a str,
    typ: &'a str,
    kid: i64,
}

pub fn encode(claims: &Claims, key: &[u8]) -> Result<String, TokenError> {
    let header = Header {
        alg: ALGORITHM,
        typ: TOKEN_TYPE,
        kid: OsRng.gen(),
    };

    let header64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
    let payload64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
    let signing_input = format!("{header64}.{payload64}");

    let mut mac = keyed_mac(key)?;
    mac.update(signing_input.as_bytes());
    let signature = mac.finalize().into_bytes();

    Ok(format!(
        "{signing_input}.{}",
        URL_SAFE_NO_PAD.encode(signature)
    ))
}

pub fn decode(token: &str, key: &[u8]) -> Result<Claims, TokenError> {
    let parts: Vec<&str> = token.split('.').collect();
    let &[header64, payload64, signature64] = parts.as_slice() else {
        return Err(TokenError::SegmentCount);
    };

    let header = decode_object(header64).ok_or(TokenError::InvalidHeader)?;
    let payload = decode_object(payload64).ok_or(TokenError::InvalidPayload)?;
    let signature = URL_SAFE_NO_PAD
        .decode(signature64)
        .map_err(|_| TokenError::InvalidSignature)?;

    match header.get("alg") {
        None | Some(Value::Null) => return Err(TokenError::MissingAlgorithm),
        Some(Value::String(alg)) if alg == ALGORITHM => {}
        Some(_) => return Err(TokenError::UnsupportedAlgorithm),
    }

    let mut mac = keyed_mac(key)?;
    mac.update(header64.as_bytes());
    mac.update(b".");
    mac.update(payload64.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::VerificationFailed)?;

    Ok(payload)
}

fn keyed_mac(key: &[u8]) -> Result<HmacSha512, TokenError> {
    HmacSha512::new_from_slice(key).map_err(|_| TokenError::InvalidKey)
}

fn decode_object(segment: &str) -> Option<Claims> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).ok()?;
    match serde_json::from_slice::<Value>(&bytes).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Token codec bound to the process-wide secret key.
#[derive(Clone)]
pub struct TokenCodec {
    key: Arc<[u8]>,
}

impl TokenCodec {
    pub fn new(key: &[u8]) -> Self {
        Self { key: key.into() }
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(claims, &self.key)
    }

    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        decode(token, &self.key)
    }

    /// Issues a fresh access token carrying `{"email": email}`.
    pub fn issue_for_email(&self, email: &str) -> Result<String, TokenError> {
        let mut claims = Claims::new();
        claims.insert("email".into(), Value::String(email.to_owned()));
        let token = self.encode(&claims)?;
        debug!("access token issued");
        Ok(token)
    }

    /// The `email` claim of a verified token, if it carries a string one.
    pub fn email_claim(&self, token: &str) -> Result<Option<String>, TokenError> {
        let claims = self.decode(token)?;
        Ok(match claims.get("email") {
            Some(Value::String(email)) => Some(email.clone()),
            _ => None,
        })
    }
}
