//! HS256 session tokens.
//!
//! Tokens use the compact JWT form `header.claims.signature`, each part
//! base64url-encoded without padding. Expiry lives in the signed claims, so
//! any holder of the key can check it without trusting caller metadata.

use crate::error::TokenError;
use crate::store::PrincipalId;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, instrument};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";
const TOKEN_TYPE: &str = "JWT";

/// Process-wide symmetric signing key.
///
/// Loaded once at startup and never rotated while the process runs.
#[derive(Debug)]
pub struct SigningKey(SecretString);

impl SigningKey {
    /// Wrap a secret, rejecting an empty one.
    pub fn new(secret: SecretString) -> Result<Self, TokenError> {
        if secret.expose_secret().is_empty() {
            return Err(TokenError::KeyUnavailable);
        }
        Ok(Self(secret))
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(self.0.expose_secret().as_bytes())
            .map_err(|_| TokenError::KeyUnavailable)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// The principal a token speaks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: PrincipalId,
}

/// Signed token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user: Subject,
    /// Issued-at (Unix seconds)
    pub iat: i64,
    /// Expiry (Unix seconds); the token is invalid from this instant on
    pub exp: i64,
    /// Unique token id, so two tokens minted in the same second differ
    pub jti: Uuid,
}

/// A freshly issued bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub subject_id: PrincipalId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    token: String,
}

impl SessionToken {
    /// Compact signed form handed to the principal.
    pub fn as_str(&self) -> &str {
        &self.token
    }

    pub fn into_string(self) -> String {
        self.token
    }
}

/// Signs and verifies session tokens.
#[derive(Debug)]
pub struct TokenIssuer {
    key: SigningKey,
}

impl TokenIssuer {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Issue a token for `subject_id`, valid for `validity` from now.
    pub fn issue(
        &self,
        subject_id: &PrincipalId,
        validity: Duration,
    ) -> Result<SessionToken, TokenError> {
        self.issue_at(subject_id, validity, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    ///
    /// Timestamps are truncated to whole seconds, so
    /// `expires_at - issued_at` equals `validity` exactly for whole-second
    /// windows. Sub-second remainders of `validity` are dropped.
    #[instrument(skip_all, fields(subject_id = %subject_id))]
    pub fn issue_at(
        &self,
        subject_id: &PrincipalId,
        validity: Duration,
        now: DateTime<Utc>,
    ) -> Result<SessionToken, TokenError> {
        let window = i64::try_from(validity.as_secs()).map_err(|_| TokenError::InvalidWindow)?;
        if window == 0 {
            return Err(TokenError::InvalidWindow);
        }

        let iat = now.timestamp();
        let exp = iat.checked_add(window).ok_or(TokenError::InvalidWindow)?;
        let issued_at = DateTime::from_timestamp(iat, 0).ok_or(TokenError::InvalidWindow)?;
        let expires_at = DateTime::from_timestamp(exp, 0).ok_or(TokenError::InvalidWindow)?;

        let claims = Claims {
            user: Subject {
                id: subject_id.clone(),
            },
            iat,
            exp,
            jti: Uuid::new_v4(),
        };
        let token = self.sign(&claims)?;

        debug!(%expires_at, "Issued session token");

        Ok(SessionToken {
            subject_id: subject_id.clone(),
            issued_at,
            expires_at,
            token,
        })
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: TOKEN_TYPE.to_string(),
        };

        let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        let claims_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
        let signing_input = format!("{header_b64}.{claims_b64}");

        let mut mac = self.key.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature}"))
    }

    /// Check a token's signature and expiry as of `now`.
    ///
    /// A token is expired when `now >= exp`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed);
        };

        let header: Header = serde_json::from_slice(&decode_segment(header_b64)?)?;
        if header.alg != ALGORITHM || !header.typ.eq_ignore_ascii_case(TOKEN_TYPE) {
            return Err(TokenError::UnsupportedHeader);
        }

        let signature = decode_segment(signature_b64)?;
        let mut mac = self.key.mac()?;
        mac.update(format!("{header_b64}.{claims_b64}").as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let claims: Claims = serde_json::from_slice(&decode_segment(claims_b64)?)?;
        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, TokenError> {
    URL_SAFE_NO_PAD
        .decode(segment.as_bytes())
        .map_err(|_| TokenError::Malformed)
}
