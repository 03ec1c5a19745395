// ABOUTME: Token authority issuing and verifying stateless HS256 bearer credentials
// ABOUTME: Owns the token-version counter and the global revocation cutoff as atomics
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 dravr.ai

//! # Token Authority
//!
//! Tokens are never stored server-side. A token is valid when its MAC
//! matches the live signing secret, both key ids match the live
//! fingerprint, its scope is exact, it is within its validity window,
//! and it was created at or after the global revocation cutoff.
//!
//! The `token_version` claim is recorded for wire compatibility but is
//! not compared during verification.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{
    decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::secrets::SecretStore;
use crate::types::{CallerIdentity, GatewayError};

/// Scope stamped into every token minted by this gateway
pub const TOKEN_SCOPE: &str = "api_gateway";

/// Validity window of an issued token (30 days)
pub const TOKEN_VALIDITY: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Key age after which issuance logs a rotation reminder
const KEY_ROTATION_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Case-insensitive bearer scheme prefix
const BEARER_PREFIX: &str = "bearer ";

/// Symmetric MAC algorithms accepted at verification
const MAC_ALGORITHMS: &[Algorithm] = &[Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Claims carried by a gateway token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Unique token id
    pub jti: String,
    /// Issued-at (unix seconds)
    pub iat: u64,
    /// Not-before (unix seconds)
    pub nbf: u64,
    /// Expiry (unix seconds)
    pub exp: u64,
    /// Resolved caller identity
    #[serde(rename = "container_id")]
    pub subject_id: String,
    /// Identity asserted by the upstream caller, when present
    #[serde(rename = "magic_user_id", default, skip_serializing_if = "Option::is_none")]
    pub upstream_user_id: Option<String>,
    /// Caller organization
    #[serde(
        rename = "magic_organization_code",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub org_code: Option<String>,
    /// Token-version counter value at issuance
    pub token_version: u64,
    /// Issuance time compared against the revocation cutoff
    pub created_at: u64,
    /// Fingerprint of the signing secret at issuance
    #[serde(rename = "kid")]
    pub key_id: String,
    /// Random anti-replay marker (128 bits, hex)
    pub nonce: String,
    /// Always [`TOKEN_SCOPE`]
    pub scope: String,
}

/// A freshly signed token with the claims it carries
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Compact JWS serialisation
    pub token: String,
    /// Claims embedded in the token
    pub claims: Claims,
}

/// Why a presented token was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRejection {
    /// Not a parseable token
    Malformed(String),
    /// Header declares an algorithm outside the symmetric MAC family
    AlgorithmMismatch(String),
    /// Header key id missing or not the live fingerprint
    HeaderKeyMismatch(Option<String>),
    /// MAC does not match the live secret
    BadSignature,
    /// Past its expiry
    Expired,
    /// Before its not-before time
    NotYetValid,
    /// Scope is not [`TOKEN_SCOPE`]
    WrongScope(String),
    /// Created before the global revocation cutoff
    Revoked {
        /// Token creation time
        created_at: u64,
        /// Active cutoff
        cutoff: u64,
    },
    /// Claims key id is not the live fingerprint
    ClaimsKeyMismatch(String),
}

impl fmt::Display for TokenRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(details) => write!(f, "malformed token: {details}"),
            Self::AlgorithmMismatch(alg) => write!(f, "unexpected signing algorithm: {alg}"),
            Self::HeaderKeyMismatch(kid) => {
                write!(f, "header key id mismatch: {}", kid.as_deref().unwrap_or("<none>"))
            }
            Self::BadSignature => write!(f, "signature verification failed"),
            Self::Expired => write!(f, "token expired"),
            Self::NotYetValid => write!(f, "token not yet valid"),
            Self::WrongScope(scope) => write!(f, "invalid scope: {scope}"),
            Self::Revoked { created_at, cutoff } => {
                write!(f, "token created at {created_at} precedes revocation cutoff {cutoff}")
            }
            Self::ClaimsKeyMismatch(kid) => write!(f, "claims key id mismatch: {kid}"),
        }
    }
}

impl std::error::Error for TokenRejection {}

/// Issues and verifies gateway tokens
pub struct TokenAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    key_id: String,
    token_version: AtomicU64,
    revoke_before: AtomicU64,
    key_loaded_at: Instant,
}

impl TokenAuthority {
    /// Create an authority bound to the store's signing secret
    pub fn new(store: &SecretStore) -> Self {
        let secret = store.signing_secret().as_bytes();
        info!(key_id = %store.key_id(), "Token authority initialised");
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            key_id: store.key_id().to_owned(),
            token_version: AtomicU64::new(0),
            revoke_before: AtomicU64::new(0),
            key_loaded_at: Instant::now(),
        }
    }

    /// Fingerprint of the live signing secret
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Most recently issued token version
    pub fn current_version(&self) -> u64 {
        self.token_version.load(Ordering::SeqCst)
    }

    /// Active revocation cutoff (unix seconds, 0 when never revoked)
    pub fn revoke_timestamp(&self) -> u64 {
        self.revoke_before.load(Ordering::SeqCst)
    }

    /// Issue a token for the caller at the current time
    pub fn issue(&self, identity: &CallerIdentity) -> Result<IssuedToken, GatewayError> {
        self.issue_at(identity, unix_timestamp())
    }

    /// Issue a token as if the current time were `now`
    pub fn issue_at(&self, identity: &CallerIdentity, now: u64) -> Result<IssuedToken, GatewayError> {
        self.check_key_rotation();

        let subject = identity.subject().to_owned();
        let version = self.token_version.fetch_add(1, Ordering::SeqCst) + 1;

        let claims = Claims {
            jti: format!("{}-{subject}", unix_nanos()),
            iat: now,
            nbf: now,
            exp: now + TOKEN_VALIDITY.as_secs(),
            subject_id: subject,
            upstream_user_id: identity
                .upstream_user_id
                .clone()
                .filter(|v| !v.is_empty()),
            org_code: identity
                .organization_code
                .clone()
                .filter(|v| !v.is_empty()),
            token_version: version,
            created_at: now,
            key_id: self.key_id.clone(),
            nonce: generate_nonce(),
            scope: TOKEN_SCOPE.to_owned(),
        };

        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(self.key_id.clone());

        let token = encode(&header, &claims, &self.encoding_key)
            .map_err(|e| GatewayError::internal(format!("Failed to sign token: {e}")))?;

        info!(
            version,
            key_id = %self.key_id,
            subject = %claims.subject_id,
            "Issued gateway token"
        );

        Ok(IssuedToken { token, claims })
    }

    /// Verify a presented token, with or without its `Bearer ` prefix
    ///
    /// Every rejection is logged here; callers should only surface a
    /// generic unauthorized response.
    pub fn verify(&self, presented: &str) -> Result<Claims, TokenRejection> {
        let result = self.verify_inner(strip_bearer(presented.trim()));
        if let Err(ref rejection) = result {
            warn!(reason = %rejection, "Token rejected");
        }
        result
    }

    fn verify_inner(&self, token: &str) -> Result<Claims, TokenRejection> {
        let header = decode_header(token).map_err(|e| TokenRejection::Malformed(e.to_string()))?;

        if !MAC_ALGORITHMS.contains(&header.alg) {
            return Err(TokenRejection::AlgorithmMismatch(format!("{:?}", header.alg)));
        }
        if header.kid.as_deref() != Some(self.key_id.as_str()) {
            return Err(TokenRejection::HeaderKeyMismatch(header.kid));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = MAC_ALGORITHMS.to_vec();
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf"]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| convert_jwt_error(&e))?;

        if claims.scope != TOKEN_SCOPE {
            return Err(TokenRejection::WrongScope(claims.scope));
        }

        let cutoff = self.revoke_timestamp();
        if claims.created_at < cutoff {
            return Err(TokenRejection::Revoked {
                created_at: claims.created_at,
                cutoff,
            });
        }

        if claims.key_id != self.key_id {
            return Err(TokenRejection::ClaimsKeyMismatch(claims.key_id));
        }

        debug!(subject = %claims.subject_id, version = claims.token_version, "Token verified");
        Ok(claims)
    }

    /// Invalidate every token created before now
    pub fn revoke_all(&self) -> u64 {
        self.revoke_all_at(unix_timestamp())
    }

    /// Move the revocation cutoff to `timestamp`; the cutoff never moves backwards
    pub fn revoke_all_at(&self, timestamp: u64) -> u64 {
        let previous = self.revoke_before.fetch_max(timestamp, Ordering::SeqCst);
        let cutoff = previous.max(timestamp);
        info!(cutoff, "Revoked all tokens issued before cutoff");
        cutoff
    }

    fn check_key_rotation(&self) {
        let age = self.key_loaded_at.elapsed();
        if age > KEY_ROTATION_INTERVAL {
            info!(
                key_id = %self.key_id,
                age_secs = age.as_secs(),
                "Signing key has exceeded its rotation interval"
            );
        }
    }
}

impl fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("key_id", &self.key_id)
            .field("token_version", &self.current_version())
            .field("revoke_before", &self.revoke_timestamp())
            .finish_non_exhaustive()
    }
}

/// Remove a case-insensitive `Bearer ` prefix, if present
pub fn strip_bearer(value: &str) -> &str {
    match value.get(..BEARER_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(BEARER_PREFIX) => {
            value.get(BEARER_PREFIX.len()..).unwrap_or_default().trim_start()
        }
        _ => value,
    }
}

/// Whether a header value already carries the bearer scheme
pub fn has_bearer_prefix(value: &str) -> bool {
    value
        .get(..BEARER_PREFIX.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(BEARER_PREFIX))
}

/// Current unix timestamp in seconds
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn unix_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

/// 128 random bits, hex-encoded
fn generate_nonce() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

fn convert_jwt_error(e: &jsonwebtoken::errors::Error) -> TokenRejection {
    match e.kind() {
        JwtErrorKind::ExpiredSignature => TokenRejection::Expired,
        JwtErrorKind::ImmatureSignature => TokenRejection::NotYetValid,
        JwtErrorKind::InvalidSignature => TokenRejection::BadSignature,
        JwtErrorKind::InvalidAlgorithm => TokenRejection::AlgorithmMismatch(e.to_string()),
        _ => TokenRejection::Malformed(e.to_string()),
    }
}
