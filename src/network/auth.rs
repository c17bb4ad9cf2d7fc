//! Decryption Authorizations
//!
//! A verifier asks the encryption oracle for plaintext by presenting a
//! signed authorization: requester identity, a validity window
//! (`startTimestamp`, `durationDays`) and the contracts whose ciphertexts
//! it may read. Authorizations are HS256 JWTs.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::state::Identity;

/// Seconds per day of authorization validity.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Validity used by the verification flow when none is given.
pub const DEFAULT_DURATION_DAYS: u32 = 10;

/// Longest window accepted when signing.
pub const MAX_DURATION_DAYS: u32 = 365;

/// Authorization configuration.
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    /// Issuer claim written on signing and required on validation, if set.
    pub issuer: Option<String>,
    /// HS256 secret.
    pub secret: Option<String>,
    /// Whether to skip window validation (for testing only).
    pub skip_expiry: bool,
}

impl AuthConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            issuer: std::env::var("AUTH_ISSUER").ok(),
            secret: std::env::var("AUTH_SECRET").ok(),
            skip_expiry: std::env::var("AUTH_SKIP_EXPIRY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    /// Config with a fixed secret.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
            ..Default::default()
        }
    }

    /// Check if signing and validation are possible.
    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }
}

/// Claims carried by an authorization token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationClaims {
    /// Requester identity (checksummed hex).
    pub sub: String,
    /// Start of the window (Unix seconds).
    pub nbf: u64,
    /// Issued at (equal to the window start).
    pub iat: u64,
    /// End of the window (Unix seconds).
    pub exp: u64,
    /// Contracts whose ciphertexts may be decrypted.
    pub contracts: Vec<Identity>,
    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl AuthorizationClaims {
    /// Does this authorization cover ciphertexts of `contract`?
    pub fn covers(&self, contract: &Identity) -> bool {
        self.contracts.contains(contract)
    }
}

/// Signed authorization presented with a decrypt request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptAuthorization {
    /// Identity asking for plaintext.
    pub requester: Identity,
    /// Start of the window (Unix seconds).
    pub start_timestamp: u64,
    /// Window length in days.
    pub duration_days: u32,
    /// Signed token.
    pub token: String,
}

impl DecryptAuthorization {
    /// End of the window (Unix seconds).
    pub fn expires_at(&self) -> u64 {
        window_end(self.start_timestamp, self.duration_days)
    }
}

fn window_end(start: u64, days: u32) -> u64 {
    start.saturating_add(days as u64 * SECONDS_PER_DAY)
}

/// Authorization errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No secret configured.
    #[error("authorization not configured")]
    NotConfigured,
    /// Token format is invalid.
    #[error("invalid token format")]
    InvalidFormat,
    /// Token signature verification failed.
    #[error("invalid signature")]
    InvalidSignature,
    /// Window has ended.
    #[error("authorization expired")]
    Expired,
    /// Window has not started.
    #[error("authorization not yet valid")]
    NotYetValid,
    /// Issuer claim doesn't match expected value.
    #[error("invalid issuer")]
    InvalidIssuer,
    /// Required claim is missing.
    #[error("missing required claim: {0}")]
    MissingClaim(String),
    /// Token subject differs from the stated requester.
    #[error("token subject does not match requester {0}")]
    SubjectMismatch(Identity),
    /// Token window differs from the stated window.
    #[error("token window does not match stated window")]
    WindowMismatch,
    /// Duration outside `1..=MAX_DURATION_DAYS`.
    #[error("invalid duration: {0} days")]
    InvalidWindow(u32),
    /// JWT decoding error.
    #[error("decode error: {0}")]
    DecodeError(String),
    /// JWT encoding error.
    #[error("encode error: {0}")]
    EncodeError(String),
}

/// Sign an authorization for `requester` over `contracts`.
pub fn sign_authorization(
    requester: &Identity,
    contracts: &[Identity],
    start_timestamp: u64,
    duration_days: u32,
    config: &AuthConfig,
) -> Result<DecryptAuthorization, AuthError> {
    let secret = config.secret.as_ref().ok_or(AuthError::NotConfigured)?;
    if duration_days == 0 || duration_days > MAX_DURATION_DAYS {
        return Err(AuthError::InvalidWindow(duration_days));
    }

    let claims = AuthorizationClaims {
        sub: requester.to_checksum(),
        nbf: start_timestamp,
        iat: start_timestamp,
        exp: window_end(start_timestamp, duration_days),
        contracts: contracts.to_vec(),
        iss: config.issuer.clone(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::EncodeError(e.to_string()))?;

    Ok(DecryptAuthorization {
        requester: *requester,
        start_timestamp,
        duration_days,
        token,
    })
}

/// Validate an authorization against the current time.
pub fn validate_authorization(
    authorization: &DecryptAuthorization,
    config: &AuthConfig,
) -> Result<AuthorizationClaims, AuthError> {
    let now = chrono::Utc::now().timestamp().max(0) as u64;
    validate_authorization_at(authorization, config, now)
}

/// Validate an authorization at a given Unix time.
pub fn validate_authorization_at(
    authorization: &DecryptAuthorization,
    config: &AuthConfig,
    now: u64,
) -> Result<AuthorizationClaims, AuthError> {
    let secret = config.secret.as_ref().ok_or(AuthError::NotConfigured)?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.required_spec_claims = std::collections::HashSet::new();
    validation.validate_aud = false;
    // Window checked below against `now`
    validation.validate_exp = false;
    validation.validate_nbf = false;
    if let Some(ref issuer) = config.issuer {
        validation.set_issuer(&[issuer]);
    }

    let token_data: TokenData<AuthorizationClaims> = decode(
        &authorization.token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(map_jwt_error)?;
    let claims = token_data.claims;

    if claims.sub.is_empty() {
        return Err(AuthError::MissingClaim("sub".into()));
    }
    let subject: Identity = claims
        .sub
        .parse()
        .map_err(|_| AuthError::SubjectMismatch(authorization.requester))?;
    if subject != authorization.requester {
        return Err(AuthError::SubjectMismatch(authorization.requester));
    }

    if claims.nbf != authorization.start_timestamp || claims.exp != authorization.expires_at() {
        return Err(AuthError::WindowMismatch);
    }

    if !config.skip_expiry {
        if now < claims.nbf {
            return Err(AuthError::NotYetValid);
        }
        if now > claims.exp {
            return Err(AuthError::Expired);
        }
    }

    Ok(claims)
}

/// Map JWT library errors to our error type.
fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::ImmatureSignature => AuthError::NotYetValid,
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
        ErrorKind::InvalidToken | ErrorKind::Base64(_) => AuthError::InvalidFormat,
        _ => AuthError::DecodeError(err.to_string()),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;

    const SECRET: &str = "test-secret-key-256-bits-long!!";
    const START: u64 = 1_700_000_000;

    fn requester() -> Identity {
        Identity::new(Address::repeat_byte(0x11))
    }

    fn contract() -> Identity {
        Identity::new(Address::repeat_byte(0xCC))
    }

    fn signed(config: &AuthConfig) -> DecryptAuthorization {
        sign_authorization(&requester(), &[contract()], START, DEFAULT_DURATION_DAYS, config).unwrap()
    }

    #[test]
    fn test_valid_authorization() {
        let config = AuthConfig::with_secret(SECRET);
        let auth = signed(&config);

        let claims = validate_authorization_at(&auth, &config, START + 60).unwrap();
        assert_eq!(claims.sub, requester().to_checksum());
        assert!(claims.covers(&contract()));
        assert!(!claims.covers(&requester()));
        assert_eq!(claims.exp, START + 10 * SECONDS_PER_DAY);
    }

    #[test]
    fn test_expired_rejected() {
        let config = AuthConfig::with_secret(SECRET);
        let auth = signed(&config);

        let result = validate_authorization_at(&auth, &config, auth.expires_at() + 1);
        assert!(matches!(result, Err(AuthError::Expired)));
    }

    #[test]
    fn test_not_yet_valid_rejected() {
        let config = AuthConfig::with_secret(SECRET);
        let auth = signed(&config);

        let result = validate_authorization_at(&auth, &config, START - 1);
        assert!(matches!(result, Err(AuthError::NotYetValid)));
    }

    #[test]
    fn test_invalid_signature_rejected() {
        let auth = signed(&AuthConfig::with_secret("correct-secret-key-here!!!!!"));
        let config = AuthConfig::with_secret("wrong-secret-key-here!!!!!!");

        let result = validate_authorization_at(&auth, &config, START);
        assert!(matches!(result, Err(AuthError::InvalidSignature)));
    }

    #[test]
    fn test_requester_swap_rejected() {
        let config = AuthConfig::with_secret(SECRET);
        let mut auth = signed(&config);
        auth.requester = Identity::new(Address::repeat_byte(0x22));

        let result = validate_authorization_at(&auth, &config, START);
        assert!(matches!(result, Err(AuthError::SubjectMismatch(_))));
    }

    #[test]
    fn test_window_stretch_rejected() {
        let config = AuthConfig::with_secret(SECRET);
        let mut auth = signed(&config);
        auth.duration_days = 100;

        let result = validate_authorization_at(&auth, &config, START);
        assert!(matches!(result, Err(AuthError::WindowMismatch)));
    }

    #[test]
    fn test_issuer_validation() {
        let config = AuthConfig {
            issuer: Some("other".into()),
            ..AuthConfig::with_secret(SECRET)
        };
        let auth = signed(&config);

        let strict = AuthConfig {
            issuer: Some("verifier".into()),
            ..AuthConfig::with_secret(SECRET)
        };

        let result = validate_authorization_at(&auth, &strict, START);
        assert!(matches!(result, Err(AuthError::InvalidIssuer)));
    }

    #[test]
    fn test_zero_duration_rejected() {
        let config = AuthConfig::with_secret(SECRET);
        let result = sign_authorization(&requester(), &[contract()], START, 0, &config);
        assert_eq!(result, Err(AuthError::InvalidWindow(0)));
    }

    #[test]
    fn test_not_configured_error() {
        let config = AuthConfig::default();
        let result = sign_authorization(&requester(), &[], START, 1, &config);
        assert!(matches!(result, Err(AuthError::NotConfigured)));
    }

    #[test]
    fn test_skip_expiry_for_testing() {
        let config = AuthConfig {
            skip_expiry: true,
            ..AuthConfig::with_secret(SECRET)
        };
        let auth = signed(&config);

        let result = validate_authorization_at(&auth, &config, START + 400 * SECONDS_PER_DAY);
        assert!(result.is_ok());
    }
}
