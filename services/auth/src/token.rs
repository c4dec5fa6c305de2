//! Stateless signed bearer tokens
//!
//! Tokens are compact JWS strings signed with HMAC-SHA256 under the
//! process-wide secret. They are never persisted and cannot be revoked;
//! expiry is the only way one stops being valid.

use anyhow::Result;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::models::{Principal, Role};

/// Default ephemeral token lifetime (24 hours)
const DEFAULT_TOKEN_EXPIRY: i64 = 86_400;

/// Upper bound on the configured lifetime (one year)
const MAX_TOKEN_EXPIRY: i64 = 365 * 86_400;

/// Token configuration
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Process-wide secret; signs tokens and seeds the credential cipher key
    pub secret: String,
    /// Ephemeral token lifetime in seconds (default: 24 hours)
    pub expiry: i64,
}

impl TokenConfig {
    /// Create a new TokenConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_SECRET`: Signing secret (required)
    /// - `JWT_EXPIRY`: Token expiry in seconds, 1 to 31536000 (default: 86400)
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable not set"))?;

        if secret.is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }
        if secret.len() < 32 {
            warn!("JWT_SECRET is shorter than 32 bytes; use a longer random secret in production");
        }

        let expiry = match std::env::var("JWT_EXPIRY") {
            Ok(value) => value
                .trim()
                .parse::<i64>()
                .map_err(|_| anyhow::anyhow!("JWT_EXPIRY must be a number of seconds"))?,
            Err(_) => DEFAULT_TOKEN_EXPIRY,
        };
        if !(1..=MAX_TOKEN_EXPIRY).contains(&expiry) {
            anyhow::bail!("JWT_EXPIRY must be between 1 and {} seconds", MAX_TOKEN_EXPIRY);
        }

        Ok(TokenConfig { secret, expiry })
    }
}

/// Token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub id: Uuid,
    pub email: String,
    /// Display name
    pub name: String,
    pub role: Role,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiration (unix seconds)
    pub exp: i64,
}

impl Claims {
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
        }
    }
}

/// A freshly minted ephemeral token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Encodes, decodes and verifies ephemeral tokens
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: TokenConfig,
}

impl TokenCodec {
    /// Initialize a new codec from the injected secret
    pub fn new(config: TokenConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        // Expiry is enforced by `verify` against the caller's clock.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        TokenCodec {
            encoding_key,
            decoding_key,
            validation,
            config,
        }
    }

    /// Sign a token for `principal` valid from `issued_at` for `ttl`
    pub fn encode(
        &self,
        principal: &Principal,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> AuthResult<String> {
        if ttl <= Duration::zero() {
            return Err(AuthError::TokenLifetime);
        }

        let iat = issued_at.timestamp();
        let exp = iat
            .checked_add(ttl.num_seconds())
            .ok_or(AuthError::TokenLifetime)?;
        let claims = Claims {
            id: principal.id,
            email: principal.email.clone(),
            name: principal.name.clone(),
            role: principal.role,
            iat,
            exp,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(AuthError::TokenEncoding)
    }

    /// Mint a token for `principal` with the configured lifetime
    pub fn issue(&self, principal: &Principal) -> AuthResult<IssuedToken> {
        let now = Utc::now();
        let ttl = self.expiry().ok_or(AuthError::TokenLifetime)?;
        let token = self.encode(principal, now, ttl)?;
        let expires_at = DateTime::from_timestamp(now.timestamp(), 0)
            .unwrap_or(now)
            .checked_add_signed(ttl)
            .ok_or(AuthError::TokenLifetime)?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Check structure and signature, returning the payload without
    /// looking at expiry
    ///
    /// Structure is checked before the signature: a token whose header or
    /// payload is not base64url JSON is malformed whatever its signature.
    pub fn decode(&self, token: &str) -> AuthResult<Claims> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 {
            return Err(AuthError::MalformedToken);
        }
        for segment in &segments[..2] {
            let bytes = URL_SAFE_NO_PAD
                .decode(segment)
                .map_err(|_| AuthError::MalformedToken)?;
            serde_json::from_slice::<serde_json::Value>(&bytes)
                .map_err(|_| AuthError::MalformedToken)?;
        }

        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::MissingAlgorithm => AuthError::BadSignature,
                _ => AuthError::MalformedToken,
            })
    }

    /// Decode and reject tokens whose expiry is at or before `now`
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> AuthResult<Claims> {
        let claims = self.decode(token)?;

        if now.timestamp() >= claims.exp {
            return Err(AuthError::Expired);
        }

        Ok(claims)
    }

    /// Get the configured token lifetime, if representable
    pub fn expiry(&self) -> Option<Duration> {
        Duration::try_seconds(self.config.expiry)
    }
}
