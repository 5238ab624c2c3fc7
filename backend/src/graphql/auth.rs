//! GraphQL authentication
//!
//! Sessions are identified by a signed JWT whose subject is the session id.
//! Tokens carry no expiry of their own: the session store slides the session
//! expiry on every request, and a token is only as good as its session. The
//! HTTP handler verifies the token and puts an [`AuthUser`] and an
//! authenticated [`GmpClient`] into the request data; resolvers get them
//! back through [`AuthExt`].

use async_graphql::{Context, ErrorExtensions, Result};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gmp::GmpClient;

/// Secret used to sign session tokens
#[derive(Clone)]
pub struct JwtSecret(String);

impl JwtSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into().trim().to_string())
    }
}

/// User context of an authenticated request
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub session_id: Uuid,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

/// Claims of a session token
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    username: String,
    iat: i64,
}

fn unauthorized(message: impl Into<String>) -> async_graphql::Error {
    async_graphql::Error::new(message).extend_with(|_, e| e.set("code", "UNAUTHORIZED"))
}

/// Sign a token for a session
pub fn issue_token(secret: &JwtSecret, session_id: Uuid, username: &str) -> Result<String> {
    sign(
        secret,
        &Claims {
            sub: session_id.to_string(),
            username: username.to_string(),
            iat: Utc::now().timestamp(),
        },
    )
}

fn sign(secret: &JwtSecret, claims: &Claims) -> Result<String> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.0.as_bytes()),
    )
    .map_err(|e| async_graphql::Error::new(format!("Failed to sign token: {}", e)))
}

/// Verify a token and return the session id it names
pub fn verify_token(secret: &JwtSecret, token: &str) -> Result<Uuid> {
    let mut validation = Validation::new(Algorithm::HS256);
    // Expiry belongs to the session store
    validation.validate_exp = false;
    validation.required_spec_claims.clear();
    validation.validate_aud = false;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.0.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::warn!(error = %e, "JWT verification failed");
        unauthorized(format!("Invalid token: {}", e))
    })?;

    Uuid::parse_str(&token_data.claims.sub).map_err(|_| unauthorized("Invalid token subject"))
}

/// Extension trait to get the authenticated session from GraphQL context
pub trait AuthExt {
    /// Get the authenticated user, or return an error if not authenticated
    fn auth_user(&self) -> Result<&AuthUser>;

    /// Get the GMP client of the authenticated session
    fn gmp(&self) -> Result<&GmpClient>;
}

impl<'a> AuthExt for Context<'a> {
    fn auth_user(&self) -> Result<&AuthUser> {
        self.data_opt::<AuthUser>()
            .ok_or_else(|| unauthorized("Authentication required"))
    }

    fn gmp(&self) -> Result<&GmpClient> {
        self.data_opt::<GmpClient>()
            .ok_or_else(|| unauthorized("Authentication required"))
    }
}
