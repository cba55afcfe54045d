//! Authentication gate: password hashing, signed bearer tokens and the
//! role-gating middleware.
//!
//! Tokens are the sole credential; no session state is kept server-side.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use crate::AppState;

/// Tokens expire one hour after issuance.
pub const TOKEN_TTL_SECS: i64 = 3600;

/// bcrypt cost factor for stored password hashes.
pub const BCRYPT_COST: u32 = 12;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_EDITOR: &str = "editor";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id
    pub sub: String,
    pub role: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiration (unix seconds)
    pub exp: i64,
}

/// Hash a password with bcrypt
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    bcrypt::hash(password, BCRYPT_COST).map_err(|e| {
        tracing::error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to hash password")
    })
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Issue a signed token embedding the user id and role
pub fn issue_token(user_id: &str, role: &str, secret: &str) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(TOKEN_TTL_SECS)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("Failed to sign token: {}", e);
        ApiError::internal("Failed to sign token")
    })
}

/// Verify a token's signature and expiry
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let mut validation = Validation::default();
    // No leeway: a token is rejected the second it expires
    validation.leeway = 0;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::invalid_token("Invalid or expired token"))
}

fn bearer_token(request: &Request<Body>) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.to_string())
}

/// Check the request's bearer token against a required role set. An empty
/// set admits any authenticated user. On success the decoded claims are
/// attached to the request's extensions.
fn authorize(
    state: &AppState,
    request: &mut Request<Body>,
    roles: &[&str],
) -> Result<(), ApiError> {
    let token =
        bearer_token(request).ok_or_else(|| ApiError::unauthenticated("Missing bearer token"))?;

    let claims = verify_token(&token, &state.config.auth.jwt_secret)?;

    if !roles.is_empty() && !roles.contains(&claims.role.as_str()) {
        return Err(ApiError::forbidden("Access denied"));
    }

    request.extensions_mut().insert(claims);
    Ok(())
}

/// Middleware gating a route on the admin role
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    authorize(&state, &mut request, &[ROLE_ADMIN])?;
    Ok(next.run(request).await)
}
