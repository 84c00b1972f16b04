use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use transit_core::{Actor, Role};
use transit_forecast::remote::INTERNAL_TOKEN_HEADER;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

/// Claims issued by the identity provider.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

impl From<Claims> for Actor {
    fn from(claims: Claims) -> Self {
        Actor {
            user_id: claims.sub,
            role: Role::from_claim(&claims.role),
        }
    }
}

pub fn decode_actor(token: &str, secret: &str) -> Result<Actor, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::AuthenticationError(format!("Invalid token: {}", e)))?;

    Ok(token_data.claims.into())
}

// ============================================================================
// Authentication Middleware
// ============================================================================

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // 1. Extract token from Authorization header
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::AuthenticationError("Missing bearer token".to_string()))?;

    // 2. Decode and validate JWT
    let actor = decode_actor(token, &state.auth.secret)?;

    // 3. Inject identity; ownership is checked by the booking service
    req.extensions_mut().insert(actor);

    Ok(next.run(req).await)
}

/// Guards the internal estimator endpoints with the shared secret, when one is configured.
pub async fn internal_token_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(expected) = state.auth.internal_token.as_deref() {
        let presented = req
            .headers()
            .get(INTERNAL_TOKEN_HEADER)
            .and_then(|h| h.to_str().ok());
        if presented != Some(expected) {
            return Err(AppError::AuthenticationError(
                "Missing or invalid internal token".to_string(),
            ));
        }
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(role: &str, exp: usize, secret: &str) -> String {
        let claims = Claims {
            sub: "user-1".to_string(),
            role: role.to_string(),
            exp,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn in_an_hour() -> usize {
        (chrono::Utc::now().timestamp() + 3600) as usize
    }

    #[test]
    fn test_decode_roles() {
        let admin = decode_actor(&token("SUPER_ADMIN", in_an_hour(), "s"), "s").unwrap();
        assert!(admin.is_admin());
        assert_eq!(admin.user_id, "user-1");

        let user = decode_actor(&token("CUSTOMER", in_an_hour(), "s"), "s").unwrap();
        assert!(!user.is_admin());
    }

    #[test]
    fn test_rejects_bad_signature_and_expired() {
        assert!(decode_actor(&token("ADMIN", in_an_hour(), "other"), "s").is_err());
        assert!(decode_actor(&token("ADMIN", 1_000, "s"), "s").is_err());
        assert!(decode_actor("garbage", "s").is_err());
    }
}
