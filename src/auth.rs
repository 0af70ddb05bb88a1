//! Bearer-token identity and permission checks
//!
//! Token issuance lives in the identity service; this side only verifies
//! the HS256 signature and reads the account id and staff flag out of the
//! claims.

use crate::{ApiError, AppState};
use axum::{async_trait, extract::FromRequestParts, http::header, http::request::Parts};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default)]
    pub staff: bool,
    pub exp: i64,
}

/// The authenticated requester.
#[derive(Clone, Copy, Debug)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub is_staff: bool,
}

impl CurrentUser {
    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.is_staff {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }

    /// Staff see every order; everyone else only their own.
    pub fn can_access_order(&self, owner_user_id: Uuid) -> bool {
        self.is_staff || self.user_id == owner_user_id
    }
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|_| ApiError::Unauthorized)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;
        let token = header.strip_prefix("Bearer ").ok_or(ApiError::Unauthorized)?;
        let claims = verify_token(token, &state.config.jwt_secret)?;
        Ok(Self { user_id: claims.sub, is_staff: claims.staff })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(claims: &Claims, secret: &str) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn verify_roundtrip() {
        let claims = Claims { sub: Uuid::new_v4(), staff: true, exp: chrono::Utc::now().timestamp() + 3600 };
        let decoded = verify_token(&token(&claims, "s3cret"), "s3cret").unwrap();
        assert_eq!(decoded.sub, claims.sub);
        assert!(decoded.staff);
    }

    #[test]
    fn rejects_wrong_secret() {
        let claims = Claims { sub: Uuid::new_v4(), staff: false, exp: chrono::Utc::now().timestamp() + 3600 };
        assert!(verify_token(&token(&claims, "s3cret"), "other").is_err());
    }

    #[test]
    fn rejects_expired() {
        let claims = Claims { sub: Uuid::new_v4(), staff: false, exp: chrono::Utc::now().timestamp() - 3600 };
        assert!(verify_token(&token(&claims, "s3cret"), "s3cret").is_err());
    }

    #[test]
    fn staff_predicate() {
        let staff = CurrentUser { user_id: Uuid::new_v4(), is_staff: true };
        let customer = CurrentUser { user_id: Uuid::new_v4(), is_staff: false };
        assert!(staff.require_staff().is_ok());
        assert!(customer.require_staff().is_err());
    }

    #[test]
    fn order_visibility() {
        let owner = Uuid::new_v4();
        let staff = CurrentUser { user_id: Uuid::new_v4(), is_staff: true };
        let same = CurrentUser { user_id: owner, is_staff: false };
        let other = CurrentUser { user_id: Uuid::new_v4(), is_staff: false };
        assert!(staff.can_access_order(owner));
        assert!(same.can_access_order(owner));
        assert!(!other.can_access_order(owner));
    }
}
