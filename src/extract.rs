//! JSON extractor with automatic validation

use crate::ApiError;
use axum::{async_trait, extract::{FromRequest, Request}, Json};
use serde::de::DeserializeOwned;
use validator::Validate;

/// Deserializes the body, then runs `validator::Validate` on it.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::Validation(e.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}
