//! Customer profiles
//!
//! Staff manage the whole collection; `/customers/me` lets any
//! authenticated account read and update its own profile.

use crate::auth::CurrentUser;
use crate::extract::ValidatedJson;
use crate::{ApiError, ApiResult, AppState};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/customers", get(list_customers).post(create_customer))
        .route("/customers/me", get(me).put(update_me))
        .route(
            "/customers/:id",
            get(get_customer).put(replace_customer).patch(update_customer).delete(delete_customer),
        )
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub membership: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    Bronze,
    Silver,
    Gold,
}

impl Membership {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bronze => "bronze",
            Self::Silver => "silver",
            Self::Gold => "gold",
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CustomerInput {
    pub user_id: Uuid,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub membership: Option<Membership>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CustomerUpdate {
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub membership: Option<Membership>,
}

async fn list_customers(State(s): State<AppState>, user: CurrentUser) -> ApiResult<Json<Vec<Customer>>> {
    user.require_staff()?;
    let customers = sqlx::query_as::<_, Customer>("SELECT * FROM customers ORDER BY id")
        .fetch_all(&s.db)
        .await?;
    Ok(Json(customers))
}

async fn create_customer(
    State(s): State<AppState>,
    user: CurrentUser,
    ValidatedJson(input): ValidatedJson<CustomerInput>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    user.require_staff()?;
    let membership = input.membership.unwrap_or(Membership::Bronze);
    let customer = sqlx::query_as::<_, Customer>(
        "INSERT INTO customers (id, user_id, phone, birth_date, membership)
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(input.user_id)
    .bind(&input.phone)
    .bind(input.birth_date)
    .bind(membership.as_str())
    .fetch_one(&s.db)
    .await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

async fn get_customer(
    State(s): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Customer>> {
    user.require_staff()?;
    let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
        .bind(id)
        .fetch_optional(&s.db)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(customer))
}

async fn replace_customer(
    State(s): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    ValidatedJson(update): ValidatedJson<CustomerUpdate>,
) -> ApiResult<Json<Customer>> {
    user.require_staff()?;
    let customer = sqlx::query_as::<_, Customer>(
        "UPDATE customers SET phone = $2, birth_date = $3,
         membership = COALESCE($4, membership) WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&update.phone)
    .bind(update.birth_date)
    .bind(update.membership.map(Membership::as_str))
    .fetch_optional(&s.db)
    .await?
    .ok_or(ApiError::NotFound)?;
    Ok(Json(customer))
}

async fn update_customer(
    State(s): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    ValidatedJson(update): ValidatedJson<CustomerUpdate>,
) -> ApiResult<Json<Customer>> {
    user.require_staff()?;
    let customer = sqlx::query_as::<_, Customer>(
        "UPDATE customers SET phone = COALESCE($2, phone),
         birth_date = COALESCE($3, birth_date),
         membership = COALESCE($4, membership) WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&update.phone)
    .bind(update.birth_date)
    .bind(update.membership.map(Membership::as_str))
    .fetch_optional(&s.db)
    .await?
    .ok_or(ApiError::NotFound)?;
    Ok(Json(customer))
}

async fn delete_customer(
    State(s): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    user.require_staff()?;
    let result = sqlx::query("DELETE FROM customers WHERE id = $1").bind(id).execute(&s.db).await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// The caller's own profile. 404 until staff provision one for the account.
async fn me(State(s): State<AppState>, user: CurrentUser) -> ApiResult<Json<Customer>> {
    let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_optional(&s.db)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(customer))
}

async fn update_me(
    State(s): State<AppState>,
    user: CurrentUser,
    ValidatedJson(update): ValidatedJson<CustomerUpdate>,
) -> ApiResult<Json<Customer>> {
    let customer = sqlx::query_as::<_, Customer>(
        "UPDATE customers SET phone = $2, birth_date = $3,
         membership = COALESCE($4, membership) WHERE user_id = $1 RETURNING *",
    )
    .bind(user.user_id)
    .bind(&update.phone)
    .bind(update.birth_date)
    .bind(update.membership.map(Membership::as_str))
    .fetch_optional(&s.db)
    .await?
    .ok_or(ApiError::NotFound)?;
    Ok(Json(customer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_tiers() {
        assert_eq!(Membership::Bronze.as_str(), "bronze");
        assert_eq!(serde_json::from_str::<Membership>("\"gold\"").unwrap(), Membership::Gold);
        assert!(serde_json::from_str::<Membership>("\"platinum\"").is_err());
    }

    #[test]
    fn phone_length_is_bounded() {
        let update = CustomerUpdate {
            phone: Some("0".repeat(64)),
            birth_date: None,
            membership: None,
        };
        assert!(update.validate().is_err());
    }
}
