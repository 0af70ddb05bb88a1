//! Shopping carts
//!
//! Carts are anonymous and ephemeral: create, fetch, delete. Checkout
//! (`POST /orders`) consumes them.

use crate::routes::cart_items::{self, CartItemResponse};
use crate::{ApiError, ApiResult, AppState};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/carts", post(create_cart))
        .route("/carts/:cart_id", get(get_cart).delete(delete_cart))
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct Cart {
    id: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub items: Vec<CartItemResponse>,
    pub total_price: i64,
}

impl CartResponse {
    fn new(cart: Cart, items: Vec<CartItemResponse>) -> Self {
        let total_price = items.iter().map(|i| i.total_price).sum();
        Self { id: cart.id, created_at: cart.created_at, items, total_price }
    }
}

async fn create_cart(State(s): State<AppState>) -> ApiResult<(StatusCode, Json<CartResponse>)> {
    let cart = sqlx::query_as::<_, Cart>("INSERT INTO carts (id) VALUES ($1) RETURNING *")
        .bind(Uuid::now_v7())
        .fetch_one(&s.db)
        .await?;
    Ok((StatusCode::CREATED, Json(CartResponse::new(cart, vec![]))))
}

async fn get_cart(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<CartResponse>> {
    let cart = sqlx::query_as::<_, Cart>("SELECT * FROM carts WHERE id = $1")
        .bind(id)
        .fetch_optional(&s.db)
        .await?
        .ok_or(ApiError::NotFound)?;
    let items = cart_items::load_items(&s.db, id).await?;
    Ok(Json(CartResponse::new(cart, items)))
}

async fn delete_cart(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    let result = sqlx::query("DELETE FROM carts WHERE id = $1").bind(id).execute(&s.db).await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}
