//! Cart items, scoped to their parent cart
//!
//! One row per (cart, product): adding a product already in the cart
//! increments the stored quantity instead of creating a second row.
//! Accepted shapes differ by verb: POST takes product + quantity, PATCH
//! takes quantity only, GET returns the nested product summary.

use crate::extract::ValidatedJson;
use crate::routes::products::ProductSummary;
use crate::{ApiError, ApiResult, AppState};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/carts/:cart_id/items", get(list_items).post(add_item))
        .route(
            "/carts/:cart_id/items/:item_id",
            get(get_item).patch(update_item).delete(remove_item),
        )
}

#[derive(Debug, Serialize)]
pub struct CartItemResponse {
    pub id: Uuid,
    pub product: ProductSummary,
    pub quantity: i32,
    pub total_price: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    id: Uuid,
    quantity: i32,
    product_id: Uuid,
    name: String,
    unit_price: i64,
}

impl From<CartItemRow> for CartItemResponse {
    fn from(row: CartItemRow) -> Self {
        Self {
            id: row.id,
            total_price: row.unit_price * i64::from(row.quantity),
            quantity: row.quantity,
            product: ProductSummary { id: row.product_id, name: row.name, unit_price: row.unit_price },
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddCartItem {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCartItem {
    #[validate(range(min = 1))]
    pub quantity: i32,
}

pub(crate) async fn load_items(db: &sqlx::PgPool, cart_id: Uuid) -> ApiResult<Vec<CartItemResponse>> {
    let rows = sqlx::query_as::<_, CartItemRow>(
        "SELECT ci.id, ci.quantity, p.id AS product_id, p.name, p.unit_price
         FROM cart_items ci JOIN products p ON p.id = ci.product_id
         WHERE ci.cart_id = $1 ORDER BY p.name",
    )
    .bind(cart_id)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

async fn load_item(db: &sqlx::PgPool, cart_id: Uuid, id: Uuid) -> ApiResult<CartItemResponse> {
    let row = sqlx::query_as::<_, CartItemRow>(
        "SELECT ci.id, ci.quantity, p.id AS product_id, p.name, p.unit_price
         FROM cart_items ci JOIN products p ON p.id = ci.product_id
         WHERE ci.cart_id = $1 AND ci.id = $2",
    )
    .bind(cart_id)
    .bind(id)
    .fetch_optional(db)
    .await?
    .ok_or(ApiError::NotFound)?;
    Ok(row.into())
}

async fn ensure_cart(db: &sqlx::PgPool, cart_id: Uuid) -> ApiResult<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM carts WHERE id = $1)")
        .bind(cart_id)
        .fetch_one(db)
        .await?;
    if exists {
        Ok(())
    } else {
        Err(ApiError::NotFound)
    }
}

async fn list_items(
    State(s): State<AppState>,
    Path(cart_id): Path<Uuid>,
) -> ApiResult<Json<Vec<CartItemResponse>>> {
    ensure_cart(&s.db, cart_id).await?;
    Ok(Json(load_items(&s.db, cart_id).await?))
}

async fn get_item(
    State(s): State<AppState>,
    Path((cart_id, id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<CartItemResponse>> {
    Ok(Json(load_item(&s.db, cart_id, id).await?))
}

async fn add_item(
    State(s): State<AppState>,
    Path(cart_id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<AddCartItem>,
) -> ApiResult<(StatusCode, Json<CartItemResponse>)> {
    ensure_cart(&s.db, cart_id).await?;
    let known_product: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
        .bind(input.product_id)
        .fetch_one(&s.db)
        .await?;
    if !known_product {
        return Err(ApiError::Validation("product does not exist".into()));
    }
    let id: Uuid = sqlx::query_scalar(
        "INSERT INTO cart_items (id, cart_id, product_id, quantity) VALUES ($1, $2, $3, $4)
         ON CONFLICT (cart_id, product_id)
         DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
         RETURNING id",
    )
    .bind(Uuid::now_v7())
    .bind(cart_id)
    .bind(input.product_id)
    .bind(input.quantity)
    .fetch_one(&s.db)
    .await?;
    let item = load_item(&s.db, cart_id, id).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn update_item(
    State(s): State<AppState>,
    Path((cart_id, id)): Path<(Uuid, Uuid)>,
    ValidatedJson(input): ValidatedJson<UpdateCartItem>,
) -> ApiResult<Json<CartItemResponse>> {
    let updated: Option<Uuid> = sqlx::query_scalar(
        "UPDATE cart_items SET quantity = $3 WHERE cart_id = $1 AND id = $2 RETURNING id",
    )
    .bind(cart_id)
    .bind(id)
    .bind(input.quantity)
    .fetch_optional(&s.db)
    .await?;
    let id = updated.ok_or(ApiError::NotFound)?;
    Ok(Json(load_item(&s.db, cart_id, id).await?))
}

async fn remove_item(
    State(s): State<AppState>,
    Path((cart_id, id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND id = $2")
        .bind(cart_id)
        .bind(id)
        .execute(&s.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_must_be_positive() {
        let input = AddCartItem { product_id: Uuid::nil(), quantity: 0 };
        assert!(input.validate().is_err());
        let input = AddCartItem { product_id: Uuid::nil(), quantity: 2 };
        assert!(input.validate().is_ok());
        let input = UpdateCartItem { quantity: -1 };
        assert!(input.validate().is_err());
    }

    #[test]
    fn line_total_is_price_times_quantity() {
        let row = CartItemRow {
            id: Uuid::nil(),
            quantity: 3,
            product_id: Uuid::nil(),
            name: "Mug".into(),
            unit_price: 450,
        };
        let item = CartItemResponse::from(row);
        assert_eq!(item.total_price, 1350);
    }
}
