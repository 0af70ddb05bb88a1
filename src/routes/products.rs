//! Product catalog endpoints
//!
//! Reads are open; writes are staff-only. Deleting a product is refused
//! while order items still reference it.

use crate::auth::CurrentUser;
use crate::extract::ValidatedJson;
use crate::pagination::{Page, Paginated};
use crate::{ApiError, ApiResult, AppState};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/:product_id",
            get(get_product).put(replace_product).patch(update_product).delete(delete_product),
        )
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub unit_price: i64,
    pub inventory: i32,
    pub category_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Reduced shape nested inside cart and order items.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub unit_price: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProductInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub unit_price: i64,
    #[validate(range(min = 0))]
    pub inventory: Option<i32>,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProductPatch {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub unit_price: Option<i64>,
    #[validate(range(min = 0))]
    pub inventory: Option<i32>,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductFilters {
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    pub inventory_lt: Option<i32>,
    pub ordering: Option<String>,
}

fn order_clause(ordering: &str) -> Option<&'static str> {
    match ordering {
        "name" => Some("name ASC"),
        "-name" => Some("name DESC"),
        "unit_price" => Some("unit_price ASC"),
        "-unit_price" => Some("unit_price DESC"),
        "inventory" => Some("inventory ASC"),
        "-inventory" => Some("inventory DESC"),
        _ => None,
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filters: &ProductFilters) {
    if let Some(category_id) = filters.category_id {
        qb.push(" AND category_id = ").push_bind(category_id);
    }
    if let Some(inventory_lt) = filters.inventory_lt {
        qb.push(" AND inventory < ").push_bind(inventory_lt);
    }
    if let Some(search) = &filters.search {
        let pattern = format!("%{}%", search);
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR category_id IN (SELECT id FROM categories WHERE title ILIKE ")
            .push_bind(pattern)
            .push("))");
    }
}

async fn list_products(
    State(s): State<AppState>,
    Query(page): Query<Page>,
    Query(filters): Query<ProductFilters>,
) -> ApiResult<Json<Paginated<Product>>> {
    let order = match filters.ordering.as_deref() {
        Some(o) => order_clause(o).ok_or_else(|| ApiError::Validation(format!("cannot order by '{}'", o)))?,
        None => "created_at DESC",
    };

    let mut qb = QueryBuilder::new("SELECT * FROM products WHERE TRUE");
    push_filters(&mut qb, &filters);
    qb.push(" ORDER BY ").push(order);
    qb.push(" LIMIT ").push_bind(page.limit()).push(" OFFSET ").push_bind(page.offset());
    let products = qb.build_query_as::<Product>().fetch_all(&s.db).await?;

    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM products WHERE TRUE");
    push_filters(&mut count, &filters);
    let total: i64 = count.build_query_scalar().fetch_one(&s.db).await?;

    Ok(Json(Paginated { data: products, total, page: page.number() }))
}

async fn get_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Product>> {
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&s.db)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(product))
}

async fn create_product(
    State(s): State<AppState>,
    user: CurrentUser,
    ValidatedJson(input): ValidatedJson<ProductInput>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    user.require_staff()?;
    let product = sqlx::query_as::<_, Product>(
        "INSERT INTO products (id, name, description, unit_price, inventory, category_id)
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.unit_price)
    .bind(input.inventory.unwrap_or(0))
    .bind(input.category_id)
    .fetch_one(&s.db)
    .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn replace_product(
    State(s): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<ProductInput>,
) -> ApiResult<Json<Product>> {
    user.require_staff()?;
    let product = sqlx::query_as::<_, Product>(
        "UPDATE products SET name = $2, description = $3, unit_price = $4, inventory = $5,
         category_id = $6, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&input.name)
    .bind(&input.description)
    .bind(input.unit_price)
    .bind(input.inventory.unwrap_or(0))
    .bind(input.category_id)
    .fetch_optional(&s.db)
    .await?
    .ok_or(ApiError::NotFound)?;
    Ok(Json(product))
}

async fn update_product(
    State(s): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    ValidatedJson(patch): ValidatedJson<ProductPatch>,
) -> ApiResult<Json<Product>> {
    user.require_staff()?;
    let product = sqlx::query_as::<_, Product>(
        "UPDATE products SET name = COALESCE($2, name), description = COALESCE($3, description),
         unit_price = COALESCE($4, unit_price), inventory = COALESCE($5, inventory),
         category_id = COALESCE($6, category_id), updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&patch.name)
    .bind(&patch.description)
    .bind(patch.unit_price)
    .bind(patch.inventory)
    .bind(patch.category_id)
    .fetch_optional(&s.db)
    .await?
    .ok_or(ApiError::NotFound)?;
    Ok(Json(product))
}

async fn delete_product(
    State(s): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    user.require_staff()?;
    let referenced: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_items WHERE product_id = $1")
        .bind(id)
        .fetch_one(&s.db)
        .await?;
    if referenced > 0 {
        return Err(ApiError::DeleteBlocked(
            "some order items include this product, remove them first".into(),
        ));
    }
    let result = sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(&s.db).await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_whitelist() {
        assert_eq!(order_clause("name"), Some("name ASC"));
        assert_eq!(order_clause("-unit_price"), Some("unit_price DESC"));
        assert_eq!(order_clause("inventory"), Some("inventory ASC"));
        assert_eq!(order_clause("id"), None);
        assert_eq!(order_clause("name; DROP TABLE products"), None);
    }

    #[test]
    fn filters_render_bound_parameters() {
        let filters = ProductFilters {
            search: Some("mug".into()),
            category_id: Some(Uuid::nil()),
            inventory_lt: Some(5),
            ordering: None,
        };
        let mut qb = QueryBuilder::new("SELECT * FROM products WHERE TRUE");
        push_filters(&mut qb, &filters);
        assert_eq!(
            qb.into_sql(),
            "SELECT * FROM products WHERE TRUE AND category_id = $1 AND inventory < $2 \
             AND (name ILIKE $3 OR category_id IN (SELECT id FROM categories WHERE title ILIKE $4))"
        );
    }

    #[test]
    fn no_filters_no_clauses() {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM products WHERE TRUE");
        push_filters(&mut qb, &ProductFilters::default());
        assert_eq!(qb.into_sql(), "SELECT COUNT(*) FROM products WHERE TRUE");
    }

    #[test]
    fn input_validation() {
        let input = ProductInput {
            name: String::new(),
            description: None,
            unit_price: -1,
            inventory: None,
            category_id: None,
        };
        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
        assert!(errors.field_errors().contains_key("unit_price"));
    }
}
