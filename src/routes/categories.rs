//! Category endpoints
//!
//! Reads are open; writes are staff-only. Deleting a category is refused
//! while products still reference it.

use crate::auth::CurrentUser;
use crate::extract::ValidatedJson;
use crate::{ApiError, ApiResult, AppState};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/:id",
            get(get_category).put(replace_category).patch(replace_category).delete(delete_category),
        )
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
}

async fn list_categories(State(s): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    let categories = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY title")
        .fetch_all(&s.db)
        .await?;
    Ok(Json(categories))
}

async fn get_category(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Category>> {
    let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
        .bind(id)
        .fetch_optional(&s.db)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(category))
}

async fn create_category(
    State(s): State<AppState>,
    user: CurrentUser,
    ValidatedJson(input): ValidatedJson<CategoryInput>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    user.require_staff()?;
    let category = sqlx::query_as::<_, Category>(
        "INSERT INTO categories (id, title) VALUES ($1, $2) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&input.title)
    .fetch_one(&s.db)
    .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn replace_category(
    State(s): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<CategoryInput>,
) -> ApiResult<Json<Category>> {
    user.require_staff()?;
    let category = sqlx::query_as::<_, Category>(
        "UPDATE categories SET title = $2 WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&input.title)
    .fetch_optional(&s.db)
    .await?
    .ok_or(ApiError::NotFound)?;
    Ok(Json(category))
}

async fn delete_category(
    State(s): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    user.require_staff()?;
    let referenced: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE category_id = $1")
        .bind(id)
        .fetch_one(&s.db)
        .await?;
    if referenced > 0 {
        return Err(ApiError::DeleteBlocked(
            "some products include this category, remove them first".into(),
        ));
    }
    let result = sqlx::query("DELETE FROM categories WHERE id = $1").bind(id).execute(&s.db).await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_required() {
        let input = CategoryInput { title: String::new() };
        assert!(input.validate().is_err());
        let input = CategoryInput { title: "Beverages".into() };
        assert!(input.validate().is_ok());
    }
}
