//! Product comments, scoped to their parent product

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
    Router::new().route("/products/:product_id/comments", get(list_comments).post(create_comment))
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub product_id: Uuid,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CommentInput {
    #[validate(length(min = 1, max = 100))]
    pub author: String,
    #[validate(length(min = 1))]
    pub body: String,
}

async fn ensure_product(db: &sqlx::PgPool, product_id: Uuid) -> ApiResult<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
        .bind(product_id)
        .fetch_one(db)
        .await?;
    if exists {
        Ok(())
    } else {
        Err(ApiError::NotFound)
    }
}

async fn list_comments(
    State(s): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Comment>>> {
    ensure_product(&s.db, product_id).await?;
    let comments = sqlx::query_as::<_, Comment>(
        "SELECT * FROM comments WHERE product_id = $1 ORDER BY created_at",
    )
    .bind(product_id)
    .fetch_all(&s.db)
    .await?;
    Ok(Json(comments))
}

async fn create_comment(
    State(s): State<AppState>,
    Path(product_id): Path<Uuid>,
    ValidatedJson(input): ValidatedJson<CommentInput>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    ensure_product(&s.db, product_id).await?;
    let comment = sqlx::query_as::<_, Comment>(
        "INSERT INTO comments (id, product_id, author, body) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(product_id)
    .bind(&input.author)
    .bind(&input.body)
    .fetch_one(&s.db)
    .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_needs_author_and_body() {
        let input = CommentInput { author: String::new(), body: String::new() };
        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("author"));
        assert!(errors.field_errors().contains_key("body"));
    }
}
