//! User routes
//!
//! CRUD over user accounts. Deletion is soft: the row stays, `is_active` flips.

use axum::{extract::State, response::IntoResponse};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::api::{paginate, ApiPath, ApiResponse, Created, PageSource, Pagination, ValidatedJson};
use crate::app::AppState;
use crate::domain::users::{password_issues, CreateUserRequest, UpdateUserRequest, UserResponse};
use crate::error::{ApiError, ApiResult};
use crate::services::hash_password;

const USER_COLUMNS: &str =
    "id, username, email, full_name, is_active, last_login, avatar_url, created_at, updated_at";

/// Database row for user
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    full_name: Option<String>,
    is_active: bool,
    last_login: Option<DateTime<Utc>>,
    avatar_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<UserRow> for UserResponse {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            full_name: row.full_name,
            is_active: row.is_active,
            last_login: row.last_login,
            avatar_url: row.avatar_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Active users in id order
struct ActiveUsers<'a> {
    db: &'a SqlitePool,
}

#[async_trait::async_trait]
impl<'a> PageSource for ActiveUsers<'a> {
    type Item = UserRow;
    type Error = sqlx::Error;

    async fn count(&self) -> Result<u64, sqlx::Error> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_active = 1")
            .fetch_one(self.db)
            .await?;
        Ok(total.max(0) as u64)
    }

    async fn fetch(&self, offset: u64, limit: u64) -> Result<Vec<UserRow>, sqlx::Error> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE is_active = 1 ORDER BY id LIMIT ? OFFSET ?",
            USER_COLUMNS
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(self.db)
        .await
    }
}

async fn fetch_user(db: &SqlitePool, user_id: i64) -> ApiResult<UserRow> {
    sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

fn check_password(password: &str) -> ApiResult<()> {
    let issues = password_issues(password);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!(
            "Password validation failed: {}",
            issues.join(", ")
        )))
    }
}

/// Reject a username or email already held by another active user
async fn ensure_unique(
    db: &SqlitePool,
    username: Option<&str>,
    email: Option<&str>,
    exclude_id: Option<i64>,
) -> ApiResult<()> {
    let exclude_id = exclude_id.unwrap_or(0);

    if let Some(username) = username {
        let taken: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM users WHERE username = ? AND is_active = 1 AND id != ?",
        )
        .bind(username)
        .bind(exclude_id)
        .fetch_optional(db)
        .await?;
        if taken.is_some() {
            return Err(ApiError::conflict("Username already exists"));
        }
    }

    if let Some(email) = email {
        let taken: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM users WHERE email = ? AND is_active = 1 AND id != ?",
        )
        .bind(email)
        .bind(exclude_id)
        .fetch_optional(db)
        .await?;
        if taken.is_some() {
            return Err(ApiError::conflict("Email already exists"));
        }
    }

    Ok(())
}

/// GET /api/v1/users
///
/// List active users.
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Pagination(params): Pagination,
) -> Result<impl IntoResponse, ApiError> {
    let page = paginate(&ActiveUsers { db: &state.db }, params).await?;

    Ok(ApiResponse::success(
        page.map(UserResponse::from),
        "Users retrieved successfully",
    ))
}

/// POST /api/v1/users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.to_lowercase();
    let email = req.email.to_lowercase();

    ensure_unique(&state.db, Some(&username), Some(&email), None).await?;
    check_password(&req.password)?;

    let password_hash = hash_password(&req.password).await?;

    let row = sqlx::query_as::<_, UserRow>(&format!(
        r#"
        INSERT INTO users (username, email, full_name, is_active, password_hash, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(&username)
    .bind(&email)
    .bind(&req.full_name)
    .bind(req.is_active)
    .bind(&password_hash)
    .bind(Utc::now())
    .fetch_one(&state.db)
    .await?;

    tracing::info!(user_id = row.id, username = %row.username, "User created");

    Ok(Created(ApiResponse::success(
        UserResponse::from(row),
        "User created successfully",
    )))
}

/// GET /api/v1/users/:user_id
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    ApiPath(user_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let row = fetch_user(&state.db, user_id).await?;

    Ok(ApiResponse::success(
        UserResponse::from(row),
        "User retrieved successfully",
    ))
}

/// PUT /api/v1/users/:user_id
///
/// Partial update; absent fields keep their current value and an explicit
/// `null` clears a nullable one.
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    ApiPath(user_id): ApiPath<i64>,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    fetch_user(&state.db, user_id).await?;

    let username = req.username.as_deref().map(str::to_lowercase);
    let email = req.email.as_deref().map(str::to_lowercase);
    ensure_unique(&state.db, username.as_deref(), email.as_deref(), Some(user_id)).await?;

    let password_hash = match req.password.as_deref() {
        Some(password) => {
            check_password(password)?;
            Some(hash_password(password).await?)
        }
        None => None,
    };

    let row = sqlx::query_as::<_, UserRow>(&format!(
        r#"
        UPDATE users SET
            username = COALESCE(?, username),
            email = COALESCE(?, email),
            full_name = CASE WHEN ? THEN ? ELSE full_name END,
            password_hash = COALESCE(?, password_hash),
            is_active = COALESCE(?, is_active),
            avatar_url = CASE WHEN ? THEN ? ELSE avatar_url END,
            updated_at = ?
        WHERE id = ?
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(&username)
    .bind(&email)
    .bind(req.full_name.is_some())
    .bind(req.full_name.flatten())
    .bind(&password_hash)
    .bind(req.is_active)
    .bind(req.avatar_url.is_some())
    .bind(req.avatar_url.flatten())
    .bind(Utc::now())
    .bind(user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("User not found"))?;

    tracing::info!(user_id, "User updated");

    Ok(ApiResponse::success(
        UserResponse::from(row),
        "User updated successfully",
    ))
}

/// DELETE /api/v1/users/:user_id
///
/// Soft delete.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    ApiPath(user_id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let result = sqlx::query("UPDATE users SET is_active = 0, updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(user_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::info!(user_id, "User deactivated");

    Ok(ApiResponse::message("User deleted successfully"))
}
