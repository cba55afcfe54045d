//! User endpoints: registration, login, role-gated admin CRUD and the
//! admin bootstrap count.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{CountResponse, LoginRequest, LoginResponse, RegisterRequest, User, UserResponse};
use crate::AppState;

use super::auth::{hash_password, issue_token, verify_password, ROLE_ADMIN};
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_password, validate_role, validate_username};
use super::{non_empty, read_form, ListQuery};

async fn fetch_user(state: &AppState, id: &str) -> Result<User, ApiError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

async fn username_taken(
    state: &AppState,
    username: &str,
    exclude_id: Option<&str>,
) -> Result<bool, ApiError> {
    let existing: Option<(String,)> =
        sqlx::query_as("SELECT id FROM users WHERE username = ? AND id != COALESCE(?, '')")
            .bind(username)
            .bind(exclude_id)
            .fetch_optional(&state.db)
            .await?;
    Ok(existing.is_some())
}

/// Register a new user. The role defaults to `admin` when unspecified.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let name = req.name.as_deref().unwrap_or("").trim().to_string();
    let username = req.username.as_deref().unwrap_or("").trim().to_string();
    let password = req.password.as_deref().unwrap_or("").to_string();
    let role = req.role.as_deref().unwrap_or(ROLE_ADMIN).to_string();

    let mut errors = ValidationErrorBuilder::new();
    if name.is_empty() {
        errors.add("name", "Name is required");
    }
    if let Err(e) = validate_username(&username) {
        errors.add("username", e);
    }
    if let Err(e) = validate_password(&password) {
        errors.add("password", e);
    }
    if let Err(e) = validate_role(&role) {
        errors.add("role", e);
    }
    errors.finish()?;

    if username_taken(&state, &username, None).await? {
        return Err(ApiError::conflict("This username is already in use"));
    }

    let password_hash = hash_password(&password)?;
    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO users (id, name, username, password_hash, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&name)
    .bind(&username)
    .bind(&password_hash)
    .bind(&role)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let user = fetch_user(&state, &id).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// Log in with username and password; returns the user and a bearer token
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(&req.username)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::invalid_credentials("Invalid credentials"));
    }

    let token = issue_token(&user.id, &user.role, &state.config.auth.jwt_secret)?;

    Ok(Json(LoginResponse {
        user: UserResponse::from(user),
        token,
    }))
}

/// List all users, sorted. Admin only.
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let (field, dir) = query.sort("username")?;

    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT * FROM users ORDER BY {} {}",
        field, dir
    ))
    .fetch_all(&state.db)
    .await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Get a user by id. Admin only.
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = fetch_user(&state, &id).await?;
    Ok(Json(UserResponse::from(user)))
}

/// Update a user. Admin only. Multipart with all fields optional; a new
/// profile image replaces and deletes the old file, a new password is
/// re-validated and re-hashed.
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<UserResponse>, ApiError> {
    let existing = fetch_user(&state, &id).await?;
    let form = read_form(multipart, "image").await?;

    let mut errors = ValidationErrorBuilder::new();
    if let Some(username) = non_empty(form.text("username")) {
        if let Err(e) = validate_username(username) {
            errors.add("username", e);
        }
    }
    if let Some(password) = non_empty(form.text("password")) {
        if let Err(e) = validate_password(password) {
            errors.add("password", e);
        }
    }
    if let Some(role) = non_empty(form.text("role")) {
        if let Err(e) = validate_role(role) {
            errors.add("role", e);
        }
    }
    errors.finish()?;

    if let Some(username) = non_empty(form.text("username")) {
        if username_taken(&state, username, Some(&id)).await? {
            return Err(ApiError::conflict("This username is already in use"));
        }
    }

    let password_hash = match non_empty(form.text("password")) {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    let new_image = match form.file {
        Some(ref upload) => {
            let filename = state
                .files
                .save(&upload.original_name, &upload.bytes)
                .map_err(|e| {
                    tracing::error!("Failed to store upload: {}", e);
                    ApiError::internal("Failed to store upload")
                })?;
            if let Some(ref old) = existing.profile_image {
                state.files.delete_best_effort(old);
            }
            Some(filename)
        }
        None => None,
    };

    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE users SET
            name = COALESCE(?, name),
            username = COALESCE(?, username),
            password_hash = COALESCE(?, password_hash),
            role = COALESCE(?, role),
            profile_image = COALESCE(?, profile_image),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(non_empty(form.text("name")))
    .bind(non_empty(form.text("username")))
    .bind(&password_hash)
    .bind(non_empty(form.text("role")))
    .bind(&new_image)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    let user = fetch_user(&state, &id).await?;
    Ok(Json(UserResponse::from(user)))
}

/// Delete a user and, best-effort, their profile image. Admin only.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let user = fetch_user(&state, &id).await?;

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    if let Some(ref image) = user.profile_image {
        state.files.delete_best_effort(image);
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Count users with the admin role; the frontend uses this to decide
/// whether initial admin bootstrap is needed.
pub async fn count_admin_principals(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CountResponse>, ApiError> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = ?")
        .bind(ROLE_ADMIN)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(CountResponse { count: count.0 }))
}
