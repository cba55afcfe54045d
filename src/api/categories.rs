//! Category CRUD endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{Category, CreateCategoryRequest, UpdateCategoryRequest};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::{non_empty, ListQuery};

/// Create a new category
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let name = req.name.as_deref().unwrap_or("").trim().to_string();
    let description = req.description.as_deref().unwrap_or("").trim().to_string();

    let mut errors = ValidationErrorBuilder::new();
    if name.is_empty() {
        errors.add("name", "Name is required");
    }
    if description.is_empty() {
        errors.add("description", "Description is required");
    }
    errors.finish()?;

    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM categories WHERE name = ?")
        .bind(&name)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("A category with this name already exists"));
    }

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO categories (id, name, description, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&name)
    .bind(&description)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok((StatusCode::CREATED, Json(category)))
}

/// List all categories, sorted
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Category>>, ApiError> {
    let (field, dir) = query.sort("name")?;

    let categories = sqlx::query_as::<_, Category>(&format!(
        "SELECT * FROM categories ORDER BY {} {}",
        field, dir
    ))
    .fetch_all(&state.db)
    .await?;

    Ok(Json(categories))
}

/// Get a category by id
pub async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Category>, ApiError> {
    let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;

    Ok(Json(category))
}

/// Update a category; re-checks name uniqueness excluding itself. Empty or
/// whitespace-only fields are treated as absent and never clobber stored
/// data.
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<Json<Category>, ApiError> {
    let _existing = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;

    let name = non_empty(req.name.as_deref());
    let description = non_empty(req.description.as_deref());

    if let Some(name) = name {
        let duplicate: Option<(String,)> =
            sqlx::query_as("SELECT id FROM categories WHERE name = ? AND id != ?")
                .bind(name)
                .bind(&id)
                .fetch_optional(&state.db)
                .await?;
        if duplicate.is_some() {
            return Err(ApiError::conflict("A category with this name already exists"));
        }
    }

    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE categories SET
            name = COALESCE(?, name),
            description = COALESCE(?, description),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(name)
    .bind(description)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(category))
}

/// Delete a category. Products referencing it are left alone: the reference
/// dangles rather than cascading.
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let result = sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Category not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::testing::{body_json, get, json_request, send, state};
    use crate::api::create_router;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_get_category() {
        let (state, _dir) = state().await;
        let router = create_router(state);

        let response = send(
            &router,
            json_request(
                "POST",
                "/categories",
                json!({"name": "Drinks", "description": "Cold drinks"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["name"], "Drinks");

        let id = created["id"].as_str().unwrap();
        let response = send(&router, get(&format!("/categories/{}", id))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_requires_both_fields() {
        let (state, _dir) = state().await;
        let router = create_router(state);

        let response = send(
            &router,
            json_request("POST", "/categories", json!({"name": "Drinks"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "validation_error");
    }

    #[tokio::test]
    async fn test_duplicate_name_conflicts_and_keeps_one_record() {
        let (state, _dir) = state().await;
        let router = create_router(state.clone());

        let payload = json!({"name": "Drinks", "description": "Cold drinks"});
        let response = send(&router, json_request("POST", "/categories", payload.clone())).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = send(&router, json_request("POST", "/categories", payload)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "conflict");

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM categories")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn test_update_rechecks_uniqueness_excluding_self() {
        let (state, _dir) = state().await;
        let router = create_router(state);

        let a = body_json(
            send(
                &router,
                json_request(
                    "POST",
                    "/categories",
                    json!({"name": "Drinks", "description": "d"}),
                ),
            )
            .await,
        )
        .await;
        let b = body_json(
            send(
                &router,
                json_request(
                    "POST",
                    "/categories",
                    json!({"name": "Snacks", "description": "d"}),
                ),
            )
            .await,
        )
        .await;

        // Renaming b to a's name conflicts
        let response = send(
            &router,
            json_request(
                "PUT",
                &format!("/categories/{}", b["id"].as_str().unwrap()),
                json!({"name": "Drinks"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Updating a with its own name is fine
        let response = send(
            &router,
            json_request(
                "PUT",
                &format!("/categories/{}", a["id"].as_str().unwrap()),
                json!({"name": "Drinks", "description": "updated"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let updated = body_json(response).await;
        assert_eq!(updated["description"], "updated");
    }

    #[tokio::test]
    async fn test_update_ignores_empty_fields() {
        let (state, _dir) = state().await;
        let router = create_router(state);

        let created = body_json(
            send(
                &router,
                json_request(
                    "POST",
                    "/categories",
                    json!({"name": "Drinks", "description": "Cold drinks"}),
                ),
            )
            .await,
        )
        .await;
        let id = created["id"].as_str().unwrap();

        // Blank and whitespace-only fields must not clobber stored data
        let response = send(
            &router,
            json_request(
                "PUT",
                &format!("/categories/{}", id),
                json!({"name": "", "description": "   "}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let updated = body_json(response).await;
        assert_eq!(updated["name"], "Drinks");
        assert_eq!(updated["description"], "Cold drinks");
    }

    #[tokio::test]
    async fn test_get_missing_category_is_404() {
        let (state, _dir) = state().await;
        let router = create_router(state);

        let response = send(&router, get("/categories/nope")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_sorted_desc() {
        let (state, _dir) = state().await;
        let router = create_router(state);

        for name in ["Apples", "Bread", "Cheese"] {
            send(
                &router,
                json_request(
                    "POST",
                    "/categories",
                    json!({"name": name, "description": "d"}),
                ),
            )
            .await;
        }

        let response = send(&router, get("/categories/all?sortBy=name&order=desc")).await;
        let body = body_json(response).await;
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Cheese", "Bread", "Apples"]);
    }

    #[tokio::test]
    async fn test_list_rejects_sort_field_with_bad_charset() {
        let (state, _dir) = state().await;
        let router = create_router(state);

        let response = send(
            &router,
            get("/categories/all?sortBy=name;%20DROP%20TABLE%20categories"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
