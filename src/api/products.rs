//! Product CRUD endpoints: multipart create/update with coupled image
//! lifecycle, list with category join, pagination and search.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{Product, ProductPage, ProductWithCategory};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::{non_empty, read_form, ListQuery};

#[derive(Debug, Deserialize)]
pub struct PaginateQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

async fn fetch_product(state: &AppState, id: &str) -> Result<Product, ApiError> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))
}

async fn category_exists(state: &AppState, category_id: &str) -> Result<bool, ApiError> {
    let found: Option<(String,)> = sqlx::query_as("SELECT id FROM categories WHERE id = ?")
        .bind(category_id)
        .fetch_optional(&state.db)
        .await?;
    Ok(found.is_some())
}

/// Create a product. All fields including the image are mandatory. The
/// image is stored before the uniqueness and reference checks; when either
/// check fails the stored file is deleted again, since no transaction spans
/// the file store and the database.
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let form = read_form(multipart, "image").await?;

    let name = non_empty(form.text("name")).unwrap_or("").to_string();
    let description = non_empty(form.text("description")).unwrap_or("").to_string();
    let category_id = non_empty(form.text("category_id")).unwrap_or("").to_string();

    let mut errors = ValidationErrorBuilder::new();
    if name.is_empty() {
        errors.add("name", "Name is required");
    }
    if description.is_empty() {
        errors.add("description", "Description is required");
    }
    if category_id.is_empty() {
        errors.add("category_id", "Category id is required");
    }
    let price = match non_empty(form.text("price")) {
        None => {
            errors.add("price", "Price is required");
            None
        }
        Some(raw) => match raw.parse::<f64>() {
            Ok(p) => Some(p),
            Err(_) => {
                errors.add("price", "Price must be a number");
                None
            }
        },
    };
    if form.file.is_none() {
        errors.add("image", "Image file is required");
    }
    errors.finish()?;

    let (Some(upload), Some(price)) = (form.file, price) else {
        // Presence was validated above
        return Err(ApiError::internal("Invalid upload state"));
    };

    let image = state
        .files
        .save(&upload.original_name, &upload.bytes)
        .map_err(|e| {
            tracing::error!("Failed to store upload: {}", e);
            ApiError::internal("Failed to store upload")
        })?;

    let duplicate: Option<(String,)> = sqlx::query_as("SELECT id FROM products WHERE name = ?")
        .bind(&name)
        .fetch_optional(&state.db)
        .await?;
    if duplicate.is_some() {
        state.files.delete_best_effort(&image);
        return Err(ApiError::conflict("A product with this name already exists"));
    }

    if !category_exists(&state, &category_id).await? {
        state.files.delete_best_effort(&image);
        return Err(ApiError::invalid_reference(
            "The specified category does not exist",
        ));
    }

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO products (id, name, description, price, image, category_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&name)
    .bind(&description)
    .bind(price)
    .bind(&image)
    .bind(&category_id)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let product = fetch_product(&state, &id).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// List all products with the category name joined in
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ProductWithCategory>>, ApiError> {
    let (field, dir) = query.sort("name")?;

    let products = sqlx::query_as::<_, ProductWithCategory>(&format!(
        r#"
        SELECT p.*, c.name AS category_name
        FROM products p
        LEFT JOIN categories c ON c.id = p.category_id
        ORDER BY p.{} {}
        "#,
        field, dir
    ))
    .fetch_all(&state.db)
    .await?;

    Ok(Json(products))
}

/// Get a product by id
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let product = fetch_product(&state, &id).await?;
    Ok(Json(product))
}

/// Paginated product listing, 1-based page index
pub async fn paginate_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PaginateQuery>,
) -> Result<Json<ProductPage>, ApiError> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(10);

    if page <= 0 || limit <= 0 {
        return Err(ApiError::validation_field(
            "page",
            "Page and limit must be greater than zero",
        ));
    }

    // A huge page value would overflow the offset computation
    let offset = (page - 1)
        .checked_mul(limit)
        .ok_or_else(|| ApiError::validation_field("page", "Page is out of range"))?;

    let sort = ListQuery {
        sort_by: query.sort_by.clone(),
        order: query.order.clone(),
    };
    let (field, dir) = sort.sort("name")?;

    let products = sqlx::query_as::<_, Product>(&format!(
        "SELECT * FROM products ORDER BY {} {} LIMIT ? OFFSET ?",
        field, dir
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
        .fetch_one(&state.db)
        .await?;

    Ok(Json(ProductPage {
        total_products: total.0,
        page,
        limit,
        total_pages: (total.0 + limit - 1) / limit,
        products,
    }))
}

/// Case-insensitive substring search over product name and description
pub async fn search_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let sort = ListQuery {
        sort_by: query.sort_by.clone(),
        order: query.order.clone(),
    };
    let (field, dir) = sort.sort("name")?;

    let pattern = format!("%{}%", query.query.unwrap_or_default());

    let products = sqlx::query_as::<_, Product>(&format!(
        "SELECT * FROM products WHERE name LIKE ? OR description LIKE ? ORDER BY {} {}",
        field, dir
    ))
    .bind(&pattern)
    .bind(&pattern)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(products))
}

/// Update a product. Category existence and name uniqueness are re-checked
/// only for the fields actually supplied; a new image replaces the old file.
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Product>, ApiError> {
    let existing = fetch_product(&state, &id).await?;
    let form = read_form(multipart, "image").await?;

    if let Some(category_id) = non_empty(form.text("category_id")) {
        if !category_exists(&state, category_id).await? {
            return Err(ApiError::invalid_reference(
                "The specified category does not exist",
            ));
        }
    }

    if let Some(name) = non_empty(form.text("name")) {
        let duplicate: Option<(String,)> =
            sqlx::query_as("SELECT id FROM products WHERE name = ? AND id != ?")
                .bind(name)
                .bind(&id)
                .fetch_optional(&state.db)
                .await?;
        if duplicate.is_some() {
            return Err(ApiError::conflict("A product with this name already exists"));
        }
    }

    let price = match non_empty(form.text("price")) {
        None => None,
        Some(raw) => Some(
            raw.parse::<f64>()
                .map_err(|_| ApiError::validation_field("price", "Price must be a number"))?,
        ),
    };

    // Store the replacement image only after all checks have passed, then
    // drop the old file.
    let new_image = match form.file {
        Some(ref upload) => {
            let filename = state
                .files
                .save(&upload.original_name, &upload.bytes)
                .map_err(|e| {
                    tracing::error!("Failed to store upload: {}", e);
                    ApiError::internal("Failed to store upload")
                })?;
            state.files.delete_best_effort(&existing.image);
            Some(filename)
        }
        None => None,
    };

    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE products SET
            name = COALESCE(?, name),
            description = COALESCE(?, description),
            price = COALESCE(?, price),
            category_id = COALESCE(?, category_id),
            image = COALESCE(?, image),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(non_empty(form.text("name")))
    .bind(non_empty(form.text("description")))
    .bind(price)
    .bind(non_empty(form.text("category_id")))
    .bind(&new_image)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    let product = fetch_product(&state, &id).await?;
    Ok(Json(product))
}

/// Delete a product and, best-effort, its image file
pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let product = fetch_product(&state, &id).await?;

    sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    state.files.delete_best_effort(&product.image);

    Ok(StatusCode::NO_CONTENT)
}
