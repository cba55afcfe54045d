pub mod auth;
mod categories;
pub mod error;
mod products;
mod users;
pub mod validation;

use axum::{
    body::Bytes,
    extract::Multipart,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::AppState;
use error::ApiError;
use validation::{sort_direction, validate_sort_field};

/// Common `sortBy`/`order` query parameters for list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

impl ListQuery {
    /// Resolve the sort field and SQL direction, falling back to `default`.
    /// The field is charset-checked before interpolation; unknown columns
    /// are passed through and rejected by the store.
    fn sort(&self, default: &str) -> Result<(String, &'static str), ApiError> {
        let field = self.sort_by.as_deref().unwrap_or(default);
        validate_sort_field(field).map_err(|e| ApiError::validation_field("sortBy", e))?;
        let dir = sort_direction(self.order.as_deref().unwrap_or("asc"));
        Ok((field.to_string(), dir))
    }
}

/// Treat empty or whitespace-only form values as absent, matching the
/// partial-update contract.
pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// A file part read out of a multipart body.
pub(crate) struct UploadedFile {
    pub original_name: String,
    pub bytes: Bytes,
}

/// Text fields plus at most one file field from a multipart body.
pub(crate) struct FormData {
    pub fields: HashMap<String, String>,
    pub file: Option<UploadedFile>,
}

impl FormData {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|s| s.as_str())
    }
}

/// Drain a multipart body into text fields and the single expected file
/// field (`file_field`). Unknown parts are ignored.
pub(crate) async fn read_form(
    mut multipart: Multipart,
    file_field: &str,
) -> Result<FormData, ApiError> {
    let mut form = FormData {
        fields: HashMap::new(),
        file: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_field("body", format!("Malformed multipart body: {}", e)))?
    {
        let name = match field.name() {
            Some(n) => n.to_string(),
            None => continue,
        };

        if name == file_field {
            let original_name = field.file_name().unwrap_or("upload").to_string();
            let bytes = field.bytes().await.map_err(|e| {
                ApiError::validation_field(&name, format!("Failed to read upload: {}", e))
            })?;
            form.file = Some(UploadedFile {
                original_name,
                bytes,
            });
        } else {
            let value = field.text().await.map_err(|e| {
                ApiError::validation_field(&name, format!("Failed to read field: {}", e))
            })?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let category_routes = Router::new()
        .route("/", post(categories::create_category))
        .route("/all", get(categories::list_categories))
        .route("/:id", get(categories::get_category))
        .route("/:id", put(categories::update_category))
        .route("/:id", delete(categories::delete_category));

    let product_routes = Router::new()
        .route("/", post(products::create_product))
        .route("/", get(products::paginate_products))
        .route("/all", get(products::list_products))
        .route("/search", get(products::search_products))
        .route("/:id", get(products::get_product))
        .route("/:id", put(products::update_product))
        .route("/:id", delete(products::delete_product));

    // Registration, login and the admin bootstrap count are public
    let public_user_routes = Router::new()
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        .route("/count-admin-principals", get(users::count_admin_principals));

    let admin_user_routes = Router::new()
        .route("/all", get(users::list_users))
        .route("/:id", get(users::get_user))
        .route("/:id", put(users::update_user))
        .route("/:id", delete(users::delete_user))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/categories", category_routes)
        .nest("/products", product_routes)
        .nest("/users", public_user_routes.merge(admin_user_routes))
        .nest_service("/uploads", ServeDir::new(state.files.dir()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
