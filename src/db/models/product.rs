use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    /// Stored filename of the product image, relative to the upload dir.
    pub image: String,
    pub category_id: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Product with the referenced category's name joined in. The name is null
/// when the category reference dangles.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProductWithCategory {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub image: String,
    pub category_id: String,
    pub created_at: String,
    pub updated_at: String,
    pub category_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub total_products: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub products: Vec<Product>,
}
