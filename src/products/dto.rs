use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::repo_types::Product;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub quantity: i32,
    pub image_path: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            description: p.description,
            price: p.price,
            quantity: p.quantity,
            image_path: p.image_path,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// All fields are required; they are optional here so a missing one is a
/// validation error rather than a parse failure.
#[derive(Debug, Default, Deserialize)]
pub struct CreateProductRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Option<f64>,
    pub quantity: Option<i32>,
}

/// Sparse update. Absent fields (and empty strings) are unchanged; a present
/// number, zero included, is applied.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub quantity: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProductEnvelope {
    pub product: ProductResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProductList {
    pub products: Vec<ProductResponse>,
}
