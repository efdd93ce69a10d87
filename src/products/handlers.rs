use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{CreateProductRequest, ProductEnvelope, ProductList, UpdateProductRequest},
    services::ProductService,
};
use crate::{
    auth::extractors::AuthUser,
    dto::{parse_id, MessageResponse},
    error::AppError,
    extractors::JsonBody,
    images::{multipart::read_image, MAX_UPLOAD_BYTES},
    state::AppState,
};

const INVALID_ID: &str = "invalid product id";

// Reads are public; every write goes through `AuthUser`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route(
            "/products/:id/image",
            post(upload_product_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
}

#[instrument(skip(svc))]
pub async fn list_products(
    State(svc): State<ProductService>,
) -> Result<Json<ProductList>, AppError> {
    let products = svc.list().await?;
    Ok(Json(ProductList { products }))
}

#[instrument(skip(svc))]
pub async fn get_product(
    State(svc): State<ProductService>,
    Path(id): Path<String>,
) -> Result<Json<ProductEnvelope>, AppError> {
    let product = svc.get(parse_id(&id, INVALID_ID)?).await?;
    Ok(Json(ProductEnvelope { product }))
}

#[instrument(skip(svc, payload))]
pub async fn create_product(
    State(svc): State<ProductService>,
    AuthUser(user_id): AuthUser,
    JsonBody(payload): JsonBody<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductEnvelope>), AppError> {
    let product = svc.create(payload).await?;
    Ok((StatusCode::CREATED, Json(ProductEnvelope { product })))
}

#[instrument(skip(svc, payload))]
pub async fn update_product(
    State(svc): State<ProductService>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody<UpdateProductRequest>,
) -> Result<Json<ProductEnvelope>, AppError> {
    let product = svc.update(parse_id(&id, INVALID_ID)?, payload).await?;
    Ok(Json(ProductEnvelope { product }))
}

#[instrument(skip(svc))]
pub async fn delete_product(
    State(svc): State<ProductService>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    svc.delete(parse_id(&id, INVALID_ID)?).await?;
    Ok(Json(MessageResponse::new("product deleted successfully")))
}

#[instrument(skip(svc, mp))]
pub async fn upload_product_image(
    State(svc): State<ProductService>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<Json<ProductEnvelope>, AppError> {
    let id = parse_id(&id, INVALID_ID)?;
    let item = read_image(mp?).await?;
    let product = svc.upload_image(id, item).await?;
    Ok(Json(ProductEnvelope { product }))
}
