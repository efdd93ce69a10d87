use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::instrument;

use super::{
    dto::{AuthResponse, LoginRequest, RegisterRequest},
    services::AuthService,
};
use crate::{error::AppError, extractors::JsonBody, state::AppState};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

#[instrument(skip(svc, payload))]
pub async fn register(
    State(svc): State<AuthService>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let (user, token) = svc.register(payload).await?;
    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

#[instrument(skip(svc, payload))]
pub async fn login(
    State(svc): State<AuthService>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let (user, token) = svc.login(payload).await?;
    Ok(Json(AuthResponse { user, token }))
}
