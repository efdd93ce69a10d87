use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{UpdateProfileRequest, UserEnvelope, UserList},
    services::UserService,
};
use crate::{
    auth::extractors::AuthUser,
    dto::{parse_id, MessageResponse},
    error::AppError,
    extractors::JsonBody,
    images::{multipart::read_image, MAX_UPLOAD_BYTES},
    state::AppState,
};

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_me).put(update_me))
        .route(
            "/users/me/image",
            post(upload_my_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id", get(get_user).delete(delete_user))
}

#[instrument(skip(svc))]
pub async fn get_me(
    State(svc): State<UserService>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserEnvelope>, AppError> {
    let user = svc.get_profile(user_id).await?;
    Ok(Json(UserEnvelope { user }))
}

#[instrument(skip(svc, payload))]
pub async fn update_me(
    State(svc): State<UserService>,
    AuthUser(user_id): AuthUser,
    JsonBody(payload): JsonBody<UpdateProfileRequest>,
) -> Result<Json<UserEnvelope>, AppError> {
    let user = svc.update_profile(user_id, payload).await?;
    Ok(Json(UserEnvelope { user }))
}

#[instrument(skip(svc, mp))]
pub async fn upload_my_image(
    State(svc): State<UserService>,
    AuthUser(user_id): AuthUser,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<Json<UserEnvelope>, AppError> {
    let item = read_image(mp?).await?;
    let user = svc.upload_profile_image(user_id, item).await?;
    Ok(Json(UserEnvelope { user }))
}

#[instrument(skip(svc))]
pub async fn list_users(
    State(svc): State<UserService>,
    AuthUser(_caller): AuthUser,
) -> Result<Json<UserList>, AppError> {
    let users = svc.list_users().await?;
    Ok(Json(UserList { users }))
}

#[instrument(skip(svc))]
pub async fn get_user(
    State(svc): State<UserService>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<UserEnvelope>, AppError> {
    let user = svc.get_user(parse_id(&id, "invalid user id")?).await?;
    Ok(Json(UserEnvelope { user }))
}

#[instrument(skip(svc))]
pub async fn delete_user(
    State(svc): State<UserService>,
    AuthUser(_caller): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    svc.delete_user(parse_id(&id, "invalid user id")?).await?;
    Ok(Json(MessageResponse::new("user deleted successfully")))
}
