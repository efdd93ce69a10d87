use std::sync::Arc;

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use super::{
    dto::{LoginRequest, RegisterRequest},
    jwt::JwtKeys,
    password::{self, MIN_PASSWORD_LEN},
};
use crate::{
    error::AppError,
    state::AppState,
    users::{dto::UserResponse, repo::UserRepo, repo_types::NewUser},
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn check_password_len(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Registration and login.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepo>,
    keys: JwtKeys,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.users.clone(), state.jwt.clone())
    }
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepo>, keys: JwtKeys) -> Self {
        Self { users, keys }
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<(UserResponse, String), AppError> {
        if req.name.trim().is_empty() {
            return Err(AppError::validation("name is required"));
        }
        if !is_valid_email(&req.email) {
            warn!(email = %req.email, "invalid email");
            return Err(AppError::validation("invalid email"));
        }
        check_password_len(&req.password)?;

        // Fast path; the unique index still catches concurrent registrations.
        if self.users.find_by_email(&req.email).await?.is_some() {
            warn!(email = %req.email, "email already registered");
            return Err(AppError::Conflict("email already registered".into()));
        }

        let new = NewUser::with_password(req.name, req.email, &req.password)?;
        let user = self.users.create(new).await?;
        let token = self.keys.sign(user.id)?;

        info!(user_id = user.id, email = %user.email, "user registered");
        Ok((user.into(), token))
    }

    pub async fn login(&self, req: LoginRequest) -> Result<(UserResponse, String), AppError> {
        if req.email.is_empty() || req.password.is_empty() {
            return Err(AppError::validation("email and password are required"));
        }
        if !is_valid_email(&req.email) {
            return Err(AppError::validation("invalid email"));
        }

        let user = match self.users.find_by_email(&req.email).await? {
            Some(u) => u,
            None => {
                password::burn_verification(&req.password);
                warn!(email = %req.email, "login unknown email");
                return Err(AppError::Unauthorized("invalid credentials"));
            }
        };

        if !user.verify_password(&req.password) {
            warn!(user_id = user.id, "login invalid password");
            return Err(AppError::Unauthorized("invalid credentials"));
        }

        let token = self.keys.sign(user.id)?;
        info!(user_id = user.id, "user logged in");
        Ok((user.into(), token))
    }
}
