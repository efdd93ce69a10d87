use sqlx::FromRow;
use time::OffsetDateTime;

use crate::auth::password;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String, // Argon2 PHC string, never leaves the service
    pub image_path: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    /// Hashes `plain` and replaces the stored hash. Persisting is up to the caller.
    pub fn set_password(&mut self, plain: &str) -> anyhow::Result<()> {
        self.password_hash = password::hash_password(plain)?;
        Ok(())
    }

    pub fn verify_password(&self, plain: &str) -> bool {
        password::verify_password(plain, &self.password_hash)
    }
}

/// Insert payload; only constructible with an already hashed password.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

impl NewUser {
    pub fn with_password(name: String, email: String, plain: &str) -> anyhow::Result<Self> {
        Ok(Self {
            name,
            email,
            password_hash: password::hash_password(plain)?,
        })
    }
}
