use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{info, warn};

use super::{
    dto::{UpdateProfileRequest, UserResponse},
    repo::UserRepo,
    repo_types::User,
};
use crate::{
    auth::services::{check_password_len, is_valid_email},
    error::AppError,
    images::services::{discard_image, store_image, UploadItem, USERS_FOLDER},
    state::AppState,
    storage::FileStore,
};

const NOT_FOUND: AppError = AppError::NotFound("user not found");

/// Empty strings count as "not supplied".
fn supplied(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}

/// Profile and administrative user operations.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepo>,
    files: Arc<dyn FileStore>,
}

impl FromRef<AppState> for UserService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.users.clone(), state.files.clone())
    }
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepo>, files: Arc<dyn FileStore>) -> Self {
        Self { users, files }
    }

    async fn load(&self, id: i64) -> Result<User, AppError> {
        self.users.find_by_id(id).await?.ok_or(NOT_FOUND)
    }

    async fn save(&self, user: &User) -> Result<User, AppError> {
        self.users.update(user).await?.ok_or(NOT_FOUND)
    }

    pub async fn get_profile(&self, principal: i64) -> Result<UserResponse, AppError> {
        Ok(self.load(principal).await?.into())
    }

    pub async fn update_profile(
        &self,
        principal: i64,
        req: UpdateProfileRequest,
    ) -> Result<UserResponse, AppError> {
        let name = supplied(req.name);
        let email = supplied(req.email);
        let password = supplied(req.password);

        if let Some(email) = &email {
            if !is_valid_email(email) {
                return Err(AppError::validation("invalid email"));
            }
        }
        if let Some(password) = &password {
            check_password_len(password)?;
        }

        let mut user = self.load(principal).await?;

        if let Some(email) = email {
            if email != user.email {
                if let Some(other) = self.users.find_by_email(&email).await? {
                    if other.id != user.id {
                        warn!(user_id = user.id, "email change to a taken address");
                        return Err(AppError::Conflict("email already registered".into()));
                    }
                }
                user.email = email;
            }
        }
        if let Some(name) = name {
            user.name = name;
        }
        if let Some(password) = password {
            user.set_password(&password)?;
        }

        let saved = self.save(&user).await?;
        info!(user_id = saved.id, "profile updated");
        Ok(saved.into())
    }

    pub async fn upload_profile_image(
        &self,
        principal: i64,
        item: UploadItem,
    ) -> Result<UserResponse, AppError> {
        let mut user = self.load(principal).await?;
        let new_path = store_image(&*self.files, USERS_FOLDER, item).await?;
        let previous = user.image_path.replace(new_path.clone());

        let saved = match self.save(&user).await {
            Ok(u) => u,
            Err(e) => {
                discard_image(&*self.files, &new_path).await;
                return Err(e);
            }
        };
        if let Some(previous) = previous {
            discard_image(&*self.files, &previous).await;
        }

        info!(user_id = saved.id, path = %new_path, "profile image updated");
        Ok(saved.into())
    }

    pub async fn list_users(&self) -> Result<Vec<UserResponse>, AppError> {
        let users = self.users.list().await?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    pub async fn get_user(&self, id: i64) -> Result<UserResponse, AppError> {
        Ok(self.load(id).await?.into())
    }

    /// Removes the record, then its image file (best-effort).
    pub async fn delete_user(&self, id: i64) -> Result<(), AppError> {
        let user = self.load(id).await?;
        if !self.users.delete(id).await? {
            return Err(NOT_FOUND);
        }
        if let Some(path) = &user.image_path {
            discard_image(&*self.files, path).await;
        }
        info!(user_id = id, "user deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::{memory::MemoryUserRepo, storage::LocalFileStore, users::repo_types::NewUser};

    struct Fixture {
        svc: UserService,
        files: Arc<LocalFileStore>,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let files = Arc::new(LocalFileStore::new(dir.path()));
        let svc = UserService::new(Arc::new(MemoryUserRepo::default()), files.clone());
        Fixture { svc, files, _dir: dir }
    }

    async fn seed(svc: &UserService, name: &str, email: &str) -> User {
        let new = NewUser::with_password(name.into(), email.into(), "secret1").unwrap();
        svc.users.create(new).await.unwrap()
    }

    fn png() -> UploadItem {
        UploadItem {
            body: Bytes::from_static(b"\x89PNG"),
            content_type: "image/png".into(),
            file_name: Some("me.png".into()),
        }
    }

    fn patch(name: Option<&str>, email: Option<&str>, password: Option<&str>) -> UpdateProfileRequest {
        UpdateProfileRequest {
            name: name.map(str::to_string),
            email: email.map(str::to_string),
            password: password.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn partial_update_leaves_other_fields() {
        let f = fixture();
        let ana = seed(&f.svc, "Ana", "ana@example.com").await;

        let updated = f
            .svc
            .update_profile(ana.id, patch(Some("Ana Maria"), None, Some("")))
            .await
            .unwrap();
        assert_eq!(updated.name, "Ana Maria");
        assert_eq!(updated.email, "ana@example.com");

        let stored = f.svc.users.find_by_id(ana.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, ana.password_hash);
    }

    #[tokio::test]
    async fn empty_strings_do_not_clear_fields() {
        let f = fixture();
        let ana = seed(&f.svc, "Ana", "ana@example.com").await;
        let updated = f
            .svc
            .update_profile(ana.id, patch(Some(""), Some(""), None))
            .await
            .unwrap();
        assert_eq!(updated.name, "Ana");
        assert_eq!(updated.email, "ana@example.com");
    }

    #[tokio::test]
    async fn password_change_rehashes() {
        let f = fixture();
        let ana = seed(&f.svc, "Ana", "ana@example.com").await;
        f.svc
            .update_profile(ana.id, patch(None, None, Some("brand-new")))
            .await
            .unwrap();
        let stored = f.svc.users.find_by_id(ana.id).await.unwrap().unwrap();
        assert!(stored.verify_password("brand-new"));
        assert!(!stored.verify_password("secret1"));

        let err = f
            .svc
            .update_profile(ana.id, patch(None, None, Some("tiny")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn email_change_checks_other_users() {
        let f = fixture();
        let ana = seed(&f.svc, "Ana", "ana@example.com").await;
        seed(&f.svc, "Bo", "bo@example.com").await;

        let err = f
            .svc
            .update_profile(ana.id, patch(None, Some("bo@example.com"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // unchanged email is not a conflict with oneself
        f.svc
            .update_profile(ana.id, patch(Some("A"), Some("ana@example.com"), None))
            .await
            .unwrap();

        let moved = f
            .svc
            .update_profile(ana.id, patch(None, Some("ana@new.example.com"), None))
            .await
            .unwrap();
        assert_eq!(moved.email, "ana@new.example.com");

        assert!(matches!(
            f.svc
                .update_profile(ana.id, patch(None, Some("broken"), None))
                .await
                .unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn missing_principal_is_not_found() {
        let f = fixture();
        assert!(matches!(
            f.svc.get_profile(99).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            f.svc.update_profile(99, patch(Some("x"), None, None)).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn image_upload_replaces_previous_file() {
        let f = fixture();
        let ana = seed(&f.svc, "Ana", "ana@example.com").await;

        let first = f.svc.upload_profile_image(ana.id, png()).await.unwrap();
        let first_path = first.image_path.clone().unwrap();
        assert!(first_path.starts_with("/uploads/users/"));
        assert!(first_path.ends_with(".png"));
        assert!(f.files.exists(&first_path).await.unwrap());

        let second = f.svc.upload_profile_image(ana.id, png()).await.unwrap();
        let second_path = second.image_path.unwrap();
        assert_ne!(first_path, second_path);
        assert!(f.files.exists(&second_path).await.unwrap());
        assert!(!f.files.exists(&first_path).await.unwrap());
    }

    #[tokio::test]
    async fn image_upload_rejects_content_type() {
        let f = fixture();
        let ana = seed(&f.svc, "Ana", "ana@example.com").await;
        let item = UploadItem {
            body: Bytes::from_static(b"%PDF"),
            content_type: "application/pdf".into(),
            file_name: Some("cv.pdf".into()),
        };
        let err = f.svc.upload_profile_image(ana.id, item).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(f.svc.get_profile(ana.id).await.unwrap().image_path.is_none());
    }

    #[tokio::test]
    async fn delete_removes_image_file() {
        let f = fixture();
        let ana = seed(&f.svc, "Ana", "ana@example.com").await;
        let path = f
            .svc
            .upload_profile_image(ana.id, png())
            .await
            .unwrap()
            .image_path
            .unwrap();

        f.svc.delete_user(ana.id).await.unwrap();
        assert!(!f.files.exists(&path).await.unwrap());
        assert!(matches!(
            f.svc.get_user(ana.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn delete_without_image_and_unknown_id() {
        let f = fixture();
        let bo = seed(&f.svc, "Bo", "bo@example.com").await;
        f.svc.delete_user(bo.id).await.unwrap();
        assert!(f.svc.list_users().await.unwrap().is_empty());
        assert!(matches!(
            f.svc.delete_user(bo.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
