use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::jwt::JwtKeys;
use crate::config::AppConfig;
use crate::db;
use crate::images::services::{PRODUCTS_FOLDER, USERS_FOLDER};
use crate::memory::{MemoryProductRepo, MemoryUserRepo};
use crate::products::repo::{PgProductRepo, ProductRepo};
use crate::storage::{FileStore, LocalFileStore};
use crate::users::repo::{PgUserRepo, UserRepo};

/// Everything a request handler can reach. Services are built from it via `FromRef`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub users: Arc<dyn UserRepo>,
    pub products: Arc<dyn ProductRepo>,
    pub files: Arc<dyn FileStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let (users, products): (Arc<dyn UserRepo>, Arc<dyn ProductRepo>) =
            match &config.database_url {
                Some(url) => {
                    let pool = db::connect(url).await?;
                    db::migrate(&pool).await?;
                    info!("using postgres record store");
                    (
                        Arc::new(PgUserRepo::new(pool.clone())),
                        Arc::new(PgProductRepo::new(pool)),
                    )
                }
                None => {
                    warn!("DATABASE_URL not set; records are kept in memory and lost on exit");
                    (
                        Arc::new(MemoryUserRepo::default()),
                        Arc::new(MemoryProductRepo::default()),
                    )
                }
            };

        let files = LocalFileStore::new(&config.uploads_dir);
        files.ensure_folders(&[USERS_FOLDER, PRODUCTS_FOLDER]).await?;

        Ok(Self::from_parts(Arc::new(config), users, products, Arc::new(files)))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        products: Arc<dyn ProductRepo>,
        files: Arc<dyn FileStore>,
    ) -> Self {
        Self {
            jwt: JwtKeys::new(&config.jwt),
            config,
            users,
            products,
            files,
        }
    }

    /// In-memory records with files under `config.uploads_dir`.
    pub fn in_memory(config: AppConfig) -> Self {
        let files = Arc::new(LocalFileStore::new(&config.uploads_dir));
        Self::from_parts(
            Arc::new(config),
            Arc::new(MemoryUserRepo::default()),
            Arc::new(MemoryProductRepo::default()),
            files,
        )
    }
}
