use async_trait::async_trait;
use sqlx::PgPool;

use super::repo_types::{NewProduct, Product};
use crate::error::RepoError;

#[async_trait]
pub trait ProductRepo: Send + Sync {
    async fn create(&self, new: NewProduct) -> Result<Product, RepoError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Product>, RepoError>;
    async fn list(&self) -> Result<Vec<Product>, RepoError>;
    /// Saves every mutable column. `None` when the row is gone.
    async fn update(&self, product: &Product) -> Result<Option<Product>, RepoError>;
    async fn delete(&self, id: i64) -> Result<bool, RepoError>;
}

#[derive(Clone)]
pub struct PgProductRepo {
    db: PgPool,
}

impl PgProductRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProductRepo for PgProductRepo {
    async fn create(&self, new: NewProduct) -> Result<Product, RepoError> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (name, description, price, quantity)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, description, price, quantity, image_path, created_at, updated_at
            "#,
        )
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.price)
        .bind(new.quantity)
        .fetch_one(&self.db)
        .await?;
        Ok(product)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Product>, RepoError> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, price, quantity, image_path, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(product)
    }

    async fn list(&self) -> Result<Vec<Product>, RepoError> {
        let rows = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, description, price, quantity, image_path, created_at, updated_at
            FROM products
            ORDER BY id
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn update(&self, product: &Product) -> Result<Option<Product>, RepoError> {
        let row = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
               SET name = $2, description = $3, price = $4, quantity = $5,
                   image_path = $6, updated_at = now()
             WHERE id = $1
            RETURNING id, name, description, price, quantity, image_path, created_at, updated_at
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.quantity)
        .bind(&product.image_path)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn delete(&self, id: i64) -> Result<bool, RepoError> {
        let res = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
