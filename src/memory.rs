//! In-memory record stores, used when no `DATABASE_URL` is configured and in tests.
//!
//! Each store keeps its rows behind one `RwLock`, so check-and-insert on the
//! email index is atomic just like the unique constraint in Postgres.

use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::{
    error::RepoError,
    products::{
        repo::ProductRepo,
        repo_types::{NewProduct, Product},
    },
    users::{
        repo::UserRepo,
        repo_types::{NewUser, User},
    },
};

#[derive(Debug)]
struct Table<T> {
    next_id: i64,
    rows: BTreeMap<i64, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            rows: BTreeMap::new(),
        }
    }
}

impl<T> Table<T> {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Default)]
pub struct MemoryUserRepo {
    table: RwLock<Table<User>>,
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn create(&self, new: NewUser) -> Result<User, RepoError> {
        let mut table = self.table.write().await;
        if table.rows.values().any(|u| u.email == new.email) {
            return Err(RepoError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: table.allocate_id(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            image_path: None,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepoError> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let table = self.table.read().await;
        Ok(table.rows.values().find(|u| u.email == email).cloned())
    }

    async fn list(&self) -> Result<Vec<User>, RepoError> {
        Ok(self.table.read().await.rows.values().cloned().collect())
    }

    async fn update(&self, user: &User) -> Result<Option<User>, RepoError> {
        let mut table = self.table.write().await;
        if table
            .rows
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(RepoError::DuplicateEmail);
        }
        let Some(row) = table.rows.get_mut(&user.id) else {
            return Ok(None);
        };
        row.name = user.name.clone();
        row.email = user.email.clone();
        row.password_hash = user.password_hash.clone();
        row.image_path = user.image_path.clone();
        row.updated_at = OffsetDateTime::now_utc();
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool, RepoError> {
        Ok(self.table.write().await.rows.remove(&id).is_some())
    }
}

#[derive(Debug, Default)]
pub struct MemoryProductRepo {
    table: RwLock<Table<Product>>,
}

#[async_trait]
impl ProductRepo for MemoryProductRepo {
    async fn create(&self, new: NewProduct) -> Result<Product, RepoError> {
        let mut table = self.table.write().await;
        let now = OffsetDateTime::now_utc();
        let product = Product {
            id: table.allocate_id(),
            name: new.name,
            description: new.description,
            price: new.price,
            quantity: new.quantity,
            image_path: None,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(product.id, product.clone());
        Ok(product)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Product>, RepoError> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Product>, RepoError> {
        Ok(self.table.read().await.rows.values().cloned().collect())
    }

    async fn update(&self, product: &Product) -> Result<Option<Product>, RepoError> {
        let mut table = self.table.write().await;
        let Some(row) = table.rows.get_mut(&product.id) else {
            return Ok(None);
        };
        row.name = product.name.clone();
        row.description = product.description.clone();
        row.price = product.price;
        row.quantity = product.quantity;
        row.image_path = product.image_path.clone();
        row.updated_at = OffsetDateTime::now_utc();
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool, RepoError> {
        Ok(self.table.write().await.rows.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "n".into(),
            email: email.into(),
            password_hash: "$argon2id$stub".into(),
        }
    }

    #[tokio::test]
    async fn unique_email_on_insert_and_update() {
        let repo = MemoryUserRepo::default();
        let a = repo.create(new_user("a@example.com")).await.unwrap();
        let b = repo.create(new_user("b@example.com")).await.unwrap();
        assert!(matches!(
            repo.create(new_user("a@example.com")).await,
            Err(RepoError::DuplicateEmail)
        ));

        let mut b2 = b.clone();
        b2.email = a.email.clone();
        assert!(matches!(repo.update(&b2).await, Err(RepoError::DuplicateEmail)));
        assert_eq!(repo.find_by_id(b.id).await.unwrap().unwrap().email, "b@example.com");
    }

    #[tokio::test]
    async fn concurrent_duplicate_registrations_yield_one_row() {
        let repo = Arc::new(MemoryUserRepo::default());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.create(new_user("race@example.com")).await.is_ok()
            }));
        }
        let mut wins = 0;
        for h in handles {
            if h.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ids_are_not_reused() {
        let repo = MemoryProductRepo::default();
        let p = |n: &str| NewProduct {
            name: n.into(),
            description: "d".into(),
            price: 1.0,
            quantity: 1,
        };
        let first = repo.create(p("a")).await.unwrap();
        assert!(repo.delete(first.id).await.unwrap());
        assert!(!repo.delete(first.id).await.unwrap());
        let second = repo.create(p("b")).await.unwrap();
        assert!(second.id > first.id);
        assert!(repo.update(&first).await.unwrap().is_none());
    }
}
