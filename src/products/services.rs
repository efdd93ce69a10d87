use std::sync::Arc;

use axum::extract::FromRef;
use tracing::info;

use super::{
    dto::{CreateProductRequest, ProductResponse, UpdateProductRequest},
    repo::ProductRepo,
    repo_types::{NewProduct, Product},
};
use crate::{
    error::AppError,
    images::services::{discard_image, store_image, UploadItem, PRODUCTS_FOLDER},
    state::AppState,
    storage::FileStore,
};

const NOT_FOUND: AppError = AppError::NotFound("product not found");

fn check_price(price: f64) -> Result<f64, AppError> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::validation("price must be a non-negative number"));
    }
    Ok(price)
}

fn check_quantity(quantity: i32) -> Result<i32, AppError> {
    if quantity < 0 {
        return Err(AppError::validation("quantity must be non-negative"));
    }
    Ok(quantity)
}

/// Product catalogue operations.
#[derive(Clone)]
pub struct ProductService {
    products: Arc<dyn ProductRepo>,
    files: Arc<dyn FileStore>,
}

impl FromRef<AppState> for ProductService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.products.clone(), state.files.clone())
    }
}

impl ProductService {
    pub fn new(products: Arc<dyn ProductRepo>, files: Arc<dyn FileStore>) -> Self {
        Self { products, files }
    }

    async fn load(&self, id: i64) -> Result<Product, AppError> {
        self.products.find_by_id(id).await?.ok_or(NOT_FOUND)
    }

    async fn save(&self, product: &Product) -> Result<Product, AppError> {
        self.products.update(product).await?.ok_or(NOT_FOUND)
    }

    pub async fn create(&self, req: CreateProductRequest) -> Result<ProductResponse, AppError> {
        if req.name.trim().is_empty() {
            return Err(AppError::validation("name is required"));
        }
        if req.description.trim().is_empty() {
            return Err(AppError::validation("description is required"));
        }
        let price = check_price(req.price.ok_or_else(|| AppError::validation("price is required"))?)?;
        let quantity = check_quantity(
            req.quantity
                .ok_or_else(|| AppError::validation("quantity is required"))?,
        )?;

        let product = self
            .products
            .create(NewProduct {
                name: req.name,
                description: req.description,
                price,
                quantity,
            })
            .await?;
        info!(product_id = product.id, "product created");
        Ok(product.into())
    }

    pub async fn list(&self) -> Result<Vec<ProductResponse>, AppError> {
        let rows = self.products.list().await?;
        Ok(rows.into_iter().map(ProductResponse::from).collect())
    }

    pub async fn get(&self, id: i64) -> Result<ProductResponse, AppError> {
        Ok(self.load(id).await?.into())
    }

    pub async fn update(
        &self,
        id: i64,
        req: UpdateProductRequest,
    ) -> Result<ProductResponse, AppError> {
        let price = req.price.map(check_price).transpose()?;
        let quantity = req.quantity.map(check_quantity).transpose()?;

        let mut product = self.load(id).await?;
        if let Some(name) = req.name.filter(|s| !s.is_empty()) {
            product.name = name;
        }
        if let Some(description) = req.description.filter(|s| !s.is_empty()) {
            product.description = description;
        }
        if let Some(price) = price {
            product.price = price;
        }
        if let Some(quantity) = quantity {
            product.quantity = quantity;
        }

        let saved = self.save(&product).await?;
        info!(product_id = saved.id, "product updated");
        Ok(saved.into())
    }

    /// Removes the record, then its image file (best-effort).
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        let product = self.load(id).await?;
        if !self.products.delete(id).await? {
            return Err(NOT_FOUND);
        }
        if let Some(path) = &product.image_path {
            discard_image(&*self.files, path).await;
        }
        info!(product_id = id, "product deleted");
        Ok(())
    }

    pub async fn upload_image(&self, id: i64, item: UploadItem) -> Result<ProductResponse, AppError> {
        let mut product = self.load(id).await?;
        let new_path = store_image(&*self.files, PRODUCTS_FOLDER, item).await?;
        let previous = product.image_path.replace(new_path.clone());

        let saved = match self.save(&product).await {
            Ok(p) => p,
            Err(e) => {
                discard_image(&*self.files, &new_path).await;
                return Err(e);
            }
        };
        if let Some(previous) = previous {
            discard_image(&*self.files, &previous).await;
        }

        info!(product_id = saved.id, path = %new_path, "product image updated");
        Ok(saved.into())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::{memory::MemoryProductRepo, storage::LocalFileStore};

    struct Fixture {
        svc: ProductService,
        files: Arc<LocalFileStore>,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let files = Arc::new(LocalFileStore::new(dir.path()));
        let svc = ProductService::new(Arc::new(MemoryProductRepo::default()), files.clone());
        Fixture { svc, files, _dir: dir }
    }

    fn pen() -> CreateProductRequest {
        CreateProductRequest {
            name: "Pen".into(),
            description: "Blue pen".into(),
            price: Some(1.5),
            quantity: Some(100),
        }
    }

    fn gif() -> UploadItem {
        UploadItem {
            body: Bytes::from_static(b"GIF89a"),
            content_type: "image/gif".into(),
            file_name: Some("pen.gif".into()),
        }
    }

    #[tokio::test]
    async fn create_get_update_roundtrip() {
        let f = fixture();
        let created = f.svc.create(pen()).await.unwrap();
        let fetched = f.svc.get(created.id).await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.name, "Pen");
        assert_eq!(fetched.description, "Blue pen");
        assert_eq!(fetched.price, 1.5);
        assert_eq!(fetched.quantity, 100);
        assert!(fetched.image_path.is_none());

        f.svc
            .update(
                created.id,
                UpdateProductRequest {
                    quantity: Some(50),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let after = f.svc.get(created.id).await.unwrap();
        assert_eq!(after.quantity, 50);
        assert_eq!(after.price, 1.5);
        assert_eq!(after.name, "Pen");
        assert!(after.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn update_name_keeps_price() {
        let f = fixture();
        let p = f
            .svc
            .create(CreateProductRequest {
                price: Some(10.0),
                ..pen()
            })
            .await
            .unwrap();
        let updated = f
            .svc
            .update(
                p.id,
                UpdateProductRequest {
                    name: Some("Bob".into()),
                    description: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Bob");
        assert_eq!(updated.description, "Blue pen");
        assert_eq!(updated.price, 10.0);
    }

    #[tokio::test]
    async fn zero_is_a_real_value_on_update() {
        let f = fixture();
        let p = f.svc.create(pen()).await.unwrap();
        let updated = f
            .svc
            .update(
                p.id,
                UpdateProductRequest {
                    price: Some(0.0),
                    quantity: Some(0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price, 0.0);
        assert_eq!(updated.quantity, 0);
    }

    #[tokio::test]
    async fn invalid_values_are_rejected_before_mutation() {
        let f = fixture();
        let p = f.svc.create(pen()).await.unwrap();
        let err = f
            .svc
            .update(
                p.id,
                UpdateProductRequest {
                    name: Some("Changed".into()),
                    price: Some(-1.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(f.svc.get(p.id).await.unwrap().name, "Pen");

        let err = f
            .svc
            .update(
                p.id,
                UpdateProductRequest {
                    quantity: Some(-5),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn create_requires_every_field() {
        let f = fixture();
        let cases = [
            CreateProductRequest { name: String::new(), ..pen() },
            CreateProductRequest { description: String::new(), ..pen() },
            CreateProductRequest { name: "   ".into(), ..pen() },
            CreateProductRequest { description: "\t ".into(), ..pen() },
            CreateProductRequest { price: None, ..pen() },
            CreateProductRequest { quantity: None, ..pen() },
            CreateProductRequest { price: Some(-0.5), ..pen() },
            CreateProductRequest { quantity: Some(-1), ..pen() },
        ];
        for req in cases {
            assert!(matches!(
                f.svc.create(req).await.unwrap_err(),
                AppError::Validation(_)
            ));
        }
        assert!(f.svc.list().await.unwrap().is_empty());

        let free = f
            .svc
            .create(CreateProductRequest { price: Some(0.0), quantity: Some(0), ..pen() })
            .await
            .unwrap();
        assert_eq!(free.price, 0.0);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let f = fixture();
        assert!(matches!(f.svc.get(5).await.unwrap_err(), AppError::NotFound(_)));
        assert!(matches!(
            f.svc.update(5, UpdateProductRequest::default()).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(f.svc.delete(5).await.unwrap_err(), AppError::NotFound(_)));
        assert!(matches!(
            f.svc.upload_image(5, gif()).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn image_lifecycle_follows_record() {
        let f = fixture();
        let p = f.svc.create(pen()).await.unwrap();

        let first = f.svc.upload_image(p.id, gif()).await.unwrap().image_path.unwrap();
        assert!(first.starts_with("/uploads/products/"));
        let second = f.svc.upload_image(p.id, gif()).await.unwrap().image_path.unwrap();
        assert!(!f.files.exists(&first).await.unwrap());
        assert!(f.files.exists(&second).await.unwrap());

        f.svc.delete(p.id).await.unwrap();
        assert!(!f.files.exists(&second).await.unwrap());
        assert!(f.svc.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_without_image_succeeds() {
        let f = fixture();
        let p = f.svc.create(pen()).await.unwrap();
        f.svc.delete(p.id).await.unwrap();
        assert!(matches!(f.svc.get(p.id).await.unwrap_err(), AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_returns_in_creation_order() {
        let f = fixture();
        let a = f.svc.create(pen()).await.unwrap();
        let b = f
            .svc
            .create(CreateProductRequest { name: "Pencil".into(), ..pen() })
            .await
            .unwrap();
        let ids: Vec<i64> = f.svc.list().await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }
}
