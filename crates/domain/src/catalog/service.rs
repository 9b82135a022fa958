//! Catalog service for product operations.

use common::ProductId;
use store::{
    NewProduct, PRODUCT_NAME_CONSTRAINT, Product, Store, StoreError, StoreTransaction,
};

use crate::error::{DomainError, Result};
use crate::transaction::finish;

use super::{CreateProduct, UpdateProduct};

/// Service for managing the product catalog.
///
/// Every write runs in its own transaction; a failed write leaves the
/// catalog unchanged.
pub struct CatalogService<S: Store> {
    store: S,
}

impl<S: Store> CatalogService<S> {
    /// Creates a new catalog service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads a product by id.
    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| DomainError::ProductNotFound(id.to_string()))
    }

    /// Loads a product by its unique name.
    #[tracing::instrument(skip(self))]
    pub async fn find_by_name(&self, name: &str) -> Result<Product> {
        self.store
            .find_product_by_name(name)
            .await?
            .ok_or_else(|| DomainError::ProductNotFound(name.to_string()))
    }

    /// Creates a product with a unique name.
    #[tracing::instrument(skip(self))]
    pub async fn create_product(&self, cmd: CreateProduct) -> Result<Product> {
        cmd.validate()?;

        let mut tx = self.store.begin().await?;
        let result = insert_product(&mut tx, cmd).await;
        let product = finish(tx, result).await?;

        tracing::info!(product_id = %product.id, name = %product.name, "Product created");
        Ok(product)
    }

    /// Updates the product currently named `cmd.current_name`.
    #[tracing::instrument(skip(self))]
    pub async fn update_product(&self, cmd: UpdateProduct) -> Result<Product> {
        cmd.validate()?;

        let mut tx = self.store.begin().await?;
        let result = apply_update(&mut tx, cmd).await;
        let product = finish(tx, result).await?;

        tracing::info!(product_id = %product.id, name = %product.name, "Product updated");
        Ok(product)
    }

    /// Deletes a product by name and returns it.
    ///
    /// Products referenced by order items cannot be deleted.
    #[tracing::instrument(skip(self))]
    pub async fn delete_by_name(&self, name: &str) -> Result<Product> {
        let mut tx = self.store.begin().await?;
        let result = delete_product(&mut tx, name).await;
        let product = finish(tx, result).await?;

        tracing::info!(product_id = %product.id, name = %product.name, "Product deleted");
        Ok(product)
    }
}

async fn insert_product<Tx: StoreTransaction>(tx: &mut Tx, cmd: CreateProduct) -> Result<Product> {
    if tx.find_product_by_name(&cmd.name).await?.is_some() {
        return Err(DomainError::DuplicateName(cmd.name));
    }

    let name = cmd.name.clone();
    tx.insert_product(NewProduct {
        name: cmd.name,
        description: cmd.description,
        price: cmd.price,
    })
    .await
    .map_err(|err| name_conflict(err, &name))
}

async fn apply_update<Tx: StoreTransaction>(tx: &mut Tx, cmd: UpdateProduct) -> Result<Product> {
    let mut product = tx
        .find_product_by_name(&cmd.current_name)
        .await?
        .ok_or_else(|| DomainError::ProductNotFound(cmd.current_name.clone()))?;

    if let Some(new_name) = cmd.new_name
        && new_name != product.name
    {
        if tx.find_product_by_name(&new_name).await?.is_some() {
            return Err(DomainError::DuplicateName(new_name));
        }
        product.name = new_name;
    }
    if let Some(price) = cmd.new_price {
        product.price = price;
    }
    if let Some(description) = cmd.new_description {
        product.description = description;
    }

    tx.update_product(&product)
        .await
        .map_err(|err| name_conflict(err, &product.name))?;
    Ok(product)
}

async fn delete_product<Tx: StoreTransaction>(tx: &mut Tx, name: &str) -> Result<Product> {
    let product = tx
        .find_product_by_name(name)
        .await?
        .ok_or_else(|| DomainError::ProductNotFound(name.to_string()))?;

    if tx.product_in_use(product.id).await? {
        return Err(DomainError::ProductInUse(product.name));
    }

    match tx.delete_product(product.id).await {
        Ok(()) => Ok(product),
        Err(StoreError::ForeignKeyViolation { .. }) => Err(DomainError::ProductInUse(product.name)),
        Err(err) => Err(err.into()),
    }
}

/// Maps a unique-name violation raised by the store to `DuplicateName`.
fn name_conflict(err: StoreError, name: &str) -> DomainError {
    if err.is_unique_violation_of(PRODUCT_NAME_CONSTRAINT) {
        DomainError::DuplicateName(name.to_string())
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;
    use store::InMemoryStore;

    fn service() -> CatalogService<InMemoryStore> {
        CatalogService::new(InMemoryStore::new())
    }

    async fn burger(service: &CatalogService<InMemoryStore>) -> Product {
        service
            .create_product(CreateProduct::new(
                "Burger",
                "Beef patty",
                Money::from_cents(500),
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_product() {
        let service = service();
        let product = burger(&service).await;

        assert_eq!(product.name, "Burger");
        assert_eq!(product.price, Money::from_cents(500));
        assert_eq!(service.get_product(product.id).await.unwrap(), product);
        assert_eq!(service.find_by_name("Burger").await.unwrap(), product);
    }

    #[tokio::test]
    async fn test_get_missing_product() {
        let service = service();

        let result = service.get_product(ProductId::new(42)).await;
        assert!(matches!(result, Err(DomainError::ProductNotFound(id)) if id == "42"));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_price() {
        let service = service();

        let result = service
            .create_product(CreateProduct::new("Water", "", Money::zero()))
            .await;
        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(service.find_by_name("Water").await.is_err());
    }

    #[tokio::test]
    async fn test_update_changes_only_supplied_fields() {
        let service = service();
        let original = burger(&service).await;

        let updated = service
            .update_product(UpdateProduct::new("Burger").with_price(Money::from_cents(650)))
            .await
            .unwrap();

        assert_eq!(updated.id, original.id);
        assert_eq!(updated.name, "Burger");
        assert_eq!(updated.description, "Beef patty");
        assert_eq!(updated.price, Money::from_cents(650));
    }

    #[tokio::test]
    async fn test_update_can_clear_description() {
        let service = service();
        burger(&service).await;

        let updated = service
            .update_product(UpdateProduct::new("Burger").with_description(""))
            .await
            .unwrap();
        assert_eq!(updated.description, "");
    }

    #[tokio::test]
    async fn test_rename_to_same_name_is_allowed() {
        let service = service();
        burger(&service).await;

        let updated = service
            .update_product(UpdateProduct::new("Burger").with_name("Burger"))
            .await
            .unwrap();
        assert_eq!(updated.name, "Burger");
    }

    #[tokio::test]
    async fn test_update_missing_product() {
        let service = service();

        let result = service
            .update_product(UpdateProduct::new("Pizza").with_name("Calzone"))
            .await;
        assert!(matches!(result, Err(DomainError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_returns_product() {
        let service = service();
        let product = burger(&service).await;

        let deleted = service.delete_by_name("Burger").await.unwrap();
        assert_eq!(deleted, product);

        let again = service.delete_by_name("Burger").await;
        assert!(matches!(again, Err(DomainError::ProductNotFound(_))));
    }
}
