//! Catalog commands.

use common::Money;

use crate::error::{DomainError, Result};

/// Command to create a new product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateProduct {
    pub name: String,
    pub description: String,
    pub price: Money,
}

impl CreateProduct {
    /// Creates a new CreateProduct command.
    pub fn new(name: impl Into<String>, description: impl Into<String>, price: Money) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            price,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_price(self.price)
    }
}

/// Command to update an existing product, addressed by its current name.
///
/// `None` leaves a field unchanged; `Some` always overwrites it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateProduct {
    pub current_name: String,
    pub new_name: Option<String>,
    pub new_price: Option<Money>,
    pub new_description: Option<String>,
}

impl UpdateProduct {
    /// Creates an update that changes nothing yet.
    pub fn new(current_name: impl Into<String>) -> Self {
        Self {
            current_name: current_name.into(),
            ..Default::default()
        }
    }

    /// Renames the product.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.new_name = Some(name.into());
        self
    }

    /// Sets a new price.
    pub fn with_price(mut self, price: Money) -> Self {
        self.new_price = Some(price);
        self
    }

    /// Sets a new description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.new_description = Some(description.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(name) = &self.new_name {
            validate_name(name)?;
        }
        if let Some(price) = self.new_price {
            validate_price(price)?;
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(DomainError::Validation(
            "product name must not be blank".to_string(),
        ));
    }
    Ok(())
}

fn validate_price(price: Money) -> Result<()> {
    if !price.is_positive() {
        return Err(DomainError::Validation(format!(
            "product price must be greater than 0, got {price}"
        )));
    }
    Ok(())
}
