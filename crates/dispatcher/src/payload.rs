//! Typed payloads of the recognised actions.

use common::{Money, OrderId, OrderItemId, OrderStatus, ProductId, TableNumber, UserId};
use domain::{AddItem, CreateProduct, RemoveItem, UpdateOrderStatus, UpdateProduct};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::action::Action;
use crate::error::DispatchError;

/// Decodes the payload of `action` into its typed shape.
pub fn decode<T: DeserializeOwned>(action: Action, data: Value) -> Result<T, DispatchError> {
    serde_json::from_value(data).map_err(|err| DispatchError::Decode {
        action,
        reason: err.to_string(),
    })
}

/// A product id sent either as a JSON number or as a numeric string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ProductRef {
    Id(i64),
    Text(String),
}

impl ProductRef {
    pub fn into_id(self) -> Result<ProductId, DispatchError> {
        match self {
            ProductRef::Id(id) => Ok(ProductId::new(id)),
            ProductRef::Text(text) => text
                .trim()
                .parse::<i64>()
                .map(ProductId::new)
                .map_err(|err| DispatchError::Decode {
                    action: Action::GetProduct,
                    reason: format!("invalid product id {text:?}: {err}"),
                }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProductPayload {
    pub name: String,
    pub price: Money,
    #[serde(default)]
    pub description: String,
}

impl From<CreateProductPayload> for CreateProduct {
    fn from(payload: CreateProductPayload) -> Self {
        CreateProduct::new(payload.name, payload.description, payload.price)
    }
}

#[derive(Debug, Deserialize)]
pub struct EditProductPayload {
    #[serde(rename = "updateOrderDTO")]
    pub update: ProductChanges,
}

/// Field changes for a product; absent or null fields are left alone.
#[derive(Debug, Deserialize)]
pub struct ProductChanges {
    pub product: String,
    #[serde(rename = "newnameProduct", default)]
    pub new_name: Option<String>,
    #[serde(rename = "newPrice", default)]
    pub new_price: Option<Money>,
    #[serde(rename = "newDescription", default)]
    pub new_description: Option<String>,
}

impl TryFrom<EditProductPayload> for UpdateProduct {
    type Error = DispatchError;

    fn try_from(payload: EditProductPayload) -> Result<Self, Self::Error> {
        let changes = payload.update;
        if changes.product.trim().is_empty() {
            return Err(DispatchError::Decode {
                action: Action::EditProduct,
                reason: "Product name cannot be empty".to_string(),
            });
        }

        Ok(UpdateProduct {
            current_name: changes.product,
            new_name: changes.new_name,
            new_price: changes.new_price,
            new_description: changes.new_description,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteProductPayload {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderItemPayload {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i32,
    #[serde(rename = "tablenumber")]
    pub table_number: TableNumber,
}

impl From<CreateOrderItemPayload> for AddItem {
    fn from(payload: CreateOrderItemPayload) -> Self {
        AddItem::new(
            payload.user_id,
            payload.product_id,
            payload.quantity,
            payload.table_number,
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct UserPayload {
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusPayload {
    pub order_id: OrderId,
    pub new_status: OrderStatus,
}

impl From<UpdateStatusPayload> for UpdateOrderStatus {
    fn from(payload: UpdateStatusPayload) -> Self {
        UpdateOrderStatus::new(payload.order_id, payload.new_status)
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteOrderItemPayload {
    pub order_item_id: OrderItemId,
}

impl From<DeleteOrderItemPayload> for RemoveItem {
    fn from(payload: DeleteOrderItemPayload) -> Self {
        RemoveItem::new(payload.order_item_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_product_ref_accepts_number_and_string() {
        let id: ProductRef = decode(Action::GetProduct, json!(7)).unwrap();
        assert_eq!(id.into_id().unwrap(), ProductId::new(7));

        let id: ProductRef = decode(Action::GetProduct, json!("42")).unwrap();
        assert_eq!(id.into_id().unwrap(), ProductId::new(42));

        let id: ProductRef = decode(Action::GetProduct, json!("seven")).unwrap();
        assert!(matches!(id.into_id(), Err(DispatchError::Decode { .. })));
    }

    #[test]
    fn test_create_order_item_payload() {
        let payload: CreateOrderItemPayload = decode(
            Action::CreateOrderItem,
            json!({ "user_id": 1, "product_id": 7, "quantity": 3, "tablenumber": 2 }),
        )
        .unwrap();

        let cmd = AddItem::from(payload);
        assert_eq!(cmd.user_id, UserId::new(1));
        assert_eq!(cmd.product_id, ProductId::new(7));
        assert_eq!(cmd.quantity, 3);
        assert_eq!(cmd.table_number, TableNumber::new(2));
    }

    #[test]
    fn test_missing_field_is_a_decode_error() {
        let result: Result<CreateOrderItemPayload, _> = decode(
            Action::CreateOrderItem,
            json!({ "user_id": 1, "quantity": 3, "tablenumber": 2 }),
        );
        assert!(matches!(
            result,
            Err(DispatchError::Decode { action: Action::CreateOrderItem, ref reason })
                if reason.contains("product_id")
        ));
    }

    #[test]
    fn test_edit_payload_only_sets_supplied_fields() {
        let payload: EditProductPayload = decode(
            Action::EditProduct,
            json!({ "updateOrderDTO": { "product": "Burger", "newPrice": 650 } }),
        )
        .unwrap();

        let cmd = UpdateProduct::try_from(payload).unwrap();
        assert_eq!(cmd.current_name, "Burger");
        assert_eq!(cmd.new_name, None);
        assert_eq!(cmd.new_price, Some(Money::from_cents(650)));
        assert_eq!(cmd.new_description, None);
    }

    #[test]
    fn test_edit_payload_requires_product_name() {
        let payload: EditProductPayload = decode(
            Action::EditProduct,
            json!({ "updateOrderDTO": { "product": "", "newnameProduct": "Fries" } }),
        )
        .unwrap();

        assert!(UpdateProduct::try_from(payload).is_err());
    }

    #[test]
    fn test_status_payload_accepts_legacy_name() {
        let payload: UpdateStatusPayload = decode(
            Action::UpdateOrderStatus,
            json!({ "order_id": 3, "new_status": "Pendiente" }),
        )
        .unwrap();
        assert_eq!(payload.new_status, OrderStatus::Pending);

        let result: Result<UpdateStatusPayload, _> = decode(
            Action::UpdateOrderStatus,
            json!({ "order_id": 3, "new_status": "Paid" }),
        );
        assert!(result.is_err());
    }
}
