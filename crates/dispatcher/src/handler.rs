//! Routes one inbound message to one catalog or order operation.

use std::str::FromStr;
use std::time::{Duration, Instant};

use domain::{CatalogService, DomainError, OrderService, UpdateProduct};
use serde::Serialize;
use serde_json::Value;
use store::Store;

use crate::action::Action;
use crate::envelope::Reply;
use crate::error::DispatchError;
use crate::payload::{
    CreateOrderItemPayload, CreateProductPayload, DeleteOrderItemPayload, DeleteProductPayload,
    EditProductPayload, ProductRef, UpdateStatusPayload, UserPayload, decode,
};

/// Default deadline for a single message.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Decodes messages, runs the matching operation under a deadline and
/// encodes the outcome as a [`Reply`].
///
/// Dispatching never fails: every error becomes an error reply.
pub struct Dispatcher<S: Store> {
    catalog: CatalogService<S>,
    orders: OrderService<S>,
    timeout: Duration,
}

impl<S: Store + Clone> Dispatcher<S> {
    /// Creates a dispatcher whose services share one store.
    pub fn new(store: S, timeout: Duration) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            orders: OrderService::new(store),
            timeout,
        }
    }
}

impl<S: Store> Dispatcher<S> {
    pub fn catalog(&self) -> &CatalogService<S> {
        &self.catalog
    }

    pub fn orders(&self) -> &OrderService<S> {
        &self.orders
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Dispatches a decoded message.
    ///
    /// The operation is dropped when the deadline expires, which rolls back
    /// any transaction it still holds.
    #[tracing::instrument(skip(self, data))]
    pub async fn dispatch(&self, pattern: &str, data: Value) -> Reply {
        let started = Instant::now();

        let action = Action::from_str(pattern);
        let label = action
            .as_ref()
            .map(|action| action.as_str())
            .unwrap_or("unknown");

        let result = match action {
            Ok(action) => match tokio::time::timeout(self.timeout, self.execute(action, data)).await
            {
                Ok(result) => result,
                Err(_) => Err(DispatchError::Timeout(self.timeout)),
            },
            Err(err) => Err(err),
        };
        metrics::histogram!("dispatch_duration_seconds", "pattern" => label)
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(reply) => {
                metrics::counter!("dispatch_messages_total", "pattern" => label, "outcome" => "success")
                    .increment(1);
                tracing::debug!(message = %reply.message, "Dispatched");
                reply
            }
            Err(err) => self.reject_as(label, err),
        }
    }

    /// Builds the error reply for a message that could not be dispatched.
    pub fn reject(&self, err: DispatchError) -> Reply {
        self.reject_as("unknown", err)
    }

    fn reject_as(&self, label: &'static str, err: DispatchError) -> Reply {
        let kind = err.kind();
        metrics::counter!(
            "dispatch_messages_total",
            "pattern" => label,
            "outcome" => kind.as_str()
        )
        .increment(1);
        tracing::warn!(pattern = label, kind = %kind, error = %err, "Dispatch failed");
        err.into_reply()
    }

    async fn execute(&self, action: Action, data: Value) -> Result<Reply, DispatchError> {
        let failed = |source: DomainError| DispatchError::Domain { action, source };

        match action {
            Action::GetProduct => {
                let id = decode::<ProductRef>(action, data)?.into_id()?;
                let product = self.catalog.get_product(id).await.map_err(failed)?;
                success(action, &product)
            }
            Action::CreateProduct => {
                let payload: CreateProductPayload = decode(action, data)?;
                let product = self
                    .catalog
                    .create_product(payload.into())
                    .await
                    .map_err(failed)?;
                success(action, &product)
            }
            Action::EditProduct => {
                let payload: EditProductPayload = decode(action, data)?;
                let cmd = UpdateProduct::try_from(payload)?;
                let product = self.catalog.update_product(cmd).await.map_err(failed)?;
                success(action, &product)
            }
            Action::DeleteProduct => {
                let payload: DeleteProductPayload = decode(action, data)?;
                let product = self
                    .catalog
                    .delete_by_name(&payload.name)
                    .await
                    .map_err(failed)?;
                success(action, &product)
            }
            Action::CreateOrderItem => {
                let payload: CreateOrderItemPayload = decode(action, data)?;
                let item = self.orders.add_item(payload.into()).await.map_err(failed)?;
                success(action, &item)
            }
            Action::GetAllOrderItems => {
                let items = self.orders.list_items().await.map_err(failed)?;
                success(action, &items)
            }
            Action::GetOrderItemsByUser => {
                let payload: UserPayload = decode(action, data)?;
                let items = self
                    .orders
                    .list_items_by_user(payload.user_id)
                    .await
                    .map_err(failed)?;
                success(action, &items)
            }
            Action::GetAllOrders => {
                let orders = self.orders.list_orders().await.map_err(failed)?;
                success(action, &orders)
            }
            Action::UpdateOrderStatus => {
                let payload: UpdateStatusPayload = decode(action, data)?;
                let order = self
                    .orders
                    .update_status(payload.into())
                    .await
                    .map_err(failed)?;
                success(action, &order)
            }
            Action::DeleteOrderItem => {
                let payload: DeleteOrderItemPayload = decode(action, data)?;
                let item = self
                    .orders
                    .remove_item(payload.into())
                    .await
                    .map_err(failed)?;
                success(action, &item)
            }
        }
    }
}

fn success<T: Serialize>(action: Action, value: &T) -> Result<Reply, DispatchError> {
    let data = serde_json::to_value(value).map_err(DispatchError::Encode)?;
    Ok(Reply::success(action.success_message(), data))
}
