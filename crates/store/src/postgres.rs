use async_trait::async_trait;
use common::{Money, OrderId, OrderItemId, OrderStatus, ProductId, TableNumber, UserId};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction};

use crate::record::{NewOrder, NewOrderItem, NewProduct, Order, OrderItem, Product};
use crate::store::{Store, StoreTransaction};
use crate::{Result, StoreError};

/// Advisory lock class for the per-table pending order lookup.
const PENDING_ORDER_LOCK_CLASS: i32 = 0x4f52;

const ORDER_COLUMNS: &str = "id, table_number, user_id, order_date, total_amount, status";

const ITEM_WITH_PRODUCT: &str = r#"
    SELECT i.id, i.user_id, i.order_id, i.product_id, i.quantity, i.total_price, i.table_number,
           p.name AS product_name, p.description AS product_description, p.price AS product_price
    FROM order_items i
    JOIN products p ON p.id = i.product_id
"#;

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: Money::from_cents(row.try_get("price")?),
    })
}

fn row_to_item(row: &PgRow) -> Result<OrderItem> {
    let product_id = ProductId::new(row.try_get("product_id")?);
    let product = match row.try_get::<Option<String>, _>("product_name")? {
        Some(name) => Some(Product {
            id: product_id,
            name,
            description: row.try_get("product_description")?,
            price: Money::from_cents(row.try_get("product_price")?),
        }),
        None => None,
    };

    Ok(OrderItem {
        id: OrderItemId::new(row.try_get("id")?),
        user_id: UserId::new(row.try_get("user_id")?),
        order_id: row.try_get::<Option<i64>, _>("order_id")?.map(OrderId::new),
        product_id,
        product,
        quantity: row.try_get("quantity")?,
        total_price: Money::from_cents(row.try_get("total_price")?),
        table_number: TableNumber::new(row.try_get("table_number")?),
    })
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<OrderStatus>()
        .map_err(|e| StoreError::InvalidData(e.to_string()))?;

    Ok(Order {
        id: OrderId::new(row.try_get("id")?),
        table_number: TableNumber::new(row.try_get("table_number")?),
        user_id: UserId::new(row.try_get("user_id")?),
        items: Vec::new(),
        order_date: row.try_get("order_date")?,
        total_amount: Money::from_cents(row.try_get("total_amount")?),
        status,
    })
}

/// Loads the items of the given orders and attaches them in id order.
async fn attach_items(conn: &mut PgConnection, mut orders: Vec<Order>) -> Result<Vec<Order>> {
    if orders.is_empty() {
        return Ok(orders);
    }

    let ids: Vec<i64> = orders.iter().map(|o| o.id.as_i64()).collect();
    let rows = sqlx::query(&format!(
        "{ITEM_WITH_PRODUCT} WHERE i.order_id = ANY($1) ORDER BY i.id ASC"
    ))
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;

    for row in &rows {
        let item = row_to_item(row)?;
        if let Some(order) = orders.iter_mut().find(|o| Some(o.id) == item.order_id) {
            order.items.push(item);
        }
    }
    Ok(orders)
}

async fn fetch_order(
    conn: &mut PgConnection,
    sql: &str,
    bind: i64,
) -> Result<Option<Order>> {
    let row = sqlx::query(sql).bind(bind).fetch_optional(&mut *conn).await?;
    match row {
        Some(row) => {
            let order = row_to_order(&row)?;
            Ok(attach_items(conn, vec![order]).await?.pop())
        }
        None => Ok(None),
    }
}

async fn fetch_product_by_name(conn: &mut PgConnection, name: &str) -> Result<Option<Product>> {
    let row = sqlx::query("SELECT id, name, description, price FROM products WHERE name = $1")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_product).transpose()
}

async fn fetch_order_item(conn: &mut PgConnection, id: OrderItemId) -> Result<Option<OrderItem>> {
    let row = sqlx::query(&format!("{ITEM_WITH_PRODUCT} WHERE i.id = $1"))
        .bind(id.as_i64())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_item).transpose()
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        let tx = self.pool.begin().await?;
        Ok(PostgresTransaction { tx })
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT id, name, description, price FROM products WHERE id = $1")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_product).transpose()
    }

    async fn find_product_by_name(&self, name: &str) -> Result<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch_product_by_name(&mut conn, name).await
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(
            &mut conn,
            &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"),
            id.as_i64(),
        )
        .await
    }

    async fn find_pending_order(&self, table_number: TableNumber) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(
            &mut conn,
            &format!(
                "SELECT {ORDER_COLUMNS} FROM orders WHERE table_number = $1 AND status = 'Pending'"
            ),
            i64::from(table_number.as_i32()),
        )
        .await
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY id ASC"
        ))
        .fetch_all(&mut *conn)
        .await?;

        let orders = rows
            .iter()
            .map(row_to_order)
            .collect::<Result<Vec<_>>>()?;
        attach_items(&mut conn, orders).await
    }

    async fn get_order_item(&self, id: OrderItemId) -> Result<Option<OrderItem>> {
        let mut conn = self.pool.acquire().await?;
        fetch_order_item(&mut conn, id).await
    }

    async fn list_order_items(&self) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(&format!("{ITEM_WITH_PRODUCT} ORDER BY i.id ASC"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_item).collect()
    }

    async fn list_order_items_by_user(&self, user_id: UserId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(&format!(
            "{ITEM_WITH_PRODUCT} WHERE i.user_id = $1 ORDER BY i.id ASC"
        ))
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_item).collect()
    }
}

/// Transaction over a [`PostgresStore`].
///
/// Wraps a `sqlx` transaction, which rolls back when dropped uncommitted.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn find_product_by_name(&mut self, name: &str) -> Result<Option<Product>> {
        fetch_product_by_name(&mut self.tx, name).await
    }

    async fn insert_product(&mut self, product: NewProduct) -> Result<Product> {
        let row = sqlx::query(
            r#"
            INSERT INTO products (name, description, price)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, price
            "#,
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .fetch_one(&mut *self.tx)
        .await?;
        row_to_product(&row)
    }

    async fn update_product(&mut self, product: &Product) -> Result<()> {
        let result = sqlx::query(
            "UPDATE products SET name = $2, description = $3, price = $4 WHERE id = $1",
        )
        .bind(product.id.as_i64())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "product",
                id: product.id.as_i64(),
            });
        }
        Ok(())
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<()> {
        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_i64())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn product_in_use(&mut self, id: ProductId) -> Result<bool> {
        let in_use: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM order_items WHERE product_id = $1)")
                .bind(id.as_i64())
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(in_use)
    }

    async fn lock_pending_order(&mut self, table_number: TableNumber) -> Result<Option<Order>> {
        // Held until commit/rollback; a concurrent caller for the same table
        // blocks here and then sees the winner's committed order.
        sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind(PENDING_ORDER_LOCK_CLASS)
            .bind(table_number.as_i32())
            .execute(&mut *self.tx)
            .await?;

        fetch_order(
            &mut self.tx,
            &format!(
                "SELECT {ORDER_COLUMNS} FROM orders WHERE table_number = $1 AND status = 'Pending' FOR UPDATE"
            ),
            i64::from(table_number.as_i32()),
        )
        .await
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        fetch_order(
            &mut self.tx,
            &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"),
            id.as_i64(),
        )
        .await
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO orders (table_number, user_id, order_date, total_amount, status)
            VALUES ($1, $2, $3, 0, $4)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order.table_number.as_i32())
        .bind(order.user_id.as_i64())
        .bind(order.order_date)
        .bind(order.status.as_str())
        .fetch_one(&mut *self.tx)
        .await?;
        row_to_order(&row)
    }

    async fn set_order_total(&mut self, id: OrderId, total: Money) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET total_amount = $2 WHERE id = $1")
            .bind(id.as_i64())
            .bind(total.cents())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "order",
                id: id.as_i64(),
            });
        }
        Ok(())
    }

    async fn set_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(id.as_i64())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "order",
                id: id.as_i64(),
            });
        }
        Ok(())
    }

    async fn get_order_item(&mut self, id: OrderItemId) -> Result<Option<OrderItem>> {
        fetch_order_item(&mut self.tx, id).await
    }

    async fn insert_order_item(&mut self, item: NewOrderItem) -> Result<OrderItem> {
        let row = sqlx::query(
            r#"
            INSERT INTO order_items (user_id, order_id, product_id, quantity, total_price, table_number)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, order_id, product_id, quantity, total_price, table_number,
                      NULL::TEXT AS product_name, NULL::TEXT AS product_description,
                      NULL::BIGINT AS product_price
            "#,
        )
        .bind(item.user_id.as_i64())
        .bind(item.order_id.as_i64())
        .bind(item.product_id.as_i64())
        .bind(item.quantity)
        .bind(item.total_price.cents())
        .bind(item.table_number.as_i32())
        .fetch_one(&mut *self.tx)
        .await?;
        row_to_item(&row)
    }

    async fn delete_order_item(&mut self, id: OrderItemId) -> Result<()> {
        let result = sqlx::query("DELETE FROM order_items WHERE id = $1")
            .bind(id.as_i64())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "order item",
                id: id.as_i64(),
            });
        }
        Ok(())
    }

    async fn sum_item_totals(&mut self, order_id: OrderId) -> Result<Money> {
        // Summed client side: SUM(BIGINT) widens to NUMERIC.
        let totals: Vec<i64> =
            sqlx::query_scalar("SELECT total_price FROM order_items WHERE order_id = $1")
                .bind(order_id.as_i64())
                .fetch_all(&mut *self.tx)
                .await?;
        Money::checked_sum(totals.into_iter().map(Money::from_cents)).ok_or(
            StoreError::TotalOutOfRange {
                order_id: order_id.as_i64(),
            },
        )
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
