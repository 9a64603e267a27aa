use async_trait::async_trait;
use chrono::Utc;
use common::{ProductId, UserId};
use domain::{Cart, CartItem, NewOrder, NewOrderItem, Product};
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};

use crate::{
    Result, StoreError,
    store::{OrderWriter, ProductLookup, Transaction, TransactionManager, UserCartStore},
};

const SELECT_PRODUCT: &str = r#"
    SELECT id, name, price::text AS price, stock
    FROM products
    WHERE id = $1
"#;

const ADJUST_STOCK: &str = r#"
    UPDATE products
    SET stock = stock + $2, updated_at = NOW()
    WHERE id = $1
"#;

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(row.try_get::<String, _>("id")?),
        name: row.try_get("name")?,
        price: row.try_get("price")?,
        stock: row.try_get("stock")?,
    })
}

/// PostgreSQL-backed catalog and order store.
#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ProductLookup for PgDatabase {
    async fn get_by_id(&self, product_id: &ProductId) -> Result<Product> {
        let row = sqlx::query(SELECT_PRODUCT)
            .bind(product_id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))?;
        row_to_product(row)
    }

    async fn adjust_stock(&self, product_id: &ProductId, delta: i32) -> Result<()> {
        let result = sqlx::query(ADJUST_STOCK)
            .bind(product_id.as_str())
            .bind(delta)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::ProductNotFound(product_id.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionManager for PgDatabase {
    type Tx = PgTransaction;

    async fn begin(&self) -> Result<PgTransaction> {
        Ok(PgTransaction {
            tx: self.pool.begin().await?,
        })
    }
}

/// A transaction on [`PgDatabase`].
///
/// Stock reads take no row lock; see [`InMemoryDatabase`](crate::InMemoryDatabase)
/// for the resulting oversell window.
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl OrderWriter for PgTransaction {
    async fn create_order(&mut self, order: &NewOrder) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, total_amount, status, created_at, updated_at)
            VALUES ($1, $2, $3::numeric, $4, $5, $6)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_str())
        .bind(&order.total_amount)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn create_order_item(&mut self, item: &NewOrderItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, product_id, quantity, price, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5::numeric, $6, $7)
            "#,
        )
        .bind(item.id)
        .bind(item.order_id.as_uuid())
        .bind(item.product_id.as_str())
        .bind(item.quantity)
        .bind(&item.price)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn get_product(&mut self, product_id: &ProductId) -> Result<Product> {
        let row = sqlx::query(SELECT_PRODUCT)
            .bind(product_id.as_str())
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| StoreError::ProductNotFound(product_id.clone()))?;
        row_to_product(row)
    }

    async fn adjust_stock(&mut self, product_id: &ProductId, delta: i32) -> Result<()> {
        let result = sqlx::query(ADJUST_STOCK)
            .bind(product_id.as_str())
            .bind(delta)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::ProductNotFound(product_id.clone()));
        }
        Ok(())
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

/// PostgreSQL-backed user carts, one JSONB document per user.
///
/// Mutations lock the user's row (`SELECT ... FOR UPDATE`) for the
/// duration of the read-modify-write.
#[derive(Clone)]
pub struct PgUserCartStore {
    pool: PgPool,
}

impl PgUserCartStore {
    /// Creates a new PostgreSQL user cart store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn modify<F>(&self, user_id: &UserId, create: bool, f: F) -> Result<()>
    where
        F: FnOnce(&mut Cart) -> Result<()> + Send,
    {
        let mut tx = self.pool.begin().await?;

        let row: Option<PgRow> =
            sqlx::query("SELECT document FROM user_carts WHERE user_id = $1 FOR UPDATE")
                .bind(user_id.as_str())
                .fetch_optional(&mut *tx)
                .await?;

        let mut cart = match row {
            Some(row) => serde_json::from_value(row.try_get("document")?)?,
            None if create => Cart::new_user(user_id),
            None => return Ok(()),
        };

        f(&mut cart)?;

        let document = serde_json::to_value(&cart)?;
        sqlx::query(
            r#"
            INSERT INTO user_carts (user_id, document, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE SET
                document = EXCLUDED.document,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(user_id.as_str())
        .bind(document)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl UserCartStore for PgUserCartStore {
    async fn add_item(&self, user_id: &UserId, item: CartItem) -> Result<()> {
        self.modify(user_id, true, |cart| {
            cart.merge_item(item);
            Ok(())
        })
        .await
    }

    async fn get_by_user(&self, user_id: &UserId) -> Result<Option<Cart>> {
        let row: Option<PgRow> = sqlx::query("SELECT document FROM user_carts WHERE user_id = $1")
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(serde_json::from_value(row.try_get("document")?)?)),
            None => Ok(None),
        }
    }

    async fn update_quantity(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<()> {
        let mut found = false;
        self.modify(user_id, false, |cart| {
            found = cart.set_quantity(product_id, quantity);
            if found {
                Ok(())
            } else {
                Err(StoreError::ItemNotFound {
                    product_id: product_id.clone(),
                })
            }
        })
        .await?;
        if !found {
            return Err(StoreError::ItemNotFound {
                product_id: product_id.clone(),
            });
        }
        Ok(())
    }

    async fn remove_item(&self, user_id: &UserId, product_id: &ProductId) -> Result<()> {
        self.modify(user_id, false, |cart| {
            cart.remove_item(product_id);
            Ok(())
        })
        .await
    }

    async fn clear(&self, user_id: &UserId) -> Result<()> {
        self.modify(user_id, false, |cart| {
            cart.clear();
            Ok(())
        })
        .await
    }
}
