//! PostgreSQL token and cart repositories.

use async_trait::async_trait;
use common::{CartId, TourId, TouristId};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::error::{PurchaseError, Result};
use crate::models::{AddToCart, NewPurchaseToken, OrderItem, ShoppingCart, TourPurchaseToken};
use crate::repository::{CartRepository, TokenRepository};

/// Runs the database migrations for the purchase tables.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

/// PostgreSQL-backed token repository.
#[derive(Clone)]
pub struct PostgresTokenRepository {
    pool: PgPool,
}

impl PostgresTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_token(row: PgRow) -> Result<TourPurchaseToken> {
        Ok(TourPurchaseToken {
            id: row.try_get("id")?,
            tourist_id: TouristId::new(row.try_get("tourist_id")?),
            tour_id: TourId::new(row.try_get("tour_id")?),
            token: row.try_get("token")?,
            purchased_at: row.try_get("purchased_at")?,
        })
    }
}

#[async_trait]
impl TokenRepository for PostgresTokenRepository {
    #[tracing::instrument(skip(self, token), fields(tour_id = %token.tour_id))]
    async fn create_token(&self, token: NewPurchaseToken) -> Result<TourPurchaseToken> {
        let row = sqlx::query(
            r#"
            INSERT INTO tour_purchase_tokens (tourist_id, tour_id, token, purchased_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, tourist_id, tour_id, token, purchased_at
            "#,
        )
        .bind(token.tourist_id.as_i64())
        .bind(token.tour_id.as_i64())
        .bind(&token.token)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_token(row)
    }

    async fn tokens_for_tourist(&self, tourist_id: TouristId) -> Result<Vec<TourPurchaseToken>> {
        let rows = sqlx::query(
            r#"
            SELECT id, tourist_id, tour_id, token, purchased_at
            FROM tour_purchase_tokens
            WHERE tourist_id = $1
            ORDER BY purchased_at DESC, id DESC
            "#,
        )
        .bind(tourist_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_token).collect()
    }

    async fn token_by_value(&self, token: &str) -> Result<Option<TourPurchaseToken>> {
        let row = sqlx::query(
            r#"
            SELECT id, tourist_id, tour_id, token, purchased_at
            FROM tour_purchase_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_token).transpose()
    }

    async fn validate_token(&self, token: &str, tour_id: TourId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM tour_purchase_tokens WHERE token = $1 AND tour_id = $2)",
        )
        .bind(token)
        .bind(tour_id.as_i64())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn is_purchased(&self, tourist_id: TouristId, tour_id: TourId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM tour_purchase_tokens WHERE tourist_id = $1 AND tour_id = $2)",
        )
        .bind(tourist_id.as_i64())
        .bind(tour_id.as_i64())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

/// PostgreSQL-backed cart repository.
#[derive(Clone)]
pub struct PostgresCartRepository {
    pool: PgPool,
}

impl PostgresCartRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_item(row: PgRow) -> Result<OrderItem> {
        Ok(OrderItem {
            id: row.try_get("id")?,
            cart_id: CartId::new(row.try_get("cart_id")?),
            tour_id: TourId::new(row.try_get("tour_id")?),
            tour_name: row.try_get("tour_name")?,
            price: row.try_get("price")?,
            quantity: row.try_get("quantity")?,
            added_at: row.try_get("added_at")?,
        })
    }

    /// Returns the cart row for a tourist, inserting it on first use.
    async fn ensure_cart(&self, tourist_id: TouristId) -> Result<PgRow> {
        let row = sqlx::query(
            r#"
            INSERT INTO shopping_carts (tourist_id)
            VALUES ($1)
            ON CONFLICT (tourist_id) DO UPDATE SET tourist_id = EXCLUDED.tourist_id
            RETURNING id, tourist_id, created_at, updated_at
            "#,
        )
        .bind(tourist_id.as_i64())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn items(&self, cart_id: CartId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, cart_id, tour_id, tour_name, price, quantity, added_at
            FROM order_items
            WHERE cart_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(cart_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_item).collect()
    }

    async fn touch(&self, cart_id: CartId) -> Result<()> {
        sqlx::query("UPDATE shopping_carts SET updated_at = NOW() WHERE id = $1")
            .bind(cart_id.as_i64())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CartRepository for PostgresCartRepository {
    async fn cart_for_tourist(&self, tourist_id: TouristId) -> Result<ShoppingCart> {
        let row = self.ensure_cart(tourist_id).await?;
        let id = CartId::new(row.try_get("id")?);

        Ok(ShoppingCart {
            id,
            tourist_id,
            items: self.items(id).await?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    #[tracing::instrument(skip(self, request), fields(tour_id = %request.tour_id))]
    async fn add_item(&self, tourist_id: TouristId, request: AddToCart) -> Result<OrderItem> {
        request.validate()?;
        let cart_id = CartId::new(self.ensure_cart(tourist_id).await?.try_get("id")?);

        let row = sqlx::query(
            r#"
            INSERT INTO order_items (cart_id, tour_id, tour_name, price, quantity, added_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING id, cart_id, tour_id, tour_name, price, quantity, added_at
            "#,
        )
        .bind(cart_id.as_i64())
        .bind(request.tour_id.as_i64())
        .bind(&request.tour_name)
        .bind(request.price)
        .bind(request.quantity)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_cart_tour")
            {
                return PurchaseError::TourAlreadyInCart(request.tour_id);
            }
            PurchaseError::Database(e)
        })?;

        self.touch(cart_id).await?;
        Self::row_to_item(row)
    }

    async fn remove_item(&self, tourist_id: TouristId, item_id: i64) -> Result<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM order_items
            USING shopping_carts
            WHERE order_items.id = $1
              AND order_items.cart_id = shopping_carts.id
              AND shopping_carts.tourist_id = $2
            "#,
        )
        .bind(item_id)
        .bind(tourist_id.as_i64())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PurchaseError::ItemNotFound(item_id));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(cart_id = %cart_id))]
    async fn clear_cart(&self, cart_id: CartId) -> Result<()> {
        sqlx::query("DELETE FROM order_items WHERE cart_id = $1")
            .bind(cart_id.as_i64())
            .execute(&self.pool)
            .await?;
        self.touch(cart_id).await
    }
}
