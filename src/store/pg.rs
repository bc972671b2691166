use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use super::{
    AdminAccount, AdminDirectory, CartRepo, NotificationRepo, PendingInsert, ProductRepo,
    ReportRepo, StockCheckedWrite,
};
use crate::cart::models::{Cart, CartItem, NewCart};
use crate::notification::models::{LowStockNotification, NewLowStockNotification};
use crate::product::models::{NewProduct, Product};
use crate::report::models::{DailySalesReport, ReportMetrics};
use crate::utils::{types::Pool, StoreError};

pub async fn build_pool(database_url: &str) -> Result<Pool, String> {
    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    bb8::Pool::builder()
        .build(config)
        .await
        .map_err(|e| format!("Failed to create db pool: {}", e))
}

/// Postgres-backed repositories over a shared bb8 pool.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn conn(
        &self,
    ) -> Result<bb8::PooledConnection<'_, AsyncDieselConnectionManager<AsyncPgConnection>>, StoreError>
    {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))
    }
}

#[async_trait]
impl ProductRepo for PgStore {
    async fn find(&self, id: i32) -> Result<Option<Product>, StoreError> {
        use crate::schema::products;

        let mut conn = self.conn().await?;
        let res = products::table
            .find(id)
            .select(Product::as_select())
            .get_result(&mut conn)
            .await
            .optional()?;
        Ok(res)
    }

    async fn by_ids(&self, ids: &[i32]) -> Result<Vec<Product>, StoreError> {
        use crate::schema::products;

        let mut conn = self.conn().await?;
        let res = products::table
            .filter(products::id.eq_any(ids))
            .select(Product::as_select())
            .load(&mut conn)
            .await?;
        Ok(res)
    }

    async fn all(&self) -> Result<Vec<Product>, StoreError> {
        use crate::schema::products;

        let mut conn = self.conn().await?;
        let res = products::table
            .order(products::id.asc())
            .select(Product::as_select())
            .load(&mut conn)
            .await?;
        Ok(res)
    }

    async fn create(&self, new: NewProduct) -> Result<Product, StoreError> {
        use crate::schema::products;

        let mut conn = self.conn().await?;
        let res = diesel::insert_into(products::table)
            .values(&new)
            .returning(Product::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(res)
    }

    async fn set_stock(&self, id: i32, stock: i32) -> Result<Option<Product>, StoreError> {
        use crate::schema::products;

        let mut conn = self.conn().await?;
        let res = diesel::update(products::table.find(id))
            .set(products::stock_quantity.eq(stock))
            .returning(Product::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?;
        Ok(res)
    }
}

#[async_trait]
impl CartRepo for PgStore {
    async fn cart_for_user(&self, user_id: Uuid) -> Result<Option<Cart>, StoreError> {
        use crate::schema::carts;

        let mut conn = self.conn().await?;
        let res = carts::table
            .filter(carts::user_id.eq(user_id))
            .select(Cart::as_select())
            .get_result(&mut conn)
            .await
            .optional()?;
        Ok(res)
    }

    async fn create_cart(&self, user_id: Uuid) -> Result<Cart, StoreError> {
        use crate::schema::carts;

        let mut conn = self.conn().await?;
        let new_cart = NewCart {
            user_id,
            created_at: Local::now().naive_local(),
        };
        // A concurrent creator wins the unique user_id; read their row back.
        let inserted = diesel::insert_into(carts::table)
            .values(&new_cart)
            .on_conflict(carts::user_id)
            .do_nothing()
            .returning(Cart::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?;
        match inserted {
            Some(cart) => Ok(cart),
            None => {
                let cart = carts::table
                    .filter(carts::user_id.eq(user_id))
                    .select(Cart::as_select())
                    .get_result(&mut conn)
                    .await?;
                Ok(cart)
            }
        }
    }

    async fn item(&self, item_id: i32) -> Result<Option<CartItem>, StoreError> {
        use crate::schema::cart_items;

        let mut conn = self.conn().await?;
        let res = cart_items::table
            .find(item_id)
            .select(CartItem::as_select())
            .get_result(&mut conn)
            .await
            .optional()?;
        Ok(res)
    }

    async fn items_with_products(
        &self,
        cart_id: i32,
    ) -> Result<Vec<(CartItem, Product)>, StoreError> {
        use crate::schema::{cart_items, products};

        let mut conn = self.conn().await?;
        let res = cart_items::table
            .inner_join(products::table)
            .filter(cart_items::cart_id.eq(cart_id))
            .order(cart_items::id.asc())
            .select((CartItem::as_select(), Product::as_select()))
            .load::<(CartItem, Product)>(&mut conn)
            .await?;
        Ok(res)
    }

    async fn add_item(
        &self,
        cart_id: i32,
        product_id: i32,
        qty: i32,
    ) -> Result<StockCheckedWrite, StoreError> {
        use crate::schema::{cart_items, products};

        let mut conn = self.conn().await?;
        let res = conn
            .transaction::<StockCheckedWrite, diesel::result::Error, _>(move |mut conn| {
                Box::pin(async move {
                    // Lock the product row so the stock precondition holds at
                    // commit time. No stock is decremented.
                    let product = products::table
                        .find(product_id)
                        .select(Product::as_select())
                        .for_update()
                        .get_result(&mut conn)
                        .await
                        .optional()?;

                    let stock = match product {
                        Some(product) => product.stock_quantity,
                        None => return Ok(StockCheckedWrite::MissingProduct),
                    };
                    if stock < qty {
                        return Ok(StockCheckedWrite::OutOfStock { available: stock });
                    }

                    let item = diesel::insert_into(cart_items::table)
                        .values((
                            cart_items::cart_id.eq(cart_id),
                            cart_items::product_id.eq(product_id),
                            cart_items::quantity.eq(qty),
                            cart_items::created_at.eq(Local::now().naive_local()),
                        ))
                        .on_conflict((cart_items::cart_id, cart_items::product_id))
                        .do_update()
                        .set(cart_items::quantity.eq(cart_items::quantity + qty))
                        .returning(CartItem::as_returning())
                        .get_result(&mut conn)
                        .await?;

                    Ok(StockCheckedWrite::Written(item))
                })
            })
            .await?;
        Ok(res)
    }

    async fn set_quantity(&self, item_id: i32, qty: i32) -> Result<StockCheckedWrite, StoreError> {
        use crate::schema::{cart_items, products};

        let mut conn = self.conn().await?;
        let res = conn
            .transaction::<StockCheckedWrite, diesel::result::Error, _>(move |mut conn| {
                Box::pin(async move {
                    let item = cart_items::table
                        .find(item_id)
                        .select(CartItem::as_select())
                        .for_update()
                        .get_result(&mut conn)
                        .await
                        .optional()?;
                    let item = match item {
                        Some(item) => item,
                        None => return Ok(StockCheckedWrite::MissingItem),
                    };

                    let product = products::table
                        .find(item.product_id)
                        .select(Product::as_select())
                        .for_update()
                        .get_result(&mut conn)
                        .await
                        .optional()?;
                    let stock = match product {
                        Some(product) => product.stock_quantity,
                        None => return Ok(StockCheckedWrite::MissingProduct),
                    };

                    // Growing the line must fit the headroom left on top of
                    // what this item already holds.
                    if qty > item.quantity && qty > stock {
                        return Ok(StockCheckedWrite::OutOfStock {
                            available: stock - item.quantity,
                        });
                    }

                    let updated = diesel::update(cart_items::table.find(item_id))
                        .set(cart_items::quantity.eq(qty))
                        .returning(CartItem::as_returning())
                        .get_result(&mut conn)
                        .await?;
                    Ok(StockCheckedWrite::Written(updated))
                })
            })
            .await?;
        Ok(res)
    }

    async fn delete_item(&self, item_id: i32) -> Result<bool, StoreError> {
        use crate::schema::cart_items;

        let mut conn = self.conn().await?;
        let deleted = diesel::delete(cart_items::table.find(item_id))
            .execute(&mut conn)
            .await?;
        Ok(deleted > 0)
    }

    async fn quantity_total(&self, cart_id: i32) -> Result<i64, StoreError> {
        use crate::schema::cart_items;
        use diesel::dsl::sum;

        let mut conn = self.conn().await?;
        let total: Option<i64> = cart_items::table
            .filter(cart_items::cart_id.eq(cart_id))
            .select(sum(cart_items::quantity))
            .get_result(&mut conn)
            .await?;
        Ok(total.unwrap_or(0))
    }

    async fn items_created_during(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<CartItem>, StoreError> {
        use crate::schema::cart_items;

        let mut conn = self.conn().await?;
        let res = cart_items::table
            .filter(cart_items::created_at.ge(from))
            .filter(cart_items::created_at.lt(to))
            .order(cart_items::id.asc())
            .select(CartItem::as_select())
            .load(&mut conn)
            .await?;
        Ok(res)
    }
}

#[async_trait]
impl NotificationRepo for PgStore {
    async fn sent_on(&self, product_id: i32, day: NaiveDate) -> Result<bool, StoreError> {
        use crate::schema::low_stock_notifications as notifications;
        use diesel::dsl::exists;

        let mut conn = self.conn().await?;
        let sent = diesel::select(exists(
            notifications::table
                .filter(notifications::product_id.eq(product_id))
                .filter(notifications::notified_on.eq(day))
                .filter(notifications::sent_at.is_not_null()),
        ))
        .get_result(&mut conn)
        .await?;
        Ok(sent)
    }

    async fn insert_pending(
        &self,
        new: NewLowStockNotification,
    ) -> Result<PendingInsert, StoreError> {
        use crate::schema::low_stock_notifications as notifications;

        let mut conn = self.conn().await?;
        let inserted = diesel::insert_into(notifications::table)
            .values(&new)
            .on_conflict((notifications::product_id, notifications::notified_on))
            .do_nothing()
            .returning(LowStockNotification::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?;
        match inserted {
            Some(row) => Ok(PendingInsert::Created(row)),
            None => {
                // Lost the (product, day) uniqueness race; hand back the
                // winner's row.
                let existing = notifications::table
                    .filter(notifications::product_id.eq(new.product_id))
                    .filter(notifications::notified_on.eq(new.notified_on))
                    .select(LowStockNotification::as_select())
                    .get_result(&mut conn)
                    .await?;
                Ok(PendingInsert::Existing(existing))
            }
        }
    }

    async fn mark_sent(&self, id: i32, at: NaiveDateTime) -> Result<(), StoreError> {
        use crate::schema::low_stock_notifications as notifications;

        let mut conn = self.conn().await?;
        diesel::update(notifications::table.find(id))
            .set(notifications::sent_at.eq(Some(at)))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete_created_before(&self, cutoff: NaiveDateTime) -> Result<u64, StoreError> {
        use crate::schema::low_stock_notifications as notifications;

        let mut conn = self.conn().await?;
        let deleted = diesel::delete(notifications::table.filter(notifications::created_at.lt(cutoff)))
            .execute(&mut conn)
            .await?;
        Ok(deleted as u64)
    }
}

#[async_trait]
impl ReportRepo for PgStore {
    async fn find(&self, date: NaiveDate) -> Result<Option<DailySalesReport>, StoreError> {
        use crate::schema::daily_sales_reports as reports;

        let mut conn = self.conn().await?;
        let res = reports::table
            .filter(reports::report_date.eq(date))
            .select(DailySalesReport::as_select())
            .get_result(&mut conn)
            .await
            .optional()?;
        Ok(res)
    }

    async fn upsert(
        &self,
        date: NaiveDate,
        admin_id: Uuid,
        metrics: &ReportMetrics,
    ) -> Result<DailySalesReport, StoreError> {
        use crate::schema::daily_sales_reports as reports;

        let mut conn = self.conn().await?;
        let top_products =
            serde_json::to_value(&metrics.top_products).unwrap_or_else(|_| serde_json::json!([]));
        let res = diesel::insert_into(reports::table)
            .values((
                reports::report_date.eq(date),
                reports::admin_id.eq(admin_id),
                reports::total_items_sold.eq(metrics.total_items_sold),
                reports::total_revenue.eq(&metrics.total_revenue),
                reports::unique_products_sold.eq(metrics.unique_products_sold),
                reports::top_products.eq(&top_products),
                reports::created_at.eq(Local::now().naive_local()),
            ))
            .on_conflict(reports::report_date)
            .do_update()
            .set((
                reports::admin_id.eq(admin_id),
                reports::total_items_sold.eq(metrics.total_items_sold),
                reports::total_revenue.eq(&metrics.total_revenue),
                reports::unique_products_sold.eq(metrics.unique_products_sold),
                reports::top_products.eq(&top_products),
            ))
            .returning(DailySalesReport::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(res)
    }

    async fn mark_sent(&self, date: NaiveDate, at: NaiveDateTime) -> Result<(), StoreError> {
        use crate::schema::daily_sales_reports as reports;

        let mut conn = self.conn().await?;
        diesel::update(reports::table.filter(reports::report_date.eq(date)))
            .set((reports::is_sent.eq(true), reports::sent_at.eq(Some(at))))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete_created_before(&self, cutoff: NaiveDateTime) -> Result<u64, StoreError> {
        use crate::schema::daily_sales_reports as reports;

        let mut conn = self.conn().await?;
        let deleted = diesel::delete(reports::table.filter(reports::created_at.lt(cutoff)))
            .execute(&mut conn)
            .await?;
        Ok(deleted as u64)
    }
}

/// Resolves the admin as the user row matching the configured email,
/// looked up fresh for every operation.
pub struct PgAdminDirectory {
    pool: Pool,
    admin_email: String,
}

impl PgAdminDirectory {
    pub fn new(pool: Pool, admin_email: String) -> Self {
        Self { pool, admin_email }
    }
}

#[async_trait]
impl AdminDirectory for PgAdminDirectory {
    async fn resolve(&self) -> Result<Option<AdminAccount>, StoreError> {
        use crate::schema::users;

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))?;
        let row: Option<(Uuid, String)> = users::table
            .filter(users::email.eq(&self.admin_email))
            .select((users::id, users::email))
            .get_result(&mut conn)
            .await
            .optional()?;
        Ok(row.map(|(id, email)| AdminAccount { id, email }))
    }
}
