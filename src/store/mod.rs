//! Repository interfaces the engines run against. Implementations return
//! plain records; no query-on-access. `pg` is the production backend,
//! `memory` backs the test suite and local experiments.

pub mod memory;
pub mod pg;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use crate::cart::models::{Cart, CartItem};
use crate::notification::models::{LowStockNotification, NewLowStockNotification};
use crate::product::models::{NewProduct, Product};
use crate::report::models::{DailySalesReport, ReportMetrics};
use crate::utils::StoreError;

/// Outcome of a cart write whose stock precondition is re-checked atomically
/// with the write itself, closing the check-then-act window.
#[derive(Debug, PartialEq, Clone)]
pub enum StockCheckedWrite {
    Written(CartItem),
    OutOfStock { available: i32 },
    MissingProduct,
    MissingItem,
}

#[async_trait]
pub trait ProductRepo: Send + Sync {
    async fn find(&self, id: i32) -> Result<Option<Product>, StoreError>;
    async fn by_ids(&self, ids: &[i32]) -> Result<Vec<Product>, StoreError>;
    async fn all(&self) -> Result<Vec<Product>, StoreError>;
    async fn create(&self, new: NewProduct) -> Result<Product, StoreError>;
    /// Returns the updated product, or `None` if it does not exist.
    async fn set_stock(&self, id: i32, stock: i32) -> Result<Option<Product>, StoreError>;
}

#[async_trait]
pub trait CartRepo: Send + Sync {
    async fn cart_for_user(&self, user_id: Uuid) -> Result<Option<Cart>, StoreError>;
    /// Conflict-safe on the unique `user_id`; a concurrent creator's row is
    /// returned instead of an error.
    async fn create_cart(&self, user_id: Uuid) -> Result<Cart, StoreError>;
    async fn item(&self, item_id: i32) -> Result<Option<CartItem>, StoreError>;
    async fn items_with_products(
        &self,
        cart_id: i32,
    ) -> Result<Vec<(CartItem, Product)>, StoreError>;
    /// Merge-law add: an existing (cart, product) row has `qty` summed into
    /// it, otherwise a row is created. Fails the stock precondition when the
    /// product's stock is below `qty`.
    async fn add_item(
        &self,
        cart_id: i32,
        product_id: i32,
        qty: i32,
    ) -> Result<StockCheckedWrite, StoreError>;
    /// Sets an item's quantity. Fails the stock precondition when the new
    /// quantity exceeds the product's stock; `available` then reports the
    /// remaining headroom (stock minus the item's current quantity).
    async fn set_quantity(&self, item_id: i32, qty: i32) -> Result<StockCheckedWrite, StoreError>;
    async fn delete_item(&self, item_id: i32) -> Result<bool, StoreError>;
    /// Sum of quantities across the cart, not the row count.
    async fn quantity_total(&self, cart_id: i32) -> Result<i64, StoreError>;
    /// Items created in `[from, to)`, for daily aggregation.
    async fn items_created_during(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<CartItem>, StoreError>;
}

/// Result of inserting a pending notification under the
/// (product, notified_on) uniqueness constraint.
#[derive(Debug, PartialEq, Clone)]
pub enum PendingInsert {
    Created(LowStockNotification),
    /// A row for this (product, day) already existed; the losing writer gets
    /// it back instead of a constraint error.
    Existing(LowStockNotification),
}

#[async_trait]
pub trait NotificationRepo: Send + Sync {
    /// Whether a *sent* notification exists for the product on `day`.
    async fn sent_on(&self, product_id: i32, day: NaiveDate) -> Result<bool, StoreError>;
    async fn insert_pending(
        &self,
        new: NewLowStockNotification,
    ) -> Result<PendingInsert, StoreError>;
    async fn mark_sent(&self, id: i32, at: NaiveDateTime) -> Result<(), StoreError>;
    async fn delete_created_before(&self, cutoff: NaiveDateTime) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait ReportRepo: Send + Sync {
    async fn find(&self, date: NaiveDate) -> Result<Option<DailySalesReport>, StoreError>;
    /// Upsert keyed on the unique `report_date`: existing metrics are
    /// overwritten, never accumulated.
    async fn upsert(
        &self,
        date: NaiveDate,
        admin_id: Uuid,
        metrics: &ReportMetrics,
    ) -> Result<DailySalesReport, StoreError>;
    async fn mark_sent(&self, date: NaiveDate, at: NaiveDateTime) -> Result<(), StoreError>;
    async fn delete_created_before(&self, cutoff: NaiveDateTime) -> Result<u64, StoreError>;
}

#[derive(Debug, PartialEq, Clone)]
pub struct AdminAccount {
    pub id: Uuid,
    pub email: String,
}

/// Resolves the administrator account receiving alerts and reports.
/// Resolved per operation, never cached process-wide.
#[async_trait]
pub trait AdminDirectory: Send + Sync {
    async fn resolve(&self) -> Result<Option<AdminAccount>, StoreError>;
}
