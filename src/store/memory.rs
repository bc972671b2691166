//! Mutex-guarded in-memory backend. Backs the test suite; behaves like the
//! Postgres backend for every contract the engines rely on, including the
//! (cart, product) merge, the (product, day) notification uniqueness and the
//! report-date upsert.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime};
use uuid::Uuid;

use super::{
    AdminAccount, AdminDirectory, CartRepo, NotificationRepo, PendingInsert, ProductRepo,
    ReportRepo, StockCheckedWrite,
};
use crate::cart::models::{Cart, CartItem};
use crate::notification::models::{LowStockNotification, NewLowStockNotification};
use crate::product::models::{NewProduct, Product};
use crate::report::models::{DailySalesReport, ReportMetrics};
use crate::utils::StoreError;

#[derive(Default)]
struct Inner {
    products: BTreeMap<i32, Product>,
    carts: BTreeMap<i32, Cart>,
    items: BTreeMap<i32, CartItem>,
    notifications: BTreeMap<i32, LowStockNotification>,
    reports: BTreeMap<i32, DailySalesReport>,
    admin: Option<AdminAccount>,
    next_id: i32,
}

impl Inner {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the admin account the directory resolves to.
    pub fn set_admin(&self, email: &str) -> AdminAccount {
        let account = AdminAccount {
            id: Uuid::new_v4(),
            email: email.to_owned(),
        };
        self.inner.lock().unwrap().admin = Some(account.clone());
        account
    }

    /// Test hook: rewrites an item's creation timestamp so date-range
    /// behavior can be exercised without waiting for midnight.
    pub fn set_item_created_at(&self, item_id: i32, at: NaiveDateTime) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(item) = inner.items.get_mut(&item_id) {
            item.created_at = at;
        }
    }

    /// Test hook: reprices a product in place.
    pub fn set_price(&self, product_id: i32, price: bigdecimal::BigDecimal) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(product) = inner.products.get_mut(&product_id) {
            product.price = price;
        }
    }
}

#[async_trait]
impl ProductRepo for MemStore {
    async fn find(&self, id: i32) -> Result<Option<Product>, StoreError> {
        Ok(self.inner.lock().unwrap().products.get(&id).cloned())
    }

    async fn by_ids(&self, ids: &[i32]) -> Result<Vec<Product>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| inner.products.get(id).cloned())
            .collect())
    }

    async fn all(&self) -> Result<Vec<Product>, StoreError> {
        Ok(self.inner.lock().unwrap().products.values().cloned().collect())
    }

    async fn create(&self, new: NewProduct) -> Result<Product, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id();
        let product = Product {
            id,
            name: new.name,
            description: new.description,
            price: new.price,
            stock_quantity: new.stock_quantity,
        };
        inner.products.insert(id, product.clone());
        Ok(product)
    }

    async fn set_stock(&self, id: i32, stock: i32) -> Result<Option<Product>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.products.get_mut(&id).map(|product| {
            product.stock_quantity = stock;
            product.clone()
        }))
    }
}

#[async_trait]
impl CartRepo for MemStore {
    async fn cart_for_user(&self, user_id: Uuid) -> Result<Option<Cart>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .carts
            .values()
            .find(|cart| cart.user_id == user_id)
            .cloned())
    }

    async fn create_cart(&self, user_id: Uuid) -> Result<Cart, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.carts.values().find(|cart| cart.user_id == user_id) {
            return Ok(existing.clone());
        }
        let id = inner.next_id();
        let cart = Cart {
            id,
            user_id,
            created_at: now(),
        };
        inner.carts.insert(id, cart.clone());
        Ok(cart)
    }

    async fn item(&self, item_id: i32) -> Result<Option<CartItem>, StoreError> {
        Ok(self.inner.lock().unwrap().items.get(&item_id).cloned())
    }

    async fn items_with_products(
        &self,
        cart_id: i32,
    ) -> Result<Vec<(CartItem, Product)>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .items
            .values()
            .filter(|item| item.cart_id == cart_id)
            .filter_map(|item| {
                inner
                    .products
                    .get(&item.product_id)
                    .map(|product| (item.clone(), product.clone()))
            })
            .collect())
    }

    async fn add_item(
        &self,
        cart_id: i32,
        product_id: i32,
        qty: i32,
    ) -> Result<StockCheckedWrite, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let stock = match inner.products.get(&product_id) {
            Some(product) => product.stock_quantity,
            None => return Ok(StockCheckedWrite::MissingProduct),
        };
        if stock < qty {
            return Ok(StockCheckedWrite::OutOfStock { available: stock });
        }
        if let Some(existing) = inner
            .items
            .values_mut()
            .find(|item| item.cart_id == cart_id && item.product_id == product_id)
        {
            existing.quantity += qty;
            return Ok(StockCheckedWrite::Written(existing.clone()));
        }
        let id = inner.next_id();
        let item = CartItem {
            id,
            cart_id,
            product_id,
            quantity: qty,
            created_at: now(),
        };
        inner.items.insert(id, item.clone());
        Ok(StockCheckedWrite::Written(item))
    }

    async fn set_quantity(&self, item_id: i32, qty: i32) -> Result<StockCheckedWrite, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let (product_id, current) = match inner.items.get(&item_id) {
            Some(item) => (item.product_id, item.quantity),
            None => return Ok(StockCheckedWrite::MissingItem),
        };
        let stock = match inner.products.get(&product_id) {
            Some(product) => product.stock_quantity,
            None => return Ok(StockCheckedWrite::MissingProduct),
        };
        if qty > current && qty > stock {
            return Ok(StockCheckedWrite::OutOfStock {
                available: stock - current,
            });
        }
        let item = inner.items.get_mut(&item_id).unwrap();
        item.quantity = qty;
        Ok(StockCheckedWrite::Written(item.clone()))
    }

    async fn delete_item(&self, item_id: i32) -> Result<bool, StoreError> {
        Ok(self.inner.lock().unwrap().items.remove(&item_id).is_some())
    }

    async fn quantity_total(&self, cart_id: i32) -> Result<i64, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .items
            .values()
            .filter(|item| item.cart_id == cart_id)
            .map(|item| i64::from(item.quantity))
            .sum())
    }

    async fn items_created_during(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<CartItem>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut items: Vec<CartItem> = inner
            .items
            .values()
            .filter(|item| item.created_at >= from && item.created_at < to)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.id);
        Ok(items)
    }
}

#[async_trait]
impl NotificationRepo for MemStore {
    async fn sent_on(&self, product_id: i32, day: NaiveDate) -> Result<bool, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.notifications.values().any(|n| {
            n.product_id == product_id && n.notified_on == day && n.sent_at.is_some()
        }))
    }

    async fn insert_pending(
        &self,
        new: NewLowStockNotification,
    ) -> Result<PendingInsert, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner
            .notifications
            .values()
            .find(|n| n.product_id == new.product_id && n.notified_on == new.notified_on)
        {
            return Ok(PendingInsert::Existing(existing.clone()));
        }
        let id = inner.next_id();
        let notification = LowStockNotification {
            id,
            product_id: new.product_id,
            admin_id: new.admin_id,
            current_stock: new.current_stock,
            threshold_level: new.threshold_level,
            notified_on: new.notified_on,
            sent_at: None,
            created_at: now(),
        };
        inner.notifications.insert(id, notification.clone());
        Ok(PendingInsert::Created(notification))
    }

    async fn mark_sent(&self, id: i32, at: NaiveDateTime) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(notification) = inner.notifications.get_mut(&id) {
            notification.sent_at = Some(at);
        }
        Ok(())
    }

    async fn delete_created_before(&self, cutoff: NaiveDateTime) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.notifications.len();
        inner.notifications.retain(|_, n| n.created_at >= cutoff);
        Ok((before - inner.notifications.len()) as u64)
    }
}

#[async_trait]
impl ReportRepo for MemStore {
    async fn find(&self, date: NaiveDate) -> Result<Option<DailySalesReport>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .reports
            .values()
            .find(|report| report.report_date == date)
            .cloned())
    }

    async fn upsert(
        &self,
        date: NaiveDate,
        admin_id: Uuid,
        metrics: &ReportMetrics,
    ) -> Result<DailySalesReport, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let top_products =
            serde_json::to_value(&metrics.top_products).unwrap_or_else(|_| serde_json::json!([]));
        if let Some(existing) = inner
            .reports
            .values_mut()
            .find(|report| report.report_date == date)
        {
            existing.admin_id = admin_id;
            existing.total_items_sold = metrics.total_items_sold;
            existing.total_revenue = metrics.total_revenue.clone();
            existing.unique_products_sold = metrics.unique_products_sold;
            existing.top_products = top_products;
            return Ok(existing.clone());
        }
        let id = inner.next_id();
        let report = DailySalesReport {
            id,
            report_date: date,
            admin_id,
            total_items_sold: metrics.total_items_sold,
            total_revenue: metrics.total_revenue.clone(),
            unique_products_sold: metrics.unique_products_sold,
            top_products,
            is_sent: false,
            sent_at: None,
            created_at: now(),
        };
        inner.reports.insert(id, report.clone());
        Ok(report)
    }

    async fn mark_sent(&self, date: NaiveDate, at: NaiveDateTime) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(report) = inner
            .reports
            .values_mut()
            .find(|report| report.report_date == date)
        {
            report.is_sent = true;
            report.sent_at = Some(at);
        }
        Ok(())
    }

    async fn delete_created_before(&self, cutoff: NaiveDateTime) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.reports.len();
        inner.reports.retain(|_, report| report.created_at >= cutoff);
        Ok((before - inner.reports.len()) as u64)
    }
}

#[async_trait]
impl AdminDirectory for MemStore {
    async fn resolve(&self) -> Result<Option<AdminAccount>, StoreError> {
        Ok(self.inner.lock().unwrap().admin.clone())
    }
}
