use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::low_stock_notifications;

/// One low-stock alert record. At most one row exists per
/// (product, notified_on) day; `sent_at` stays null until delivery succeeds.
#[derive(Queryable, Selectable, Identifiable, Debug, PartialEq, Clone, Serialize)]
#[diesel(table_name = low_stock_notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LowStockNotification {
    pub id: i32,
    pub product_id: i32,
    pub admin_id: Uuid,
    pub current_stock: i32,
    pub threshold_level: i32,
    pub notified_on: NaiveDate,
    pub sent_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl LowStockNotification {
    pub fn is_sent(&self) -> bool {
        self.sent_at.is_some()
    }
}

#[derive(Insertable)]
#[diesel(table_name = low_stock_notifications)]
pub struct NewLowStockNotification {
    pub product_id: i32,
    pub admin_id: Uuid,
    pub current_stock: i32,
    pub threshold_level: i32,
    pub notified_on: NaiveDate,
}
