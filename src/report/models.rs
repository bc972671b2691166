use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::daily_sales_reports;

#[derive(Queryable, Selectable, Identifiable, Debug, PartialEq, Clone, Serialize)]
#[diesel(table_name = daily_sales_reports)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DailySalesReport {
    pub id: i32,
    pub report_date: NaiveDate,
    pub admin_id: Uuid,
    pub total_items_sold: i64,
    pub total_revenue: BigDecimal,
    pub unique_products_sold: i32,
    pub top_products: serde_json::Value,
    pub is_sent: bool,
    pub sent_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl DailySalesReport {
    pub fn top_products(&self) -> Vec<TopProduct> {
        serde_json::from_value(self.top_products.clone()).unwrap_or_default()
    }
}

/// One ranked entry of a report's top-ten product list.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct TopProduct {
    pub product_id: i32,
    pub product_name: String,
    pub quantity: i64,
    pub revenue: BigDecimal,
}

/// Freshly computed metrics for one calendar day. Persisting these for a
/// date that already has a report overwrites the stored values.
#[derive(Debug, PartialEq, Clone)]
pub struct ReportMetrics {
    pub total_items_sold: i64,
    pub total_revenue: BigDecimal,
    pub unique_products_sold: i32,
    pub top_products: Vec<TopProduct>,
}
