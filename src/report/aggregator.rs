use std::collections::HashMap;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{Days, Local, NaiveDate, NaiveTime};
use tracing::{info, warn};

use super::models::{DailySalesReport, ReportMetrics, TopProduct};
use crate::cart::models::CartItem;
use crate::notification::mailer::Mailer;
use crate::store::{AdminDirectory, CartRepo, ProductRepo, ReportRepo};
use crate::utils::ShopError;

pub const TOP_PRODUCTS_LIMIT: usize = 10;

#[derive(Debug, PartialEq, Clone)]
pub enum ReportOutcome {
    /// Admin account could not be resolved; logged, nothing persisted.
    NoAdmin,
    Generated(DailySalesReport),
}

/// Computes and idempotently persists the per-calendar-day sales summary.
/// Re-running for a date overwrites the stored metrics with freshly computed
/// values, so repeated or out-of-order runs converge on the true totals.
#[derive(Clone)]
pub struct ReportAggregator {
    carts: Arc<dyn CartRepo>,
    products: Arc<dyn ProductRepo>,
    reports: Arc<dyn ReportRepo>,
    admins: Arc<dyn AdminDirectory>,
    mailer: Arc<dyn Mailer>,
}

impl ReportAggregator {
    pub fn new(
        carts: Arc<dyn CartRepo>,
        products: Arc<dyn ProductRepo>,
        reports: Arc<dyn ReportRepo>,
        admins: Arc<dyn AdminDirectory>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            carts,
            products,
            reports,
            admins,
            mailer,
        }
    }

    pub async fn generate(&self, date: NaiveDate) -> Result<ReportOutcome, ShopError> {
        let admin = match self.admins.resolve().await? {
            Some(admin) => admin,
            None => {
                warn!(%date, "admin user not found for daily sales report");
                return Ok(ReportOutcome::NoAdmin);
            }
        };

        let start = date.and_time(NaiveTime::MIN);
        let end = (date + Days::new(1)).and_time(NaiveTime::MIN);
        let items = self.carts.items_created_during(start, end).await?;
        let metrics = self.compute(&items).await?;

        let report = self.reports.upsert(date, admin.id, &metrics).await?;

        // No duplicate-send guard: every run, retries included, resends and
        // re-marks the report.
        self.mailer.send_daily_report(&admin.email, &report).await?;
        self.reports
            .mark_sent(date, Local::now().naive_local())
            .await?;
        let report = self.reports.find(date).await?.unwrap_or(report);

        info!(
            %date,
            total_items_sold = metrics.total_items_sold,
            unique_products_sold = metrics.unique_products_sold,
            "daily sales report generated and sent"
        );
        Ok(ReportOutcome::Generated(report))
    }

    /// Groups items by product in first-encounter order. Prices are read at
    /// aggregation time, not from a sale-time snapshot.
    async fn compute(&self, items: &[CartItem]) -> Result<ReportMetrics, ShopError> {
        let mut product_ids: Vec<i32> = Vec::new();
        for item in items {
            if !product_ids.contains(&item.product_id) {
                product_ids.push(item.product_id);
            }
        }
        let products: HashMap<i32, _> = self
            .products
            .by_ids(&product_ids)
            .await?
            .into_iter()
            .map(|product| (product.id, product))
            .collect();

        let mut total_items_sold: i64 = 0;
        let mut total_revenue = BigDecimal::from(0);
        let mut groups: Vec<TopProduct> = Vec::new();
        let mut group_index: HashMap<i32, usize> = HashMap::new();

        for item in items {
            let product = match products.get(&item.product_id) {
                Some(product) => product,
                None => {
                    warn!(
                        product_id = item.product_id,
                        "cart item references a missing product; skipped"
                    );
                    continue;
                }
            };
            let quantity = i64::from(item.quantity);
            let revenue = product.price.clone() * BigDecimal::from(quantity);

            total_items_sold += quantity;
            total_revenue += revenue.clone();

            match group_index.get(&item.product_id) {
                Some(&idx) => {
                    groups[idx].quantity += quantity;
                    groups[idx].revenue += revenue;
                }
                None => {
                    group_index.insert(item.product_id, groups.len());
                    groups.push(TopProduct {
                        product_id: product.id,
                        product_name: product.name.clone(),
                        quantity,
                        revenue,
                    });
                }
            }
        }

        let unique_products_sold = groups.len() as i32;
        // Stable sort: revenue ties keep first-encountered order.
        groups.sort_by(|a, b| b.revenue.cmp(&a.revenue));
        groups.truncate(TOP_PRODUCTS_LIMIT);

        Ok(ReportMetrics {
            total_items_sold,
            total_revenue,
            unique_products_sold,
            top_products: groups,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::mailer::{OutboundMail, RecordingMailer};
    use crate::product::models::NewProduct;
    use crate::store::memory::MemStore;
    use crate::store::StockCheckedWrite;
    use uuid::Uuid;

    struct Harness {
        store: Arc<MemStore>,
        mailer: Arc<RecordingMailer>,
        aggregator: ReportAggregator,
        cart_id: i32,
    }

    async fn harness() -> Harness {
        let store = Arc::new(MemStore::new());
        store.set_admin("admin@storefront.shop");
        let mailer = Arc::new(RecordingMailer::new());
        let aggregator = ReportAggregator::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            mailer.clone(),
        );
        let cart = store.create_cart(Uuid::new_v4()).await.unwrap();
        Harness {
            store,
            mailer,
            aggregator,
            cart_id: cart.id,
        }
    }

    impl Harness {
        async fn product(&self, name: &str, price: i64, stock: i32) -> i32 {
            self.store
                .create(NewProduct {
                    name: name.to_owned(),
                    description: String::new(),
                    price: BigDecimal::from(price),
                    stock_quantity: stock,
                })
                .await
                .unwrap()
                .id
        }

        async fn sell(&self, product_id: i32, qty: i32) -> i32 {
            match self
                .store
                .add_item(self.cart_id, product_id, qty)
                .await
                .unwrap()
            {
                StockCheckedWrite::Written(item) => item.id,
                other => panic!("unexpected write outcome: {:?}", other),
            }
        }

        async fn generated(&self, date: NaiveDate) -> DailySalesReport {
            match self.aggregator.generate(date).await.unwrap() {
                ReportOutcome::Generated(report) => report,
                ReportOutcome::NoAdmin => panic!("admin should resolve"),
            }
        }
    }

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    #[tokio::test]
    async fn computes_metrics_for_the_day() {
        let h = harness().await;
        let widget = h.product("Widget", 100, 50).await;
        let gadget = h.product("Gadget", 40, 50).await;
        h.sell(widget, 5).await;
        h.sell(gadget, 10).await;

        let report = h.generated(today()).await;
        assert_eq!(report.total_items_sold, 15);
        assert_eq!(report.total_revenue, BigDecimal::from(900));
        assert_eq!(report.unique_products_sold, 2);

        let top = report.top_products();
        assert_eq!(top.len(), 2);
        // Widget revenue 500 outranks gadget revenue 400.
        assert_eq!(top[0].product_id, widget);
        assert_eq!(top[0].quantity, 5);
        assert_eq!(top[0].revenue, BigDecimal::from(500));
        assert_eq!(top[1].product_id, gadget);

        assert!(report.is_sent);
        assert!(report.sent_at.is_some());
    }

    #[tokio::test]
    async fn rerun_is_idempotent_and_overwrites_new_totals() {
        let h = harness().await;
        let widget = h.product("Widget", 10, 100).await;
        h.sell(widget, 10).await;

        let first = h.generated(today()).await;
        assert_eq!(first.total_items_sold, 10);

        // Unchanged data: identical stored metrics.
        let second = h.generated(today()).await;
        assert_eq!(second.total_items_sold, 10);
        assert_eq!(second.total_revenue, first.total_revenue);
        assert_eq!(second.id, first.id);

        // Five more units sold the same day: totals are replaced, not summed.
        let other_cart = h.store.create_cart(Uuid::new_v4()).await.unwrap();
        h.store.add_item(other_cart.id, widget, 5).await.unwrap();
        let third = h.generated(today()).await;
        assert_eq!(third.total_items_sold, 15);
        assert_eq!(third.total_revenue, BigDecimal::from(150));
    }

    #[tokio::test]
    async fn every_run_resends_the_report() {
        let h = harness().await;
        let widget = h.product("Widget", 10, 100).await;
        h.sell(widget, 1).await;

        h.generated(today()).await;
        h.generated(today()).await;

        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|mail| matches!(
            mail,
            OutboundMail::Report { to, report_date }
                if to == "admin@storefront.shop" && *report_date == today()
        )));
    }

    #[tokio::test]
    async fn top_products_capped_at_ten_with_stable_ties() {
        let h = harness().await;
        // Twelve products with descending revenue, then two more tied with
        // the leader.
        let mut ids = Vec::new();
        for i in 0..12 {
            let id = h.product(&format!("P{}", i), 100 - i, 100).await;
            h.sell(id, 1).await;
            ids.push(id);
        }
        let tied_a = h.product("TiedA", 100, 100).await;
        let tied_b = h.product("TiedB", 100, 100).await;
        h.sell(tied_a, 1).await;
        h.sell(tied_b, 1).await;

        let report = h.generated(today()).await;
        assert_eq!(report.unique_products_sold, 14);
        let top = report.top_products();
        assert_eq!(top.len(), 10);
        // Revenue-100 group keeps first-encounter order: P0, TiedA, TiedB.
        assert_eq!(top[0].product_id, ids[0]);
        assert_eq!(top[1].product_id, tied_a);
        assert_eq!(top[2].product_id, tied_b);
        assert_eq!(top[3].product_id, ids[1]);
    }

    #[tokio::test]
    async fn only_items_created_on_the_date_count() {
        let h = harness().await;
        let widget = h.product("Widget", 10, 100).await;
        h.sell(widget, 3).await;
        let stale_item = h.sell(h.product("Old", 10, 100).await, 7).await;
        let yesterday = (today() - Days::new(1)).and_time(NaiveTime::MIN);
        h.store.set_item_created_at(stale_item, yesterday);

        let report = h.generated(today()).await;
        assert_eq!(report.total_items_sold, 3);
        assert_eq!(report.unique_products_sold, 1);

        let stale_report = h.generated(today() - Days::new(1)).await;
        assert_eq!(stale_report.total_items_sold, 7);
    }

    #[tokio::test]
    async fn empty_day_yields_zeroed_report() {
        let h = harness().await;
        let report = h.generated(today()).await;
        assert_eq!(report.total_items_sold, 0);
        assert_eq!(report.total_revenue, BigDecimal::from(0));
        assert_eq!(report.unique_products_sold, 0);
        assert!(report.top_products().is_empty());
    }

    #[tokio::test]
    async fn unresolved_admin_is_a_soft_no_op() {
        let store = Arc::new(MemStore::new());
        let mailer = Arc::new(RecordingMailer::new());
        let aggregator = ReportAggregator::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            mailer.clone(),
        );

        assert_eq!(
            aggregator.generate(today()).await.unwrap(),
            ReportOutcome::NoAdmin
        );
        assert!(mailer.sent().is_empty());
        assert!(ReportRepo::find(&*store, today()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn price_changes_alter_regenerated_revenue() {
        // Current-price semantics, reproduced from the legacy system: a
        // price change between runs changes the stored historical revenue.
        let h = harness().await;
        let widget = h.product("Widget", 10, 100).await;
        h.sell(widget, 2).await;

        let first = h.generated(today()).await;
        assert_eq!(first.total_revenue, BigDecimal::from(20));

        h.store.set_price(widget, BigDecimal::from(25));
        let second = h.generated(today()).await;
        assert_eq!(second.total_revenue, BigDecimal::from(50));
    }
}
