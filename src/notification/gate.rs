use std::sync::Arc;

use chrono::Local;
use tracing::{info, warn};

use super::mailer::Mailer;
use super::models::NewLowStockNotification;
use crate::product::models::Product;
use crate::store::{AdminDirectory, NotificationRepo, PendingInsert};
use crate::utils::ShopError;

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum NotifyOutcome {
    /// Stock is above the threshold; nothing to do.
    StockOk,
    /// Admin account could not be resolved; logged, no row created.
    NoAdmin,
    /// A sent notification already exists for this product today.
    AlreadySent,
    Sent,
}

/// Decides, idempotently, whether a low-stock alert for a product must fire
/// today. Per (product, day) the record moves NoNotification -> Pending ->
/// Sent; concurrent triggers converge on one row via the (product, day)
/// uniqueness constraint.
#[derive(Clone)]
pub struct NotificationGate {
    repo: Arc<dyn NotificationRepo>,
    admins: Arc<dyn AdminDirectory>,
    mailer: Arc<dyn Mailer>,
}

impl NotificationGate {
    pub fn new(
        repo: Arc<dyn NotificationRepo>,
        admins: Arc<dyn AdminDirectory>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            repo,
            admins,
            mailer,
        }
    }

    pub async fn check_and_notify(
        &self,
        product: &Product,
        current_stock: i32,
        threshold: i32,
    ) -> Result<NotifyOutcome, ShopError> {
        if current_stock > threshold {
            return Ok(NotifyOutcome::StockOk);
        }

        let admin = match self.admins.resolve().await? {
            Some(admin) => admin,
            None => {
                warn!(
                    product_id = product.id,
                    "admin user not found for low stock notification"
                );
                return Ok(NotifyOutcome::NoAdmin);
            }
        };

        let today = Local::now().date_naive();
        if self.repo.sent_on(product.id, today).await? {
            return Ok(NotifyOutcome::AlreadySent);
        }

        let row = match self
            .repo
            .insert_pending(NewLowStockNotification {
                product_id: product.id,
                admin_id: admin.id,
                current_stock,
                threshold_level: threshold,
                notified_on: today,
            })
            .await?
        {
            PendingInsert::Created(row) => row,
            PendingInsert::Existing(row) if row.is_sent() => {
                return Ok(NotifyOutcome::AlreadySent)
            }
            // A prior attempt created the row but its send failed; adopt it
            // and retry the send rather than piling up pending rows.
            PendingInsert::Existing(row) => row,
        };

        self.mailer
            .send_low_stock_alert(&admin.email, product, current_stock, threshold)
            .await?;
        self.repo
            .mark_sent(row.id, Local::now().naive_local())
            .await?;

        info!(
            product_id = product.id,
            current_stock, threshold, "low stock notification sent"
        );
        Ok(NotifyOutcome::Sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::mailer::{OutboundMail, RecordingMailer};
    use crate::product::models::NewProduct;
    use crate::store::memory::MemStore;
    use crate::store::ProductRepo;
    use bigdecimal::BigDecimal;

    async fn setup(stock: i32) -> (NotificationGate, Arc<MemStore>, Arc<RecordingMailer>, Product) {
        let store = Arc::new(MemStore::new());
        store.set_admin("admin@storefront.shop");
        let product = store
            .create(NewProduct {
                name: "Widget".to_owned(),
                description: String::new(),
                price: BigDecimal::from(10),
                stock_quantity: stock,
            })
            .await
            .unwrap();
        let mailer = Arc::new(RecordingMailer::new());
        let gate = NotificationGate::new(store.clone(), store.clone(), mailer.clone());
        (gate, store, mailer, product)
    }

    #[tokio::test]
    async fn repeated_triggers_send_exactly_once_per_day() {
        let (gate, _, mailer, product) = setup(3).await;

        assert_eq!(
            gate.check_and_notify(&product, 3, 5).await.unwrap(),
            NotifyOutcome::Sent
        );
        for _ in 0..3 {
            assert_eq!(
                gate.check_and_notify(&product, 3, 5).await.unwrap(),
                NotifyOutcome::AlreadySent
            );
        }

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0],
            OutboundMail::LowStock {
                to: "admin@storefront.shop".to_owned(),
                product_id: product.id,
                current_stock: 3,
                threshold: 5,
            }
        );
    }

    #[tokio::test]
    async fn threshold_boundary() {
        let (gate, _, mailer, product) = setup(5).await;

        // Exactly at the threshold fires, one above does not.
        assert_eq!(
            gate.check_and_notify(&product, 6, 5).await.unwrap(),
            NotifyOutcome::StockOk
        );
        assert!(mailer.sent().is_empty());
        assert_eq!(
            gate.check_and_notify(&product, 5, 5).await.unwrap(),
            NotifyOutcome::Sent
        );
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn unresolved_admin_is_a_soft_no_op() {
        let store = Arc::new(MemStore::new());
        let product = store
            .create(NewProduct {
                name: "Widget".to_owned(),
                description: String::new(),
                price: BigDecimal::from(10),
                stock_quantity: 1,
            })
            .await
            .unwrap();
        let mailer = Arc::new(RecordingMailer::new());
        let gate = NotificationGate::new(store.clone(), store.clone(), mailer.clone());

        assert_eq!(
            gate.check_and_notify(&product, 1, 5).await.unwrap(),
            NotifyOutcome::NoAdmin
        );
        assert!(mailer.sent().is_empty());

        // Once the admin exists the same trigger goes through.
        store.set_admin("admin@storefront.shop");
        assert_eq!(
            gate.check_and_notify(&product, 1, 5).await.unwrap(),
            NotifyOutcome::Sent
        );
    }

    #[tokio::test]
    async fn failed_send_leaves_pending_row_and_retry_reuses_it() {
        let (gate, _, mailer, product) = setup(2).await;

        mailer.fail_next(1);
        assert!(gate.check_and_notify(&product, 2, 5).await.is_err());
        assert!(mailer.sent().is_empty());

        // The retry adopts the pending row; still exactly one outbound mail.
        assert_eq!(
            gate.check_and_notify(&product, 2, 5).await.unwrap(),
            NotifyOutcome::Sent
        );
        assert_eq!(mailer.sent().len(), 1);
        assert_eq!(
            gate.check_and_notify(&product, 2, 5).await.unwrap(),
            NotifyOutcome::AlreadySent
        );
    }
}
