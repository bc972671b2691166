use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::product::models::Product;
use crate::report::models::DailySalesReport;
use crate::utils::{config::SmtpConfig, MailError};

/// Outbound mail collaborator. Transport is out of scope for the core;
/// only the payloads matter.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_low_stock_alert(
        &self,
        to: &str,
        product: &Product,
        current_stock: i32,
        threshold: i32,
    ) -> Result<(), MailError>;

    async fn send_daily_report(&self, to: &str, report: &DailySalesReport)
        -> Result<(), MailError>;
}

pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn deliver(&self, to: &str, subject: &str, body: String) -> Result<(), MailError> {
        let email = Message::builder()
            .from(Mailbox::new(
                Some("Storefront".to_owned()),
                self.config
                    .from_address
                    .parse()
                    .map_err(|e| MailError(format!("Failed to parse sender email: {}", e)))?,
            ))
            .to(Mailbox::new(
                None,
                to.parse()
                    .map_err(|e| MailError(format!("Failed to parse receiver email: {}", e)))?,
            ))
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| MailError(format!("Failed to build a message: {}", e)))?;

        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.clone(),
        );
        let mailer = SmtpTransport::relay(&self.config.relay)
            .map_err(|e| MailError(format!("Wrong smtp transport: {}", e)))?
            .credentials(creds)
            .build();

        mailer
            .send(&email)
            .map_err(|e| MailError(format!("failed to send an email: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_low_stock_alert(
        &self,
        to: &str,
        product: &Product,
        current_stock: i32,
        threshold: i32,
    ) -> Result<(), MailError> {
        let body = format!(
            "Product '{}' is running low on stock.\n\nCurrent stock: {}\nThreshold: {}\n",
            product.name, current_stock, threshold
        );
        self.deliver(to, &format!("Low stock alert: {}", product.name), body)
    }

    async fn send_daily_report(
        &self,
        to: &str,
        report: &DailySalesReport,
    ) -> Result<(), MailError> {
        let mut body = format!(
            "Daily sales report for {}\n\nItems sold: {}\nRevenue: {}\nUnique products: {}\n",
            report.report_date,
            report.total_items_sold,
            report.total_revenue,
            report.unique_products_sold
        );
        for (rank, top) in report.top_products().iter().enumerate() {
            body.push_str(&format!(
                "{}. {} x{} ({})\n",
                rank + 1,
                top.product_name,
                top.quantity,
                top.revenue
            ));
        }
        self.deliver(
            to,
            &format!("Daily sales report {}", report.report_date),
            body,
        )
    }
}

/// What a recording mailer saw go out.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMail {
    LowStock {
        to: String,
        product_id: i32,
        current_stock: i32,
        threshold: i32,
    },
    Report {
        to: String,
        report_date: NaiveDate,
    },
}

/// Records outbound mail instead of delivering it; can be told to fail the
/// next N sends to exercise retry paths.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutboundMail>>,
    fail_next: AtomicUsize,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutboundMail> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, mail: OutboundMail) -> Result<(), MailError> {
        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(MailError("injected mail failure".to_owned()));
        }
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_low_stock_alert(
        &self,
        to: &str,
        product: &Product,
        current_stock: i32,
        threshold: i32,
    ) -> Result<(), MailError> {
        self.record(OutboundMail::LowStock {
            to: to.to_owned(),
            product_id: product.id,
            current_stock,
            threshold,
        })
    }

    async fn send_daily_report(
        &self,
        to: &str,
        report: &DailySalesReport,
    ) -> Result<(), MailError> {
        self.record(OutboundMail::Report {
            to: to.to_owned(),
            report_date: report.report_date,
        })
    }
}
