//! In-process task queue with at-least-once semantics: each job gets up to
//! `max_attempts` tries with a per-task timeout, then is logged as a
//! permanent failure. Background failures never reach end users.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, warn};

use crate::notification::gate::NotificationGate;
use crate::report::aggregator::ReportAggregator;
use crate::store::ProductRepo;
use crate::utils::ShopError;

#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    LowStockCheck { product_id: i32 },
    DailySalesReport { date: NaiveDate },
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, job: &Job) -> Result<(), ShopError>;
}

#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub max_attempts: u32,
    pub task_timeout: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            task_timeout: Duration::from_secs(60),
        }
    }
}

struct Envelope {
    job: Job,
    attempt: u32,
}

/// Handle for enqueueing jobs; cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl Dispatcher {
    pub fn dispatch(&self, job: Job) {
        if self.tx.send(Envelope { job, attempt: 1 }).is_err() {
            error!("job worker is gone; dropping job");
        }
    }
}

/// Spawns the worker task draining the queue.
pub fn spawn(handler: Arc<dyn JobHandler>, options: WorkerOptions) -> (Dispatcher, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
    let requeue = tx.clone();

    let handle = tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let outcome = timeout(options.task_timeout, handler.run(&envelope.job)).await;
            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(_) => "task timed out".to_owned(),
            };
            if envelope.attempt < options.max_attempts {
                warn!(
                    job = ?envelope.job,
                    attempt = envelope.attempt,
                    error = %failure,
                    "job attempt failed; requeueing"
                );
                let _ = requeue.send(Envelope {
                    job: envelope.job,
                    attempt: envelope.attempt + 1,
                });
            } else {
                error!(
                    job = ?envelope.job,
                    attempts = envelope.attempt,
                    error = %failure,
                    "job failed permanently"
                );
            }
        }
    });

    (Dispatcher { tx }, handle)
}

/// Routes queue jobs into the two background engines.
pub struct ShopJobHandler {
    products: Arc<dyn ProductRepo>,
    gate: NotificationGate,
    aggregator: ReportAggregator,
    low_stock_threshold: i32,
}

impl ShopJobHandler {
    pub fn new(
        products: Arc<dyn ProductRepo>,
        gate: NotificationGate,
        aggregator: ReportAggregator,
        low_stock_threshold: i32,
    ) -> Self {
        Self {
            products,
            gate,
            aggregator,
            low_stock_threshold,
        }
    }
}

#[async_trait]
impl JobHandler for ShopJobHandler {
    async fn run(&self, job: &Job) -> Result<(), ShopError> {
        match job {
            Job::LowStockCheck { product_id } => {
                let product = match self.products.find(*product_id).await? {
                    Some(product) => product,
                    None => {
                        warn!(product_id, "low stock check for missing product; skipped");
                        return Ok(());
                    }
                };
                self.gate
                    .check_and_notify(
                        &product,
                        product.stock_quantity,
                        self.low_stock_threshold,
                    )
                    .await?;
                Ok(())
            }
            Job::DailySalesReport { date } => {
                self.aggregator.generate(*date).await?;
                Ok(())
            }
        }
    }
}
