use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use chrono::{Days, Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use storefront::notification::gate::{NotificationGate, NotifyOutcome};
use storefront::notification::mailer::{Mailer, RecordingMailer, SmtpMailer};
use storefront::report::aggregator::{ReportAggregator, ReportOutcome};
use storefront::store::pg::{self, PgAdminDirectory, PgStore};
use storefront::store::{NotificationRepo, ProductRepo, ReportRepo};
use storefront::utils::config::AppConfig;

#[derive(Parser)]
#[command(name = "shopctl", about = "Operational commands for the storefront")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate and send the daily sales report
    Report {
        /// Report date (YYYY-MM-DD); defaults to yesterday
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Run the low-stock check for one product, or scan the whole inventory
    LowStock {
        /// Product id; omitted means full scan
        #[arg(long)]
        product: Option<i32>,
    },
    /// Delete notification and report rows older than the cutoff
    Cleanup {
        /// Age cutoff in days
        #[arg(long, default_value_t = 90)]
        days: i64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::from_env().map_err(anyhow::Error::msg)?;
    let pool = pg::build_pool(&config.database_url)
        .await
        .map_err(anyhow::Error::msg)?;

    let store = Arc::new(PgStore::new(pool.clone()));
    let admins = Arc::new(PgAdminDirectory::new(
        pool.clone(),
        config.admin_email.clone(),
    ));
    let mailer: Arc<dyn Mailer> = match config.smtp.clone() {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp)),
        None => Arc::new(RecordingMailer::new()),
    };

    match cli.command {
        Command::Report { date } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive() - Days::new(1));
            let aggregator = ReportAggregator::new(
                store.clone(),
                store.clone(),
                store.clone(),
                admins,
                mailer,
            );
            match aggregator.generate(date).await? {
                ReportOutcome::Generated(report) => {
                    println!(
                        "report for {}: {} items, revenue {}",
                        date, report.total_items_sold, report.total_revenue
                    );
                }
                ReportOutcome::NoAdmin => {
                    println!("admin account not found; report skipped");
                }
            }
        }
        Command::LowStock { product } => {
            let threshold = config.low_stock_threshold;
            let gate = NotificationGate::new(store.clone(), admins, mailer);
            match product {
                Some(id) => {
                    let product = ProductRepo::find(&*store, id)
                        .await?
                        .with_context(|| format!("product {} not found", id))?;
                    let outcome = gate
                        .check_and_notify(&product, product.stock_quantity, threshold)
                        .await?;
                    println!("{}: {:?}", product.name, outcome);
                }
                None => {
                    let mut alerted = 0;
                    for product in store.all().await? {
                        if product.stock_quantity > threshold {
                            continue;
                        }
                        let outcome = gate
                            .check_and_notify(&product, product.stock_quantity, threshold)
                            .await?;
                        if outcome == NotifyOutcome::Sent {
                            alerted += 1;
                        }
                    }
                    println!("inventory scan complete, {} alerts sent", alerted);
                }
            }
        }
        Command::Cleanup { days } => {
            let cutoff = Local::now().naive_local() - chrono::Duration::days(days);
            let notifications =
                NotificationRepo::delete_created_before(&*store, cutoff).await?;
            let reports = ReportRepo::delete_created_before(&*store, cutoff).await?;
            println!(
                "deleted {} notifications and {} reports older than {} days",
                notifications, reports, days
            );
        }
    }

    Ok(())
}
