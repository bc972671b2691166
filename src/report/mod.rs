pub mod aggregator;
pub mod models;
