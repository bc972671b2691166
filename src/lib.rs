use std::sync::Arc;

pub mod cart;
pub mod jobs;
pub mod notification;
pub mod product;
pub mod report;
pub mod schema;
pub mod store;
pub mod utils;

use cart::engine::CartEngine;
use jobs::Dispatcher;
use store::ProductRepo;

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: CartEngine,
    pub products: Arc<dyn ProductRepo>,
    pub dispatcher: Dispatcher,
}
