use std::sync::Arc;

use crate::store::ProductRepo;
use crate::utils::ShopError;

/// Read-only view of per-product available quantity. Purely advisory: cart
/// writes re-validate stock atomically at commit time, and nothing here
/// mutates or reserves stock.
#[derive(Clone)]
pub struct StockLedger {
    products: Arc<dyn ProductRepo>,
}

impl StockLedger {
    pub fn new(products: Arc<dyn ProductRepo>) -> Self {
        Self { products }
    }

    /// True iff the product exists and has at least `qty` units in stock.
    pub async fn has_stock(&self, product_id: i32, qty: i32) -> Result<bool, ShopError> {
        let product = self.products.find(product_id).await?;
        Ok(product.is_some_and(|p| p.stock_quantity >= qty))
    }

    /// The product's stock quantity, 0 if the product does not exist.
    pub async fn stock_quantity(&self, product_id: i32) -> Result<i32, ShopError> {
        let product = self.products.find(product_id).await?;
        Ok(product.map_or(0, |p| p.stock_quantity))
    }
}
