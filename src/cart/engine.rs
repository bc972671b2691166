use std::sync::Arc;

use tokio::sync::broadcast;
use uuid::Uuid;

use super::models::{Cart, CartItem, CartItemView, CartView};
use crate::product::stock::StockLedger;
use crate::store::{CartRepo, ProductRepo, StockCheckedWrite};
use crate::utils::{ShopError, MAX_ITEM_QUANTITY};

/// Emitted after every successful cart mutation; carries the cart's new
/// total quantity for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct CartUpdated {
    pub user_id: Uuid,
    pub item_count: i64,
}

/// Result of a cart mutation. `item` is `None` when the mutation removed
/// the line (explicit removal or a zero-quantity update).
#[derive(Debug, Clone, PartialEq)]
pub struct CartMutation {
    pub item: Option<CartItem>,
    pub item_count: i64,
}

/// Stock-aware cart mutation engine. Every operation takes the acting user
/// explicitly; item-scoped operations verify the item belongs to that user's
/// cart before touching it.
#[derive(Clone)]
pub struct CartEngine {
    carts: Arc<dyn CartRepo>,
    products: Arc<dyn ProductRepo>,
    ledger: StockLedger,
    events: broadcast::Sender<CartUpdated>,
}

impl CartEngine {
    pub fn new(carts: Arc<dyn CartRepo>, products: Arc<dyn ProductRepo>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            carts,
            ledger: StockLedger::new(products.clone()),
            products,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CartUpdated> {
        self.events.subscribe()
    }

    /// Idempotent: returns the user's cart, creating it on first access.
    pub async fn get_or_create_cart(&self, user_id: Uuid) -> Result<Cart, ShopError> {
        match self.carts.cart_for_user(user_id).await? {
            Some(cart) => Ok(cart),
            None => Ok(self.carts.create_cart(user_id).await?),
        }
    }

    /// Adds `qty` of a product to the user's cart. A line for that product
    /// already in the cart has the quantity summed into it; a product never
    /// appears on two lines.
    pub async fn add_item(
        &self,
        user_id: Uuid,
        product_id: i32,
        qty: i32,
    ) -> Result<CartMutation, ShopError> {
        if self.products.find(product_id).await?.is_none() {
            return Err(ShopError::NotFound("Product"));
        }
        if qty < 1 {
            return Err(ShopError::InvalidQuantity(qty));
        }
        if !self.ledger.has_stock(product_id, qty).await? {
            let available = self.ledger.stock_quantity(product_id).await?;
            return Err(ShopError::InsufficientStock { available });
        }

        let cart = self.get_or_create_cart(user_id).await?;
        let item = match self.carts.add_item(cart.id, product_id, qty).await? {
            StockCheckedWrite::Written(item) => item,
            StockCheckedWrite::OutOfStock { available } => {
                return Err(ShopError::InsufficientStock { available })
            }
            StockCheckedWrite::MissingProduct => return Err(ShopError::NotFound("Product")),
            StockCheckedWrite::MissingItem => return Err(ShopError::NotFound("Cart item")),
        };

        let item_count = self.carts.quantity_total(cart.id).await?;
        self.notify(user_id, item_count);
        Ok(CartMutation {
            item: Some(item),
            item_count,
        })
    }

    /// Sets an item's quantity. A quantity of zero or less removes the item
    /// outright. Growing the line is bounded by the product's stock headroom
    /// (stock minus what the line already holds).
    pub async fn update_quantity(
        &self,
        user_id: Uuid,
        item_id: i32,
        qty: i32,
    ) -> Result<CartMutation, ShopError> {
        if qty <= 0 {
            return self.remove_item(user_id, item_id).await;
        }
        if qty > MAX_ITEM_QUANTITY {
            return Err(ShopError::UpperBoundExceeded(qty));
        }

        let (cart, item) = self.owned_item(user_id, item_id).await?;

        let delta = qty - item.quantity;
        if delta > 0 {
            let stock = self.ledger.stock_quantity(item.product_id).await?;
            if qty > stock {
                return Err(ShopError::InsufficientStock {
                    available: stock - item.quantity,
                });
            }
        }

        let item = match self.carts.set_quantity(item_id, qty).await? {
            StockCheckedWrite::Written(item) => item,
            StockCheckedWrite::OutOfStock { available } => {
                return Err(ShopError::InsufficientStock { available })
            }
            StockCheckedWrite::MissingProduct => return Err(ShopError::NotFound("Product")),
            StockCheckedWrite::MissingItem => return Err(ShopError::NotFound("Cart item")),
        };

        let item_count = self.carts.quantity_total(cart.id).await?;
        self.notify(user_id, item_count);
        Ok(CartMutation {
            item: Some(item),
            item_count,
        })
    }

    pub async fn remove_item(&self, user_id: Uuid, item_id: i32) -> Result<CartMutation, ShopError> {
        let (cart, item) = self.owned_item(user_id, item_id).await?;

        if !self.carts.delete_item(item.id).await? {
            return Err(ShopError::NotFound("Cart item"));
        }

        let item_count = self.carts.quantity_total(cart.id).await?;
        self.notify(user_id, item_count);
        Ok(CartMutation {
            item: None,
            item_count,
        })
    }

    /// Sum of quantities across the user's cart, not the line count.
    pub async fn item_count(&self, user_id: Uuid) -> Result<i64, ShopError> {
        let cart = self.get_or_create_cart(user_id).await?;
        Ok(self.carts.quantity_total(cart.id).await?)
    }

    pub async fn user_cart(&self, user_id: Uuid) -> Result<CartView, ShopError> {
        let cart = self.get_or_create_cart(user_id).await?;
        let items = self
            .carts
            .items_with_products(cart.id)
            .await?
            .into_iter()
            .map(|(item, product)| CartItemView { item, product })
            .collect();
        let item_count = self.carts.quantity_total(cart.id).await?;
        Ok(CartView {
            cart,
            items,
            item_count,
        })
    }

    /// Ownership rule for item-scoped operations: a missing item is
    /// `NotFound`, an item in another user's cart is `Forbidden`.
    async fn owned_item(&self, user_id: Uuid, item_id: i32) -> Result<(Cart, CartItem), ShopError> {
        let item = self
            .carts
            .item(item_id)
            .await?
            .ok_or(ShopError::NotFound("Cart item"))?;
        let cart = self.get_or_create_cart(user_id).await?;
        if item.cart_id != cart.id {
            return Err(ShopError::Forbidden);
        }
        Ok((cart, item))
    }

    fn notify(&self, user_id: Uuid, item_count: i64) {
        // No subscribers is fine.
        let _ = self.events.send(CartUpdated {
            user_id,
            item_count,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::models::NewProduct;
    use crate::store::memory::MemStore;
    use bigdecimal::BigDecimal;

    async fn engine_with_product(price: i64, stock: i32) -> (CartEngine, Arc<MemStore>, i32) {
        let store = Arc::new(MemStore::new());
        let product = store
            .create(NewProduct {
                name: "Widget".to_owned(),
                description: "A widget".to_owned(),
                price: BigDecimal::from(price),
                stock_quantity: stock,
            })
            .await
            .unwrap();
        let engine = CartEngine::new(store.clone(), store.clone());
        (engine, store, product.id)
    }

    #[tokio::test]
    async fn get_or_create_cart_is_idempotent() {
        let (engine, _, _) = engine_with_product(100, 10).await;
        let user = Uuid::new_v4();

        let first = engine.get_or_create_cart(user).await.unwrap();
        let second = engine.get_or_create_cart(user).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn repeated_adds_merge_into_one_line() {
        let (engine, _, product) = engine_with_product(100, 10).await;
        let user = Uuid::new_v4();

        let first = engine.add_item(user, product, 5).await.unwrap();
        let second = engine.add_item(user, product, 3).await.unwrap();

        let first_item = first.item.unwrap();
        let merged = second.item.unwrap();
        assert_eq!(merged.id, first_item.id);
        assert_eq!(merged.quantity, 8);
        assert_eq!(second.item_count, 8);
    }

    #[tokio::test]
    async fn add_rejects_missing_product_and_bad_quantity() {
        let (engine, _, product) = engine_with_product(100, 10).await;
        let user = Uuid::new_v4();

        assert!(matches!(
            engine.add_item(user, 9999, 1).await,
            Err(ShopError::NotFound("Product"))
        ));
        assert!(matches!(
            engine.add_item(user, product, 0).await,
            Err(ShopError::InvalidQuantity(0))
        ));
    }

    #[tokio::test]
    async fn add_rejects_insufficient_stock() {
        let (engine, _, product) = engine_with_product(100, 4).await;
        let user = Uuid::new_v4();

        let err = engine.add_item(user, product, 5).await.unwrap_err();
        assert!(matches!(err, ShopError::InsufficientStock { available: 4 }));
    }

    #[tokio::test]
    async fn carts_are_isolated_between_users() {
        let (engine, _, product) = engine_with_product(100, 10).await;
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        engine.add_item(alice, product, 2).await.unwrap();
        let bobs = engine.add_item(bob, product, 3).await.unwrap();

        assert!(matches!(
            engine
                .update_quantity(alice, bobs.item.as_ref().unwrap().id, 1)
                .await,
            Err(ShopError::Forbidden)
        ));

        assert_eq!(engine.item_count(alice).await.unwrap(), 2);
        assert_eq!(engine.item_count(bob).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn foreign_item_is_forbidden_missing_item_is_not_found() {
        let (engine, _, product) = engine_with_product(100, 10).await;
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let item = engine
            .add_item(alice, product, 1)
            .await
            .unwrap()
            .item
            .unwrap();

        assert!(matches!(
            engine.update_quantity(bob, item.id, 2).await,
            Err(ShopError::Forbidden)
        ));
        assert!(matches!(
            engine.remove_item(bob, item.id).await,
            Err(ShopError::Forbidden)
        ));
        assert!(matches!(
            engine.remove_item(alice, 424242).await,
            Err(ShopError::NotFound("Cart item"))
        ));
    }

    #[tokio::test]
    async fn zero_or_negative_quantity_update_removes_the_item() {
        let (engine, _, product) = engine_with_product(100, 10).await;
        let user = Uuid::new_v4();

        let item = engine
            .add_item(user, product, 4)
            .await
            .unwrap()
            .item
            .unwrap();
        let res = engine.update_quantity(user, item.id, 0).await.unwrap();
        assert_eq!(res.item, None);
        assert_eq!(res.item_count, 0);

        let item = engine
            .add_item(user, product, 4)
            .await
            .unwrap()
            .item
            .unwrap();
        let res = engine.update_quantity(user, item.id, -3).await.unwrap();
        assert_eq!(res.item, None);
        assert_eq!(engine.item_count(user).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn remove_then_add_starts_from_zero() {
        let (engine, _, product) = engine_with_product(100, 10).await;
        let user = Uuid::new_v4();

        let item = engine
            .add_item(user, product, 6)
            .await
            .unwrap()
            .item
            .unwrap();
        engine.remove_item(user, item.id).await.unwrap();

        let fresh = engine
            .add_item(user, product, 2)
            .await
            .unwrap()
            .item
            .unwrap();
        assert_eq!(fresh.quantity, 2);
        assert_eq!(engine.item_count(user).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn update_above_upper_bound_is_rejected() {
        let (engine, _, product) = engine_with_product(100, 10).await;
        let user = Uuid::new_v4();

        let item = engine
            .add_item(user, product, 1)
            .await
            .unwrap()
            .item
            .unwrap();
        assert!(matches!(
            engine.update_quantity(user, item.id, 10_000).await,
            Err(ShopError::UpperBoundExceeded(10_000))
        ));
    }

    #[tokio::test]
    async fn update_reports_remaining_headroom() {
        // Price 100, stock 10: add 5 then 3, then try to grow to 13.
        let (engine, _, product) = engine_with_product(100, 10).await;
        let user = Uuid::new_v4();

        engine.add_item(user, product, 5).await.unwrap();
        let merged = engine.add_item(user, product, 3).await.unwrap();
        let item = merged.item.unwrap();
        assert_eq!(item.quantity, 8);

        let err = engine.update_quantity(user, item.id, 13).await.unwrap_err();
        assert!(matches!(err, ShopError::InsufficientStock { available: 2 }));

        // Shrinking is always allowed, growth within headroom too.
        let ok = engine.update_quantity(user, item.id, 10).await.unwrap();
        assert_eq!(ok.item.unwrap().quantity, 10);
    }

    #[tokio::test]
    async fn mutations_emit_cart_updated_with_new_count() {
        let (engine, _, product) = engine_with_product(100, 10).await;
        let user = Uuid::new_v4();
        let mut events = engine.subscribe();

        engine.add_item(user, product, 2).await.unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            CartUpdated {
                user_id: user,
                item_count: 2
            }
        );

        let item = engine
            .add_item(user, product, 1)
            .await
            .unwrap()
            .item
            .unwrap();
        events.recv().await.unwrap();
        engine.remove_item(user, item.id).await.unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(event.item_count, 0);
    }

    #[tokio::test]
    async fn item_count_sums_quantities_across_lines() {
        let store = Arc::new(MemStore::new());
        let engine = CartEngine::new(store.clone(), store.clone());
        let user = Uuid::new_v4();

        for qty in [2, 5] {
            let product = store
                .create(NewProduct {
                    name: format!("P{}", qty),
                    description: String::new(),
                    price: BigDecimal::from(10),
                    stock_quantity: 50,
                })
                .await
                .unwrap();
            engine.add_item(user, product.id, qty).await.unwrap();
        }

        assert_eq!(engine.item_count(user).await.unwrap(), 7);
        let view = engine.user_cart(user).await.unwrap();
        assert_eq!(view.items.len(), 2);
        assert_eq!(view.item_count, 7);
    }
}
