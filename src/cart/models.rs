use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::product::models::Product;
use crate::schema::{cart_items, carts};

#[derive(Queryable, Selectable, Identifiable, Debug, PartialEq, Clone, Serialize)]
#[diesel(table_name = carts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Cart {
    pub id: i32,
    pub user_id: Uuid,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = carts)]
pub struct NewCart {
    pub user_id: Uuid,
    pub created_at: NaiveDateTime,
}

#[derive(Queryable, Selectable, Identifiable, Debug, PartialEq, Clone, Serialize)]
#[diesel(table_name = cart_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CartItem {
    pub id: i32,
    pub cart_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Deserialize)]
pub struct AddItemPayload {
    pub product_id: i32,
    pub quantity: i32,
}

#[derive(Deserialize)]
pub struct UpdateQuantityPayload {
    pub quantity: i32,
}

#[derive(Serialize)]
pub struct CartItemView {
    #[serde(flatten)]
    pub item: CartItem,
    pub product: Product,
}

#[derive(Serialize)]
pub struct CartView {
    pub cart: Cart,
    pub items: Vec<CartItemView>,
    pub item_count: i64,
}
