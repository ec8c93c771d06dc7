use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, OrderItem, OrderStatus, ShippingAddress};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OrderItemInput {
    /// Catalog product id, if the item still maps to one.
    pub id: Option<i64>,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    /// Accepted for compatibility; the account is taken from the bearer token.
    pub user_id: Option<Uuid>,
    pub user_email: String,
    pub user_name: String,
    pub user_phone: Option<String>,
    pub shipping_address: ShippingAddress,
    pub items: Vec<OrderItemInput>,
    pub total_amount: Decimal,
    pub shipping_cost: Option<Decimal>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedOrderData {
    pub status: OrderStatus,
    pub total: Decimal,
}

/// Body of `POST /orders`: identifiers at the top level, state under `data`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub success: bool,
    pub message: String,
    pub order_id: i64,
    pub order_number: String,
    pub data: CreatedOrderData,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuestTrackRequest {
    pub email: String,
    pub order_number: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateOrderRequest {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub cargo_company: Option<String>,
    pub cargo_tracking_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
