//! Persistence of orders and their line items.
//!
//! Both implementations share the same guarantees: an order and its items are
//! written atomically, a clashing order number is reported as
//! [`AppError::DuplicateOrderNumber`], and payment settlement is a single
//! compare-and-swap on a still-pending order.

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::{
    dto::orders::OrderWithItems,
    error::{AppError, AppResult},
    models::{Order, OrderStatus, PaymentMethod, PaymentOutcome, PaymentStatus, ShippingAddress},
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryOrderStore;
pub use postgres::PgOrderStore;

const ORDER_NUMBER_ATTEMPTS: usize = 3;

/// Largest amount a `NUMERIC(12, 2)` money column holds.
pub const MAX_AMOUNT: Decimal = dec!(9999999999.99);

/// Rounds to the two decimal places every money column stores.
pub fn money(amount: Decimal) -> Decimal {
    let mut amount = amount;
    amount.rescale(2);
    amount
}

pub fn amount_out_of_range() -> AppError {
    AppError::BadRequest("order amounts out of range".into())
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Option<Uuid>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub shipping_address: ShippingAddress,
    pub total_amount: Decimal,
    pub shipping_cost: Decimal,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: Option<i64>,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl NewOrderItem {
    /// `None` when the product does not fit a `Decimal`.
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price
            .checked_mul(Decimal::from(self.quantity))
            .map(money)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedOrder {
    pub order_id: i64,
    pub order_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderKey {
    Id(i64),
    Number(String),
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct OrderUpdate {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub cargo_company: Option<String>,
    pub cargo_tracking_number: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OrderListFilter {
    pub status: Option<OrderStatus>,
    pub newest_first: bool,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Clone)]
pub enum Settlement {
    /// This call moved the order out of `pending`.
    Applied(Order),
    /// The order had already left `pending`; nothing was written.
    AlreadySettled(Order),
    NotFound,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts the order row and all item rows as one unit.
    async fn insert_order(
        &self,
        order_number: &str,
        order: &NewOrder,
        items: &[NewOrderItem],
    ) -> AppResult<CreatedOrder>;

    /// Applies a partial update and refreshes `updated_at`.
    async fn update_order(&self, key: &OrderKey, update: &OrderUpdate) -> AppResult<Order>;

    /// Moves a `pending`/`pending` order to the outcome's target state. Only
    /// one concurrent caller can win for a given order.
    async fn settle_payment(
        &self,
        order_number: &str,
        outcome: PaymentOutcome,
    ) -> AppResult<Settlement>;

    async fn find_order(&self, key: &OrderKey) -> AppResult<Option<OrderWithItems>>;

    /// Guest lookup: both the order number and the e-mail must match.
    async fn find_for_guest(
        &self,
        order_number: &str,
        email: &str,
    ) -> AppResult<Option<OrderWithItems>>;

    async fn list_user_orders(
        &self,
        user_id: Uuid,
        filter: &OrderListFilter,
    ) -> AppResult<(Vec<Order>, i64)>;
}

/// `MD` + last ten digits of the millisecond clock + three random digits.
///
/// Two orders created in the same millisecond collide with probability 1/1000;
/// the unique index catches it and [`create_order`] retries with a fresh number.
pub fn generate_order_number() -> String {
    let millis = Utc::now().timestamp_millis().rem_euclid(10_000_000_000);
    let suffix: u16 = rand::thread_rng().gen_range(0..1000);
    format!("MD{millis:010}{suffix:03}")
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Creates an order under a freshly generated number, retrying on collision.
pub async fn create_order(
    store: &dyn OrderStore,
    order: &NewOrder,
    items: &[NewOrderItem],
) -> AppResult<CreatedOrder> {
    let mut attempt = 1;
    loop {
        let order_number = generate_order_number();
        match store.insert_order(&order_number, order, items).await {
            Err(AppError::DuplicateOrderNumber) if attempt < ORDER_NUMBER_ATTEMPTS => {
                tracing::warn!(order_number = %order_number, attempt, "order number collision, retrying");
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_number_has_documented_shape() {
        for _ in 0..100 {
            let number = generate_order_number();
            assert_eq!(number.len(), 15, "{number}");
            assert!(number.starts_with("MD"));
            assert!(number[2..].chars().all(|c| c.is_ascii_digit()), "{number}");
        }
    }

    #[test]
    fn line_total_is_quantity_times_price() {
        let item = NewOrderItem {
            product_id: None,
            product_name: "Serum".into(),
            quantity: 3,
            unit_price: Decimal::new(3350, 2),
        };
        assert_eq!(item.line_total(), Some(Decimal::new(10050, 2)));
    }

    #[test]
    fn line_total_overflow_is_none() {
        let item = NewOrderItem {
            product_id: None,
            product_name: "Serum".into(),
            quantity: 2,
            unit_price: Decimal::MAX,
        };
        assert_eq!(item.line_total(), None);
    }

    #[test]
    fn money_keeps_two_places() {
        assert_eq!(money(Decimal::from(200)).to_string(), "200.00");
        assert_eq!(money(Decimal::new(12345, 3)).to_string(), "12.35");
        assert_eq!(MAX_AMOUNT.to_string(), "9999999999.99");
    }

    #[test]
    fn emails_are_compared_normalised() {
        assert_eq!(normalize_email("  Ayse@Example.COM "), "ayse@example.com");
    }
}
