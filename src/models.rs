use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status '{other}'")),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(format!("unknown payment status '{other}'")),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Paytr,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Paytr => "paytr",
            PaymentMethod::Cash => "cash",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "paytr" => Ok(PaymentMethod::Paytr),
            "cash" => Ok(PaymentMethod::Cash),
            other => Err(format!("unknown payment method '{other}'")),
        }
    }
}

/// Final outcome reported by the gateway for a pending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Paid,
    Failed,
}

impl PaymentOutcome {
    /// The order/payment status pair this outcome settles a pending order into.
    pub fn target(&self) -> (OrderStatus, PaymentStatus) {
        match self {
            PaymentOutcome::Paid => (OrderStatus::Confirmed, PaymentStatus::Paid),
            PaymentOutcome::Failed => (OrderStatus::Cancelled, PaymentStatus::Failed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct ShippingAddress {
    pub full_name: Option<String>,
    pub address: String,
    pub district: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
}

impl ShippingAddress {
    /// Single-line form used where the gateway expects a free-text address.
    pub fn one_line(&self) -> String {
        [
            Some(self.address.as_str()),
            self.district.as_deref(),
            self.city.as_deref(),
            self.postal_code.as_deref(),
            self.country.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }

    pub fn to_blob(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parses a stored address; unreadable blobs mean "address unknown".
    pub fn from_blob(blob: &str) -> Option<Self> {
        match serde_json::from_str(blob) {
            Ok(address) => Some(address),
            Err(err) => {
                tracing::warn!(error = %err, "stored shipping address is not readable");
                None
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: i64,
    pub order_number: String,
    pub user_id: Option<Uuid>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub shipping_address: Option<ShippingAddress>,
    pub total_amount: Decimal,
    pub shipping_cost: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub cargo_company: Option<String>,
    pub cargo_tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: Option<i64>,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert!("paid".parse::<OrderStatus>().is_err());
        assert!("Pending".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn payment_outcome_targets() {
        assert_eq!(
            PaymentOutcome::Paid.target(),
            (OrderStatus::Confirmed, PaymentStatus::Paid)
        );
        assert_eq!(
            PaymentOutcome::Failed.target(),
            (OrderStatus::Cancelled, PaymentStatus::Failed)
        );
    }

    #[test]
    fn unreadable_address_blob_is_unknown() {
        assert_eq!(ShippingAddress::from_blob("not json"), None);
        assert_eq!(ShippingAddress::from_blob(""), None);
    }

    #[test]
    fn address_blob_parses_back() {
        let address = ShippingAddress {
            full_name: Some("Ayse Yilmaz".into()),
            address: "Bagdat Cd. 12".into(),
            district: Some("Kadikoy".into()),
            city: Some("Istanbul".into()),
            ..Default::default()
        };
        assert_eq!(ShippingAddress::from_blob(&address.to_blob()), Some(address.clone()));
        assert_eq!(address.one_line(), "Bagdat Cd. 12, Kadikoy, Istanbul");
    }
}
