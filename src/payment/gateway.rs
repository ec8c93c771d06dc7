use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::{
    config::PaytrConfig,
    models::{Order, OrderItem},
    payment::signature::{SignatureError, sign_request},
};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway timed out")]
    Timeout,

    #[error("payment gateway unreachable: {0}")]
    Transport(String),

    #[error("unexpected payment gateway response: {0}")]
    InvalidResponse(String),

    #[error("payment gateway rejected the request: {reason}")]
    Rejected {
        reason: String,
        code: Option<String>,
    },

    #[error("cannot build payment request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Signature(#[from] SignatureError),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else if err.is_decode() {
            GatewayError::InvalidResponse(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

/// Form body posted to the gateway's token endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentRequest {
    pub merchant_id: String,
    pub user_ip: String,
    pub merchant_oid: String,
    pub email: String,
    /// Order total in minor currency units.
    pub payment_amount: i64,
    pub payment_type: String,
    pub installment_count: u32,
    pub currency: String,
    pub test_mode: String,
    pub non_3d: String,
    pub user_name: String,
    pub user_address: String,
    pub user_phone: String,
    /// JSON array of `[name, unit price, quantity]` triples.
    pub user_basket: String,
    pub merchant_ok_url: String,
    pub merchant_fail_url: String,
    pub client_lang: String,
    pub paytr_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentToken {
    pub token: String,
    pub payment_url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Submits a signed request. Never retried: a second submission could
    /// charge the customer twice.
    async fn submit_payment(&self, request: &PaymentRequest) -> Result<PaymentToken, GatewayError>;
}

/// Converts a major-unit amount to integer minor units, rounding half away from zero.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// Fixed two-decimal rendering used in the basket, e.g. `100` -> `"100.00"`.
pub fn format_unit_price(price: Decimal) -> String {
    let mut rounded = price.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

pub fn build_payment_request(
    config: &PaytrConfig,
    order: &Order,
    items: &[OrderItem],
    client_ip: &str,
) -> Result<PaymentRequest, GatewayError> {
    let payment_amount = to_minor_units(order.total_amount)
        .filter(|amount| *amount > 0)
        .ok_or_else(|| {
            GatewayError::InvalidRequest(format!("invalid order total {}", order.total_amount))
        })?;

    let basket: Vec<(&str, String, i32)> = items
        .iter()
        .map(|item| {
            (
                item.product_name.as_str(),
                format_unit_price(item.unit_price),
                item.quantity,
            )
        })
        .collect();
    let user_basket = serde_json::to_string(&basket)
        .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;

    let amount_text = payment_amount.to_string();
    let installment_text = config.installment_count.to_string();
    let test_mode = config.test_mode_flag();
    let paytr_token = sign_request(
        &[
            ("merchant_id", config.merchant_id.as_str()),
            ("user_ip", client_ip),
            ("merchant_oid", order.order_number.as_str()),
            ("email", order.customer_email.as_str()),
            ("payment_amount", amount_text.as_str()),
            ("payment_type", config.payment_type.as_str()),
            ("installment_count", installment_text.as_str()),
            ("currency", config.currency.as_str()),
            ("test_mode", test_mode),
        ],
        &config.merchant_key,
        &config.merchant_salt,
    )?;

    let address = order.shipping_address.as_ref();
    let user_phone = order
        .customer_phone
        .clone()
        .or_else(|| address.and_then(|a| a.phone.clone()))
        .unwrap_or_default();

    Ok(PaymentRequest {
        merchant_id: config.merchant_id.clone(),
        user_ip: client_ip.to_string(),
        merchant_oid: order.order_number.clone(),
        email: order.customer_email.clone(),
        payment_amount,
        payment_type: config.payment_type.clone(),
        installment_count: config.installment_count,
        currency: config.currency.clone(),
        test_mode: test_mode.to_string(),
        non_3d: "0".to_string(),
        user_name: order.customer_name.clone(),
        user_address: address.map(|a| a.one_line()).unwrap_or_default(),
        user_phone,
        user_basket,
        merchant_ok_url: config.ok_url.clone(),
        merchant_fail_url: config.fail_url.clone(),
        client_lang: "tr".to_string(),
        paytr_token,
    })
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    status: String,
    token: Option<String>,
    reason: Option<String>,
    err_no: Option<serde_json::Value>,
}

/// HTTP client for the PayTR token endpoint.
#[derive(Clone)]
pub struct PaytrGateway {
    client: reqwest::Client,
    token_url: String,
    payment_url: String,
}

impl PaytrGateway {
    pub fn new(config: &PaytrConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            token_url: config.token_url.clone(),
            payment_url: config.payment_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PaymentGateway for PaytrGateway {
    #[instrument(skip(self, request), fields(order_number = %request.merchant_oid))]
    async fn submit_payment(&self, request: &PaymentRequest) -> Result<PaymentToken, GatewayError> {
        let response = self.client.post(&self.token_url).form(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::InvalidResponse(format!("HTTP {status}")));
        }

        let body: TokenResponse = response.json().await?;
        if body.status != "success" {
            let reason = body.reason.unwrap_or_else(|| "unknown gateway error".to_string());
            let code = body.err_no.map(|code| match code {
                serde_json::Value::String(text) => text,
                other => other.to_string(),
            });
            tracing::info!(reason = %reason, "payment request rejected by gateway");
            return Err(GatewayError::Rejected { reason, code });
        }

        let token = body
            .token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| GatewayError::InvalidResponse("success without token".into()))?;

        tracing::debug!("payment token issued");
        Ok(PaymentToken {
            payment_url: format!("{}/{}", self.payment_url, token),
            token,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::{OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress};

    fn config() -> PaytrConfig {
        PaytrConfig {
            merchant_id: "123456".into(),
            merchant_key: "key".into(),
            merchant_salt: "salt".into(),
            token_url: "http://localhost/token".into(),
            payment_url: "http://localhost/pay".into(),
            ok_url: "https://shop.example/ok".into(),
            fail_url: "https://shop.example/fail".into(),
            test_mode: true,
            currency: "TL".into(),
            payment_type: "card".into(),
            installment_count: 0,
            timeout_secs: 30,
        }
    }

    fn order(total: Decimal) -> Order {
        Order {
            id: 1,
            order_number: "MD1700000000123".into(),
            user_id: None,
            customer_name: "Ayse Yilmaz".into(),
            customer_email: "ayse@example.com".into(),
            customer_phone: None,
            shipping_address: Some(ShippingAddress {
                address: "Bagdat Cd. 12".into(),
                city: Some("Istanbul".into()),
                phone: Some("05550000000".into()),
                ..Default::default()
            }),
            total_amount: total,
            shipping_cost: Decimal::ZERO,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: PaymentMethod::Paytr,
            cargo_company: None,
            cargo_tracking_number: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(name: &str, price: Decimal, quantity: i32) -> OrderItem {
        OrderItem {
            id: 1,
            order_id: 1,
            product_id: Some(1),
            product_name: name.into(),
            quantity,
            unit_price: price,
            line_total: price * Decimal::from(quantity),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn minor_units_round_half_away_from_zero() {
        assert_eq!(to_minor_units(dec!(200.00)), Some(20000));
        assert_eq!(to_minor_units(dec!(199.99)), Some(19999));
        assert_eq!(to_minor_units(dec!(10.005)), Some(1001));
        assert_eq!(to_minor_units(dec!(10.004)), Some(1000));
        assert_eq!(to_minor_units(dec!(-10.005)), Some(-1001));
    }

    #[test]
    fn unit_price_always_has_two_decimals() {
        assert_eq!(format_unit_price(dec!(100)), "100.00");
        assert_eq!(format_unit_price(dec!(99.9)), "99.90");
        assert_eq!(format_unit_price(dec!(12.345)), "12.35");
    }

    #[test]
    fn request_carries_basket_amount_and_verifiable_token() {
        let config = config();
        let order = order(dec!(200.00));
        let items = vec![item("Serum", dec!(100), 2)];

        let request = build_payment_request(&config, &order, &items, "10.0.0.1").unwrap();
        assert_eq!(request.payment_amount, 20000);
        assert_eq!(request.user_basket, r#"[["Serum","100.00",2]]"#);
        assert_eq!(request.test_mode, "1");
        assert_eq!(request.user_phone, "05550000000");
        assert_eq!(request.user_address, "Bagdat Cd. 12, Istanbul");

        let expected = sign_request(
            &[
                ("merchant_id", "123456"),
                ("user_ip", "10.0.0.1"),
                ("merchant_oid", "MD1700000000123"),
                ("email", "ayse@example.com"),
                ("payment_amount", "20000"),
                ("payment_type", "card"),
                ("installment_count", "0"),
                ("currency", "TL"),
                ("test_mode", "1"),
            ],
            "key",
            "salt",
        )
        .unwrap();
        assert_eq!(request.paytr_token, expected);
    }

    #[test]
    fn zero_total_cannot_be_paid() {
        let err = build_payment_request(&config(), &order(Decimal::ZERO), &[], "10.0.0.1")
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidRequest(_)));
    }
}
