mod common;

use std::time::Duration;

use chrono::Utc;
use rust_decimal_macros::dec;
use serde_json::json;
use shop_payments_api::{
    config::PaytrConfig,
    models::{Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress},
    payment::{GatewayError, PaymentGateway, PaytrGateway, gateway::build_payment_request},
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string_contains, method, path},
};

const TOKEN_PATH: &str = "/odeme/api/get-token";

fn config_for(server: &MockServer, timeout_secs: u64) -> PaytrConfig {
    PaytrConfig {
        token_url: format!("{}{TOKEN_PATH}", server.uri()),
        timeout_secs,
        ..common::paytr_config()
    }
}

fn order() -> (Order, Vec<OrderItem>) {
    let now = Utc::now();
    let order = Order {
        id: 1,
        order_number: "MD1700000000123".into(),
        user_id: None,
        customer_name: "Ayse Yilmaz".into(),
        customer_email: "ayse@example.com".into(),
        customer_phone: Some("05551234567".into()),
        shipping_address: Some(ShippingAddress {
            address: "Bagdat Cd. No:12".into(),
            city: Some("Istanbul".into()),
            ..Default::default()
        }),
        total_amount: dec!(200.00),
        shipping_cost: dec!(0),
        status: OrderStatus::Pending,
        payment_status: PaymentStatus::Pending,
        payment_method: PaymentMethod::Paytr,
        cargo_company: None,
        cargo_tracking_number: None,
        created_at: now,
        updated_at: now,
    };
    let items = vec![OrderItem {
        id: 1,
        order_id: 1,
        product_id: Some(1),
        product_name: "Serum".into(),
        quantity: 2,
        unit_price: dec!(100.00),
        line_total: dec!(200.00),
        created_at: now,
    }];
    (order, items)
}

#[tokio::test]
async fn success_response_yields_payment_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("merchant_oid=MD1700000000123"))
        .and(body_string_contains("payment_amount=20000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "token": "abc123"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server, 5);
    let gateway = PaytrGateway::new(&config).unwrap();
    let (order, items) = order();
    let request = build_payment_request(&config, &order, &items, "203.0.113.7").unwrap();

    let token = gateway.submit_payment(&request).await.unwrap();
    assert_eq!(token.token, "abc123");
    assert_eq!(token.payment_url, "https://www.paytr.com/odeme/guvenli/abc123");
}

#[tokio::test]
async fn failed_status_surfaces_reason() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "failed",
            "reason": "paytr_token gonderilen degerler ile uyusmuyor",
            "err_no": 14
        })))
        .mount(&server)
        .await;

    let config = config_for(&server, 5);
    let gateway = PaytrGateway::new(&config).unwrap();
    let (order, items) = order();
    let request = build_payment_request(&config, &order, &items, "127.0.0.1").unwrap();

    match gateway.submit_payment(&request).await {
        Err(GatewayError::Rejected { reason, code }) => {
            assert_eq!(reason, "paytr_token gonderilen degerler ile uyusmuyor");
            assert_eq!(code.as_deref(), Some("14"));
        }
        other => panic!("unexpected result {other:?}"),
    }
}

#[tokio::test]
async fn slow_gateway_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "status": "success", "token": "late" }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = config_for(&server, 1);
    let gateway = PaytrGateway::new(&config).unwrap();
    let (order, items) = order();
    let request = build_payment_request(&config, &order, &items, "127.0.0.1").unwrap();

    assert!(matches!(
        gateway.submit_payment(&request).await,
        Err(GatewayError::Timeout)
    ));
}

#[tokio::test]
async fn server_error_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let config = config_for(&server, 5);
    let gateway = PaytrGateway::new(&config).unwrap();
    let (order, items) = order();
    let request = build_payment_request(&config, &order, &items, "127.0.0.1").unwrap();

    assert!(matches!(
        gateway.submit_payment(&request).await,
        Err(GatewayError::InvalidResponse(_))
    ));
}
