use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Form body the gateway posts to the callback endpoint.
///
/// Every field defaults to empty so a partial body still reaches signature
/// verification (and fails there) instead of being rejected by the extractor.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct CallbackPayload {
    pub merchant_oid: String,
    pub status: String,
    pub total_amount: String,
    pub hash: String,
    pub payment_amount: Option<String>,
    pub payment_type: Option<String>,
    pub currency: Option<String>,
    pub test_mode: Option<String>,
    pub failed_reason_code: Option<String>,
    pub failed_reason_msg: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSession {
    pub success: bool,
    pub message: String,
    pub order_id: i64,
    pub order_number: String,
    pub token: String,
    pub payment_url: String,
}
