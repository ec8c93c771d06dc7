//! HMAC-SHA256 tokens exchanged with the payment gateway.
//!
//! Outbound requests and inbound callbacks sign different field sets. In both
//! cases the values are concatenated in a fixed order, the merchant salt is
//! appended, and the digest is keyed by the merchant key and base64 encoded.
//! The gateway computes the same string on its side, so the order of fields is
//! part of the protocol.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::{dto::payment::CallbackPayload, models::PaymentOutcome};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("merchant key rejected by HMAC")]
    InvalidKey,
}

/// Result of checking a callback. A failed check is a value, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackVerification {
    pub valid: bool,
    pub outcome: PaymentOutcome,
    pub order_number: String,
    /// `total_amount` in minor units, when it parses.
    pub amount: Option<i64>,
}

/// Signs `fields` (name, value) in the given order, followed by `salt`.
pub fn sign_request(
    fields: &[(&str, &str)],
    secret: &str,
    salt: &str,
) -> Result<String, SignatureError> {
    let mut mac = keyed(secret)?;
    for (_, value) in fields {
        mac.update(value.as_bytes());
    }
    mac.update(salt.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Token the gateway attaches to a callback:
/// `merchant_oid + salt + status + total_amount`.
pub fn sign_callback(
    order_number: &str,
    status: &str,
    total_amount: &str,
    secret: &str,
    salt: &str,
) -> Result<String, SignatureError> {
    let mut mac = keyed(secret)?;
    mac.update(callback_message(order_number, status, total_amount, salt).as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

pub fn verify_callback(payload: &CallbackPayload, secret: &str, salt: &str) -> CallbackVerification {
    let outcome = if payload.status == "success" {
        PaymentOutcome::Paid
    } else {
        PaymentOutcome::Failed
    };
    let amount = payload.total_amount.trim().parse::<i64>().ok();

    CallbackVerification {
        valid: hash_matches(payload, secret, salt),
        outcome,
        order_number: payload.merchant_oid.clone(),
        amount,
    }
}

fn hash_matches(payload: &CallbackPayload, secret: &str, salt: &str) -> bool {
    let Ok(supplied) = STANDARD.decode(payload.hash.trim()) else {
        return false;
    };
    let Ok(mut mac) = keyed(secret) else {
        return false;
    };
    mac.update(
        callback_message(
            &payload.merchant_oid,
            &payload.status,
            &payload.total_amount,
            salt,
        )
        .as_bytes(),
    );
    // verify_slice compares in constant time.
    mac.verify_slice(&supplied).is_ok()
}

fn callback_message(order_number: &str, status: &str, total_amount: &str, salt: &str) -> String {
    format!("{order_number}{salt}{status}{total_amount}")
}

fn keyed(secret: &str) -> Result<HmacSha256, SignatureError> {
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidKey)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "merchant-key";
    const SALT: &str = "merchant-salt";

    fn callback(status: &str, amount: &str) -> CallbackPayload {
        let hash = sign_callback("MD1700000000123", status, amount, KEY, SALT).unwrap();
        CallbackPayload {
            merchant_oid: "MD1700000000123".into(),
            status: status.into(),
            total_amount: amount.into(),
            hash,
            ..Default::default()
        }
    }

    #[test]
    fn request_token_is_deterministic_base64() {
        let fields = [("merchant_id", "1001"), ("user_ip", "10.0.0.1")];
        let a = sign_request(&fields, KEY, SALT).unwrap();
        let b = sign_request(&fields, KEY, SALT).unwrap();
        assert_eq!(a, b);
        // 32-byte digest encodes to 44 base64 chars
        assert_eq!(a.len(), 44);
        assert!(STANDARD.decode(&a).is_ok());
    }

    #[test]
    fn request_token_depends_on_field_order() {
        let forward = sign_request(&[("a", "1001"), ("b", "2002")], KEY, SALT).unwrap();
        let reversed = sign_request(&[("b", "2002"), ("a", "1001")], KEY, SALT).unwrap();
        assert_ne!(forward, reversed);
    }

    #[test]
    fn request_token_depends_on_key_and_salt() {
        let fields = [("merchant_id", "1001")];
        let base = sign_request(&fields, KEY, SALT).unwrap();
        assert_ne!(base, sign_request(&fields, "other-key", SALT).unwrap());
        assert_ne!(base, sign_request(&fields, KEY, "other-salt").unwrap());
    }

    #[test]
    fn genuine_callback_verifies() {
        let payload = callback("success", "20000");
        let result = verify_callback(&payload, KEY, SALT);
        assert!(result.valid);
        assert_eq!(result.outcome, PaymentOutcome::Paid);
        assert_eq!(result.order_number, "MD1700000000123");
        assert_eq!(result.amount, Some(20000));
    }

    #[test]
    fn non_success_status_normalises_to_failed() {
        let result = verify_callback(&callback("failed", "20000"), KEY, SALT);
        assert!(result.valid);
        assert_eq!(result.outcome, PaymentOutcome::Failed);
    }

    #[test]
    fn tampered_fields_fail_verification() {
        let mut payload = callback("failed", "20000");
        payload.status = "success".into();
        assert!(!verify_callback(&payload, KEY, SALT).valid);

        let mut payload = callback("success", "20000");
        payload.total_amount = "100".into();
        assert!(!verify_callback(&payload, KEY, SALT).valid);

        let mut payload = callback("success", "20000");
        payload.merchant_oid = "MD1700000000999".into();
        assert!(!verify_callback(&payload, KEY, SALT).valid);
    }

    #[test]
    fn wrong_credentials_fail_verification() {
        let payload = callback("success", "20000");
        assert!(!verify_callback(&payload, "another-key", SALT).valid);
        assert!(!verify_callback(&payload, KEY, "another-salt").valid);
    }

    #[test]
    fn malformed_hash_is_invalid_not_an_error() {
        let mut payload = callback("success", "20000");
        payload.hash = "%%% not base64 %%%".into();
        assert!(!verify_callback(&payload, KEY, SALT).valid);

        payload.hash = String::new();
        assert!(!verify_callback(&payload, KEY, SALT).valid);
    }
}
