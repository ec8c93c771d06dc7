//! Server-to-server payment notifications.
//!
//! The gateway retries a callback until it reads [`ACKNOWLEDGEMENT`], so every
//! outcome below is acknowledged. Only a verified callback for a still-pending
//! order changes state, and it does so through the store's compare-and-swap.

use tracing::{error, info, warn};

use crate::{
    dto::payment::CallbackPayload,
    models::{OrderStatus, PaymentOutcome, PaymentStatus},
    notifications::Notification,
    payment::{gateway::to_minor_units, verify_callback},
    state::OrderContext,
    store::{OrderKey, Settlement},
};

pub const ACKNOWLEDGEMENT: &str = "OK";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// This callback settled the order.
    Applied {
        order_number: String,
        status: OrderStatus,
        payment_status: PaymentStatus,
    },
    /// The order had already left `pending`; nothing changed.
    Duplicate {
        order_number: String,
        status: OrderStatus,
        payment_status: PaymentStatus,
    },
    InvalidSignature { order_number: String },
    UnknownOrder { order_number: String },
    /// The store failed; the order is left as it was.
    Failed { order_number: String, error: String },
}

impl CallbackOutcome {
    pub fn order_number(&self) -> &str {
        match self {
            CallbackOutcome::Applied { order_number, .. }
            | CallbackOutcome::Duplicate { order_number, .. }
            | CallbackOutcome::InvalidSignature { order_number }
            | CallbackOutcome::UnknownOrder { order_number }
            | CallbackOutcome::Failed { order_number, .. } => order_number,
        }
    }
}

pub async fn process_callback(ctx: &OrderContext, payload: &CallbackPayload) -> CallbackOutcome {
    let verification = verify_callback(
        payload,
        &ctx.paytr.merchant_key,
        &ctx.paytr.merchant_salt,
    );
    let order_number = verification.order_number.clone();

    if !verification.valid {
        warn!(
            target: "security",
            order_number = %order_number,
            status = %payload.status,
            "payment callback signature mismatch"
        );
        return CallbackOutcome::InvalidSignature { order_number };
    }

    let current = match ctx
        .store
        .find_order(&OrderKey::Number(order_number.clone()))
        .await
    {
        Ok(Some(found)) => found.order,
        Ok(None) => {
            warn!(order_number = %order_number, "payment callback for unknown order");
            return CallbackOutcome::UnknownOrder { order_number };
        }
        Err(err) => {
            error!(order_number = %order_number, error = %err, "order lookup failed during callback");
            return CallbackOutcome::Failed {
                order_number,
                error: err.to_string(),
            };
        }
    };

    // total_amount may include installment fees; payment_amount is the order price.
    let expected = to_minor_units(current.total_amount);
    let reported = payload
        .payment_amount
        .as_deref()
        .and_then(|amount| amount.trim().parse::<i64>().ok());
    if reported.is_some_and(|reported| Some(reported) != expected) {
        warn!(
            order_number = %order_number,
            reported = ?reported,
            expected = ?expected,
            charged = ?verification.amount,
            "callback amount differs from order total"
        );
    }

    let settlement = match ctx
        .store
        .settle_payment(&order_number, verification.outcome)
        .await
    {
        Ok(settlement) => settlement,
        Err(err) => {
            error!(order_number = %order_number, error = %err, "failed to settle payment");
            return CallbackOutcome::Failed {
                order_number,
                error: err.to_string(),
            };
        }
    };

    match settlement {
        Settlement::Applied(order) => {
            info!(
                order_number = %order_number,
                status = %order.status,
                payment_status = %order.payment_status,
                "payment settled"
            );
            let outcome = CallbackOutcome::Applied {
                order_number,
                status: order.status,
                payment_status: order.payment_status,
            };
            let notification = match verification.outcome {
                PaymentOutcome::Paid => Notification::PaymentConfirmed(order),
                PaymentOutcome::Failed => Notification::PaymentFailed {
                    order,
                    reason: payload.failed_reason_msg.clone(),
                },
            };
            ctx.notifications.enqueue(notification);
            outcome
        }
        Settlement::AlreadySettled(order) => {
            let (status, payment_status) = verification.outcome.target();
            if order.status != status || order.payment_status != payment_status {
                warn!(
                    order_number = %order_number,
                    current_status = %order.status,
                    current_payment_status = %order.payment_status,
                    reported = ?verification.outcome,
                    "callback conflicts with settled order, ignoring"
                );
            } else {
                info!(order_number = %order_number, "duplicate payment callback");
            }
            CallbackOutcome::Duplicate {
                order_number,
                status: order.status,
                payment_status: order.payment_status,
            }
        }
        Settlement::NotFound => {
            warn!(order_number = %order_number, "order vanished before settlement");
            CallbackOutcome::UnknownOrder { order_number }
        }
    }
}
