use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};
use tracing::{error, info, warn};

use crate::models::Order;

const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Customer-facing events produced by the order lifecycle.
#[derive(Debug, Clone)]
pub enum Notification {
    OrderReceived(Order),
    PaymentConfirmed(Order),
    PaymentFailed {
        order: Order,
        reason: Option<String>,
    },
    OrderShipped(Order),
}

impl Notification {
    pub fn order(&self) -> &Order {
        match self {
            Notification::OrderReceived(order)
            | Notification::PaymentConfirmed(order)
            | Notification::OrderShipped(order) => order,
            Notification::PaymentFailed { order, .. } => order,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()>;
}

/// Mailer that only records the message in the log.
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        info!(
            from = %self.from,
            to = %message.to,
            subject = %message.subject,
            "email dispatched"
        );
        Ok(())
    }
}

/// Producer side of the notification queue. Enqueueing never waits.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    sender: mpsc::Sender<Notification>,
}

impl NotificationQueue {
    pub fn new(sender: mpsc::Sender<Notification>) -> Self {
        Self { sender }
    }

    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self::new(sender), receiver)
    }

    pub fn enqueue(&self, notification: Notification) {
        match self.sender.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => warn!(
                order_number = %dropped.order().order_number,
                "notification queue full, dropping notification"
            ),
            Err(TrySendError::Closed(dropped)) => warn!(
                order_number = %dropped.order().order_number,
                "notification worker stopped, dropping notification"
            ),
        }
    }
}

pub fn spawn_worker(
    receiver: mpsc::Receiver<Notification>,
    mailer: Arc<dyn Mailer>,
    admin_email: Option<String>,
) -> JoinHandle<()> {
    tokio::spawn(run_worker(receiver, mailer, admin_email))
}

/// Drains the queue until every producer is dropped. Send failures are
/// logged and never reach the order flow.
pub async fn run_worker(
    mut receiver: mpsc::Receiver<Notification>,
    mailer: Arc<dyn Mailer>,
    admin_email: Option<String>,
) {
    info!("notification worker started");
    while let Some(notification) = receiver.recv().await {
        for message in render(&notification, admin_email.as_deref()) {
            match tokio::time::timeout(SEND_TIMEOUT, mailer.send(&message)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!(
                    to = %message.to,
                    subject = %message.subject,
                    error = %err,
                    "email send failed"
                ),
                Err(_) => error!(to = %message.to, subject = %message.subject, "email send timed out"),
            }
        }
    }
    info!("notification worker stopped");
}

pub fn render(notification: &Notification, admin_email: Option<&str>) -> Vec<EmailMessage> {
    let order = notification.order();
    let number = &order.order_number;
    let mut messages = Vec::with_capacity(2);

    match notification {
        Notification::OrderReceived(_) => {
            messages.push(EmailMessage {
                to: order.customer_email.clone(),
                subject: format!("Order {number} received"),
                body: format!(
                    "Hello {},\n\nWe received your order {number} for {} TL. \
                     We will let you know once it is confirmed.",
                    order.customer_name, order.total_amount
                ),
            });
            if let Some(admin) = admin_email {
                messages.push(admin_copy(admin, "New order", order));
            }
        }
        Notification::PaymentConfirmed(_) => {
            messages.push(EmailMessage {
                to: order.customer_email.clone(),
                subject: format!("Payment received for order {number}"),
                body: format!(
                    "Hello {},\n\nYour payment of {} TL for order {number} was received \
                     and your order is confirmed.",
                    order.customer_name, order.total_amount
                ),
            });
            if let Some(admin) = admin_email {
                messages.push(admin_copy(admin, "Paid order", order));
            }
        }
        Notification::PaymentFailed { reason, .. } => {
            let detail = reason
                .as_deref()
                .map(|r| format!(" ({r})"))
                .unwrap_or_default();
            messages.push(EmailMessage {
                to: order.customer_email.clone(),
                subject: format!("Payment failed for order {number}"),
                body: format!(
                    "Hello {},\n\nThe payment for order {number} could not be completed{detail}. \
                     The order has been cancelled; you can place it again at any time.",
                    order.customer_name
                ),
            });
        }
        Notification::OrderShipped(_) => {
            let cargo = match (&order.cargo_company, &order.cargo_tracking_number) {
                (Some(company), Some(tracking)) => format!(" with {company}, tracking number {tracking}"),
                (Some(company), None) => format!(" with {company}"),
                (None, Some(tracking)) => format!(", tracking number {tracking}"),
                (None, None) => String::new(),
            };
            messages.push(EmailMessage {
                to: order.customer_email.clone(),
                subject: format!("Order {number} shipped"),
                body: format!(
                    "Hello {},\n\nYour order {number} has been shipped{cargo}.",
                    order.customer_name
                ),
            });
        }
    }

    messages
}

fn admin_copy(admin: &str, kind: &str, order: &Order) -> EmailMessage {
    EmailMessage {
        to: admin.to_string(),
        subject: format!("{kind}: {}", order.order_number),
        body: format!(
            "{kind} {} from {} <{}>, total {} TL.",
            order.order_number, order.customer_name, order.customer_email, order.total_amount
        ),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tokio::sync::Mutex;

    use super::*;
    use crate::models::{OrderStatus, PaymentMethod, PaymentStatus};

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<EmailMessage>>,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
            if self.fail_for.as_deref() == Some(message.to.as_str()) {
                anyhow::bail!("smtp unavailable");
            }
            self.sent.lock().await.push(message.clone());
            Ok(())
        }
    }

    fn order() -> Order {
        Order {
            id: 7,
            order_number: "MD1700000000123".into(),
            user_id: None,
            customer_name: "Ayse".into(),
            customer_email: "ayse@example.com".into(),
            customer_phone: None,
            shipping_address: None,
            total_amount: Decimal::new(20000, 2),
            shipping_cost: Decimal::ZERO,
            status: OrderStatus::Confirmed,
            payment_status: PaymentStatus::Paid,
            payment_method: PaymentMethod::Paytr,
            cargo_company: Some("Aras Kargo".into()),
            cargo_tracking_number: Some("AR123".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn admin_copy_only_when_configured() {
        let confirmed = Notification::PaymentConfirmed(order());
        assert_eq!(render(&confirmed, None).len(), 1);

        let messages = render(&confirmed, Some("admin@shop.example"));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].to, "admin@shop.example");
        assert!(messages[0].subject.contains("MD1700000000123"));
    }

    #[test]
    fn shipped_mail_mentions_cargo() {
        let messages = render(&Notification::OrderShipped(order()), Some("admin@shop.example"));
        assert_eq!(messages.len(), 1);
        assert!(messages[0].body.contains("Aras Kargo"));
        assert!(messages[0].body.contains("AR123"));
    }

    #[tokio::test]
    async fn worker_keeps_going_after_send_failure() {
        let mailer = Arc::new(RecordingMailer {
            fail_for: Some("admin@shop.example".into()),
            ..Default::default()
        });
        let (queue, receiver) = NotificationQueue::channel(8);
        let worker = spawn_worker(receiver, mailer.clone(), Some("admin@shop.example".into()));

        queue.enqueue(Notification::PaymentConfirmed(order()));
        queue.enqueue(Notification::OrderShipped(order()));
        drop(queue);
        worker.await.unwrap();

        let sent = mailer.sent.lock().await;
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|m| m.to == "ayse@example.com"));
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let (queue, mut receiver) = NotificationQueue::channel(1);
        queue.enqueue(Notification::OrderReceived(order()));
        queue.enqueue(Notification::OrderReceived(order()));

        assert!(receiver.try_recv().is_ok());
        assert!(receiver.try_recv().is_err());
    }
}
