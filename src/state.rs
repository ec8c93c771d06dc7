use std::sync::Arc;

use crate::{
    config::{AppConfig, PaytrConfig},
    db::{DbPool, OrmConn},
    notifications::NotificationQueue,
    payment::PaymentGateway,
    store::OrderStore,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub orders: OrderContext,
}

/// Collaborators of the order and payment flow, injected so they can be
/// swapped for in-memory fakes.
#[derive(Clone)]
pub struct OrderContext {
    pub store: Arc<dyn OrderStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub paytr: Arc<PaytrConfig>,
    pub notifications: NotificationQueue,
}
