use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    CreatedOrder, NewOrder, NewOrderItem, OrderKey, OrderListFilter, OrderStore, OrderUpdate,
    Settlement, amount_out_of_range, money, normalize_email,
};
use crate::{
    dto::orders::OrderWithItems,
    error::{AppError, AppResult},
    models::{Order, OrderItem, OrderStatus, PaymentOutcome, PaymentStatus},
};

/// A thread-safe in-memory order store.
///
/// Every operation runs under one lock, which gives the same atomicity the
/// Postgres store gets from transactions and conditional updates.
#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    next_order_id: i64,
    next_item_id: i64,
    orders: BTreeMap<i64, OrderWithItems>,
}

impl Inner {
    fn find(&self, key: &OrderKey) -> Option<&OrderWithItems> {
        match key {
            OrderKey::Id(id) => self.orders.get(id),
            OrderKey::Number(number) => self
                .orders
                .values()
                .find(|entry| &entry.order.order_number == number),
        }
    }

    fn find_mut(&mut self, key: &OrderKey) -> Option<&mut OrderWithItems> {
        match key {
            OrderKey::Id(id) => self.orders.get_mut(id),
            OrderKey::Number(number) => self
                .orders
                .values_mut()
                .find(|entry| &entry.order.order_number == number),
        }
    }
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.orders.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert_order(
        &self,
        order_number: &str,
        order: &NewOrder,
        items: &[NewOrderItem],
    ) -> AppResult<CreatedOrder> {
        let mut inner = self.inner.write().await;

        if inner
            .orders
            .values()
            .any(|entry| entry.order.order_number == order_number)
        {
            return Err(AppError::DuplicateOrderNumber);
        }
        // Mirrors the CHECK constraint on order_items.quantity; nothing is
        // written when any item is rejected.
        if items.iter().any(|item| item.quantity <= 0) {
            return Err(AppError::Internal(anyhow::anyhow!(
                "order item quantity must be positive"
            )));
        }
        let line_totals = items
            .iter()
            .map(|item| item.line_total().ok_or_else(amount_out_of_range))
            .collect::<AppResult<Vec<_>>>()?;

        inner.next_order_id += 1;
        let order_id = inner.next_order_id;
        let now = Utc::now();

        let mut stored_items = Vec::with_capacity(items.len());
        for (item, line_total) in items.iter().zip(line_totals) {
            inner.next_item_id += 1;
            stored_items.push(OrderItem {
                id: inner.next_item_id,
                order_id,
                product_id: item.product_id,
                product_name: item.product_name.clone(),
                quantity: item.quantity,
                unit_price: money(item.unit_price),
                line_total,
                created_at: now,
            });
        }

        let stored = Order {
            id: order_id,
            order_number: order_number.to_string(),
            user_id: order.user_id,
            customer_name: order.customer_name.clone(),
            customer_email: normalize_email(&order.customer_email),
            customer_phone: order.customer_phone.clone(),
            shipping_address: Some(order.shipping_address.clone()),
            total_amount: money(order.total_amount),
            shipping_cost: money(order.shipping_cost),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: order.payment_method,
            cargo_company: None,
            cargo_tracking_number: None,
            created_at: now,
            updated_at: now,
        };

        inner.orders.insert(
            order_id,
            OrderWithItems {
                order: stored,
                items: stored_items,
            },
        );

        Ok(CreatedOrder {
            order_id,
            order_number: order_number.to_string(),
        })
    }

    async fn update_order(&self, key: &OrderKey, update: &OrderUpdate) -> AppResult<Order> {
        let mut inner = self.inner.write().await;
        let entry = inner.find_mut(key).ok_or(AppError::NotFound)?;
        let order = &mut entry.order;

        if let Some(status) = update.status {
            order.status = status;
        }
        if let Some(payment_status) = update.payment_status {
            order.payment_status = payment_status;
        }
        if let Some(company) = &update.cargo_company {
            order.cargo_company = Some(company.clone());
        }
        if let Some(tracking) = &update.cargo_tracking_number {
            order.cargo_tracking_number = Some(tracking.clone());
        }
        order.updated_at = Utc::now();

        Ok(order.clone())
    }

    async fn settle_payment(
        &self,
        order_number: &str,
        outcome: PaymentOutcome,
    ) -> AppResult<Settlement> {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.find_mut(&OrderKey::Number(order_number.to_string())) else {
            return Ok(Settlement::NotFound);
        };
        let order = &mut entry.order;

        if order.status != OrderStatus::Pending || order.payment_status != PaymentStatus::Pending {
            return Ok(Settlement::AlreadySettled(order.clone()));
        }

        let (status, payment_status) = outcome.target();
        order.status = status;
        order.payment_status = payment_status;
        order.updated_at = Utc::now();
        Ok(Settlement::Applied(order.clone()))
    }

    async fn find_order(&self, key: &OrderKey) -> AppResult<Option<OrderWithItems>> {
        let inner = self.inner.read().await;
        Ok(inner.find(key).cloned())
    }

    async fn find_for_guest(
        &self,
        order_number: &str,
        email: &str,
    ) -> AppResult<Option<OrderWithItems>> {
        let email = normalize_email(email);
        let inner = self.inner.read().await;
        Ok(inner
            .find(&OrderKey::Number(order_number.to_string()))
            .filter(|entry| entry.order.customer_email == email)
            .cloned())
    }

    async fn list_user_orders(
        &self,
        user_id: Uuid,
        filter: &OrderListFilter,
    ) -> AppResult<(Vec<Order>, i64)> {
        let inner = self.inner.read().await;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .map(|entry| &entry.order)
            .filter(|order| order.user_id == Some(user_id))
            .filter(|order| filter.status.is_none_or(|status| order.status == status))
            .cloned()
            .collect();

        orders.sort_by_key(|order| (order.created_at, order.id));
        if filter.newest_first {
            orders.reverse();
        }

        let total = orders.len() as i64;
        let page = orders
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .collect();
        Ok((page, total))
    }
}
