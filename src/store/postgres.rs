use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use super::{
    CreatedOrder, NewOrder, NewOrderItem, OrderKey, OrderListFilter, OrderStore, OrderUpdate,
    Settlement, amount_out_of_range, money, normalize_email,
};
use crate::{
    dto::orders::OrderWithItems,
    entity::{
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
    },
    error::{AppError, AppResult},
    models::{
        Order, OrderItem, OrderStatus, PaymentMethod, PaymentOutcome, PaymentStatus, ShippingAddress,
    },
};

/// Order store backed by Postgres through SeaORM.
#[derive(Clone)]
pub struct PgOrderStore {
    conn: DatabaseConnection,
}

impl PgOrderStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    async fn find_model(&self, key: &OrderKey) -> AppResult<Option<OrderModel>> {
        let finder = match key {
            OrderKey::Id(id) => Orders::find_by_id(*id),
            OrderKey::Number(number) => Orders::find().filter(OrderCol::OrderNumber.eq(number.as_str())),
        };
        Ok(finder.one(&self.conn).await?)
    }

    async fn with_items(&self, model: OrderModel) -> AppResult<OrderWithItems> {
        let items = OrderItems::find()
            .filter(OrderItemCol::OrderId.eq(model.id))
            .order_by_asc(OrderItemCol::Id)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(order_item_from_entity)
            .collect();

        Ok(OrderWithItems {
            order: order_from_entity(model)?,
            items,
        })
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert_order(
        &self,
        order_number: &str,
        order: &NewOrder,
        items: &[NewOrderItem],
    ) -> AppResult<CreatedOrder> {
        let line_totals = items
            .iter()
            .map(|item| item.line_total().ok_or_else(amount_out_of_range))
            .collect::<AppResult<Vec<_>>>()?;

        let txn = self.conn.begin().await?;
        let now = Utc::now();

        let inserted = OrderActive {
            id: NotSet,
            order_number: Set(order_number.to_string()),
            user_id: Set(order.user_id),
            customer_name: Set(order.customer_name.clone()),
            customer_email: Set(normalize_email(&order.customer_email)),
            customer_phone: Set(order.customer_phone.clone()),
            shipping_address: Set(order.shipping_address.to_blob()),
            total_amount: Set(money(order.total_amount)),
            shipping_cost: Set(money(order.shipping_cost)),
            status: Set(OrderStatus::Pending.as_str().to_string()),
            payment_status: Set(PaymentStatus::Pending.as_str().to_string()),
            payment_method: Set(order.payment_method.as_str().to_string()),
            cargo_company: Set(None),
            cargo_tracking_number: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await
        .map_err(insert_error)?;

        if !items.is_empty() {
            let rows = items.iter().zip(line_totals).map(|(item, line_total)| OrderItemActive {
                id: NotSet,
                order_id: Set(inserted.id),
                product_id: Set(item.product_id),
                product_name: Set(item.product_name.clone()),
                quantity: Set(item.quantity),
                unit_price: Set(money(item.unit_price)),
                line_total: Set(line_total),
                created_at: Set(now.into()),
            });
            // Dropping the transaction on error rolls the order row back too.
            OrderItems::insert_many(rows).exec(&txn).await?;
        }

        txn.commit().await?;

        Ok(CreatedOrder {
            order_id: inserted.id,
            order_number: inserted.order_number,
        })
    }

    async fn update_order(&self, key: &OrderKey, update: &OrderUpdate) -> AppResult<Order> {
        let existing = self.find_model(key).await?.ok_or(AppError::NotFound)?;

        let mut active: OrderActive = existing.into();
        if let Some(status) = update.status {
            active.status = Set(status.as_str().to_string());
        }
        if let Some(payment_status) = update.payment_status {
            active.payment_status = Set(payment_status.as_str().to_string());
        }
        if let Some(company) = &update.cargo_company {
            active.cargo_company = Set(Some(company.clone()));
        }
        if let Some(tracking) = &update.cargo_tracking_number {
            active.cargo_tracking_number = Set(Some(tracking.clone()));
        }
        active.updated_at = Set(Utc::now().into());

        let model = active.update(&self.conn).await?;
        order_from_entity(model)
    }

    async fn settle_payment(
        &self,
        order_number: &str,
        outcome: PaymentOutcome,
    ) -> AppResult<Settlement> {
        let (status, payment_status) = outcome.target();
        let now: chrono::DateTime<chrono::FixedOffset> = Utc::now().into();

        let result = Orders::update_many()
            .col_expr(OrderCol::Status, Expr::value(status.as_str()))
            .col_expr(OrderCol::PaymentStatus, Expr::value(payment_status.as_str()))
            .col_expr(OrderCol::UpdatedAt, Expr::value(now))
            .filter(
                Condition::all()
                    .add(OrderCol::OrderNumber.eq(order_number))
                    .add(OrderCol::Status.eq(OrderStatus::Pending.as_str()))
                    .add(OrderCol::PaymentStatus.eq(PaymentStatus::Pending.as_str())),
            )
            .exec(&self.conn)
            .await?;

        let current = self
            .find_model(&OrderKey::Number(order_number.to_string()))
            .await?;
        let Some(current) = current else {
            return Ok(Settlement::NotFound);
        };
        let order = order_from_entity(current)?;

        if result.rows_affected == 1 {
            Ok(Settlement::Applied(order))
        } else {
            Ok(Settlement::AlreadySettled(order))
        }
    }

    async fn find_order(&self, key: &OrderKey) -> AppResult<Option<OrderWithItems>> {
        match self.find_model(key).await? {
            Some(model) => Ok(Some(self.with_items(model).await?)),
            None => Ok(None),
        }
    }

    async fn find_for_guest(
        &self,
        order_number: &str,
        email: &str,
    ) -> AppResult<Option<OrderWithItems>> {
        let model = Orders::find()
            .filter(
                Condition::all()
                    .add(OrderCol::OrderNumber.eq(order_number))
                    .add(OrderCol::CustomerEmail.eq(normalize_email(email))),
            )
            .one(&self.conn)
            .await?;

        match model {
            Some(model) => Ok(Some(self.with_items(model).await?)),
            None => Ok(None),
        }
    }

    async fn list_user_orders(
        &self,
        user_id: Uuid,
        filter: &OrderListFilter,
    ) -> AppResult<(Vec<Order>, i64)> {
        let mut condition = Condition::all().add(OrderCol::UserId.eq(user_id));
        if let Some(status) = filter.status {
            condition = condition.add(OrderCol::Status.eq(status.as_str()));
        }

        let mut finder = Orders::find().filter(condition);
        finder = if filter.newest_first {
            finder.order_by_desc(OrderCol::CreatedAt).order_by_desc(OrderCol::Id)
        } else {
            finder.order_by_asc(OrderCol::CreatedAt).order_by_asc(OrderCol::Id)
        };

        let total = finder.clone().count(&self.conn).await? as i64;

        let orders = finder
            .limit(filter.limit)
            .offset(filter.offset)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(order_from_entity)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((orders, total))
    }
}

fn insert_error(err: DbErr) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::DuplicateOrderNumber,
        _ => AppError::OrmError(err),
    }
}

fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    let id = model.id;
    let corrupt = move |what: String| AppError::Internal(anyhow::anyhow!("order {id}: {what}"));

    Ok(Order {
        id: model.id,
        status: model.status.parse::<OrderStatus>().map_err(corrupt)?,
        payment_status: model.payment_status.parse::<PaymentStatus>().map_err(corrupt)?,
        payment_method: model.payment_method.parse::<PaymentMethod>().map_err(corrupt)?,
        shipping_address: ShippingAddress::from_blob(&model.shipping_address),
        order_number: model.order_number,
        user_id: model.user_id,
        customer_name: model.customer_name,
        customer_email: model.customer_email,
        customer_phone: model.customer_phone,
        total_amount: model.total_amount,
        shipping_cost: model.shipping_cost,
        cargo_company: model.cargo_company,
        cargo_tracking_number: model.cargo_tracking_number,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        product_name: model.product_name,
        quantity: model.quantity,
        unit_price: model.unit_price,
        line_total: model.line_total,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
