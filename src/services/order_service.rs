//! Order lifecycle: validation, creation, payment intent and admin updates.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{error, info, warn};

use crate::{
    dto::{
        orders::{
            CreateOrderRequest, CreateOrderResponse, CreatedOrderData, GuestTrackRequest,
            OrderList, OrderWithItems, UpdateOrderRequest,
        },
        payment::PaymentSession,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderStatus, PaymentMethod, PaymentOutcome, PaymentStatus},
    notifications::Notification,
    payment::gateway::build_payment_request,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::OrderContext,
    store::{
        self, CreatedOrder, MAX_AMOUNT, NewOrder, NewOrderItem, OrderKey, OrderListFilter,
        OrderUpdate, Settlement, amount_out_of_range, money,
    },
};

/// Allowed gap between the submitted total and the recomputed one.
const TOTAL_TOLERANCE: Decimal = dec!(0.01);

/// Direct (cash / manual) order: stays `pending` until an admin confirms it.
pub async fn create_order(
    ctx: &OrderContext,
    user: Option<&AuthUser>,
    payload: CreateOrderRequest,
) -> AppResult<CreateOrderResponse> {
    let (order, items) = prepare_order(payload, user, PaymentMethod::Cash)?;
    let created = store::create_order(ctx.store.as_ref(), &order, &items).await?;
    info!(order_number = %created.order_number, "order created");

    match ctx.store.find_order(&OrderKey::Id(created.order_id)).await {
        Ok(Some(stored)) => ctx
            .notifications
            .enqueue(Notification::OrderReceived(stored.order)),
        Ok(None) => warn!(order_number = %created.order_number, "created order not readable for notification"),
        Err(err) => warn!(order_number = %created.order_number, error = %err, "skipping order notification"),
    }

    Ok(CreateOrderResponse {
        success: true,
        message: "Order created".into(),
        order_id: created.order_id,
        order_number: created.order_number,
        data: CreatedOrderData {
            status: OrderStatus::Pending,
            total: order.total_amount,
        },
    })
}

/// Gateway order: create the order, then ask the gateway for a payment token.
/// Any gateway failure cancels the order; the customer may start over.
pub async fn create_payment(
    ctx: &OrderContext,
    user: Option<&AuthUser>,
    payload: CreateOrderRequest,
    client_ip: &str,
) -> AppResult<PaymentSession> {
    let (order, items) = prepare_order(payload, user, PaymentMethod::Paytr)?;
    let created = store::create_order(ctx.store.as_ref(), &order, &items).await?;
    info!(order_number = %created.order_number, "order created for payment");

    let stored = ctx
        .store
        .find_order(&OrderKey::Id(created.order_id))
        .await?
        .ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "order {} missing right after insert",
                created.order_number
            ))
        })?;

    let submission = match build_payment_request(&ctx.paytr, &stored.order, &stored.items, client_ip)
    {
        Ok(request) => ctx.gateway.submit_payment(&request).await,
        Err(err) => Err(err),
    };

    match submission {
        Ok(token) => {
            info!(order_number = %created.order_number, "payment token issued");
            Ok(PaymentSession {
                success: true,
                message: "Payment created".into(),
                order_id: created.order_id,
                order_number: created.order_number,
                token: token.token,
                payment_url: token.payment_url,
            })
        }
        Err(err) => {
            warn!(order_number = %created.order_number, error = %err, "payment creation failed, cancelling order");
            cancel_unpaid(ctx, &created).await;
            Err(err.into())
        }
    }
}

async fn cancel_unpaid(ctx: &OrderContext, created: &CreatedOrder) {
    match ctx
        .store
        .settle_payment(&created.order_number, PaymentOutcome::Failed)
        .await
    {
        Ok(Settlement::Applied(_)) => {}
        Ok(other) => warn!(order_number = %created.order_number, settlement = ?other, "order was not pending when cancelling"),
        Err(err) => error!(order_number = %created.order_number, error = %err, "failed to cancel unpaid order"),
    }
}

/// Owner or admin only. Other callers get "not found", not "forbidden".
pub async fn get_order(
    ctx: &OrderContext,
    user: &AuthUser,
    id: i64,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let found = ctx
        .store
        .find_order(&OrderKey::Id(id))
        .await?
        .filter(|found| user.is_admin() || found.order.user_id == Some(user.user_id))
        .ok_or(AppError::NotFound)?;

    Ok(ApiResponse::success("OK", found, Some(Meta::empty())))
}

pub async fn track_guest_order(
    ctx: &OrderContext,
    payload: GuestTrackRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let email = payload.email.trim();
    let order_number = payload.order_number.trim();
    if email.is_empty() || order_number.is_empty() {
        return Err(AppError::BadRequest(
            "email and orderNumber are required".into(),
        ));
    }

    let found = ctx
        .store
        .find_for_guest(order_number, email)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(ApiResponse::success("Order found", found, Some(Meta::empty())))
}

pub async fn list_orders(
    ctx: &OrderContext,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(parse_status(raw)?),
        None => None,
    };

    let filter = OrderListFilter {
        status,
        newest_first: matches!(query.sort_order.unwrap_or(SortOrder::Desc), SortOrder::Desc),
        limit: limit as u64,
        offset: offset as u64,
    };
    let (items, total) = ctx.store.list_user_orders(user.user_id, &filter).await?;

    Ok(ApiResponse::success(
        "Ok",
        OrderList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

/// Admin partial update of status, payment status and cargo details.
pub async fn update_order(
    ctx: &OrderContext,
    user: &AuthUser,
    id: i64,
    payload: UpdateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let update = parse_update(payload)?;

    let order = ctx.store.update_order(&OrderKey::Id(id), &update).await?;
    info!(
        order_number = %order.order_number,
        status = %order.status,
        payment_status = %order.payment_status,
        "order updated"
    );

    if update.status == Some(OrderStatus::Shipped) {
        ctx.notifications
            .enqueue(Notification::OrderShipped(order.clone()));
    }

    Ok(ApiResponse::success("Order updated", order, Some(Meta::empty())))
}

pub fn parse_update(payload: UpdateOrderRequest) -> AppResult<OrderUpdate> {
    let status = payload.status.as_deref().map(parse_status).transpose()?;
    let payment_status = payload
        .payment_status
        .as_deref()
        .map(|raw| {
            raw.parse::<PaymentStatus>()
                .map_err(|_| AppError::BadRequest("Invalid payment status".into()))
        })
        .transpose()?;

    Ok(OrderUpdate {
        status,
        payment_status,
        cargo_company: non_blank(payload.cargo_company),
        cargo_tracking_number: non_blank(payload.cargo_tracking_number),
    })
}

fn parse_status(raw: &str) -> AppResult<OrderStatus> {
    raw.parse()
        .map_err(|_| AppError::BadRequest("Invalid order status".into()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validates a create request and splits it into store inputs.
pub fn prepare_order(
    payload: CreateOrderRequest,
    user: Option<&AuthUser>,
    payment_method: PaymentMethod,
) -> AppResult<(NewOrder, Vec<NewOrderItem>)> {
    let email = payload.user_email.trim();
    if email.is_empty() {
        return Err(AppError::BadRequest("user_email is required".into()));
    }
    if !email.contains('@') {
        return Err(AppError::BadRequest("user_email is invalid".into()));
    }
    let name = payload.user_name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("user_name is required".into()));
    }
    if payload.shipping_address.address.trim().is_empty() {
        return Err(AppError::BadRequest("shipping_address is required".into()));
    }
    if payload.items.is_empty() {
        return Err(AppError::BadRequest("items must not be empty".into()));
    }

    let mut items = Vec::with_capacity(payload.items.len());
    for input in &payload.items {
        let product_name = input.name.trim();
        if product_name.is_empty() {
            return Err(AppError::BadRequest("item name is required".into()));
        }
        if input.quantity <= 0 {
            return Err(AppError::BadRequest(format!(
                "quantity for '{product_name}' must be positive"
            )));
        }
        if input.price.is_sign_negative() {
            return Err(AppError::BadRequest(format!(
                "price for '{product_name}' must not be negative"
            )));
        }
        if input.price > MAX_AMOUNT {
            return Err(amount_out_of_range());
        }
        items.push(NewOrderItem {
            product_id: input.id,
            product_name: product_name.to_string(),
            quantity: input.quantity,
            unit_price: money(input.price),
        });
    }

    let shipping_cost = payload.shipping_cost.unwrap_or(Decimal::ZERO);
    if shipping_cost.is_sign_negative() {
        return Err(AppError::BadRequest("shipping_cost must not be negative".into()));
    }
    if payload.total_amount <= Decimal::ZERO {
        return Err(AppError::BadRequest("total_amount must be positive".into()));
    }
    if shipping_cost > MAX_AMOUNT || payload.total_amount > MAX_AMOUNT {
        return Err(amount_out_of_range());
    }
    let shipping_cost = money(shipping_cost);
    let total_amount = money(payload.total_amount);

    let items_total = items
        .iter()
        .try_fold(Decimal::ZERO, |sum, item| {
            item.line_total()
                .filter(|line| *line <= MAX_AMOUNT)
                .and_then(|line| sum.checked_add(line))
        })
        .filter(|sum| *sum <= MAX_AMOUNT)
        .ok_or_else(amount_out_of_range)?;
    if (items_total + shipping_cost - total_amount).abs() > TOTAL_TOLERANCE {
        return Err(AppError::BadRequest(format!(
            "total_amount {total_amount} does not match items {items_total} plus shipping {shipping_cost}"
        )));
    }

    let order = NewOrder {
        user_id: user.map(|u| u.user_id),
        customer_name: name.to_string(),
        customer_email: store::normalize_email(email),
        customer_phone: non_blank(payload.user_phone),
        shipping_address: payload.shipping_address,
        total_amount,
        shipping_cost,
        payment_method,
    };

    Ok((order, items))
}
