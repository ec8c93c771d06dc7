use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        orders::{
            CreateOrderRequest, CreateOrderResponse, CreatedOrderData, GuestTrackRequest,
            OrderItemInput, OrderList, OrderWithItems, UpdateOrderRequest,
        },
        payment::{CallbackPayload, PaymentSession},
    },
    error::ErrorResponse,
    models::{Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress, User},
    response::{ApiResponse, Meta},
    routes::{admin, auth, health, orders, params, payment},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::register,
        orders::create_order,
        orders::create_payment,
        orders::guest_track,
        orders::list_orders,
        orders::get_order,
        admin::update_order,
        payment::payment_callback
    ),
    components(
        schemas(
            User,
            Order,
            OrderItem,
            OrderStatus,
            PaymentStatus,
            PaymentMethod,
            ShippingAddress,
            OrderItemInput,
            CreateOrderRequest,
            CreatedOrderData,
            CreateOrderResponse,
            GuestTrackRequest,
            UpdateOrderRequest,
            OrderList,
            OrderWithItems,
            PaymentSession,
            CallbackPayload,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            ErrorResponse,
            params::Pagination,
            params::OrderListQuery,
            Meta,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<Order>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Orders", description = "Order creation, payment and tracking"),
        (name = "Payment", description = "Payment gateway callbacks"),
        (name = "Admin", description = "Admin endpoints"),
        (name = "Auth", description = "Authentication endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
