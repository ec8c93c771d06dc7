pub mod auth_service;
pub mod order_service;
pub mod payment_callback_service;
