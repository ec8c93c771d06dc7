pub mod gateway;
pub mod signature;

pub use gateway::{GatewayError, PaymentGateway, PaymentRequest, PaymentToken, PaytrGateway};
pub use signature::{CallbackVerification, verify_callback};
