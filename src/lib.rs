//! Order and payment backend for a storefront: order capture, PayTR payment
//! intents, signed gateway callbacks and customer notifications.

pub mod audit;
pub mod config;
pub mod db;
pub mod dto;
pub mod entity;
pub mod error;
pub mod middleware;
pub mod models;
pub mod notifications;
pub mod payment;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
