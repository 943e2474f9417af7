pub mod admin_service;
pub mod order_service;
pub mod payment_service;
pub mod settlement;
pub mod webhook_service;
