pub mod callback_service;
pub mod fees;
pub mod idempotency;
pub mod payment_orchestrator;
pub mod payment_service;
pub mod refund_service;
pub mod webhook_dispatcher;
