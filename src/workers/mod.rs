pub mod expiry_sweeper;
pub mod payment_worker;
pub mod webhook_worker;
