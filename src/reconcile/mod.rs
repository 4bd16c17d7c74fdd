pub mod gateway;
pub mod job;

pub use gateway::{GatewayVerdict, PaymentGateway, PaystackClient};
pub use job::{ReconcileSummary, ReconciliationJob};
