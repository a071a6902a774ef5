pub mod booking;
pub mod cart;
pub mod config;
pub mod error;
pub mod freight;
pub mod funding;
pub mod lease;
pub mod notification;
pub mod purchase;
pub mod service;
pub mod status;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod utils;

pub use error::{MarketError, MarketResult};
pub use service::MarketService;
