pub mod app_config;
pub mod cart;
pub mod config;
pub mod orders;
pub mod password;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use cart::{CartOwner, CartStatus};
pub use config::{load_app_config, load_app_config_from_env};
pub use orders::{require_lines, OrderLine, OrderStatus};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid order status: {0}")]
    InvalidOrderStatus(String),
    #[error("order cannot move from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },
    #[error("invalid line item: {0}")]
    InvalidLineItem(String),
    #[error("invalid cart status: {0}")]
    InvalidCartStatus(String),
    #[error("invalid cart owner: {0}")]
    InvalidCartOwner(String),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}
