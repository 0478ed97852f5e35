//! Client for the hosted payment gateway (Stripe) used by the storefront
//! checkout: hosted checkout sessions and payment intents.

pub mod amount;
pub mod client;
pub mod error;
pub mod types;

pub use amount::{total_minor_units, PriceLine};
pub use client::StripeClient;
pub use error::PaymentsError;
pub use types::{CheckoutItem, CheckoutSession, CheckoutSessionRequest, PaymentIntent};
