//! HTTP client for the Stripe REST API.
//!
//! Requests are form-encoded and authenticated with the secret key as a
//! bearer token. Non-2xx answers surface as [`PaymentsError::Api`] carrying
//! the gateway's own message.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use crate::error::PaymentsError;
use crate::types::{CheckoutSession, CheckoutSessionRequest, ErrorEnvelope, PaymentIntent};

const DEFAULT_BASE_URL: &str = "https://api.stripe.com/";
const API_VERSION: &str = "2025-07-30.basil";

/// Relations expanded when a checkout session is read back for the
/// confirmation page.
const SESSION_EXPANSIONS: [&str; 5] = [
    "line_items",
    "line_items.data.price.product",
    "customer",
    "payment_intent",
    "subscription",
];

/// Client for the Stripe REST API.
///
/// Use [`StripeClient::new`] for production or [`StripeClient::with_base_url`]
/// to point at a mock server in tests.
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
    base_url: Url,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("base_url", &self.base_url.as_str())
            .field("secret_key", &"[redacted]")
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Creates a client pointed at the production API.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentsError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(secret_key: &str, timeout_secs: u64) -> Result<Self, PaymentsError> {
        Self::with_base_url(secret_key, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`PaymentsError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`PaymentsError::InvalidBaseUrl`] if
    /// `base_url` is not a valid URL.
    pub fn with_base_url(
        secret_key: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, PaymentsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("ecom-server/0.1")
            .build()?;

        // Exactly one trailing slash so `Url::join` appends instead of
        // replacing the last path segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| PaymentsError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            secret_key: secret_key.to_owned(),
            base_url,
        })
    }

    /// Creates a hosted checkout session in `payment` mode.
    ///
    /// # Errors
    ///
    /// - [`PaymentsError::Api`] if the gateway rejects the request.
    /// - [`PaymentsError::Http`] on network failure.
    /// - [`PaymentsError::Deserialize`] if the response has an unexpected shape.
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentsError> {
        let url = self.endpoint(&["v1", "checkout", "sessions"]);
        let builder = self.client.post(url).form(&request.form_fields());
        let session: CheckoutSession = self.send(builder, "create checkout session").await?;
        tracing::info!(session_id = %session.id, lines = request.items.len(), "checkout session created");
        Ok(session)
    }

    /// Reads a checkout session with its line items, customer and payment
    /// intent expanded. The body is returned untouched.
    ///
    /// # Errors
    ///
    /// Same as [`StripeClient::create_checkout_session`].
    pub async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<serde_json::Value, PaymentsError> {
        let url = self.endpoint(&["v1", "checkout", "sessions", session_id]);
        let expand: Vec<(&str, &str)> = SESSION_EXPANSIONS
            .iter()
            .map(|relation| ("expand[]", *relation))
            .collect();
        let builder = self.client.get(url).query(&expand);
        self.send(builder, "retrieve checkout session").await
    }

    /// Creates a USD payment intent for `amount_cents` with automatic payment
    /// methods enabled.
    ///
    /// # Errors
    ///
    /// - [`PaymentsError::InvalidAmount`] if `amount_cents` is not positive.
    /// - Otherwise the same as [`StripeClient::create_checkout_session`].
    pub async fn create_payment_intent(
        &self,
        amount_cents: i64,
    ) -> Result<PaymentIntent, PaymentsError> {
        if amount_cents <= 0 {
            return Err(PaymentsError::InvalidAmount(format!(
                "amount must be positive, got {amount_cents}"
            )));
        }
        let url = self.endpoint(&["v1", "payment_intents"]);
        let form = [
            ("amount", amount_cents.to_string()),
            ("currency", "usd".to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];
        let builder = self.client.post(url).form(&form);
        let intent: PaymentIntent = self.send(builder, "create payment intent").await?;
        tracing::info!(payment_intent = %intent.id, amount_cents, "payment intent created");
        Ok(intent)
    }

    /// Appends percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Sends an authenticated request and parses a 2xx body as `T`.
    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        context: &str,
    ) -> Result<T, PaymentsError> {
        let response = builder
            .bearer_auth(&self.secret_key)
            .header("Stripe-Version", API_VERSION)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|envelope| {
                    envelope
                        .error
                        .message
                        .or(envelope.error.kind)
                })
                .unwrap_or_else(|| format!("unexpected status {status}"));
            tracing::warn!(%status, context, %message, "payment gateway rejected request");
            return Err(PaymentsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| PaymentsError::Deserialize {
            context: context.to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
