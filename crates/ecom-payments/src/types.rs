//! Request and response shapes for the gateway endpoints the storefront uses.
//!
//! Only the fields the API layer reads are modelled; a retrieved checkout
//! session is passed through as raw JSON.

use serde::Deserialize;

/// One hosted-checkout line: a gateway price id and a quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutItem {
    pub price_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub items: Vec<CheckoutItem>,
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutSessionRequest {
    /// Builds the storefront's standard redirect pair from its origin.
    #[must_use]
    pub fn for_origin(origin: &str, items: Vec<CheckoutItem>) -> Self {
        let origin = origin.trim_end_matches('/');
        Self {
            items,
            success_url: format!("{origin}/checkout?session_id={{CHECKOUT_SESSION_ID}}"),
            cancel_url: format!("{origin}/cart"),
        }
    }

    /// Flattens the request into the gateway's bracketed form encoding.
    pub(crate) fn form_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("success_url".to_string(), self.success_url.clone()),
            ("cancel_url".to_string(), self.cancel_url.clone()),
        ];
        for (i, item) in self.items.iter().enumerate() {
            fields.push((format!("line_items[{i}][price]"), item.price_id.clone()));
            fields.push((format!("line_items[{i}][quantity]"), item.quantity.to_string()));
        }
        fields
    }
}

/// A created hosted checkout session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// A created payment intent.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub amount: i64,
    pub currency: String,
}

/// Error body: `{"error": {"message": "...", "type": "..."}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}
