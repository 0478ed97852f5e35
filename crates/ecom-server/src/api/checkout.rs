use axum::{
    extract::{Path, State},
    http::{header, HeaderMap},
    Extension, Json,
};
use ecom_payments::{
    total_minor_units, CheckoutItem, CheckoutSessionRequest, PaymentsError, PriceLine,
    StripeClient,
};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CheckoutLine {
    pub stripe_price_id: String,
    pub quantity: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CheckoutRequest {
    #[serde(default)]
    pub items: Vec<CheckoutLine>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PaymentIntentRequest {
    #[serde(default)]
    pub items: Vec<PriceLine>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CheckoutSessionCreated {
    pub session_id: String,
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PaymentIntentCreated {
    pub client_secret: Option<String>,
}

fn gateway<'a>(rid: &str, state: &'a AppState) -> Result<&'a StripeClient, ApiError> {
    state.payments.as_ref().ok_or_else(|| {
        ApiError::new(
            rid,
            "service_unavailable",
            "payments are not configured on this server",
        )
    })
}

fn map_payments_error(rid: &str, error: &PaymentsError) -> ApiError {
    match error {
        PaymentsError::InvalidAmount(message) => {
            ApiError::new(rid, "validation_error", message.clone())
        }
        PaymentsError::Api { message, .. } => {
            ApiError::new(rid, "payment_gateway_error", message.clone())
        }
        _ => {
            tracing::error!(error = %error, "payment gateway request failed");
            ApiError::new(rid, "payment_gateway_error", "payment gateway request failed")
        }
    }
}

/// POST /api/checkout — starts a hosted checkout session.
pub(super) async fn create_checkout_session(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    Json(body): Json<CheckoutRequest>,
) -> Result<Json<ApiResponse<CheckoutSessionCreated>>, ApiError> {
    let rid = &req_id.0;
    let client = gateway(rid, &state)?;
    if body.items.is_empty() {
        return Err(ApiError::new(rid, "bad_request", "no items to checkout"));
    }

    let mut items = Vec::with_capacity(body.items.len());
    for line in body.items {
        let price_id = line.stripe_price_id.trim();
        if price_id.is_empty() {
            return Err(ApiError::new(rid, "validation_error", "stripePriceId is required"));
        }
        let quantity = line.quantity.unwrap_or(1);
        if quantity == 0 {
            return Err(ApiError::new(rid, "validation_error", "quantity must be positive"));
        }
        items.push(CheckoutItem {
            price_id: price_id.to_owned(),
            quantity,
        });
    }

    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && *v != "null")
        .unwrap_or(state.settings.public_url.as_str());

    let session = client
        .create_checkout_session(&CheckoutSessionRequest::for_origin(origin, items))
        .await
        .map_err(|e| map_payments_error(rid, &e))?;

    Ok(Json(ApiResponse::new(
        CheckoutSessionCreated {
            session_id: session.id,
            url: session.url,
        },
        req_id.0,
    )))
}

/// GET /api/checkout/sessions/:id — the gateway's session, passed through.
pub(super) async fn get_checkout_session(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let rid = &req_id.0;
    let client = gateway(rid, &state)?;
    let session = client
        .retrieve_checkout_session(&id)
        .await
        .map_err(|e| map_payments_error(rid, &e))?;
    Ok(Json(ApiResponse::new(session, req_id.0)))
}

/// POST /api/checkout/create-payment-intent — charges the cart total in cents.
pub(super) async fn create_payment_intent(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<PaymentIntentRequest>,
) -> Result<Json<ApiResponse<PaymentIntentCreated>>, ApiError> {
    let rid = &req_id.0;
    let client = gateway(rid, &state)?;
    let amount = total_minor_units(&body.items).map_err(|e| map_payments_error(rid, &e))?;

    let intent = client
        .create_payment_intent(amount)
        .await
        .map_err(|e| map_payments_error(rid, &e))?;

    Ok(Json(ApiResponse::new(
        PaymentIntentCreated {
            client_secret: intent.client_secret,
        },
        req_id.0,
    )))
}
