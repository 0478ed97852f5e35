use super::*;

fn test_client(base_url: &str) -> StripeClient {
    StripeClient::with_base_url("sk_test_123", 30, base_url)
        .expect("client construction should not fail")
}

#[test]
fn endpoint_appends_segments_to_base() {
    let client = test_client("https://api.stripe.com");
    let url = client.endpoint(&["v1", "payment_intents"]);
    assert_eq!(url.as_str(), "https://api.stripe.com/v1/payment_intents");
}

#[test]
fn endpoint_keeps_base_path_prefix() {
    let client = test_client("http://127.0.0.1:9000/stripe/");
    let url = client.endpoint(&["v1", "checkout", "sessions"]);
    assert_eq!(url.as_str(), "http://127.0.0.1:9000/stripe/v1/checkout/sessions");
}

#[test]
fn endpoint_encodes_path_segments() {
    let client = test_client("https://api.stripe.com");
    let url = client.endpoint(&["v1", "checkout", "sessions", "cs_test/../x"]);
    assert_eq!(
        url.as_str(),
        "https://api.stripe.com/v1/checkout/sessions/cs_test%2F..%2Fx"
    );
}

#[test]
fn invalid_base_url_is_rejected() {
    let err = StripeClient::with_base_url("sk", 5, "not a url").unwrap_err();
    assert!(matches!(err, PaymentsError::InvalidBaseUrl { .. }));
}

#[test]
fn debug_output_redacts_key() {
    let rendered = format!("{:?}", test_client("https://api.stripe.com"));
    assert!(!rendered.contains("sk_test_123"));
}
