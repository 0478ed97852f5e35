use thiserror::Error;

/// Errors returned by the payment gateway client.
#[derive(Debug, Error)]
pub enum PaymentsError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with a non-2xx status and an error body.
    #[error("payment gateway error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// A charge amount that the gateway would reject.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid gateway base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}
