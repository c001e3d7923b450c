//! Error types for the admission pipeline.
//!
//! Each layer has its own error so the server can tell apart failures that
//! still allow an admission response (the request UID is known) from those
//! that do not.

use thiserror::Error;

/// Failure to decode or encode the `AdmissionReview` envelope.
///
/// The UID of the request is unknown when decoding fails, so the server
/// answers with HTTP 400 instead of an admission response.
#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("empty request body")]
    EmptyBody,

    #[error("malformed AdmissionReview: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("AdmissionReview has no request")]
    MissingRequest,

    #[error("unsupported AdmissionReview apiVersion '{0}'")]
    UnsupportedApiVersion(String),

    #[error("unexpected kind '{0}', expected AdmissionReview")]
    UnexpectedKind(String),

    #[error("failed to encode AdmissionReview: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Failure to decode the embedded Pod
#[derive(Error, Debug)]
#[error("could not deserialize pod object: {0}")]
pub struct PodDecodeError(#[from] pub serde_json::Error);

/// Failure while admitting a request whose UID is known.
///
/// Every variant turns into a denial carrying the error text as reason.
#[derive(Error, Debug)]
pub enum AdmissionError {
    #[error("admission request carries no object")]
    MissingObject,

    #[error(transparent)]
    ObjectDecode(#[from] PodDecodeError),

    #[error("failed to serialize patch: {0}")]
    PatchSerialization(#[source] serde_json::Error),
}

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(#[source] std::io::Error),

    /// Server error
    #[error("Webhook server error: {0}")]
    Server(#[source] std::io::Error),
}
