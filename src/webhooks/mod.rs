//! Webhook module for mutating pod admission requests.
//!
//! Pipeline: the server decodes the `AdmissionReview` (`review`), the
//! dispatcher decodes the embedded Pod (`pod`) and runs the selected
//! mutation policy (`policies`), and the verdict goes back through `review`.

pub mod dispatcher;
pub mod error;
pub mod pod;
pub mod policies;
pub mod review;
mod server;

pub use dispatcher::{Admission, AdmissionDispatcher, Outcome};
pub use error::{AdmissionError, PodDecodeError, ReviewError, WebhookError};
pub use pod::{PodView, decode_pod};
pub use policies::{MutationPolicy, PodMutator, RegistryRewrite, TagDefault};
pub use review::{
    AdmissionRequest, AdmissionResponse, AdmissionReview, GroupVersionResource, decode_review,
    encode_review,
};
pub use server::{MUTATE_PATH, WebhookState, create_webhook_router, run_webhook_server};
