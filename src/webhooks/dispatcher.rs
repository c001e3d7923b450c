//! Admission dispatcher.
//!
//! Turns an admission request into a list of patch operations by running the
//! configured mutation policy against the decoded Pod, and wraps the outcome
//! in an admission response.

use json_patch::{Patch, PatchOperation};
use tracing::{debug, info, warn};

use crate::webhooks::error::AdmissionError;
use crate::webhooks::pod::PodView;
use crate::webhooks::policies::{MutationPolicy, PodMutator};
use crate::webhooks::review::{AdmissionRequest, AdmissionResponse, GroupVersionResource};

/// How an admission request was resolved
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Allowed without looking at the object (not a pod)
    Skipped,
    /// Allowed unchanged
    Allowed,
    /// Allowed with a patch
    Mutated,
    /// Denied
    Denied,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Skipped => "skipped",
            Outcome::Allowed => "allowed",
            Outcome::Mutated => "mutated",
            Outcome::Denied => "denied",
        }
    }
}

/// A built admission response plus bookkeeping for logs and metrics
#[derive(Debug)]
pub struct Admission {
    pub response: AdmissionResponse,
    pub outcome: Outcome,
    pub patch_operations: usize,
}

/// Routes admission requests through the selected policy
#[derive(Clone, Debug)]
pub struct AdmissionDispatcher {
    policy: MutationPolicy,
    expected: GroupVersionResource,
}

impl AdmissionDispatcher {
    pub fn new(policy: impl Into<MutationPolicy>) -> Self {
        Self {
            policy: policy.into(),
            expected: GroupVersionResource::pods(),
        }
    }

    pub fn policy(&self) -> &MutationPolicy {
        &self.policy
    }

    fn targets_pods(&self, request: &AdmissionRequest) -> bool {
        request.resource == self.expected
    }

    /// Compute the patch for `request`.
    ///
    /// Requests for anything other than core `v1` pods yield an empty patch.
    /// A missing or undecodable object is an error.
    pub fn handle(&self, request: &AdmissionRequest) -> Result<Vec<PatchOperation>, AdmissionError> {
        if !self.targets_pods(request) {
            warn!(
                uid = %request.uid,
                expected = %self.expected,
                actual = %request.resource,
                "unexpected resource, allowing unchanged"
            );
            return Ok(Vec::new());
        }

        let raw = request
            .object
            .as_ref()
            .ok_or(AdmissionError::MissingObject)?;
        let mut pod = PodView::from_raw(raw)?;

        if pod.backfill_namespace(request.namespace.as_deref()) {
            debug!(
                uid = %request.uid,
                namespace = %pod.namespace(),
                "populated pod namespace from admission request"
            );
        }

        if !self.policy.needs_mutation(&pod) {
            debug!(
                uid = %request.uid,
                namespace = %pod.namespace(),
                name = %pod.effective_name(),
                "pod does not need mutating"
            );
            return Ok(Vec::new());
        }

        let patches = self.policy.generate_patch(&pod);
        if patches.is_empty() {
            warn!(
                uid = %request.uid,
                policy = self.policy.name(),
                "policy reported mutation needed but produced no patch"
            );
        }
        Ok(patches)
    }

    /// Build the admission response for `request`
    pub fn admit(&self, request: &AdmissionRequest) -> Admission {
        let allow = AdmissionResponse::allow(request.uid.clone());

        let patches = match self.handle(request) {
            Ok(patches) => patches,
            Err(e) => {
                warn!(uid = %request.uid, error = %e, "admission request denied");
                return Admission {
                    response: allow.deny(e),
                    outcome: Outcome::Denied,
                    patch_operations: 0,
                };
            }
        };

        if patches.is_empty() {
            let outcome = if self.targets_pods(request) {
                Outcome::Allowed
            } else {
                Outcome::Skipped
            };
            return Admission {
                response: allow,
                outcome,
                patch_operations: 0,
            };
        }

        let count = patches.len();
        match allow.clone().with_patch(&Patch(patches)) {
            Ok(response) => {
                info!(
                    uid = %request.uid,
                    policy = self.policy.name(),
                    operations = count,
                    "mutating pod"
                );
                Admission {
                    response,
                    outcome: Outcome::Mutated,
                    patch_operations: count,
                }
            }
            Err(e) => {
                let e = AdmissionError::PatchSerialization(e);
                warn!(uid = %request.uid, error = %e, "admission request denied");
                Admission {
                    response: allow.deny(e),
                    outcome: Outcome::Denied,
                    patch_operations: 0,
                }
            }
        }
    }
}
