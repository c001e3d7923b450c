//! Mutation policies for Pod admission.
//!
//! A policy answers two questions about a decoded Pod: does it need mutating,
//! and which JSON Patch operations perform the mutation. Both answers must
//! agree container by container, and both must be pure functions of the Pod
//! and the policy's configuration so retried admissions yield identical
//! patches.
//!
//! Policies:
//! - `registry_rewrite`: Prefix every image with a target registry
//! - `tag_default`: Append `:latest` to untagged images

pub mod registry_rewrite;
pub mod tag_default;

use json_patch::jsonptr::PointerBuf;
use json_patch::{PatchOperation, ReplaceOperation};
use serde_json::Value;

use crate::config::{PolicyKind, RegistryConfig};
use crate::webhooks::pod::PodView;

pub use registry_rewrite::RegistryRewrite;
pub use tag_default::TagDefault;

/// The capability every mutation policy provides
pub trait PodMutator {
    /// Whether at least one container needs rewriting
    fn needs_mutation(&self, pod: &PodView) -> bool;

    /// Patch operations rewriting every non-conforming container, in order
    fn generate_patch(&self, pod: &PodView) -> Vec<PatchOperation>;
}

/// The policy a deployment runs, chosen once at startup
#[derive(Clone, Debug)]
pub enum MutationPolicy {
    RegistryRewrite(RegistryRewrite),
    TagDefault(TagDefault),
}

impl MutationPolicy {
    /// Build the policy selected by `kind`
    pub fn from_config(kind: PolicyKind, registry: &RegistryConfig) -> Self {
        match kind {
            PolicyKind::RegistryRewrite => {
                MutationPolicy::RegistryRewrite(RegistryRewrite::new(registry.clone()))
            }
            PolicyKind::TagDefault => MutationPolicy::TagDefault(TagDefault),
        }
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            MutationPolicy::RegistryRewrite(_) => PolicyKind::RegistryRewrite,
            MutationPolicy::TagDefault(_) => PolicyKind::TagDefault,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().as_str()
    }
}

impl From<RegistryRewrite> for MutationPolicy {
    fn from(policy: RegistryRewrite) -> Self {
        MutationPolicy::RegistryRewrite(policy)
    }
}

impl From<TagDefault> for MutationPolicy {
    fn from(policy: TagDefault) -> Self {
        MutationPolicy::TagDefault(policy)
    }
}

impl PodMutator for MutationPolicy {
    fn needs_mutation(&self, pod: &PodView) -> bool {
        match self {
            MutationPolicy::RegistryRewrite(p) => p.needs_mutation(pod),
            MutationPolicy::TagDefault(p) => p.needs_mutation(pod),
        }
    }

    fn generate_patch(&self, pod: &PodView) -> Vec<PatchOperation> {
        match self {
            MutationPolicy::RegistryRewrite(p) => p.generate_patch(pod),
            MutationPolicy::TagDefault(p) => p.generate_patch(pod),
        }
    }
}

/// `replace /spec/containers/<index>/image` with `image`
pub fn replace_image(index: usize, image: String) -> PatchOperation {
    let index = index.to_string();
    PatchOperation::Replace(ReplaceOperation {
        path: PointerBuf::from_tokens(["spec", "containers", index.as_str(), "image"]),
        value: Value::String(image),
    })
}
