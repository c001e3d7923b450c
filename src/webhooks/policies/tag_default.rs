//! Tag defaulting policy.
//!
//! Appends `:latest` to every image without a `:` separator. Any `:` counts,
//! so registry ports and digests are treated as already tagged.

use json_patch::PatchOperation;

use super::{PodMutator, replace_image};
use crate::webhooks::pod::PodView;

pub const DEFAULT_TAG: &str = "latest";

#[derive(Clone, Copy, Debug, Default)]
pub struct TagDefault;

fn is_untagged(image: &str) -> bool {
    !image.contains(':')
}

impl PodMutator for TagDefault {
    fn needs_mutation(&self, pod: &PodView) -> bool {
        pod.containers().iter().any(|c| is_untagged(&c.image))
    }

    fn generate_patch(&self, pod: &PodView) -> Vec<PatchOperation> {
        pod.containers()
            .iter()
            .enumerate()
            .filter(|(_, c)| is_untagged(&c.image))
            .map(|(i, c)| replace_image(i, format!("{}:{}", c.image, DEFAULT_TAG)))
            .collect()
    }
}
