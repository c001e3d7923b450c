//! Registry rewrite policy.
//!
//! Prefixes every container image with the configured registry, so
//! `nginx` becomes `myreg.example.com/nginx`.
//!
//! Never mutates when:
//! - No registry is configured
//! - The pod's namespace is in the bypass set
//! - Self-bypass is enabled and the pod is one of the webhook's own
//! - Every image already comes from the registry

use json_patch::PatchOperation;
use tracing::debug;

use super::{PodMutator, replace_image};
use crate::config::RegistryConfig;
use crate::webhooks::pod::PodView;

#[derive(Clone, Debug)]
pub struct RegistryRewrite {
    config: RegistryConfig,
    /// `"<registry>/"`, precomputed
    prefix: String,
}

impl RegistryRewrite {
    pub fn new(config: RegistryConfig) -> Self {
        let prefix = format!("{}/", config.registry);
        Self { config, prefix }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn from_registry(&self, image: &str) -> bool {
        image.starts_with(&self.prefix)
    }

    fn is_self(&self, pod: &PodView) -> bool {
        self.config.bypass_self
            && pod.namespace() == self.config.self_namespace
            && pod
                .effective_name()
                .starts_with(&self.config.self_name_prefix)
    }
}

impl PodMutator for RegistryRewrite {
    fn needs_mutation(&self, pod: &PodView) -> bool {
        if self.config.registry.is_empty() {
            debug!("registry not defined, skipping mutation");
            return false;
        }

        if self.config.bypass_namespaces.contains(pod.namespace()) {
            debug!(namespace = %pod.namespace(), "namespace bypassed");
            return false;
        }

        if self.is_self(pod) {
            debug!(
                namespace = %pod.namespace(),
                name = %pod.effective_name(),
                "webhook's own pod bypassed"
            );
            return false;
        }

        let mut needed = false;
        for container in pod.containers() {
            if self.from_registry(&container.image) {
                debug!(
                    container = %container.name,
                    image = %container.image,
                    "image already from target registry"
                );
            } else {
                debug!(
                    container = %container.name,
                    image = %container.image,
                    registry = %self.config.registry,
                    "image not from target registry"
                );
                needed = true;
            }
        }
        needed
    }

    fn generate_patch(&self, pod: &PodView) -> Vec<PatchOperation> {
        pod.containers()
            .iter()
            .enumerate()
            .filter(|(_, c)| !self.from_registry(&c.image))
            .map(|(i, c)| replace_image(i, format!("{}{}", self.prefix, c.image)))
            .collect()
    }
}
