//! Minimal Pod view decoded from the admission payload.
//!
//! Only the fields the mutation policies read are modelled. Unknown fields are
//! ignored so newer cluster schema versions decode without failing.

use k8s_openapi::apimachinery::pkg::runtime::RawExtension;
use serde::Deserialize;

use crate::webhooks::error::PodDecodeError;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodMeta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub generate_name: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ContainerView {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct PodSpecView {
    #[serde(default)]
    pub containers: Vec<ContainerView>,
}

/// The parts of a Pod relevant to image mutation
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct PodView {
    #[serde(default)]
    pub metadata: PodMeta,
    #[serde(default)]
    pub spec: PodSpecView,
}

impl PodView {
    /// Decode from the embedded object of an admission request
    pub fn from_raw(raw: &RawExtension) -> Result<Self, PodDecodeError> {
        Ok(Self::deserialize(&raw.0)?)
    }

    /// Name of the pod, falling back to its generate-name prefix
    pub fn effective_name(&self) -> &str {
        self.metadata
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.metadata.generate_name.as_deref())
            .unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }

    /// Fill in the namespace when the payload omitted it
    pub fn backfill_namespace(&mut self, namespace: Option<&str>) -> bool {
        match namespace {
            Some(ns) if self.namespace().is_empty() && !ns.is_empty() => {
                self.metadata.namespace = Some(ns.to_string());
                true
            }
            _ => false,
        }
    }

    pub fn containers(&self) -> &[ContainerView] {
        &self.spec.containers
    }
}

/// Decode a serialized Pod
pub fn decode_pod(raw: &[u8]) -> Result<PodView, PodDecodeError> {
    Ok(serde_json::from_slice(raw)?)
}
