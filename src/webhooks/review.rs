//! `AdmissionReview` wire types and codec.
//!
//! Only the fields this webhook reads or writes are modelled; everything else
//! in the request is ignored on decode. The response echoes the request's
//! `apiVersion` so both `admission.k8s.io/v1` and `v1beta1` callers accept it.

use k8s_openapi::ByteString;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use k8s_openapi::apimachinery::pkg::runtime::RawExtension;
use serde::{Deserialize, Serialize};

use crate::webhooks::error::ReviewError;

pub const ADMISSION_REVIEW_KIND: &str = "AdmissionReview";
pub const ADMISSION_V1: &str = "admission.k8s.io/v1";
pub const ADMISSION_V1BETA1: &str = "admission.k8s.io/v1beta1";

/// HTTP status code carried in the `status` of a denied response
const DENIED_STATUS_CODE: i32 = 403;

/// Group/version/resource triple of the object under admission
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersionResource {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub resource: String,
}

impl GroupVersionResource {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }

    /// Core `v1` pods
    pub fn pods() -> Self {
        Self::new("", "v1", "pods")
    }
}

impl std::fmt::Display for GroupVersionResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}, Resource={}",
            self.group, self.version, self.resource
        )
    }
}

/// Group/version/kind of the object under admission
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub kind: String,
}

/// The `request` half of an `AdmissionReview`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    /// Opaque identifier, echoed verbatim in the response
    pub uid: String,
    #[serde(default)]
    pub kind: GroupVersionKind,
    #[serde(default)]
    pub resource: GroupVersionResource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// The embedded object, kept undecoded until the dispatcher asks for it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<RawExtension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

/// Patch encoding declared in a response. Kubernetes only supports JSON Patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchType {
    #[serde(rename = "JSONPatch")]
    JsonPatch,
}

/// The `response` half of an `AdmissionReview`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    /// Serialized JSON Patch, base64 encoded on the wire
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<ByteString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_type: Option<PatchType>,
}

impl AdmissionResponse {
    /// Allow the request unchanged
    pub fn allow(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            allowed: true,
            ..Default::default()
        }
    }

    /// Deny the request, surfacing `reason` to the client
    pub fn deny(mut self, reason: impl ToString) -> Self {
        self.allowed = false;
        self.patch = None;
        self.patch_type = None;
        self.status = Some(Status {
            code: Some(DENIED_STATUS_CODE),
            message: Some(reason.to_string()),
            status: Some("Failure".to_string()),
            ..Default::default()
        });
        self
    }

    /// Attach a JSON Patch. An empty patch leaves the response untouched.
    pub fn with_patch(mut self, patch: &json_patch::Patch) -> Result<Self, serde_json::Error> {
        if patch.0.is_empty() {
            return Ok(self);
        }
        self.patch = Some(ByteString(serde_json::to_vec(patch)?));
        self.patch_type = Some(PatchType::JsonPatch);
        Ok(self)
    }

    /// The denial message, if any
    pub fn reason(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.message.as_deref())
    }

    /// Decode the attached patch back into operations
    pub fn decoded_patch(&self) -> Option<Result<json_patch::Patch, serde_json::Error>> {
        self.patch
            .as_ref()
            .map(|bytes| serde_json::from_slice(&bytes.0))
    }
}

/// The admission envelope
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<AdmissionRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<AdmissionResponse>,
}

impl AdmissionReview {
    /// Wrap `response` in an envelope answering a review of `api_version`
    pub fn respond(api_version: &str, response: AdmissionResponse) -> Self {
        let api_version = if api_version.is_empty() {
            ADMISSION_V1
        } else {
            api_version
        };
        Self {
            api_version: api_version.to_string(),
            kind: ADMISSION_REVIEW_KIND.to_string(),
            request: None,
            response: Some(response),
        }
    }
}

/// Decode an HTTP request body into an `AdmissionReview`.
///
/// The returned review is guaranteed to carry a request.
pub fn decode_review(body: &[u8]) -> Result<AdmissionReview, ReviewError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ReviewError::EmptyBody);
    }

    let review: AdmissionReview = serde_json::from_slice(body).map_err(ReviewError::Malformed)?;

    if !review.kind.is_empty() && review.kind != ADMISSION_REVIEW_KIND {
        return Err(ReviewError::UnexpectedKind(review.kind));
    }
    if !review.api_version.is_empty()
        && review.api_version != ADMISSION_V1
        && review.api_version != ADMISSION_V1BETA1
    {
        return Err(ReviewError::UnsupportedApiVersion(review.api_version));
    }
    if review.request.is_none() {
        return Err(ReviewError::MissingRequest);
    }

    Ok(review)
}

/// Encode a response envelope as JSON
pub fn encode_review(review: &AdmissionReview) -> Result<Vec<u8>, ReviewError> {
    serde_json::to_vec(review).map_err(ReviewError::Encode)
}
