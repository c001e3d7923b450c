//! Test fixtures and builder patterns for Pods and AdmissionReviews.

use serde_json::{Value, json};

/// Builder for Pod JSON payloads.
///
/// # Example
/// ```
/// let pod = PodBuilder::new("web")
///     .namespace("apps")
///     .container("nginx", "nginx:1.21")
///     .build();
/// ```
#[derive(Clone, Debug, Default)]
pub struct PodBuilder {
    name: Option<String>,
    generate_name: Option<String>,
    namespace: Option<String>,
    containers: Vec<(String, String)>,
}

impl PodBuilder {
    /// Create a new builder with the given pod name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Create a builder for a pod that only has a generate-name prefix.
    pub fn generated(prefix: impl Into<String>) -> Self {
        Self {
            generate_name: Some(prefix.into()),
            ..Default::default()
        }
    }

    /// Set the namespace in the pod metadata.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Append a container.
    pub fn container(mut self, name: impl Into<String>, image: impl Into<String>) -> Self {
        self.containers.push((name.into(), image.into()));
        self
    }

    /// Append one container per image, named `c0`, `c1`, ...
    pub fn images<I, S>(mut self, images: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for image in images {
            let name = format!("c{}", self.containers.len());
            self.containers.push((name, image.into()));
        }
        self
    }

    /// Build the Pod JSON.
    pub fn build(self) -> Value {
        let mut metadata = serde_json::Map::new();
        if let Some(name) = self.name {
            metadata.insert("name".into(), json!(name));
        }
        if let Some(prefix) = self.generate_name {
            metadata.insert("generateName".into(), json!(prefix));
        }
        if let Some(namespace) = self.namespace {
            metadata.insert("namespace".into(), json!(namespace));
        }
        let containers: Vec<Value> = self
            .containers
            .into_iter()
            .map(|(name, image)| json!({"name": name, "image": image}))
            .collect();

        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": metadata,
            "spec": {"containers": containers, "restartPolicy": "Always"},
        })
    }
}

/// Builder for AdmissionReview request bodies.
#[derive(Clone, Debug)]
pub struct ReviewBuilder {
    api_version: String,
    uid: String,
    resource: (String, String, String),
    namespace: String,
    object: Option<Value>,
}

impl ReviewBuilder {
    /// A v1 review for a pod CREATE in namespace `default`.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            api_version: "admission.k8s.io/v1".to_string(),
            uid: uid.into(),
            resource: ("".to_string(), "v1".to_string(), "pods".to_string()),
            namespace: "default".to_string(),
            object: None,
        }
    }

    pub fn api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn resource(mut self, group: &str, version: &str, resource: &str) -> Self {
        self.resource = (group.to_string(), version.to_string(), resource.to_string());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn object(mut self, object: Value) -> Self {
        self.object = Some(object);
        self
    }

    /// Build the review as JSON.
    pub fn build(self) -> Value {
        let (group, version, resource) = self.resource;
        let kind = if resource == "pods" { "Pod" } else { "Unknown" };
        json!({
            "apiVersion": self.api_version,
            "kind": "AdmissionReview",
            "request": {
                "uid": self.uid,
                "kind": {"group": group, "version": version, "kind": kind},
                "resource": {"group": group, "version": version, "resource": resource},
                "requestKind": {"group": group, "version": version, "kind": kind},
                "namespace": self.namespace,
                "operation": "CREATE",
                "userInfo": {"username": "system:serviceaccount:kube-system:replicaset-controller"},
                "object": self.object,
                "oldObject": null,
                "dryRun": false,
                "options": {"kind": "CreateOptions", "apiVersion": "meta.k8s.io/v1"}
            }
        })
    }

    /// Build the review as a request body.
    pub fn body(self) -> Vec<u8> {
        serde_json::to_vec(&self.build()).expect("serialize review")
    }
}
