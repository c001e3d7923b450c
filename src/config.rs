//! Process configuration.
//!
//! Read once from environment variables at startup and never mutated
//! afterwards. Everything downstream receives the parsed values by reference.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use tracing::{info, warn};

/// Selects the mutation policy (`registry-rewrite` or `tag-default`)
pub const ENV_POLICY: &str = "IRM_POLICY";
/// Target registry; trailing slashes are trimmed
pub const ENV_REGISTRY: &str = "IRM_REGISTRY";
/// Comma-separated namespaces that are never mutated
pub const ENV_BYPASS_NS: &str = "IRM_BYPASS_NS";
/// If present, the webhook's own pods are never mutated
pub const ENV_BYPASS_ME: &str = "IRM_BYPASS_ME";
/// Namespace the webhook itself is deployed in
pub const ENV_SELF_NAMESPACE: &str = "IRM_SELF_NAMESPACE";
/// Name prefix of the webhook's own pods
pub const ENV_SELF_PREFIX: &str = "IRM_SELF_PREFIX";
pub const ENV_TLS_CERT: &str = "IRM_TLS_CERT";
pub const ENV_TLS_KEY: &str = "IRM_TLS_KEY";
pub const ENV_WEBHOOK_PORT: &str = "IRM_WEBHOOK_PORT";
pub const ENV_HEALTH_PORT: &str = "IRM_HEALTH_PORT";

/// Default path to webhook TLS certificate
pub const DEFAULT_CERT_PATH: &str = "/run/secrets/tls/tls.crt";
/// Default path to webhook TLS private key
pub const DEFAULT_KEY_PATH: &str = "/run/secrets/tls/tls.key";
/// Default webhook server port
pub const DEFAULT_WEBHOOK_PORT: u16 = 8443;
/// Default health/metrics server port
pub const DEFAULT_HEALTH_PORT: u16 = 8080;
pub const DEFAULT_SELF_NAMESPACE: &str = "kube-system";
pub const DEFAULT_SELF_PREFIX: &str = "image-registry-mutator-";

/// Errors raised while reading configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown mutation policy '{0}' (expected 'registry-rewrite' or 'tag-default')")]
    UnknownPolicy(String),

    #[error("invalid value for {key}: '{value}'")]
    InvalidPort { key: &'static str, value: String },
}

/// Which mutation policy a deployment runs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PolicyKind {
    #[default]
    RegistryRewrite,
    TagDefault,
}

impl PolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::RegistryRewrite => "registry-rewrite",
            PolicyKind::TagDefault => "tag-default",
        }
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "registry-rewrite" | "registry" => Ok(PolicyKind::RegistryRewrite),
            "tag-default" | "tag" => Ok(PolicyKind::TagDefault),
            _ => Err(ConfigError::UnknownPolicy(s.to_string())),
        }
    }
}

/// Settings consumed by the registry rewrite policy
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Target registry without trailing slash. Empty disables rewriting.
    pub registry: String,
    /// Namespaces whose pods are never rewritten
    pub bypass_namespaces: BTreeSet<String>,
    /// Skip the webhook's own pods
    pub bypass_self: bool,
    /// Namespace checked when `bypass_self` is set
    pub self_namespace: String,
    /// Pod name prefix checked when `bypass_self` is set
    pub self_name_prefix: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            registry: String::new(),
            bypass_namespaces: BTreeSet::new(),
            bypass_self: false,
            self_namespace: DEFAULT_SELF_NAMESPACE.to_string(),
            self_name_prefix: DEFAULT_SELF_PREFIX.to_string(),
        }
    }
}

impl RegistryConfig {
    /// Create a config targeting `registry`, trimming any trailing slash
    pub fn new(registry: impl AsRef<str>) -> Self {
        Self {
            registry: normalize_registry(registry.as_ref()),
            ..Default::default()
        }
    }

    /// Add namespaces to the bypass set
    pub fn with_bypass_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bypass_namespaces
            .extend(namespaces.into_iter().map(Into::into));
        self
    }

    /// Enable or disable self-bypass
    pub fn with_bypass_self(mut self, bypass_self: bool) -> Self {
        self.bypass_self = bypass_self;
        self
    }
}

/// Paths to the PEM encoded serving certificate and key
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl Default for TlsPaths {
    fn default() -> Self {
        Self {
            cert: PathBuf::from(DEFAULT_CERT_PATH),
            key: PathBuf::from(DEFAULT_KEY_PATH),
        }
    }
}

/// Complete process configuration
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WebhookConfig {
    pub policy: PolicyKind,
    pub registry: RegistryConfig,
    pub tls: TlsPaths,
    pub webhook_port: u16,
    pub health_port: u16,
}

impl WebhookConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let policy = match non_empty(ENV_POLICY) {
            Some(value) => value.parse()?,
            None => PolicyKind::default(),
        };

        let mut registry = RegistryConfig::default();

        match non_empty(ENV_REGISTRY) {
            Some(value) => {
                registry.registry = normalize_registry(&value);
                info!(registry = %registry.registry, "Target registry configured");
            }
            None => info!("{} not set, registry rewrite is disabled", ENV_REGISTRY),
        }

        if let Some(value) = non_empty(ENV_BYPASS_NS) {
            registry.bypass_namespaces = parse_namespace_list(&value);
            info!(namespaces = ?registry.bypass_namespaces, "Bypass namespaces configured");
        }

        if lookup(ENV_BYPASS_ME).is_some() {
            registry.bypass_self = true;
            info!("{} present, the webhook's own pods are bypassed", ENV_BYPASS_ME);
        }
        if let Some(value) = non_empty(ENV_SELF_NAMESPACE) {
            registry.self_namespace = value.trim().to_string();
        }
        if let Some(value) = non_empty(ENV_SELF_PREFIX) {
            registry.self_name_prefix = value.trim().to_string();
        }

        let mut tls = TlsPaths::default();
        if let Some(value) = non_empty(ENV_TLS_CERT) {
            tls.cert = PathBuf::from(value);
        }
        if let Some(value) = non_empty(ENV_TLS_KEY) {
            tls.key = PathBuf::from(value);
        }

        let webhook_port = parse_port(ENV_WEBHOOK_PORT, non_empty(ENV_WEBHOOK_PORT))?
            .unwrap_or(DEFAULT_WEBHOOK_PORT);
        let health_port = parse_port(ENV_HEALTH_PORT, non_empty(ENV_HEALTH_PORT))?
            .unwrap_or(DEFAULT_HEALTH_PORT);

        if policy == PolicyKind::TagDefault && !registry.registry.is_empty() {
            warn!(
                policy = %policy,
                "{} is set but ignored by the selected policy", ENV_REGISTRY
            );
        }

        Ok(Self {
            policy,
            registry,
            tls,
            webhook_port,
            health_port,
        })
    }
}

/// Strip trailing slashes and surrounding whitespace from a registry
pub fn normalize_registry(value: &str) -> String {
    value.trim().trim_end_matches('/').to_string()
}

/// Parse a comma-separated namespace list, dropping blanks
pub fn parse_namespace_list(value: &str) -> BTreeSet<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|ns| !ns.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_port(key: &'static str, value: Option<String>) -> Result<Option<u16>, ConfigError> {
    value
        .map(|v| {
            v.trim().parse::<u16>().map_err(|_| ConfigError::InvalidPort {
                key,
                value: v.clone(),
            })
        })
        .transpose()
}
