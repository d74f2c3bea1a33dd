//! Minimal kubeconfig reader: just enough to find the current context's
//! cluster, user token and namespace.

use crate::errors::ProviderError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
struct NamedCluster {
    name: String,
    cluster: ClusterInfo,
}

/// Cluster connection details.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterInfo {
    /// API server URL.
    pub server: String,
    /// Base64 PEM CA bundle.
    #[serde(rename = "certificate-authority-data", default)]
    pub certificate_authority_data: Option<String>,
    /// Path to a PEM CA bundle.
    #[serde(rename = "certificate-authority", default)]
    pub certificate_authority: Option<PathBuf>,
    /// Skip TLS verification.
    #[serde(rename = "insecure-skip-tls-verify", default)]
    pub insecure_skip_tls_verify: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct NamedContext {
    name: String,
    context: ContextInfo,
}

#[derive(Debug, Clone, Deserialize)]
struct ContextInfo {
    cluster: String,
    user: String,
    #[serde(default)]
    namespace: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct NamedUser {
    name: String,
    #[serde(default)]
    user: UserInfo,
}

/// User credentials. Only bearer tokens are supported.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserInfo {
    /// Bearer token.
    #[serde(default)]
    pub token: Option<String>,
}

/// A parsed kubeconfig file.
#[derive(Debug, Clone, Deserialize)]
pub struct Kubeconfig {
    #[serde(rename = "current-context", default)]
    current_context: Option<String>,
    #[serde(default)]
    clusters: Vec<NamedCluster>,
    #[serde(default)]
    contexts: Vec<NamedContext>,
    #[serde(default)]
    users: Vec<NamedUser>,
}

/// The resolved current context.
#[derive(Debug, Clone)]
pub struct CurrentContext {
    /// Cluster details.
    pub cluster: ClusterInfo,
    /// User details.
    pub user: UserInfo,
    /// Context namespace, if set.
    pub namespace: Option<String>,
}

impl CurrentContext {
    /// Returns the CA bundle in PEM form, from inline data or a file.
    ///
    /// # Errors
    ///
    /// Returns an error if inline data is not valid base64 or the file cannot
    /// be read.
    pub fn ca_pem(&self) -> Result<Option<Vec<u8>>, ProviderError> {
        if let Some(data) = &self.cluster.certificate_authority_data {
            return STANDARD
                .decode(data.trim())
                .map(Some)
                .map_err(|e| ProviderError::Malformed {
                    what: "certificate-authority-data".to_string(),
                    reason: e.to_string(),
                });
        }
        if let Some(path) = &self.cluster.certificate_authority {
            return std::fs::read(path)
                .map(Some)
                .map_err(|source| ProviderError::Io {
                    path: path.display().to_string(),
                    source,
                });
        }
        Ok(None)
    }
}

impl Kubeconfig {
    /// Returns `$KUBECONFIG` (first entry) or `~/.kube/config`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        if let Some(value) = std::env::var_os("KUBECONFIG") {
            if let Some(first) = std::env::split_paths(&value).find(|p| !p.as_os_str().is_empty()) {
                return Some(first);
            }
        }
        directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".kube").join("config"))
    }

    /// Parses kubeconfig YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed.
    pub fn parse(text: &str) -> Result<Self, ProviderError> {
        serde_yaml::from_str(text).map_err(|e| ProviderError::Malformed {
            what: "kubeconfig".to_string(),
            reason: e.to_string(),
        })
    }

    /// Reads and parses a kubeconfig file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ProviderError> {
        let text = std::fs::read_to_string(path).map_err(|source| ProviderError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Resolves the current context.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no current context or it refers to an
    /// unknown cluster or user.
    pub fn current(&self) -> Result<CurrentContext, ProviderError> {
        let malformed = |reason: String| ProviderError::Malformed {
            what: "kubeconfig".to_string(),
            reason,
        };

        let name = self
            .current_context
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| malformed("no current-context".to_string()))?;
        let context = self
            .contexts
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| malformed(format!("context '{name}' not found")))?;
        let cluster = self
            .clusters
            .iter()
            .find(|c| c.name == context.context.cluster)
            .ok_or_else(|| malformed(format!("cluster '{}' not found", context.context.cluster)))?;
        let user = self
            .users
            .iter()
            .find(|u| u.name == context.context.user)
            .ok_or_else(|| malformed(format!("user '{}' not found", context.context.user)))?;

        Ok(CurrentContext {
            cluster: cluster.cluster.clone(),
            user: user.user.clone(),
            namespace: context.context.namespace.clone(),
        })
    }
}
