//! Built-in credential providers for in-cluster and workstation use.

use super::kubeconfig::Kubeconfig;
use super::{CredentialProvider, Credentials};
use crate::errors::ProviderError;
use async_trait::async_trait;
use reqwest::{Certificate, Client};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const TOKEN_FILE: &str = "token";
const NAMESPACE_FILE: &str = "namespace";
const CA_FILE: &str = "ca.crt";
const DEFAULT_NAMESPACE: &str = "default";

fn read_trimmed(path: &Path) -> Result<String, ProviderError> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|source| ProviderError::Io {
            path: path.display().to_string(),
            source,
        })
}

/// Reads the workload's service-account token.
#[derive(Debug, Clone)]
pub struct ServiceAccountTokenProvider {
    token_path: PathBuf,
}

impl ServiceAccountTokenProvider {
    /// Reads `token` under `service_account_dir`.
    #[must_use]
    pub fn new(service_account_dir: impl AsRef<Path>) -> Self {
        Self {
            token_path: service_account_dir.as_ref().join(TOKEN_FILE),
        }
    }
}

#[async_trait]
impl CredentialProvider for ServiceAccountTokenProvider {
    fn name(&self) -> &str {
        "service-account-token"
    }

    async fn provide(&self, known: &Credentials) -> Result<Credentials, ProviderError> {
        if known.token.is_some() {
            return Ok(Credentials::default());
        }
        let token = read_trimmed(&self.token_path)?;
        Ok(Credentials::new(None, Some(&token)))
    }
}

/// Everything needed to call the cluster API.
#[derive(Clone)]
pub struct ClusterAccess {
    /// API server base URL.
    pub server: String,
    /// Bearer token for the API server.
    pub token: String,
    /// Namespace to look routes up in.
    pub namespace: String,
    /// PEM CA bundle for the API server.
    pub ca_pem: Option<Vec<u8>>,
    /// Skip TLS verification.
    pub insecure: bool,
}

impl std::fmt::Debug for ClusterAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterAccess")
            .field("server", &self.server)
            .field("namespace", &self.namespace)
            .field("insecure", &self.insecure)
            .finish_non_exhaustive()
    }
}

impl ClusterAccess {
    /// In-cluster access from the standard service environment variables.
    /// Returns `None` outside a cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if running in a cluster but the service-account
    /// files cannot be read.
    pub fn in_cluster(service_account_dir: &Path) -> Result<Option<Self>, ProviderError> {
        Self::in_cluster_from(
            std::env::var("KUBERNETES_SERVICE_HOST").ok(),
            std::env::var("KUBERNETES_SERVICE_PORT").ok(),
            service_account_dir,
        )
    }

    fn in_cluster_from(
        host: Option<String>,
        port: Option<String>,
        service_account_dir: &Path,
    ) -> Result<Option<Self>, ProviderError> {
        let Some(host) = host.filter(|h| !h.is_empty()) else {
            return Ok(None);
        };
        let port = port.filter(|p| !p.is_empty()).unwrap_or_else(|| "443".to_string());
        let host = if host.contains(':') {
            format!("[{host}]")
        } else {
            host
        };

        let ca_path = service_account_dir.join(CA_FILE);
        let ca_pem = if ca_path.exists() {
            Some(std::fs::read(&ca_path).map_err(|source| ProviderError::Io {
                path: ca_path.display().to_string(),
                source,
            })?)
        } else {
            None
        };

        Ok(Some(Self {
            server: format!("https://{host}:{port}"),
            token: read_trimmed(&service_account_dir.join(TOKEN_FILE))?,
            namespace: read_trimmed(&service_account_dir.join(NAMESPACE_FILE))?,
            ca_pem,
            insecure: false,
        }))
    }

    /// Access through the current kubeconfig context. The namespace comes
    /// from the service-account directory when present, then the context.
    ///
    /// # Errors
    ///
    /// Returns an error if the kubeconfig cannot be read or its user has no
    /// bearer token.
    pub fn from_kubeconfig(path: &Path, service_account_dir: &Path) -> Result<Self, ProviderError> {
        let current = Kubeconfig::load(path)?.current()?;
        let token = current
            .user
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ProviderError::Malformed {
                what: "kubeconfig".to_string(),
                reason: "current user has no bearer token".to_string(),
            })?;
        let namespace = read_trimmed(&service_account_dir.join(NAMESPACE_FILE))
            .ok()
            .filter(|ns| !ns.is_empty())
            .or_else(|| current.namespace.clone())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

        Ok(Self {
            server: current.cluster.server.trim_end_matches('/').to_string(),
            token,
            namespace,
            ca_pem: current.ca_pem()?,
            insecure: current.cluster.insecure_skip_tls_verify,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RouteResource {
    spec: RouteSpec,
}

#[derive(Debug, Deserialize)]
struct RouteSpec {
    #[serde(default)]
    host: String,
}

/// Extracts `spec.host` from a route resource.
///
/// # Errors
///
/// Returns an error if the body is not a route or has no host.
pub fn route_host(body: &str) -> Result<String, ProviderError> {
    let route: RouteResource = serde_json::from_str(body).map_err(|e| ProviderError::Malformed {
        what: "route".to_string(),
        reason: e.to_string(),
    })?;
    let host = route.spec.host.trim();
    if host.is_empty() {
        return Err(ProviderError::Malformed {
            what: "route".to_string(),
            reason: "spec.host is empty".to_string(),
        });
    }
    Ok(host.to_string())
}

/// Discovers the registry endpoint from the host of a named cluster route.
#[derive(Debug, Clone)]
pub struct RouteDiscoveryProvider {
    route_name: String,
    service_account_dir: PathBuf,
    kubeconfig: Option<PathBuf>,
    timeout: Duration,
}

impl RouteDiscoveryProvider {
    /// Creates a provider looking up `route_name`.
    #[must_use]
    pub fn new(
        route_name: impl Into<String>,
        service_account_dir: impl AsRef<Path>,
        kubeconfig: Option<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            route_name: route_name.into(),
            service_account_dir: service_account_dir.as_ref().to_path_buf(),
            kubeconfig,
            timeout,
        }
    }

    fn cluster_access(&self) -> Result<ClusterAccess, ProviderError> {
        self.cluster_access_from(ClusterAccess::in_cluster(&self.service_account_dir))
    }

    /// Uses in-cluster access when it is available and readable, otherwise
    /// the kubeconfig.
    fn cluster_access_from(
        &self,
        in_cluster: Result<Option<ClusterAccess>, ProviderError>,
    ) -> Result<ClusterAccess, ProviderError> {
        match in_cluster {
            Ok(Some(access)) => return Ok(access),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "In-cluster access unusable, trying kubeconfig"),
        }
        let path = self
            .kubeconfig
            .clone()
            .or_else(Kubeconfig::default_path)
            .ok_or_else(|| ProviderError::Request("no cluster access available".to_string()))?;
        ClusterAccess::from_kubeconfig(&path, &self.service_account_dir)
    }

    fn route_url(&self, access: &ClusterAccess) -> String {
        format!(
            "{}/apis/route.openshift.io/v1/namespaces/{}/routes/{}",
            access.server.trim_end_matches('/'),
            access.namespace,
            self.route_name
        )
    }

    /// Reads the route through the cluster API and returns its host as the
    /// registry endpoint.
    async fn lookup_endpoint(&self, access: &ClusterAccess) -> Result<Credentials, ProviderError> {
        let url = self.route_url(access);
        debug!(url = %url, route = %self.route_name, "Looking up registry route");

        let mut builder = Client::builder()
            .timeout(self.timeout)
            .danger_accept_invalid_certs(access.insecure);
        if let Some(pem) = &access.ca_pem {
            let cert = Certificate::from_pem(pem).map_err(|e| ProviderError::Malformed {
                what: "cluster CA".to_string(),
                reason: e.to_string(),
            })?;
            builder = builder.add_root_certificate(cert);
        }
        let client = builder
            .build()
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let response = client
            .get(&url)
            .bearer_auth(&access.token)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        if !status.is_success() {
            return Err(ProviderError::Request(format!(
                "route '{}' lookup returned {status}",
                self.route_name
            )));
        }

        let host = route_host(&body)?;
        Ok(Credentials::endpoint(&format!("https://{host}")))
    }
}

#[async_trait]
impl CredentialProvider for RouteDiscoveryProvider {
    fn name(&self) -> &str {
        "route-discovery"
    }

    async fn provide(&self, known: &Credentials) -> Result<Credentials, ProviderError> {
        if known.endpoint.is_some() {
            return Ok(Credentials::default());
        }
        let access = self.cluster_access()?;
        self.lookup_endpoint(&access).await
    }
}

/// Takes the bearer token of the current kubeconfig user.
#[derive(Debug, Clone, Default)]
pub struct KubeconfigTokenProvider {
    path: Option<PathBuf>,
}

impl KubeconfigTokenProvider {
    /// Reads `path`, or the default kubeconfig location when `None`.
    #[must_use]
    pub const fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl CredentialProvider for KubeconfigTokenProvider {
    fn name(&self) -> &str {
        "kubeconfig-token"
    }

    async fn provide(&self, known: &Credentials) -> Result<Credentials, ProviderError> {
        if known.token.is_some() {
            return Ok(Credentials::default());
        }
        let Some(path) = self.path.clone().or_else(Kubeconfig::default_path) else {
            return Ok(Credentials::default());
        };
        let current = Kubeconfig::load(&path)?.current()?;
        Ok(Credentials::new(None, current.user.token.as_deref()))
    }
}
