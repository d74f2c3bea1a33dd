//! Registry endpoint and token resolution.
//!
//! Explicit values always win. Whatever is still missing is filled by an
//! ordered chain of [`CredentialProvider`]s; the first provider to supply a
//! value owns it. Provider failures are logged and skipped, never raised.

mod kubeconfig;
mod providers;

pub use kubeconfig::{ClusterInfo, CurrentContext, Kubeconfig, UserInfo};
pub use providers::{
    route_host, ClusterAccess, KubeconfigTokenProvider, RouteDiscoveryProvider,
    ServiceAccountTokenProvider,
};

use crate::config::PublishConfig;
use crate::errors::{ProviderError, ResolutionError};
use async_trait::async_trait;
use std::fmt;
use tracing::{debug, warn};

/// A possibly incomplete endpoint/token pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Registry endpoint.
    pub endpoint: Option<String>,
    /// Bearer token.
    pub token: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

impl Credentials {
    /// Creates credentials, treating blank values as absent.
    #[must_use]
    pub fn new(endpoint: Option<&str>, token: Option<&str>) -> Self {
        Self {
            endpoint: non_blank(endpoint),
            token: non_blank(token),
        }
    }

    /// Credentials carrying only an endpoint.
    #[must_use]
    pub fn endpoint(endpoint: &str) -> Self {
        Self::new(Some(endpoint), None)
    }

    /// Credentials carrying only a token.
    #[must_use]
    pub fn token(token: &str) -> Self {
        Self::new(None, Some(token))
    }

    /// Returns true if both values are present.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.endpoint.is_some() && self.token.is_some()
    }

    /// Names of the values still missing.
    #[must_use]
    pub fn missing(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.endpoint.is_none() {
            missing.push("endpoint".to_string());
        }
        if self.token.is_none() {
            missing.push("token".to_string());
        }
        missing
    }

    /// Fills gaps from `other` without overwriting. Returns what was filled.
    fn fill_from(&mut self, other: Self) -> Vec<&'static str> {
        let mut filled = Vec::new();
        if self.endpoint.is_none() {
            if let Some(endpoint) = non_blank(other.endpoint.as_deref()) {
                self.endpoint = Some(endpoint);
                filled.push("endpoint");
            }
        }
        if self.token.is_none() {
            if let Some(token) = non_blank(other.token.as_deref()) {
                self.token = Some(token);
                filled.push("token");
            }
        }
        filled
    }
}

/// A complete endpoint/token pair.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Registry endpoint, as resolved (not yet normalized).
    pub endpoint: String,
    /// Bearer token.
    pub token: String,
}

impl fmt::Debug for ResolvedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedTarget")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// One source of endpoint and/or token values.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Short name used in logs and resolution errors.
    fn name(&self) -> &str;

    /// Returns whatever this source can supply. `known` holds the values
    /// resolved so far; providers may skip work for values already present.
    async fn provide(&self, known: &Credentials) -> Result<Credentials, ProviderError>;
}

/// Resolves a [`ResolvedTarget`] from explicit values and a provider chain.
#[derive(Default)]
pub struct CredentialResolver {
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl CredentialResolver {
    /// Creates a resolver with no providers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a provider to the chain.
    #[must_use]
    pub fn with_provider(mut self, provider: impl CredentialProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// The standard chain: service-account token, route discovery, then the
    /// kubeconfig user token.
    #[must_use]
    pub fn standard(config: &PublishConfig) -> Self {
        Self::new()
            .with_provider(ServiceAccountTokenProvider::new(&config.service_account_dir))
            .with_provider(RouteDiscoveryProvider::new(
                &config.route_name,
                &config.service_account_dir,
                config.kubeconfig.clone(),
                config.request_timeout(),
            ))
            .with_provider(KubeconfigTokenProvider::new(config.kubeconfig.clone()))
    }

    /// Provider names, in order.
    #[must_use]
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Resolves the endpoint and token.
    ///
    /// When both explicit values are given no provider is consulted.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolutionError`] naming what is still missing after every
    /// provider has been tried.
    pub async fn resolve(
        &self,
        explicit_endpoint: Option<&str>,
        explicit_token: Option<&str>,
    ) -> Result<ResolvedTarget, ResolutionError> {
        let mut credentials = Credentials::new(explicit_endpoint, explicit_token);
        let mut attempts = vec!["explicit".to_string()];

        for provider in &self.providers {
            if credentials.is_complete() {
                break;
            }
            attempts.push(provider.name().to_string());

            match provider.provide(&credentials).await {
                Ok(found) => {
                    let filled = credentials.fill_from(found);
                    debug!(provider = provider.name(), filled = ?filled, "Credential provider consulted");
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Credential provider failed");
                }
            }
        }

        match credentials {
            Credentials {
                endpoint: Some(endpoint),
                token: Some(token),
            } => Ok(ResolvedTarget { endpoint, token }),
            incomplete => Err(ResolutionError::new(incomplete.missing(), attempts)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StaticProvider {
        name: &'static str,
        credentials: Credentials,
        calls: Arc<AtomicUsize>,
    }

    impl StaticProvider {
        fn new(name: &'static str, credentials: Credentials) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    name,
                    credentials,
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl CredentialProvider for StaticProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn provide(&self, _known: &Credentials) -> Result<Credentials, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.credentials.clone())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl CredentialProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn provide(&self, _known: &Credentials) -> Result<Credentials, ProviderError> {
            Err(ProviderError::Request("cluster unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_explicit_values_bypass_providers() {
        let (provider, calls) =
            StaticProvider::new("static", Credentials::new(Some("other"), Some("other-token")));
        let resolver = CredentialResolver::new().with_provider(provider);

        let target = resolver
            .resolve(Some("kfp.example.com"), Some("explicit-token"))
            .await
            .unwrap();

        assert_eq!(target.endpoint, "kfp.example.com");
        assert_eq!(target.token, "explicit-token");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_providers_fill_gaps_in_order() {
        let (first, _) = StaticProvider::new("first", Credentials::token("first-token"));
        let (second, _) =
            StaticProvider::new("second", Credentials::new(Some("route.example.com"), Some("second-token")));
        let resolver = CredentialResolver::new().with_provider(first).with_provider(second);

        let target = resolver.resolve(None, None).await.unwrap();

        assert_eq!(target.endpoint, "route.example.com");
        assert_eq!(target.token, "first-token");
    }

    #[tokio::test]
    async fn test_explicit_endpoint_kept_when_token_discovered() {
        let (provider, calls) =
            StaticProvider::new("static", Credentials::new(Some("discovered"), Some("sa-token")));
        let resolver = CredentialResolver::new().with_provider(provider);

        let target = resolver.resolve(Some("explicit.example.com"), None).await.unwrap();

        assert_eq!(target.endpoint, "explicit.example.com");
        assert_eq!(target.token, "sa-token");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_provider_is_skipped() {
        let (provider, _) =
            StaticProvider::new("static", Credentials::new(Some("kfp"), Some("token")));
        let resolver = CredentialResolver::new()
            .with_provider(FailingProvider)
            .with_provider(provider);

        let target = resolver.resolve(None, None).await.unwrap();
        assert_eq!(target.endpoint, "kfp");
    }

    #[tokio::test]
    async fn test_chain_stops_once_complete() {
        let (first, _) = StaticProvider::new("first", Credentials::new(Some("kfp"), Some("token")));
        let (second, second_calls) = StaticProvider::new("second", Credentials::default());
        let resolver = CredentialResolver::new().with_provider(first).with_provider(second);

        resolver.resolve(None, None).await.unwrap();
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_values_are_reported() {
        let (provider, _) = StaticProvider::new("static", Credentials::token("token"));
        let resolver = CredentialResolver::new()
            .with_provider(provider)
            .with_provider(FailingProvider);

        let err = resolver.resolve(None, None).await.unwrap_err();

        assert_eq!(err.missing, vec!["endpoint".to_string()]);
        assert_eq!(
            err.attempts,
            vec!["explicit".to_string(), "static".to_string(), "failing".to_string()]
        );
    }

    #[tokio::test]
    async fn test_blank_explicit_values_are_ignored() {
        let resolver = CredentialResolver::new();
        let err = resolver.resolve(Some("  "), Some("")).await.unwrap_err();
        assert_eq!(err.missing, vec!["endpoint".to_string(), "token".to_string()]);
    }

    #[test]
    fn test_resolved_target_debug_redacts_token() {
        let target = ResolvedTarget {
            endpoint: "kfp".to_string(),
            token: "secret".to_string(),
        };
        let debug = format!("{target:?}");
        assert!(debug.contains("kfp"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_standard_chain_order() {
        let resolver = CredentialResolver::standard(&PublishConfig::default());
        assert_eq!(
            resolver.provider_names(),
            vec!["service-account-token", "route-discovery", "kubeconfig-token"]
        );
    }
}
