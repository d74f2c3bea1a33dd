//! Configuration for compiling and publishing.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! explicit config file -> `STAGEPIPE_*` environment -> CLI arguments.

use crate::errors::ConfigError;
use crate::pipeline::FRAUD_DETECTION_PIPELINE;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default in-cluster service-account directory.
pub const DEFAULT_SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Default name of the route fronting the registry.
pub const DEFAULT_ROUTE_NAME: &str = "ds-pipeline-dspa";

fn default_output() -> PathBuf {
    PathBuf::from(format!("{FRAUD_DETECTION_PIPELINE}.json"))
}

fn default_route_name() -> String {
    DEFAULT_ROUTE_NAME.to_string()
}

fn default_service_account_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SERVICE_ACCOUNT_DIR)
}

const fn default_request_timeout_seconds() -> u64 {
    30
}

/// Settings for one compile-and-publish run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Display name to compile and publish under. When unset, a definition
    /// file's `name` is used, then the built-in pipeline name.
    #[serde(default)]
    pub display_name: Option<String>,

    /// Where the compiled document is written.
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Stage definition file. The built-in pipeline is used when unset.
    #[serde(default)]
    pub definition: Option<PathBuf>,

    /// Route looked up to discover the registry endpoint.
    #[serde(default = "default_route_name")]
    pub route_name: String,

    /// Directory holding the service-account token, namespace and CA.
    #[serde(default = "default_service_account_dir")]
    pub service_account_dir: PathBuf,

    /// Kubeconfig to use outside a cluster. `$KUBECONFIG` or
    /// `~/.kube/config` when unset.
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,

    /// CA bundle for the registry. Defaults to the service-account CA.
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,

    /// Per-request timeout for registry and cluster calls.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            display_name: None,
            output: default_output(),
            definition: None,
            route_name: default_route_name(),
            service_account_dir: default_service_account_dir(),
            kubeconfig: None,
            ca_cert: None,
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

impl PublishConfig {
    /// Loads configuration from layered sources.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (prefixed with `STAGEPIPE_`)
    /// 2. `config_file`, if given
    /// 3. User config (`~/.config/stagepipe/config.toml`)
    /// 4. Built-in defaults
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a source is malformed or `config_file`
    /// does not exist.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(dirs) = directories::ProjectDirs::from("dev", "stagepipe", "stagepipe") {
            let user_config = dirs.config_dir().join("config.toml");
            if user_config.exists() {
                figment = figment.merge(Toml::file(&user_config));
            }
        }

        if let Some(path) = config_file {
            if !path.exists() {
                return Err(figment::Error::from(format!(
                    "config file '{}' not found",
                    path.display()
                ))
                .into());
            }
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("STAGEPIPE_"));

        Ok(figment.extract()?)
    }

    /// The request timeout as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// The CA bundle to trust for registry calls.
    #[must_use]
    pub fn ca_cert_path(&self) -> PathBuf {
        self.ca_cert
            .clone()
            .unwrap_or_else(|| self.service_account_dir.join("ca.crt"))
    }
}
