//! Environment bindings for stage containers.

use serde::{Deserialize, Serialize};

/// A reference to one key of a named secret in the cluster's secret store.
///
/// Only the reference is ever stored; the value is injected by the execution
/// engine when the stage container starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecretRef {
    /// Name of the secret store entry (e.g. a Kubernetes secret).
    pub secret_name: String,
    /// Key inside the secret.
    pub key: String,
}

impl SecretRef {
    /// Creates a new secret reference.
    #[must_use]
    pub fn new(secret_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            secret_name: secret_name.into(),
            key: key.into(),
        }
    }
}

/// An environment variable made available to a stage container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum EnvBinding {
    /// A literal value baked into the pipeline definition.
    Literal {
        /// Environment variable name.
        name: String,
        /// Value.
        value: String,
    },
    /// A value injected from a secret at execution time.
    Secret {
        /// Environment variable name.
        name: String,
        /// Where the value comes from.
        secret: SecretRef,
    },
}

impl EnvBinding {
    /// Creates a literal binding.
    #[must_use]
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Literal {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Creates a secret-sourced binding.
    #[must_use]
    pub fn secret(name: impl Into<String>, secret: SecretRef) -> Self {
        Self::Secret {
            name: name.into(),
            secret,
        }
    }

    /// Returns the environment variable name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Literal { name, .. } | Self::Secret { name, .. } => name,
        }
    }

    /// Returns true if the value comes from a secret.
    #[must_use]
    pub fn is_secret(&self) -> bool {
        matches!(self, Self::Secret { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_binding_serializes_reference_only() {
        let binding = EnvBinding::secret(
            "AWS_ACCESS_KEY_ID",
            SecretRef::new("pipeline-one", "AWS_ACCESS_KEY_ID"),
        );

        let json = serde_json::to_value(&binding).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "source": "secret",
                "name": "AWS_ACCESS_KEY_ID",
                "secret": {"secret_name": "pipeline-one", "key": "AWS_ACCESS_KEY_ID"}
            })
        );
        assert!(binding.is_secret());
    }

    #[test]
    fn test_literal_binding() {
        let binding = EnvBinding::literal("S3_KEY", "models/fraud/1/model.onnx");
        assert_eq!(binding.name(), "S3_KEY");
        assert!(!binding.is_secret());
    }
}
