//! Pipeline definitions: the built-in fraud-detection pipeline and loading
//! stage lists from YAML/JSON files.

use crate::core::ArtifactKind;
use crate::errors::StagepipeError;
use crate::stages::StageDescriptor;
use serde::Deserialize;
use std::path::Path;

/// Default display name of the built-in pipeline.
pub const FRAUD_DETECTION_PIPELINE: &str = "get_data_train_upload";

/// Runtime image shared by every stage of the built-in pipeline.
pub const TENSORFLOW_RUNTIME_IMAGE: &str =
    "quay.io/modh/runtime-images:runtime-cuda-tensorflow-ubi9-python-3.9-2023b-20240301";

/// Secret holding the object-storage credentials for the upload stage.
pub const UPLOAD_SECRET: &str = "pipeline-one";

/// Object key the trained model is uploaded to.
pub const MODEL_OBJECT_KEY: &str = "models/fraud/1/model.onnx";

const UPLOAD_SECRET_KEYS: [&str; 5] = [
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_DEFAULT_REGION",
    "AWS_S3_BUCKET",
    "AWS_S3_ENDPOINT",
];

/// The fraud-detection pipeline: download the transactions CSV, train a
/// classifier exported as ONNX, upload the model to object storage.
#[must_use]
pub fn fraud_detection_pipeline() -> Vec<StageDescriptor> {
    let get_data = StageDescriptor::new("get_data", TENSORFLOW_RUNTIME_IMAGE)
        .with_output("data_output_path", ArtifactKind::Dataset);

    let train_model = StageDescriptor::new("train_model", TENSORFLOW_RUNTIME_IMAGE)
        .with_packages(["tf2onnx", "seaborn"])
        .with_input_from("data_input_path", ArtifactKind::Dataset, "data_output_path")
        .with_output("model_output_path", ArtifactKind::Model);

    let upload_model = StageDescriptor::new("upload_model", TENSORFLOW_RUNTIME_IMAGE)
        .with_packages(["boto3", "botocore"])
        .with_input_from("input_model_path", ArtifactKind::Model, "model_output_path")
        .with_env("S3_KEY", MODEL_OBJECT_KEY)
        .with_secret_env(UPLOAD_SECRET, UPLOAD_SECRET_KEYS.iter().map(|k| (*k, *k)));

    vec![get_data, train_model, upload_model]
}

/// A pipeline definition file.
#[derive(Debug, Clone, Deserialize)]
pub struct DefinitionFile {
    /// Optional pipeline name; the caller's configured name wins if absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Stages in declaration order.
    pub stages: Vec<StageDescriptor>,
}

impl DefinitionFile {
    /// Parses a definition from YAML (JSON is accepted as a YAML subset).
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid definition.
    pub fn parse(text: &str) -> Result<Self, StagepipeError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Reads and parses a definition file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, StagepipeError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }
}
