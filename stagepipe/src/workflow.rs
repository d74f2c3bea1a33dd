//! Compile-and-publish orchestration.
//!
//! Compilation is mandatory and writes the document before anything touches
//! the network. Publishing is best effort: unresolved credentials skip it,
//! registry failures are reported, and neither undoes the compiled output.

use crate::config::PublishConfig;
use crate::errors::{PublishError, ResolutionError, StagepipeError};
use crate::pipeline::{
    compile, fraud_detection_pipeline, CompiledGraph, DefinitionFile, FRAUD_DETECTION_PIPELINE,
};
use crate::publish::{HttpPipelineRegistry, HttpRegistryOptions, PipelineRegistry, PublishResult, Publisher};
use crate::resolve::{CredentialResolver, ResolvedTarget};
use crate::stages::StageDescriptor;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// What happened to the publish step.
#[derive(Debug)]
pub enum PublishOutcome {
    /// The graph reached the registry.
    Published(PublishResult),
    /// Endpoint or token could not be resolved; nothing was sent.
    Skipped(ResolutionError),
    /// The registry could not be reached or refused the graph.
    Failed(PublishError),
}

impl PublishOutcome {
    /// Returns true if publishing was attempted and failed.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Summary of one run.
#[derive(Debug)]
pub struct RunReport {
    /// Name the graph was compiled and published under.
    pub display_name: String,
    /// Where the compiled document was written.
    pub output: PathBuf,
    /// SHA-256 of the compiled document.
    pub digest: String,
    /// Publish outcome.
    pub publish: PublishOutcome,
}

/// Process exit status for a run: success whenever compilation succeeded,
/// whatever happened to publishing.
#[must_use]
pub fn exit_status<T>(result: &Result<T, StagepipeError>) -> u8 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

/// Returns the pipeline name and stages to compile: the definition file if
/// configured, otherwise the built-in fraud-detection pipeline.
///
/// The name is the configured display name, then the definition file's
/// `name`, then [`FRAUD_DETECTION_PIPELINE`].
///
/// # Errors
///
/// Returns an error if the definition file cannot be read or parsed.
pub fn configured_stages(
    config: &PublishConfig,
) -> Result<(String, Vec<StageDescriptor>), StagepipeError> {
    let (file_name, stages) = match &config.definition {
        Some(path) => {
            let file = DefinitionFile::load(path)?;
            (file.name, file.stages)
        }
        None => (None, fraud_detection_pipeline()),
    };
    let name = config
        .display_name
        .clone()
        .or(file_name)
        .unwrap_or_else(|| FRAUD_DETECTION_PIPELINE.to_string());
    Ok((name, stages))
}

/// Compiles the configured pipeline and writes it to the configured output.
///
/// # Errors
///
/// Returns an error if the definition is invalid or the output cannot be
/// written.
pub fn compile_to_file(config: &PublishConfig) -> Result<CompiledGraph, StagepipeError> {
    let (name, stages) = configured_stages(config)?;
    let graph = compile(name, stages)?;
    graph.write_to(&config.output)?;
    info!(
        pipeline = %graph.pipeline_name(),
        output = %config.output.display(),
        digest = %graph.digest(),
        "Pipeline compiled"
    );
    Ok(graph)
}

/// Publishes `graph` under its own name and folds the result into an outcome.
pub async fn publish_compiled<R: PipelineRegistry>(
    publisher: &Publisher<R>,
    graph: &CompiledGraph,
) -> PublishOutcome {
    match publisher.publish(graph.pipeline_name(), graph).await {
        Ok(result) => PublishOutcome::Published(result),
        Err(e) => {
            error!(pipeline = %graph.pipeline_name(), error = %e, "Failed to publish pipeline");
            PublishOutcome::Failed(e)
        }
    }
}

/// Compiles, then publishes through the registry built by `connect`.
///
/// # Errors
///
/// Returns an error only if compilation or writing the output fails.
pub async fn compile_and_publish_with<R, F>(
    config: &PublishConfig,
    resolver: &CredentialResolver,
    explicit_endpoint: Option<&str>,
    explicit_token: Option<&str>,
    connect: F,
) -> Result<RunReport, StagepipeError>
where
    R: PipelineRegistry,
    F: FnOnce(&ResolvedTarget) -> Result<Publisher<R>, PublishError>,
{
    let graph = compile_to_file(config)?;

    let publish = match resolver.resolve(explicit_endpoint, explicit_token).await {
        Err(e) => {
            warn!(error = %e, "Registry endpoint or token unavailable, skipping upload");
            PublishOutcome::Skipped(e)
        }
        Ok(target) => match connect(&target) {
            Ok(publisher) => publish_compiled(&publisher, &graph).await,
            Err(e) => {
                error!(endpoint = %target.endpoint, error = %e, "Failed to connect to registry");
                PublishOutcome::Failed(e)
            }
        },
    };

    Ok(RunReport {
        display_name: graph.pipeline_name().to_string(),
        output: config.output.clone(),
        digest: graph.digest(),
        publish,
    })
}

/// Compiles the configured pipeline and publishes it over HTTP.
///
/// # Errors
///
/// Returns an error only if compilation or writing the output fails.
pub async fn compile_and_publish(
    config: &PublishConfig,
    resolver: &CredentialResolver,
    explicit_endpoint: Option<&str>,
    explicit_token: Option<&str>,
) -> Result<RunReport, StagepipeError> {
    let options = HttpRegistryOptions {
        timeout: config.request_timeout(),
        ca_cert: Some(config.ca_cert_path()),
    };
    compile_and_publish_with(config, resolver, explicit_endpoint, explicit_token, |target| {
        HttpPipelineRegistry::new(&target.endpoint, target.token.clone(), &options).map(Publisher::new)
    })
    .await
}
