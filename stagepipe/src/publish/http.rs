//! HTTP client for a registry serving the v2beta1 pipelines REST API.
//!
//! Only the list, upload and upload-version calls are used, and the uploaded
//! file is the stagepipe graph document rather than a Kubeflow pipeline spec.

use super::client::{PipelineRegistry, RegistryEntry};
use crate::errors::PublishError;
use crate::pipeline::CompiledGraph;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Certificate, Client, Response, Url};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

const PIPELINES_PATH: &str = "apis/v2beta1/pipelines";
const UPLOAD_PATH: &str = "apis/v2beta1/pipelines/upload";
const UPLOAD_VERSION_PATH: &str = "apis/v2beta1/pipelines/upload_version";
const PAGE_SIZE: &str = "100";
const MAX_PAGES: usize = 50;

/// Transport options for [`HttpPipelineRegistry`].
#[derive(Debug, Clone)]
pub struct HttpRegistryOptions {
    /// Per-request timeout.
    pub timeout: Duration,
    /// PEM CA bundle to trust in addition to the system roots. Ignored if
    /// the file does not exist.
    pub ca_cert: Option<PathBuf>,
}

impl Default for HttpRegistryOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            ca_cert: None,
        }
    }
}

/// Adds `https://` to endpoints given without a scheme and drops trailing
/// slashes.
#[must_use]
pub fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Builds the display-name filter understood by the registry's list call.
#[must_use]
pub fn display_name_filter(display_name: &str) -> String {
    serde_json::json!({
        "predicates": [{
            "key": "display_name",
            "operation": "EQUALS",
            "stringValue": display_name,
        }]
    })
    .to_string()
}

#[derive(Debug, Deserialize)]
struct ListPipelinesResponse {
    #[serde(default)]
    pipelines: Vec<PipelineRecord>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PipelineRecord {
    pipeline_id: String,
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct VersionRecord {
    pipeline_version_id: String,
}

/// Registry reached over HTTP with a bearer token.
#[derive(Debug, Clone)]
pub struct HttpPipelineRegistry {
    client: Client,
    base: Url,
    token: String,
}

impl HttpPipelineRegistry {
    /// Creates a client for `endpoint` authenticating with `token`.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::InvalidEndpoint`] if the endpoint is not a URL,
    /// or a transport error if the HTTP client cannot be built.
    pub fn new(
        endpoint: &str,
        token: impl Into<String>,
        options: &HttpRegistryOptions,
    ) -> Result<Self, PublishError> {
        let normalized = normalize_endpoint(endpoint);
        let base = Url::parse(&format!("{normalized}/"))
            .map_err(|_| PublishError::InvalidEndpoint(endpoint.to_string()))?;

        let mut builder = Client::builder().timeout(options.timeout);
        if let Some(path) = options.ca_cert.as_ref().filter(|p| p.exists()) {
            let pem = std::fs::read(path)
                .map_err(|e| PublishError::transport("connect", format!("{}: {e}", path.display())))?;
            let cert = Certificate::from_pem(&pem)
                .map_err(|e| PublishError::transport("connect", e.to_string()))?;
            builder = builder.add_root_certificate(cert);
        }
        let client = builder
            .build()
            .map_err(|e| PublishError::transport("connect", e.to_string()))?;

        Ok(Self {
            client,
            base,
            token: token.into(),
        })
    }

    /// Returns the normalized base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url, PublishError> {
        self.base
            .join(path)
            .map_err(|_| PublishError::InvalidEndpoint(self.base.to_string()))
    }

    fn upload_form(graph: &CompiledGraph, file_name: &str) -> Result<Form, PublishError> {
        let part = Part::bytes(graph.as_bytes().to_vec())
            .file_name(format!("{file_name}.json"))
            .mime_str("application/json")
            .map_err(|e| PublishError::transport("upload", e.to_string()))?;
        Ok(Form::new().part("uploadfile", part))
    }
}

async fn check_status(operation: &'static str, response: Response) -> Result<String, PublishError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| PublishError::transport(operation, e.to_string()))?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(PublishError::Remote {
            operation,
            status: status.as_u16(),
            body,
        })
    }
}

fn decode<T: for<'de> Deserialize<'de>>(operation: &'static str, body: &str) -> Result<T, PublishError> {
    serde_json::from_str(body).map_err(|e| PublishError::decode(operation, e.to_string()))
}

#[async_trait]
impl PipelineRegistry for HttpPipelineRegistry {
    async fn list(&self, display_name: &str) -> Result<Vec<RegistryEntry>, PublishError> {
        let url = self.url(PIPELINES_PATH)?;
        let filter = display_name_filter(display_name);
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;
        let mut truncated = true;

        for _ in 0..MAX_PAGES {
            let mut query = vec![("filter", filter.as_str()), ("page_size", PAGE_SIZE)];
            if let Some(token) = page_token.as_deref() {
                query.push(("page_token", token));
            }

            let response = self
                .client
                .get(url.clone())
                .bearer_auth(&self.token)
                .query(&query)
                .send()
                .await
                .map_err(|e| PublishError::transport("list", e.to_string()))?;
            let body = check_status("list", response).await?;
            let page: ListPipelinesResponse = decode("list", &body)?;

            entries.extend(
                page.pipelines
                    .into_iter()
                    .map(|p| RegistryEntry::new(p.pipeline_id, p.display_name)),
            );

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => {
                    truncated = false;
                    break;
                }
            }
        }

        if truncated {
            warn!(
                display_name = %display_name,
                pages = MAX_PAGES,
                matches = entries.len(),
                "Registry listing truncated; later pages were not read"
            );
        }

        debug!(display_name = %display_name, matches = entries.len(), "Listed registry entries");
        Ok(entries)
    }

    async fn create(
        &self,
        display_name: &str,
        graph: &CompiledGraph,
    ) -> Result<String, PublishError> {
        let response = self
            .client
            .post(self.url(UPLOAD_PATH)?)
            .bearer_auth(&self.token)
            .query(&[("name", display_name), ("display_name", display_name)])
            .multipart(Self::upload_form(graph, display_name)?)
            .send()
            .await
            .map_err(|e| PublishError::transport("create", e.to_string()))?;
        let body = check_status("create", response).await?;
        let record: PipelineRecord = decode("create", &body)?;
        Ok(record.pipeline_id)
    }

    async fn append_version(
        &self,
        entry_id: &str,
        graph: &CompiledGraph,
        version_name: &str,
    ) -> Result<String, PublishError> {
        let response = self
            .client
            .post(self.url(UPLOAD_VERSION_PATH)?)
            .bearer_auth(&self.token)
            .query(&[
                ("pipelineid", entry_id),
                ("name", version_name),
                ("display_name", version_name),
            ])
            .multipart(Self::upload_form(graph, version_name)?)
            .send()
            .await
            .map_err(|e| PublishError::transport("append_version", e.to_string()))?;
        let body = check_status("append_version", response).await?;
        let record: VersionRecord = decode("append_version", &body)?;
        Ok(record.pipeline_version_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ArtifactKind;
    use crate::pipeline::compile;
    use crate::stages::StageDescriptor;
    use crate::testing::serve;

    fn graph() -> CompiledGraph {
        compile(
            "demo",
            [StageDescriptor::new("extract", "python:3.11").with_output("raw", ArtifactKind::Dataset)],
        )
        .unwrap()
    }

    fn registry(base_url: &str) -> HttpPipelineRegistry {
        HttpPipelineRegistry::new(base_url, "tok", &HttpRegistryOptions::default()).unwrap()
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(
            normalize_endpoint("ds-pipeline-dspa.apps.example.com"),
            "https://ds-pipeline-dspa.apps.example.com"
        );
        assert_eq!(normalize_endpoint("http://localhost:8888/"), "http://localhost:8888");
        assert_eq!(normalize_endpoint(" https://kfp.local "), "https://kfp.local");
    }

    #[test]
    fn test_display_name_filter() {
        let filter: serde_json::Value =
            serde_json::from_str(&display_name_filter("get_data_train_upload")).unwrap();
        assert_eq!(
            filter,
            serde_json::json!({
                "predicates": [{
                    "key": "display_name",
                    "operation": "EQUALS",
                    "stringValue": "get_data_train_upload"
                }]
            })
        );
    }

    #[test]
    fn test_new_builds_api_urls() {
        let registry =
            HttpPipelineRegistry::new("kfp.example.com", "token", &HttpRegistryOptions::default())
                .unwrap();

        assert_eq!(registry.base_url().as_str(), "https://kfp.example.com/");
        assert_eq!(
            registry.url(UPLOAD_VERSION_PATH).unwrap().as_str(),
            "https://kfp.example.com/apis/v2beta1/pipelines/upload_version"
        );
    }

    #[test]
    fn test_new_keeps_path_prefix() {
        let registry = HttpPipelineRegistry::new(
            "https://gateway.example.com/kfp",
            "token",
            &HttpRegistryOptions::default(),
        )
        .unwrap();

        assert_eq!(
            registry.url(PIPELINES_PATH).unwrap().as_str(),
            "https://gateway.example.com/kfp/apis/v2beta1/pipelines"
        );
    }

    #[test]
    fn test_new_rejects_garbage_endpoint() {
        let err = HttpPipelineRegistry::new("https://exa mple.com", "token", &HttpRegistryOptions::default())
            .unwrap_err();
        assert!(matches!(err, PublishError::InvalidEndpoint(_)));
    }

    #[test]
    fn test_missing_ca_file_is_ignored() {
        let options = HttpRegistryOptions {
            timeout: Duration::from_secs(5),
            ca_cert: Some(PathBuf::from("/nonexistent/ca.crt")),
        };
        assert!(HttpPipelineRegistry::new("kfp.example.com", "t", &options).is_ok());
    }

    #[test]
    fn test_decode_list_response() {
        let body = r#"{
            "pipelines": [
                {"pipeline_id": "abc", "display_name": "get_data_train_upload"},
                {"pipeline_id": "def", "display_name": "Get_Data_Train_Upload"}
            ],
            "total_size": 2
        }"#;
        let page: ListPipelinesResponse = decode("list", body).unwrap();
        assert_eq!(page.pipelines.len(), 2);
        assert_eq!(page.pipelines[0].pipeline_id, "abc");
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn test_decode_empty_list_response() {
        let page: ListPipelinesResponse = decode("list", "{}").unwrap();
        assert!(page.pipelines.is_empty());
    }

    #[test]
    fn test_decode_error_names_operation() {
        let err = decode::<VersionRecord>("append_version", "not json").unwrap_err();
        assert!(matches!(
            err,
            PublishError::Decode {
                operation: "append_version",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_create_uploads_document_and_returns_id() {
        let server = serve(vec![(200, r#"{"pipeline_id": "p-1", "display_name": "demo"}"#.to_string())]).await;

        let id = registry(&server.base_url).create("demo", &graph()).await.unwrap();
        assert_eq!(id, "p-1");

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.method, "POST");
        assert!(request.target.starts_with("/apis/v2beta1/pipelines/upload?"));
        assert!(request.target.contains("name=demo"));
        assert!(request.target.contains("display_name=demo"));
        assert!(request.head.contains("authorization: bearer tok"));
        assert!(request.body.contains("name=\"uploadfile\""));
        assert!(request.body.contains("\"pipeline\": \"demo\""));
    }

    #[tokio::test]
    async fn test_append_version_targets_entry() {
        let server = serve(vec![(200, r#"{"pipeline_version_id": "v-7"}"#.to_string())]).await;

        let id = registry(&server.base_url)
            .append_version("p-1", &graph(), "demo-1700000000")
            .await
            .unwrap();
        assert_eq!(id, "v-7");

        let request = &server.requests()[0];
        assert!(request.target.starts_with("/apis/v2beta1/pipelines/upload_version?"));
        assert!(request.target.contains("pipelineid=p-1"));
        assert!(request.target.contains("name=demo-1700000000"));
    }

    #[tokio::test]
    async fn test_list_follows_page_tokens() {
        let server = serve(vec![
            (
                200,
                r#"{"pipelines": [{"pipeline_id": "a", "display_name": "demo"}], "next_page_token": "t2"}"#
                    .to_string(),
            ),
            (
                200,
                r#"{"pipelines": [{"pipeline_id": "b", "display_name": "demo"}], "next_page_token": ""}"#
                    .to_string(),
            ),
        ])
        .await;

        let entries = registry(&server.base_url).list("demo").await.unwrap();
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].target.starts_with("/apis/v2beta1/pipelines?"));
        assert!(requests[0].target.contains("filter="));
        assert!(!requests[0].target.contains("page_token"));
        assert!(requests[1].target.contains("page_token=t2"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_remote_error() {
        let server = serve(vec![(503, r#"{"error": "unavailable"}"#.to_string())]).await;

        let err = registry(&server.base_url).list("demo").await.unwrap_err();
        match err {
            PublishError::Remote {
                operation,
                status,
                body,
            } => {
                assert_eq!(operation, "list");
                assert_eq!(status, 503);
                assert!(body.contains("unavailable"));
            }
            other => panic!("expected remote error, got {other:?}"),
        }
    }
}
