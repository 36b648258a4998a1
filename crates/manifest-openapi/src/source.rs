use std::time::Duration;

use async_trait::async_trait;
use snafu::{ResultExt, Snafu};
use tracing::instrument;

/// Path of the OpenAPI v2 document served by the Kubernetes API server.
pub const OPENAPI_V2_PATH: &str = "/openapi/v2";

#[derive(Debug, Snafu)]
pub enum FetchError {
    #[snafu(display("failed to build request for {path:?}"))]
    BuildRequest { source: http::Error, path: String },

    #[snafu(display("failed to request {path:?} from the Kubernetes API server"))]
    Request { source: kube::Error, path: String },

    #[snafu(display("request for {path:?} did not complete within {timeout:?}"))]
    Timeout {
        source: tokio::time::error::Elapsed,
        path: String,
        timeout: Duration,
    },
}

/// Retrieves the raw schema document a [`Foundry`](crate::Foundry) is built from.
//
// async-trait keeps the trait usable as a trait object.
#[async_trait]
pub trait SchemaDocumentSource: Send + Sync {
    async fn fetch_schema_document(&self) -> Result<Vec<u8>, FetchError>;
}

/// Fetches the OpenAPI v2 document from the Kubernetes API server.
#[derive(Clone)]
pub struct KubeSchemaSource {
    client: kube::Client,
    timeout: Duration,
}

impl KubeSchemaSource {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(client: kube::Client) -> Self {
        Self {
            client,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }
}

#[async_trait]
impl SchemaDocumentSource for KubeSchemaSource {
    #[instrument(skip(self), fields(timeout = ?self.timeout))]
    async fn fetch_schema_document(&self) -> Result<Vec<u8>, FetchError> {
        let request = http::Request::get(OPENAPI_V2_PATH)
            .body(Vec::new())
            .context(BuildRequestSnafu {
                path: OPENAPI_V2_PATH,
            })?;

        // The document is several megabytes, only its size is logged.
        let document = tokio::time::timeout(self.timeout, self.client.request_text(request))
            .await
            .context(TimeoutSnafu {
                path: OPENAPI_V2_PATH,
                timeout: self.timeout,
            })?
            .context(RequestSnafu {
                path: OPENAPI_V2_PATH,
            })?;

        tracing::debug!(bytes = document.len(), "retrieved OpenAPI schema document");
        Ok(document.into_bytes())
    }
}
