use std::fmt::Display;

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use snafu::{ResultExt, Snafu};
use tracing::instrument;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DiscoveryError {
    #[snafu(display("kind {kind:?} is not served in {api_version:?}"))]
    KindNotFound { kind: String, api_version: String },

    #[snafu(display("resource {resource:?} is not served in {api_version:?}"))]
    ResourceNotFound {
        resource: String,
        api_version: String,
    },

    #[snafu(display("failed to reach the Kubernetes API server"))]
    Unavailable { source: BoxError },
}

impl DiscoveryError {
    /// Returns `true` if the API server answered, but does not know the requested type.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::KindNotFound { .. } | Self::ResourceNotFound { .. }
        )
    }
}

/// The REST resource a kind is served as, for example `apps/v1/deployments`.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ResourceType {
    /// The API group, empty for the core group.
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl ResourceType {
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.api_version(), self.resource)
    }
}

/// Maps kinds to resource types and tells their scope.
///
/// Scope is a separate lookup, as not every API server version reports it
/// together with the resource type.
#[async_trait]
pub trait DiscoveryService: Send + Sync {
    async fn map_kind_version(
        &self,
        kind: &str,
        api_version: &str,
    ) -> Result<ResourceType, DiscoveryError>;

    async fn is_namespaced(&self, resource_type: &ResourceType) -> Result<bool, DiscoveryError>;
}

/// [`DiscoveryService`] backed by the API resource listings of the Kubernetes API server.
///
/// Every call queries the API server, caching is left to the
/// [`ResourceResolver`](crate::resolver::ResourceResolver).
#[derive(Clone)]
pub struct KubeDiscovery {
    client: kube::Client,
}

impl KubeDiscovery {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    async fn list_resources(&self, api_version: &str) -> Result<APIResourceList, kube::Error> {
        if api_version.contains('/') {
            self.client.list_api_group_resources(api_version).await
        } else {
            self.client.list_core_api_resources(api_version).await
        }
    }
}

/// A 404 means the group version is not served at all, which is a lookup miss
/// and not a connectivity problem.
fn is_not_found(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(response) if response.code == 404)
}

#[async_trait]
impl DiscoveryService for KubeDiscovery {
    #[instrument(skip(self))]
    async fn map_kind_version(
        &self,
        kind: &str,
        api_version: &str,
    ) -> Result<ResourceType, DiscoveryError> {
        let not_found = || KindNotFoundSnafu { kind, api_version };

        let resources = match self.list_resources(api_version).await {
            Err(error) if is_not_found(&error) => return not_found().fail(),
            result => result.map_err(BoxError::from).context(UnavailableSnafu)?,
        };

        let resource = resources
            .resources
            .iter()
            // Subresources such as "deployments/status" share the kind of their parent
            .find(|resource| resource.kind == kind && !resource.name.contains('/'));

        match resource {
            Some(resource) => {
                let (group, version) = api_version.split_once('/').unwrap_or(("", api_version));
                Ok(ResourceType {
                    group: group.to_owned(),
                    version: version.to_owned(),
                    resource: resource.name.clone(),
                })
            }
            None => not_found().fail(),
        }
    }

    #[instrument(skip(self), fields(resource_type = %resource_type))]
    async fn is_namespaced(&self, resource_type: &ResourceType) -> Result<bool, DiscoveryError> {
        let api_version = resource_type.api_version();
        let not_found = || ResourceNotFoundSnafu {
            resource: &resource_type.resource,
            api_version: &api_version,
        };

        let resources = match self.list_resources(&api_version).await {
            Err(error) if is_not_found(&error) => return not_found().fail(),
            result => result.map_err(BoxError::from).context(UnavailableSnafu)?,
        };

        match resources
            .resources
            .iter()
            .find(|resource| resource.name == resource_type.resource)
        {
            Some(resource) => Ok(resource.namespaced),
            None => not_found().fail(),
        }
    }
}
