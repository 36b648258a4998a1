use std::{
    collections::HashMap,
    fmt::Display,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use kube::core::GroupVersionKind;
use snafu::Snafu;
use tokio::sync::OnceCell;
use tracing::instrument;

use crate::{
    discovery::{DiscoveryError, DiscoveryService},
    identity::ResourceIdentity,
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The discovery call that failed while resolving a resource type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum Lookup {
    #[strum(serialize = "resource type")]
    ResourceType,

    #[strum(serialize = "scope")]
    Scope,
}

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("the {lookup} of {resource} is not known to the Kubernetes API server"))]
    UnknownResourceType {
        source: DiscoveryError,
        lookup: Lookup,
        resource: String,
    },

    #[snafu(display("failed to discover the {lookup} of {resource}"))]
    DiscoveryUnavailable {
        source: DiscoveryError,
        lookup: Lookup,
        resource: String,
    },
}

impl Error {
    pub fn lookup(&self) -> Lookup {
        match self {
            Self::UnknownResourceType { lookup, .. } | Self::DiscoveryUnavailable { lookup, .. } => {
                *lookup
            }
        }
    }

    fn from_discovery(source: DiscoveryError, lookup: Lookup, resource: &ResourceIdentity) -> Self {
        let resource = resource.to_string();
        if source.is_not_found() {
            Self::UnknownResourceType {
                source,
                lookup,
                resource,
            }
        } else {
            Self::DiscoveryUnavailable {
                source,
                lookup,
                resource,
            }
        }
    }
}

/// Everything the API server told us about the type of a resource.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ResourceTypeDescriptor {
    /// The API group, empty for the core group.
    pub group: String,
    pub version: String,
    pub resource: String,
    pub kind: String,
    pub namespaced: bool,
}

impl ResourceTypeDescriptor {
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::gvk(&self.group, &self.version, &self.kind)
    }
}

impl Display for ResourceTypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.api_version(), self.kind)
    }
}

type CacheKey = (String, String);
type Cache = HashMap<CacheKey, Arc<OnceCell<ResourceTypeDescriptor>>>;

fn cache_key(identity: &ResourceIdentity) -> CacheKey {
    (identity.api_version.clone(), identity.kind.clone())
}

/// Resolves resource identities into [`ResourceTypeDescriptor`]s.
///
/// Descriptors are cached per apiVersion and kind until they are dropped with
/// [`ResourceResolver::invalidate`] or [`ResourceResolver::clear`]. The owner
/// of the discovery collaborator calls these whenever the API server may
/// serve different resources, for example at the start of every plan.
/// Concurrent requests for the same key share a single discovery round trip,
/// failed lookups are retried by the next request.
pub struct ResourceResolver {
    discovery: Arc<dyn DiscoveryService>,
    cache: Mutex<Cache>,
}

impl ResourceResolver {
    pub fn new(discovery: Arc<dyn DiscoveryService>) -> Self {
        Self {
            discovery,
            cache: Mutex::default(),
        }
    }

    pub async fn resolve(&self, identity: &ResourceIdentity) -> Result<ResourceTypeDescriptor> {
        let cell = self.cache_cell(identity);
        cell.get_or_try_init(|| self.discover(identity))
            .await
            .cloned()
    }

    /// Drops the cached descriptor of `identity`.
    ///
    /// Lookups already in flight still complete with the old entry.
    pub fn invalidate(&self, identity: &ResourceIdentity) {
        let removed = self.lock_cache().remove(&cache_key(identity)).is_some();
        tracing::debug!(resource = %identity, removed, "invalidated resource type");
    }

    /// Drops all cached descriptors.
    pub fn clear(&self) {
        let mut cache = self.lock_cache();
        tracing::debug!(entries = cache.len(), "clearing resource type cache");
        cache.clear();
    }

    fn cache_cell(&self, identity: &ResourceIdentity) -> Arc<OnceCell<ResourceTypeDescriptor>> {
        self.lock_cache()
            .entry(cache_key(identity))
            .or_default()
            .clone()
    }

    fn lock_cache(&self) -> MutexGuard<'_, Cache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[instrument(skip_all, fields(resource = %identity))]
    async fn discover(&self, identity: &ResourceIdentity) -> Result<ResourceTypeDescriptor> {
        let resource_type = self
            .discovery
            .map_kind_version(&identity.kind, &identity.api_version)
            .await
            .map_err(|source| Error::from_discovery(source, Lookup::ResourceType, identity))?;

        let namespaced = self
            .discovery
            .is_namespaced(&resource_type)
            .await
            .map_err(|source| Error::from_discovery(source, Lookup::Scope, identity))?;

        tracing::debug!(%resource_type, namespaced, "discovered resource type");

        Ok(ResourceTypeDescriptor {
            group: resource_type.group,
            version: resource_type.version,
            resource: resource_type.resource,
            kind: identity.kind.clone(),
            namespaced,
        })
    }
}
