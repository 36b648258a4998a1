use std::{collections::BTreeMap, sync::Arc};

use manifest_morph::{AttributePath, Type, Value, deep_unknown, from_json, infer_from_json};
use manifest_openapi::{Foundry, KubeSchemaSource, SchemaRef};
use snafu::{ResultExt, Snafu};
use tracing::instrument;

use crate::{
    config::ProviderOptions,
    diagnostics::{Diagnostic, full_message},
    discovery::KubeDiscovery,
    identity::{IdentityError, ResourceIdentity},
    resolver::{Lookup, ResourceResolver},
    validation::{normalize_manifest, validate_manifest_keys, validate_scope},
};

/// Name of the host resource type carrying a raw Kubernetes manifest.
pub const MANIFEST_RESOURCE_TYPE: &str = "kubernetes_manifest";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to load the OpenAPI schema of the Kubernetes API server"))]
    LoadSchema { source: manifest_openapi::Error },
}

#[derive(Debug, Snafu)]
pub enum PlanError {
    #[snafu(display("failed to identify the manifest"))]
    Identity { source: IdentityError },

    #[snafu(display("failed to resolve the schema of {resource}"))]
    ResolveSchema {
        source: manifest_openapi::Error,
        resource: String,
    },

    #[snafu(display("manifest of {resource} does not match its schema"))]
    MorphManifest {
        source: manifest_morph::Error,
        resource: String,
    },

    #[snafu(display("failed to mark the computed attributes of {resource}"))]
    PropagateUnknown {
        source: manifest_morph::Error,
        resource: String,
    },
}

impl From<&PlanError> for Diagnostic {
    fn from(error: &PlanError) -> Self {
        match error {
            PlanError::Identity { .. } => {
                Self::from_error("Failed to determine GroupVersionKind for manifest", error)
            }
            PlanError::ResolveSchema { resource, .. } => {
                Self::from_error(format!("Failed to get type of resource '{resource}'"), error)
            }
            PlanError::MorphManifest { source, .. } => {
                let diagnostic = Self::from_error("Failed to morph manifest to OpenAPI type", error);
                match source {
                    manifest_morph::Error::ShapeMismatch { path, .. }
                    | manifest_morph::Error::UnknownValue { path }
                    | manifest_morph::Error::InvalidNumber { path, .. } => {
                        diagnostic.with_attribute(path.clone())
                    }
                }
            }
            // The details are only logged, a mismatch at this point is a bug in the
            // provider and not something the user can fix.
            PlanError::PropagateUnknown { resource, .. } => Self::error(
                "Internal error",
                format!("Failed to plan resource '{resource}', see the provider logs for details"),
            ),
        }
    }
}

/// The host facing surface of the provider.
///
/// All collaborators are injected, [`ProviderServer::connect`] wires up the
/// ones talking to a Kubernetes cluster.
pub struct ProviderServer {
    foundry: Arc<Foundry>,
    resolver: Option<Arc<ResourceResolver>>,
    resource_types: BTreeMap<String, Type>,
}

impl ProviderServer {
    /// Creates a server without online validation.
    pub fn new(foundry: Arc<Foundry>) -> Self {
        Self {
            foundry,
            resolver: None,
            resource_types: BTreeMap::from([(
                MANIFEST_RESOURCE_TYPE.to_owned(),
                manifest_resource_type(),
            )]),
        }
    }

    pub fn with_resolver(self, resolver: Arc<ResourceResolver>) -> Self {
        Self {
            resolver: Some(resolver),
            ..self
        }
    }

    /// Loads the OpenAPI schema through `client` and enables online
    /// validation, unless disabled by `options`.
    #[instrument(skip_all)]
    pub async fn connect(client: kube::Client, options: &ProviderOptions) -> Result<Self, Error> {
        let source =
            KubeSchemaSource::new(client.clone()).with_timeout(options.schema_fetch_timeout.into());
        let foundry = Foundry::fetch(&source).await.context(LoadSchemaSnafu)?;
        let server = Self::new(Arc::new(foundry));

        if options.online_validation_disabled {
            tracing::info!("online validation is disabled");
            return Ok(server);
        }

        let discovery = Arc::new(KubeDiscovery::new(client));
        Ok(server.with_resolver(Arc::new(ResourceResolver::new(discovery))))
    }

    /// Returns the statically declared type of the host resource type `type_name`.
    pub fn resource_type(&self, type_name: &str) -> Option<&Type> {
        self.resource_types.get(type_name)
    }

    /// Runs the structural checks which need no access to the Kubernetes API server.
    #[instrument(skip(self, config))]
    pub fn validate_resource_type_config(&self, type_name: &str, config: &Value) -> Vec<Diagnostic> {
        let Some(resource_type) = self.resource_type(type_name) else {
            return vec![Diagnostic::error(
                "Failed to determine resource type",
                format!("unknown resource type {type_name:?}"),
            )];
        };

        if !resource_type.accepts(config.ty()) {
            return vec![Diagnostic::error(
                "Failed to unmarshal resource state",
                format!("expected {resource_type}, found {}", config.ty()),
            )];
        }

        let Some(attributes) = config.attributes() else {
            return vec![Diagnostic::error(
                "Failed to extract resource state from SDK value",
                "resource configuration is null or not known yet",
            )];
        };

        // The type check above guarantees the attribute is declared
        let manifest_path = AttributePath::new().with_attribute_name("manifest");
        attributes.get("manifest").map_or_else(Vec::new, |manifest| {
            validate_manifest_keys(manifest, &manifest_path)
        })
    }

    /// Forgets everything discovered about resource types so far.
    ///
    /// The host calls this at the start of every plan, so that resource types
    /// which were installed, removed or changed in the meantime are picked up.
    pub fn clear_discovery_cache(&self) {
        if let Some(resolver) = &self.resolver {
            resolver.clear();
        }
    }

    /// Checks the scope of `manifest` against the Kubernetes API server.
    ///
    /// Returns no diagnostics if online validation is disabled.
    pub async fn validate_resource_online(&self, manifest: &Value) -> Vec<Diagnostic> {
        let Some(resolver) = &self.resolver else {
            tracing::debug!("online validation is disabled, skipping scope check");
            return Vec::new();
        };

        let manifest = normalize_manifest(manifest);
        let identity = match ResourceIdentity::from_manifest(&manifest) {
            Ok(identity) => identity,
            Err(error) if error.is_not_yet_known() => {
                tracing::debug!(%error, "resource identity is not known yet, deferring scope check");
                return Vec::new();
            }
            Err(error) => {
                return vec![Diagnostic::from_error(
                    "Failed to determine GroupVersionResource for manifest",
                    &error,
                )];
            }
        };

        match resolver.resolve(&identity).await {
            Ok(descriptor) => validate_scope(&descriptor, &manifest).into_iter().collect(),
            Err(error) => {
                let summary = match error.lookup() {
                    Lookup::ResourceType => {
                        "Failed to determine GroupVersionResource for manifest".to_owned()
                    }
                    Lookup::Scope => format!("Failed to discover scope of resource '{identity}'"),
                };
                tracing::debug!(%identity, error = %full_message(&error), "online validation failed");
                vec![Diagnostic::from_error(summary, &error)]
            }
        }
    }

    /// Computes the planned `object` of a manifest.
    ///
    /// The manifest is typed by the schema of its kind, every attribute it
    /// leaves unset is marked as unknown, as the API server will fill it in.
    #[instrument(skip_all)]
    pub fn plan_object(&self, manifest: &serde_json::Value) -> Result<Value, PlanError> {
        let identity = ResourceIdentity::from_manifest(&infer_from_json(manifest))
            .context(IdentitySnafu)?;
        let gvk = identity.gvk().context(IdentitySnafu)?;
        let resource = identity.to_string();

        let ty = self
            .foundry
            .resolve_type(&SchemaRef::GroupVersionKind(gvk))
            .context(ResolveSchemaSnafu {
                resource: &resource,
            })?;

        let path = AttributePath::new().with_attribute_name("object");
        let object = from_json(&ty, manifest, &path).context(MorphManifestSnafu {
            resource: &resource,
        })?;

        deep_unknown(&ty, &object, &path)
            .inspect_err(|error| {
                tracing::error!(%error, %resource, "planned object does not match its own type");
            })
            .context(PropagateUnknownSnafu {
                resource: &resource,
            })
    }
}

/// The type of a `kubernetes_manifest` resource.
fn manifest_resource_type() -> Type {
    Type::object([
        ("computed_fields", Type::list(Type::STRING)),
        ("manifest", Type::DYNAMIC),
        ("object", Type::DYNAMIC),
        (
            "wait_for",
            Type::object([("fields", Type::map(Type::STRING))]),
        ),
    ])
}
