use std::{
    collections::{BTreeMap, HashMap},
    fmt::Display,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, TryLockError,
        atomic::{AtomicUsize, Ordering},
    },
};

use kube::core::GroupVersionKind;
use manifest_morph::Type;
use snafu::{OptionExt, ResultExt, Snafu, ensure};
use tracing::instrument;

use crate::{
    AdditionalProperties, DEFINITIONS_PREFIX, SchemaDocument, SchemaDocumentSource, SchemaObject,
};

/// Maximum number of nested `$ref` hops followed while synthesizing a single type.
pub const MAX_REFERENCE_DEPTH: usize = 64;

/// Definitions which are serialized as strings, whatever their schema says.
const STRING_DEFINITION_SUFFIXES: &[&str] = &[
    ".apimachinery.pkg.util.intstr.IntOrString",
    ".apimachinery.pkg.api.resource.Quantity",
];

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to retrieve the OpenAPI schema document"))]
    FetchDocument { source: crate::FetchError },

    #[snafu(display("failed to parse the OpenAPI schema document"))]
    ParseDocument { source: serde_json::Error },

    #[snafu(display("definition {definition:?} not found in the OpenAPI schema document"))]
    DefinitionNotFound { definition: String },

    #[snafu(display(
        "no definition found for group {group:?}, version {version:?} and kind {kind:?}"
    ))]
    UnknownGroupVersionKind {
        group: String,
        version: String,
        kind: String,
    },

    #[snafu(display("unsupported reference {reference:?}, only local definitions can be resolved"))]
    UnsupportedReference { reference: String },

    #[snafu(display("unsupported schema type {schema_type:?} in definition {definition:?}"))]
    UnsupportedSchemaType {
        definition: String,
        schema_type: String,
    },

    #[snafu(display(
        "resolving definition {definition:?} exceeded the maximum reference depth of {max_depth}"
    ))]
    MaxDepthExceeded { definition: String, max_depth: usize },
}

/// Identifies a type inside the schema document.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum SchemaRef {
    /// A definition name, for example `io.k8s.api.core.v1.ConfigMap`.
    Definition(String),

    /// The group, version and kind a definition is served as.
    GroupVersionKind(GroupVersionKind),
}

impl SchemaRef {
    pub fn definition(name: impl Into<String>) -> Self {
        Self::Definition(name.into())
    }

    pub fn gvk(group: &str, version: &str, kind: &str) -> Self {
        Self::GroupVersionKind(GroupVersionKind::gvk(group, version, kind))
    }
}

impl Display for SchemaRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Definition(name) => write!(f, "{name}"),
            Self::GroupVersionKind(gvk) if gvk.group.is_empty() => {
                write!(f, "{}/{}", gvk.version, gvk.kind)
            }
            Self::GroupVersionKind(gvk) => write!(f, "{}/{}/{}", gvk.group, gvk.version, gvk.kind),
        }
    }
}

type CacheSlot = Arc<Mutex<Option<Arc<Type>>>>;

/// Builds [`Type`] trees from an OpenAPI v2 schema document on demand.
///
/// Every resolved reference is cached for the lifetime of the foundry,
/// including the definitions it refers to. The cache can be shared between
/// threads: concurrent requests for the same reference synthesize it only
/// once, requests for different references do not block each other.
///
/// ### Self-referential definitions
///
/// Some definitions (for example `JSONSchemaProps`) refer to themselves. When
/// the synthesis re-enters a definition that is already being synthesized, the
/// reference is replaced by [`Type::DYNAMIC`] instead of being followed again.
/// Reference chains longer than [`MAX_REFERENCE_DEPTH`] are rejected.
#[derive(Debug)]
pub struct Foundry {
    document: SchemaDocument,
    gvk_index: HashMap<GroupVersionKind, String>,
    cache: Mutex<HashMap<String, CacheSlot>>,
    synthesis_count: AtomicUsize,
}

impl Foundry {
    /// Parses the raw schema document.
    pub fn new(document: &[u8]) -> Result<Self> {
        let document: SchemaDocument =
            serde_json::from_slice(document).context(ParseDocumentSnafu)?;

        let mut gvk_index = HashMap::new();
        for (name, definition) in &document.definitions {
            for gvk in &definition.group_version_kinds {
                gvk_index.entry(gvk.clone()).or_insert_with(|| name.clone());
            }
        }

        tracing::debug!(
            definitions = document.definitions.len(),
            kinds = gvk_index.len(),
            "parsed OpenAPI schema document"
        );

        Ok(Self {
            document,
            gvk_index,
            cache: Mutex::default(),
            synthesis_count: AtomicUsize::new(0),
        })
    }

    /// Retrieves the schema document from `source` and parses it.
    #[instrument(skip(source))]
    pub async fn fetch(source: &dyn SchemaDocumentSource) -> Result<Self> {
        let document = source
            .fetch_schema_document()
            .await
            .context(FetchDocumentSnafu)?;
        Self::new(&document)
    }

    /// Returns the type of `reference`, synthesizing it on first use.
    #[instrument(skip_all, fields(reference = %reference))]
    pub fn resolve_type(&self, reference: &SchemaRef) -> Result<Arc<Type>> {
        let name = self.definition_name(reference)?;

        let slot = self.slot(name);
        let mut slot = lock(&slot);

        if let Some(ty) = slot.as_ref() {
            return Ok(ty.clone());
        }

        let mut synthesizer = Synthesizer::new(self);
        let synthesized = synthesizer.definition(name)?;
        let ty = Arc::new(synthesized.ty);
        *slot = Some(ty.clone());
        drop(slot);

        self.synthesis_count.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(definition = name, "synthesized type");

        self.publish(synthesizer.completed);
        Ok(ty)
    }

    /// Number of references synthesized so far. Cache hits are not counted.
    pub fn synthesis_count(&self) -> usize {
        self.synthesis_count.load(Ordering::Relaxed)
    }

    fn definition_name<'a>(&'a self, reference: &'a SchemaRef) -> Result<&'a str> {
        match reference {
            SchemaRef::Definition(name) => {
                ensure!(
                    self.document.definitions.contains_key(name),
                    DefinitionNotFoundSnafu { definition: name }
                );
                Ok(name.as_str())
            }
            SchemaRef::GroupVersionKind(gvk) => self
                .gvk_index
                .get(gvk)
                .map(String::as_str)
                .context(UnknownGroupVersionKindSnafu {
                    group: &gvk.group,
                    version: &gvk.version,
                    kind: &gvk.kind,
                }),
        }
    }

    fn slot(&self, name: &str) -> CacheSlot {
        lock(&self.cache).entry(name.to_owned()).or_default().clone()
    }

    /// Returns the cached type of `name`, without waiting for a synthesis in progress.
    fn cached(&self, name: &str) -> Option<Arc<Type>> {
        let slot = lock(&self.cache).get(name)?.clone();
        try_lock(&slot)?.clone()
    }

    /// Caches the definitions completed while synthesizing another one.
    ///
    /// Slots which are filled already or locked by a concurrent synthesis are
    /// left alone, no slot lock is waited for here.
    fn publish(&self, completed: HashMap<&str, Type>) {
        for (name, ty) in completed {
            let slot = self.slot(name);
            match try_lock(&slot) {
                Some(mut slot) if slot.is_none() => {
                    *slot = Some(Arc::new(ty));
                    tracing::debug!(definition = name, "cached referenced definition");
                }
                _ => {}
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn try_lock<T>(mutex: &Mutex<T>) -> Option<MutexGuard<'_, T>> {
    match mutex.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}

struct Synthesized {
    ty: Type,

    /// Whether a self-reference placeholder was substituted somewhere below.
    /// Such types depend on where the synthesis started and are not memoized.
    cyclic: bool,
}

impl Synthesized {
    fn complete(ty: Type) -> Self {
        Self { ty, cyclic: false }
    }

    fn map(self, f: impl FnOnce(Type) -> Type) -> Self {
        Self {
            ty: f(self.ty),
            cyclic: self.cyclic,
        }
    }
}

/// State of a single resolution: the definitions currently being synthesized
/// and the ones finished along the way.
struct Synthesizer<'a> {
    foundry: &'a Foundry,
    definitions: &'a BTreeMap<String, SchemaObject>,
    stack: Vec<&'a str>,
    completed: HashMap<&'a str, Type>,
}

impl<'a> Synthesizer<'a> {
    fn new(foundry: &'a Foundry) -> Self {
        Self {
            foundry,
            definitions: &foundry.document.definitions,
            stack: Vec::new(),
            completed: HashMap::new(),
        }
    }

    fn definition(&mut self, name: &str) -> Result<Synthesized> {
        let definitions = self.definitions;
        let (name, schema) = definitions
            .get_key_value(name)
            .context(DefinitionNotFoundSnafu { definition: name })?;
        let name = name.as_str();

        if let Some(ty) = self.completed.get(name) {
            return Ok(Synthesized::complete(ty.clone()));
        }

        if self.stack.contains(&name) {
            tracing::debug!(
                definition = name,
                "definition refers to itself, substituting the dynamic type"
            );
            return Ok(Synthesized {
                ty: Type::DYNAMIC,
                cyclic: true,
            });
        }

        if let Some(ty) = self.foundry.cached(name) {
            return Ok(Synthesized::complete((*ty).clone()));
        }

        ensure!(
            self.stack.len() < MAX_REFERENCE_DEPTH,
            MaxDepthExceededSnafu {
                definition: name,
                max_depth: MAX_REFERENCE_DEPTH,
            }
        );

        if STRING_DEFINITION_SUFFIXES
            .iter()
            .any(|suffix| name.ends_with(suffix))
        {
            return Ok(Synthesized::complete(Type::STRING));
        }

        self.stack.push(name);
        let synthesized = self.schema(schema);
        self.stack.pop();

        let synthesized = synthesized?;
        if !synthesized.cyclic {
            self.completed.insert(name, synthesized.ty.clone());
        }
        Ok(synthesized)
    }

    fn schema(&mut self, schema: &'a SchemaObject) -> Result<Synthesized> {
        if let Some(reference) = &schema.reference {
            let name = reference
                .strip_prefix(DEFINITIONS_PREFIX)
                .context(UnsupportedReferenceSnafu { reference })?;
            return self.definition(name);
        }

        if schema.int_or_string || schema.format.as_deref() == Some("int-or-string") {
            return Ok(Synthesized::complete(Type::STRING));
        }

        if schema.preserve_unknown_fields {
            return Ok(Synthesized::complete(Type::DYNAMIC));
        }

        let synthesized = match schema.schema_type.as_deref() {
            Some("string") => Synthesized::complete(Type::STRING),
            Some("integer" | "number") => Synthesized::complete(Type::NUMBER),
            Some("boolean") => Synthesized::complete(Type::BOOL),
            Some("array") => match &schema.items {
                Some(items) => self.schema(items)?.map(Type::list),
                None => Synthesized::complete(Type::list(Type::DYNAMIC)),
            },
            Some("object") | None if !schema.properties.is_empty() => {
                let mut cyclic = false;
                let mut attributes = BTreeMap::new();
                for (name, property) in &schema.properties {
                    let property = self.schema(property)?;
                    cyclic |= property.cyclic;
                    attributes.insert(name.clone(), property.ty);
                }
                Synthesized {
                    ty: Type::Object(attributes),
                    cyclic,
                }
            }
            Some("object") | None => match &schema.additional_properties {
                Some(AdditionalProperties::Schema(values)) => self.schema(values)?.map(Type::map),
                Some(AdditionalProperties::Allowed(true)) => {
                    Synthesized::complete(Type::map(Type::DYNAMIC))
                }
                Some(AdditionalProperties::Allowed(false)) | None => {
                    Synthesized::complete(Type::DYNAMIC)
                }
            },
            Some(schema_type) => {
                return UnsupportedSchemaTypeSnafu {
                    definition: self.stack.last().copied().unwrap_or_default(),
                    schema_type,
                }
                .fail();
            }
        };

        Ok(synthesized)
    }
}
