use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};

use async_trait::async_trait;
use manifest_morph::Type;
use manifest_openapi::{Foundry, SchemaDocumentSource, SchemaRef};

const DOCUMENT: &[u8] = include_bytes!("fixtures/openapi-v2.json");

struct StaticSource {
    fetches: AtomicUsize,
}

#[async_trait]
impl SchemaDocumentSource for StaticSource {
    async fn fetch_schema_document(&self) -> Result<Vec<u8>, manifest_openapi::FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(DOCUMENT.to_vec())
    }
}

fn object_meta() -> Type {
    Type::object([
        ("annotations", Type::map(Type::STRING)),
        ("creationTimestamp", Type::STRING),
        ("labels", Type::map(Type::STRING)),
        ("name", Type::STRING),
        ("namespace", Type::STRING),
        ("resourceVersion", Type::STRING),
        ("uid", Type::STRING),
    ])
}

#[tokio::test]
async fn fetch_and_resolve_config_map() {
    let source = StaticSource {
        fetches: AtomicUsize::new(0),
    };
    let foundry = Foundry::fetch(&source)
        .await
        .expect("fixture is a valid OpenAPI document");

    let ty = foundry
        .resolve_type(&SchemaRef::gvk("", "v1", "ConfigMap"))
        .expect("ConfigMap is served");

    assert_eq!(
        *ty,
        Type::object([
            ("apiVersion", Type::STRING),
            ("binaryData", Type::map(Type::STRING)),
            ("data", Type::map(Type::STRING)),
            ("immutable", Type::BOOL),
            ("kind", Type::STRING),
            ("metadata", object_meta()),
        ])
    );
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
}

#[test]
fn deployment_with_nested_references() {
    let foundry = Foundry::new(DOCUMENT).expect("fixture is a valid OpenAPI document");

    let ty = foundry
        .resolve_type(&SchemaRef::gvk("apps", "v1", "Deployment"))
        .expect("Deployment is served");

    let spec = Type::object([
        ("maxSurge", Type::STRING),
        (
            "ports",
            Type::list(Type::object([
                ("containerPort", Type::NUMBER),
                ("name", Type::STRING),
                ("protocol", Type::STRING),
            ])),
        ),
        ("replicas", Type::NUMBER),
        (
            "resources",
            Type::object([
                ("limits", Type::map(Type::STRING)),
                ("requests", Type::map(Type::STRING)),
            ]),
        ),
    ]);
    assert_eq!(
        *ty,
        Type::object([
            ("apiVersion", Type::STRING),
            ("kind", Type::STRING),
            ("metadata", object_meta()),
            ("spec", spec),
        ])
    );
}

#[test]
fn json_schema_props_terminates() {
    let foundry = Foundry::new(DOCUMENT).expect("fixture is a valid OpenAPI document");

    let ty = foundry
        .resolve_type(&SchemaRef::definition(
            "io.k8s.apiextensions-apiserver.pkg.apis.apiextensions.v1.JSONSchemaProps",
        ))
        .expect("self-referential definition resolves");

    assert_eq!(
        *ty,
        Type::object([
            ("description", Type::STRING),
            ("items", Type::DYNAMIC),
            ("properties", Type::map(Type::DYNAMIC)),
            ("type", Type::STRING),
            ("x-kubernetes-preserve-unknown-fields", Type::BOOL),
        ])
    );
}

#[test]
fn concurrent_resolution_synthesizes_once() {
    let foundry = Arc::new(Foundry::new(DOCUMENT).expect("fixture is a valid OpenAPI document"));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let foundry = foundry.clone();
            thread::spawn(move || {
                foundry
                    .resolve_type(&SchemaRef::gvk("", "v1", "Namespace"))
                    .expect("Namespace is served")
            })
        })
        .collect();

    let types: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("resolver thread does not panic"))
        .collect();

    assert!(types.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert_eq!(foundry.synthesis_count(), 1);

    foundry
        .resolve_type(&SchemaRef::definition("io.k8s.api.core.v1.Namespace"))
        .expect("definition name maps to the same cache entry");
    assert_eq!(foundry.synthesis_count(), 1);
}

#[test]
fn referenced_definitions_are_synthesized_once() {
    let foundry = Foundry::new(DOCUMENT).expect("fixture is a valid OpenAPI document");

    foundry
        .resolve_type(&SchemaRef::gvk("apps", "v1", "Deployment"))
        .expect("Deployment is served");
    assert_eq!(foundry.synthesis_count(), 1);

    let metadata = foundry
        .resolve_type(&SchemaRef::definition(
            "io.k8s.apimachinery.pkg.apis.meta.v1.ObjectMeta",
        ))
        .expect("ObjectMeta is defined");
    assert_eq!(*metadata, object_meta());
    assert_eq!(foundry.synthesis_count(), 1);

    // Only the ConfigMap itself is new, its metadata comes from the cache
    foundry
        .resolve_type(&SchemaRef::gvk("", "v1", "ConfigMap"))
        .expect("ConfigMap is served");
    assert_eq!(foundry.synthesis_count(), 2);
}
