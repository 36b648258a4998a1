//! Structural and scope checks of `kubernetes_manifest` configurations.
//!
//! Checks accumulate: every violation found is reported as its own
//! [`Diagnostic`], instead of stopping at the first one.

use std::{borrow::Cow, collections::BTreeMap};

use manifest_morph::{AttributePath, Payload, Value, infer_from_json};

use crate::{diagnostics::Diagnostic, resolver::ResourceTypeDescriptor};

/// Top-level keys every manifest must declare.
pub const REQUIRED_KEYS: [&str; 3] = ["apiVersion", "kind", "metadata"];

/// Top-level keys which are owned by the API server and may not be declared.
pub const FORBIDDEN_KEYS: [&str; 1] = ["status"];

/// Checks the top-level keys of `manifest`, which is located at `path` in the configuration.
///
/// A manifest that is not known yet, or whose checked keys are not known yet,
/// is not validated at all and produces no diagnostics. The check is repeated
/// once the values are known.
pub fn validate_manifest_keys(manifest: &Value, path: &AttributePath) -> Vec<Diagnostic> {
    if manifest.is_unknown() {
        tracing::debug!(%path, "manifest is not known yet, deferring validation");
        return Vec::new();
    }

    let manifest = normalize_manifest(manifest);
    let empty = BTreeMap::new();
    let attributes = match manifest.attributes() {
        Some(attributes) => attributes,
        None if manifest.is_null() => &empty,
        None => {
            return vec![
                Diagnostic::error(
                    r#"Failed to extract "manifest" attribute value from resource configuration"#,
                    format!("expected an object, found {}", manifest.ty()),
                )
                .with_attribute(path.clone()),
            ];
        }
    };

    let unknown_key = REQUIRED_KEYS
        .iter()
        .chain(&FORBIDDEN_KEYS)
        .find(|key| attributes.get(**key).is_some_and(Value::is_unknown));
    if let Some(key) = unknown_key {
        tracing::debug!(%path, key, "manifest key is not known yet, deferring validation");
        return Vec::new();
    }

    let is_set = |key: &str| attributes.get(key).is_some_and(|value| !value.is_null());
    let mut diagnostics = Vec::new();

    for key in REQUIRED_KEYS.into_iter().filter(|key| !is_set(key)) {
        diagnostics.push(
            Diagnostic::error(
                r#"Attribute key missing from "manifest" value"#,
                format!("'{key}' attribute key is missing from manifest configuration"),
            )
            .with_attribute(path.with_attribute_name(key)),
        );
    }

    for key in FORBIDDEN_KEYS.into_iter().filter(|key| is_set(key)) {
        diagnostics.push(
            Diagnostic::error(
                r#"Forbidden attribute key in "manifest" value"#,
                format!("'{key}' attribute key is not allowed in manifest configuration"),
            )
            .with_attribute(path.with_attribute_name(key)),
        );
    }

    diagnostics
}

/// Checks that `manifest` declares a namespace exactly when its resource type is namespaced.
pub fn validate_scope(descriptor: &ResourceTypeDescriptor, manifest: &Value) -> Option<Diagnostic> {
    let manifest = normalize_manifest(manifest);
    let namespace_path = AttributePath::new()
        .with_attribute_name("metadata")
        .with_attribute_name("namespace");
    let walk = manifest.walk(&namespace_path);
    let reached = walk.remaining.is_empty();

    // Scope can not be judged on values the host has not computed yet
    if walk.value.is_unknown() {
        return None;
    }

    if descriptor.namespaced {
        let detail = if !reached {
            format!("Resources of type '{descriptor}' require a namespace")
        } else if walk.value.is_null() {
            format!("Namespace for resource '{descriptor}' cannot be nil")
        } else if walk.value.as_str() == Some("") {
            format!("Namespace for resource '{descriptor}' cannot be empty")
        } else {
            return None;
        };
        Some(Diagnostic::error("Namespace required", detail))
    } else if reached && !walk.value.is_null() {
        Some(Diagnostic::error(
            "Cluster level resource cannot take namespace",
            format!("Resources of type '{descriptor}' cannot have a namespace"),
        ))
    } else {
        None
    }
}

/// Manifests may arrive as opaque JSON at a dynamic position, those are
/// expanded into a value tree so they can be walked.
pub(crate) fn normalize_manifest(manifest: &Value) -> Cow<'_, Value> {
    match manifest.payload() {
        Some(Payload::Dynamic(json)) => Cow::Owned(infer_from_json(json)),
        _ => Cow::Borrowed(manifest),
    }
}

#[cfg(test)]
mod tests {
    use manifest_morph::Type;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn manifest_path() -> AttributePath {
        AttributePath::new().with_attribute_name("manifest")
    }

    fn descriptor(namespaced: bool) -> ResourceTypeDescriptor {
        ResourceTypeDescriptor {
            group: String::new(),
            version: "v1".to_owned(),
            resource: "configmaps".to_owned(),
            kind: "ConfigMap".to_owned(),
            namespaced,
        }
    }

    #[test]
    fn complete_manifest() {
        let manifest = infer_from_json(&json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": "test" },
        }));
        assert!(validate_manifest_keys(&manifest, &manifest_path()).is_empty());
    }

    #[test]
    fn every_violation_is_reported() {
        let manifest = infer_from_json(&json!({
            "apiVersion": "v1",
            "status": {},
        }));

        let diagnostics = validate_manifest_keys(&manifest, &manifest_path());
        let paths: Vec<_> = diagnostics
            .iter()
            .filter_map(|diagnostic| diagnostic.attribute.as_ref())
            .map(ToString::to_string)
            .collect();

        assert_eq!(
            paths,
            ["manifest.kind", "manifest.metadata", "manifest.status"]
        );
        assert_eq!(
            diagnostics[0].detail,
            "'kind' attribute key is missing from manifest configuration"
        );
        assert_eq!(
            diagnostics[2].detail,
            "'status' attribute key is not allowed in manifest configuration"
        );
    }

    #[test]
    fn null_keys_are_absent() {
        let manifest = infer_from_json(&json!({
            "apiVersion": "v1",
            "kind": null,
            "metadata": {},
            "status": null,
        }));

        let diagnostics = validate_manifest_keys(&manifest, &manifest_path());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some(manifest_path().with_attribute_name("kind"))
        );
    }

    #[rstest]
    #[case::unknown_manifest(Value::unknown(Type::DYNAMIC))]
    #[case::unknown_metadata(Value::object([
        ("apiVersion", Value::string("v1")),
        ("kind", Value::string("ConfigMap")),
        ("metadata", Value::unknown(Type::DYNAMIC)),
    ]))]
    #[case::unknown_status(Value::object([
        ("status", Value::unknown(Type::DYNAMIC)),
    ]))]
    fn deferred(#[case] manifest: Value) {
        assert!(validate_manifest_keys(&manifest, &manifest_path()).is_empty());
    }

    #[test]
    fn dynamic_manifest_is_expanded() {
        let manifest = Value::dynamic(json!({ "kind": "ConfigMap", "metadata": {} }));

        let diagnostics = validate_manifest_keys(&manifest, &manifest_path());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].detail,
            "'apiVersion' attribute key is missing from manifest configuration"
        );
    }

    #[test]
    fn manifest_is_not_an_object() {
        let diagnostics = validate_manifest_keys(&Value::string("kind: ConfigMap"), &manifest_path());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].summary,
            r#"Failed to extract "manifest" attribute value from resource configuration"#
        );
        assert_eq!(diagnostics[0].attribute, Some(manifest_path()));
    }

    #[rstest]
    #[case::missing_metadata(json!({}), "Resources of type 'v1/ConfigMap' require a namespace")]
    #[case::missing_namespace(json!({ "metadata": { "name": "test" } }), "Resources of type 'v1/ConfigMap' require a namespace")]
    #[case::null_namespace(json!({ "metadata": { "namespace": null } }), "Namespace for resource 'v1/ConfigMap' cannot be nil")]
    #[case::empty_namespace(json!({ "metadata": { "namespace": "" } }), "Namespace for resource 'v1/ConfigMap' cannot be empty")]
    fn namespace_required(#[case] manifest: serde_json::Value, #[case] detail: &str) {
        let diagnostic = validate_scope(&descriptor(true), &infer_from_json(&manifest))
            .expect("namespace is required");

        assert_eq!(diagnostic.summary, "Namespace required");
        assert_eq!(diagnostic.detail, detail);
    }

    #[test]
    fn namespace_present() {
        let manifest = infer_from_json(&json!({ "metadata": { "namespace": "default" } }));
        assert_eq!(validate_scope(&descriptor(true), &manifest), None);
    }

    #[test]
    fn unknown_namespace() {
        let manifest = Value::object([(
            "metadata",
            Value::object([("namespace", Value::unknown(Type::STRING))]),
        )]);
        assert_eq!(validate_scope(&descriptor(true), &manifest), None);

        let manifest = Value::object([("metadata", Value::unknown(Type::DYNAMIC))]);
        assert_eq!(validate_scope(&descriptor(true), &manifest), None);
    }

    #[rstest]
    #[case::namespace(json!({ "metadata": { "namespace": "default" } }), true)]
    #[case::empty_namespace(json!({ "metadata": { "namespace": "" } }), true)]
    #[case::null_namespace(json!({ "metadata": { "namespace": null } }), false)]
    #[case::no_namespace(json!({ "metadata": { "name": "test" } }), false)]
    fn cluster_scoped(#[case] manifest: serde_json::Value, #[case] rejected: bool) {
        let diagnostic = validate_scope(&descriptor(false), &infer_from_json(&manifest));

        assert_eq!(diagnostic.is_some(), rejected);
        if let Some(diagnostic) = diagnostic {
            assert_eq!(
                diagnostic.detail,
                "Resources of type 'v1/ConfigMap' cannot have a namespace"
            );
        }
    }
}
