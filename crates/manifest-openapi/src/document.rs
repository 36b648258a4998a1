use std::collections::BTreeMap;

use kube::core::GroupVersionKind;
use serde::Deserialize;

/// Prefix of local `$ref` pointers into [`SchemaDocument::definitions`].
pub const DEFINITIONS_PREFIX: &str = "#/definitions/";

/// The subset of a Swagger / OpenAPI v2 document needed to synthesize types.
#[derive(Debug, Default, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub definitions: BTreeMap<String, SchemaObject>,
}

/// A single schema node of the document.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaObject {
    #[serde(rename = "$ref")]
    pub reference: Option<String>,

    #[serde(rename = "type")]
    pub schema_type: Option<String>,

    pub format: Option<String>,

    #[serde(default)]
    pub properties: BTreeMap<String, SchemaObject>,

    pub additional_properties: Option<AdditionalProperties>,

    pub items: Option<Box<SchemaObject>>,

    /// The kinds a top-level definition is served as.
    #[serde(default, rename = "x-kubernetes-group-version-kind")]
    pub group_version_kinds: Vec<GroupVersionKind>,

    #[serde(default, rename = "x-kubernetes-preserve-unknown-fields")]
    pub preserve_unknown_fields: bool,

    #[serde(default, rename = "x-kubernetes-int-or-string")]
    pub int_or_string: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<SchemaObject>),
}
