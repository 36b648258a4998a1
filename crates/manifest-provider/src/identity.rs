use std::fmt::Display;

use kube::core::GroupVersionKind;
use manifest_morph::{AttributePath, Value};
use snafu::{OptionExt, Snafu, ensure};

#[derive(Debug, PartialEq, Snafu)]
pub enum IdentityError {
    #[snafu(display("manifest attribute {field:?} is missing or null"))]
    MissingField { field: &'static str },

    #[snafu(display("manifest attribute {field:?} is not known yet"))]
    NotYetKnown { field: &'static str },

    #[snafu(display("invalid apiVersion {api_version:?}, expected the format (<GROUP>/)<VERSION>"))]
    InvalidApiVersion { api_version: String },
}

/// Identifies a Kubernetes object by the well-known attributes of its manifest.
///
/// The identity is never stored, it is extracted from a manifest whenever it
/// is needed.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ResourceIdentity {
    pub api_version: String,
    pub kind: String,
    pub name: Option<String>,
    pub namespace: Option<String>,
}

impl ResourceIdentity {
    pub fn from_manifest(manifest: &Value) -> Result<Self, IdentityError> {
        let api_version = required_string_at(manifest, "apiVersion")?;
        let kind = required_string_at(manifest, "kind")?;

        Ok(Self {
            api_version: api_version.to_owned(),
            kind: kind.to_owned(),
            name: string_at(manifest, &["metadata", "name"]).map(str::to_owned),
            namespace: string_at(manifest, &["metadata", "namespace"]).map(str::to_owned),
        })
    }

    /// Splits the apiVersion into its group (empty for the core group) and version.
    pub fn group_version(&self) -> Result<(&str, &str), IdentityError> {
        let (group, version) = match self.api_version.split_once('/') {
            Some((group, version)) => {
                ensure!(
                    !group.is_empty(),
                    InvalidApiVersionSnafu {
                        api_version: &self.api_version
                    }
                );
                (group, version)
            }
            None => ("", self.api_version.as_str()),
        };

        ensure!(
            !version.is_empty() && !version.contains('/'),
            InvalidApiVersionSnafu {
                api_version: &self.api_version
            }
        );
        Ok((group, version))
    }

    pub fn gvk(&self) -> Result<GroupVersionKind, IdentityError> {
        let (group, version) = self.group_version()?;
        Ok(GroupVersionKind::gvk(group, version, &self.kind))
    }
}

impl Display for ResourceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.api_version, self.kind)
    }
}

impl IdentityError {
    /// Whether the identity can be determined once the host knows all values.
    pub fn is_not_yet_known(&self) -> bool {
        matches!(self, Self::NotYetKnown { .. })
    }
}

fn required_string_at<'a>(
    manifest: &'a Value,
    field: &'static str,
) -> Result<&'a str, IdentityError> {
    let path = AttributePath::new().with_attribute_name(field);
    ensure!(
        !manifest.walk(&path).value.is_unknown(),
        NotYetKnownSnafu { field }
    );

    string_at(manifest, &[field]).context(MissingFieldSnafu { field })
}

fn string_at<'a>(manifest: &'a Value, names: &[&str]) -> Option<&'a str> {
    let path = names
        .iter()
        .fold(AttributePath::new(), |path, name| path.with_attribute_name(*name));
    let walk = manifest.walk(&path);

    if walk.remaining.is_empty() {
        walk.value.as_str()
    } else {
        None
    }
}
