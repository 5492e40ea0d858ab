//! # Build Sources
//!
//! Declared versions and the build-source descriptors they resolve to.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Concrete build source for a deployment
///
/// Compared field-by-field to decide whether a deployment must be recreated.
/// When used as `spec.sourceTemplate`, string fields may contain `{{version}}`
/// and `{{metadata.<key>}}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveSource {
    /// Location of the uploaded bundle (e.g., "s3://bucket/site-v1.tar.gz")
    pub url: String,
    /// Optional content checksum of the bundle (e.g., "sha256:ab12...")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Optional reference to a Kubernetes secret holding fetch credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_ref: Option<CredentialsRef>,
}

/// Reference to a secret holding archive credentials
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsRef {
    /// Secret name
    pub name: String,
    /// Key within the secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// A named release intent declared in the project manifest
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VersionSpec {
    /// Version name, unique within the project (RFC 1123 label)
    pub name: String,
    /// Explicit build source. When absent the project's `sourceTemplate` is rendered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ArchiveSource>,
    /// Free-form metadata, available to the source template as `{{metadata.<key>}}`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}
