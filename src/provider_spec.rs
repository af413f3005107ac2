//! Declarative device description and credential bundle.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// API version written into provider specs produced by this crate.
pub const API_VERSION: &str = "mcm.gardener.cloud/v1alpha1";

/// Secret key holding the Equinix Metal API token.
pub const API_KEY: &str = "apiToken";

/// Fallback secret key accepted when [`API_KEY`] is absent.
pub const ALTERNATE_API_KEY: &str = "alternateApiToken";

/// Secret key holding the cloud-init payload for new devices.
pub const USER_DATA_KEY: &str = "userData";

/// Substring identifying the cluster ownership tag.
pub const CLUSTER_TAG_MARKER: &str = "kubernetes.io/cluster/";

/// Substring identifying the node role ownership tag.
pub const ROLE_TAG_MARKER: &str = "kubernetes.io/role/";

/// Equinix Metal specific part of a machine class.
///
/// Placement is driven by `metro`. The `facility` list belongs to the older
/// facility-based schema; it is carried through migration but never sent to
/// the device API.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ProviderSpec {
    /// Schema version, informational only.
    #[serde(rename = "apiVersion", default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    /// Deprecated facility codes.
    #[serde(rename = "facility", default, skip_serializing_if = "Vec::is_empty")]
    pub facilities: Vec<String>,
    /// Metro code the device is placed in (for example `ny`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub metro: String,
    /// Hardware plan (for example `c3.small.x86`).
    #[serde(rename = "machineType", default)]
    pub machine_type: String,
    /// Billing cycle such as `hourly`.
    #[serde(rename = "billingCycle", default)]
    pub billing_cycle: String,
    /// Operating system slug.
    #[serde(rename = "OS", default)]
    pub os: String,
    /// Project that owns the devices.
    #[serde(rename = "projectID", default)]
    pub project_id: String,
    /// Free-form device tags, including the ownership markers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Project SSH key identifiers installed on the device.
    #[serde(rename = "sshKeys", default, skip_serializing_if = "Vec::is_empty")]
    pub ssh_keys: Vec<String>,
    /// Raw user data embedded in the class itself.
    #[serde(rename = "userdata", default, skip_serializing_if = "String::is_empty")]
    pub user_data: String,
    /// Hardware reservations to try, in priority order.
    #[serde(rename = "reservationIDs", default, skip_serializing_if = "Vec::is_empty")]
    pub reservation_ids: Vec<String>,
    /// Refuse on-demand capacity when no reservation can be used.
    #[serde(rename = "reservedDevicesOnly", default)]
    pub reserved_devices_only: bool,
    /// Custom iPXE script URL for `custom_ipxe` images.
    #[serde(rename = "ipxeScriptUrl", default, skip_serializing_if = "String::is_empty")]
    pub ipxe_script_url: String,
}

/// Ownership markers extracted from a tag list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OwnershipTags {
    /// Tag containing [`CLUSTER_TAG_MARKER`].
    pub cluster: String,
    /// Tag containing [`ROLE_TAG_MARKER`].
    pub role: String,
}

impl OwnershipTags {
    /// Returns `true` when `tags` carries both markers verbatim.
    #[must_use]
    pub fn matches(&self, tags: &[String]) -> bool {
        tags.contains(&self.cluster) && tags.contains(&self.role)
    }
}

impl ProviderSpec {
    /// Scans the tags for the cluster and role markers.
    ///
    /// When several tags carry the same marker the last one wins.
    #[must_use]
    pub fn ownership_tags(&self) -> Option<OwnershipTags> {
        let mut cluster = None;
        let mut role = None;
        for tag in &self.tags {
            if tag.contains(CLUSTER_TAG_MARKER) {
                cluster = Some(tag);
            } else if tag.contains(ROLE_TAG_MARKER) {
                role = Some(tag);
            }
        }
        Some(OwnershipTags {
            cluster: cluster?.clone(),
            role: role?.clone(),
        })
    }
}

/// Credentials bundle supplied with every request.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Secret {
    data: BTreeMap<String, Vec<u8>>,
}

impl Secret {
    /// Creates an empty secret.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a value.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Returns the raw bytes stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.data.get(key).map(Vec::as_slice)
    }

    /// Returns `true` when `key` is present with a non-empty value.
    #[must_use]
    pub fn has_value(&self, key: &str) -> bool {
        self.get(key).is_some_and(|value| !value.is_empty())
    }

    /// Returns the trimmed API token, preferring [`API_KEY`] over
    /// [`ALTERNATE_API_KEY`]. A key whose value is blank once trimmed is
    /// skipped.
    #[must_use]
    pub fn api_token(&self) -> String {
        [API_KEY, ALTERNATE_API_KEY]
            .into_iter()
            .filter_map(|key| self.get(key))
            .map(|value| String::from_utf8_lossy(value).trim().to_owned())
            .find(|token| !token.is_empty())
            .unwrap_or_default()
    }

    /// Returns the cloud-init payload verbatim.
    #[must_use]
    pub fn user_data(&self) -> Option<String> {
        self.get(USER_DATA_KEY)
            .map(|value| String::from_utf8_lossy(value).into_owned())
    }
}

impl<K, V> FromIterator<(K, V)> for Secret
where
    K: Into<String>,
    V: Into<Vec<u8>>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            data: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}
