//! Request and response types exchanged with the lifecycle controller.
//!
//! Each provider operation takes its own strongly typed request and answers
//! with its own response, so callers never inspect loosely typed envelopes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::provider_spec::Secret;

/// Reference to a credentials secret.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct SecretReference {
    /// Secret name.
    #[serde(default)]
    pub name: String,
    /// Namespace holding the secret.
    #[serde(default)]
    pub namespace: String,
}

impl SecretReference {
    /// Creates a reference to `namespace/name`.
    #[must_use]
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

/// Provider-agnostic machine class with an opaque provider spec.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineClass {
    /// Class name.
    #[serde(default)]
    pub name: String,
    /// Labels copied from the class metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Annotations copied from the class metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Finalizers copied from the class metadata.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,
    /// Provider spec as raw JSON; decoded into
    /// [`crate::provider_spec::ProviderSpec`] on every request.
    #[serde(default)]
    pub provider_spec: serde_json::Value,
    /// Secret holding the user data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretReference>,
    /// Secret holding the API credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_secret_ref: Option<SecretReference>,
    /// Provider name; must be `EquinixMetal` for this provider.
    #[serde(default)]
    pub provider: String,
}

/// Machine object the request is about.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    /// Machine name, used as the device hostname.
    pub name: String,
    /// Provider ID issued on creation; empty before the machine exists.
    #[serde(default)]
    pub provider_id: String,
}

impl Machine {
    /// Creates a machine that has not been provisioned yet.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider_id: String::new(),
        }
    }

    /// Attaches a previously issued provider ID.
    #[must_use]
    pub fn with_provider_id(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = provider_id.into();
        self
    }
}

/// Input to [`crate::Provider::create_machine`].
#[derive(Clone, Debug, PartialEq)]
pub struct CreateMachineRequest {
    /// Machine to create.
    pub machine: Machine,
    /// Class backing the machine.
    pub machine_class: MachineClass,
    /// Credentials and user data.
    pub secret: Option<Secret>,
}

/// Result of a successful create.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMachineResponse {
    /// Opaque provider ID of the new device.
    pub provider_id: String,
    /// Node name the device registers under.
    pub node_name: String,
    /// Last known provisioning state.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub last_known_state: String,
}

/// Input to [`crate::Provider::delete_machine`].
#[derive(Clone, Debug, PartialEq)]
pub struct DeleteMachineRequest {
    /// Machine to delete; its provider ID selects the device.
    pub machine: Machine,
    /// Class backing the machine.
    pub machine_class: MachineClass,
    /// Credentials.
    pub secret: Option<Secret>,
}

/// Result of a delete.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMachineResponse {
    /// Last known state, unused by this provider.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub last_known_state: String,
}

/// Input to [`crate::Provider::get_machine_status`].
#[derive(Clone, Debug, PartialEq)]
pub struct GetMachineStatusRequest {
    /// Machine to look up.
    pub machine: Machine,
    /// Class backing the machine.
    pub machine_class: MachineClass,
    /// Credentials.
    pub secret: Option<Secret>,
}

/// Status of an existing device.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMachineStatusResponse {
    /// Provider ID re-encoded from the fetched device.
    pub provider_id: String,
    /// Node name echoed from the request.
    pub node_name: String,
}

/// Input to [`crate::Provider::list_machines`].
#[derive(Clone, Debug, PartialEq)]
pub struct ListMachinesRequest {
    /// Class whose ownership tags select the devices.
    pub machine_class: MachineClass,
    /// Credentials.
    pub secret: Option<Secret>,
}

/// Devices owned by a machine class.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMachinesResponse {
    /// Provider ID to hostname.
    pub machine_list: BTreeMap<String, String>,
}

/// Input to [`crate::Provider::get_volume_ids`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct GetVolumeIdsRequest {
    /// Names of the persistent volume specs to resolve.
    pub volume_specs: Vec<String>,
}

/// Volume IDs resolved for a [`GetVolumeIdsRequest`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetVolumeIdsResponse {
    /// Provider volume IDs.
    pub volume_ids: Vec<String>,
}

/// Kind of machine class named in a migration request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ClassKind {
    /// The provider-agnostic `MachineClass`.
    MachineClass,
    /// The deprecated `PacketMachineClass`.
    PacketMachineClass,
    /// Any other kind.
    Other(String),
}

impl ClassKind {
    /// Parses a kind name.
    #[must_use]
    pub fn from_kind(kind: &str) -> Self {
        match kind {
            "MachineClass" => Self::MachineClass,
            "PacketMachineClass" => Self::PacketMachineClass,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Returns the kind name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::MachineClass => "MachineClass",
            Self::PacketMachineClass => "PacketMachineClass",
            Self::Other(kind) => kind,
        }
    }
}

impl fmt::Display for ClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Class details accompanying a migration request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClassSpec {
    /// API group of the source class.
    pub api_group: String,
    /// Kind of the source class.
    pub kind: ClassKind,
    /// Name of the source class.
    pub name: String,
}

impl fmt::Display for ClassSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} {}", self.api_group, self.kind, self.name)
    }
}

/// Spec of the deprecated `PacketMachineClass`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketMachineClassSpec {
    /// Facility codes.
    #[serde(default)]
    pub facility: Vec<String>,
    /// Hardware plan.
    #[serde(default)]
    pub machine_type: String,
    /// Billing cycle.
    #[serde(default)]
    pub billing_cycle: String,
    /// Operating system slug.
    #[serde(rename = "OS", default)]
    pub os: String,
    /// Owning project.
    #[serde(rename = "projectID", default)]
    pub project_id: String,
    /// Device tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Project SSH keys.
    #[serde(default)]
    pub ssh_keys: Vec<String>,
    /// Raw user data.
    #[serde(rename = "userdata", default)]
    pub user_data: String,
    /// Secret holding the user data.
    #[serde(default)]
    pub secret_ref: Option<SecretReference>,
    /// Secret holding the API credentials.
    #[serde(default)]
    pub credentials_secret_ref: Option<SecretReference>,
}

/// The deprecated provider-specific machine class.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PacketMachineClass {
    /// Class name.
    #[serde(default)]
    pub name: String,
    /// Labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Annotations.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Finalizers.
    #[serde(default)]
    pub finalizers: Vec<String>,
    /// Class spec.
    #[serde(default)]
    pub spec: PacketMachineClassSpec,
}

/// Source object of a migration.
#[derive(Clone, Debug, PartialEq)]
pub enum ProviderSpecificMachineClass {
    /// Already a provider-agnostic class.
    Current(MachineClass),
    /// The deprecated `PacketMachineClass`.
    Deprecated(PacketMachineClass),
}

/// Input to [`crate::Provider::generate_machine_class_for_migration`].
#[derive(Clone, Debug, PartialEq)]
pub struct GenerateMachineClassForMigrationRequest {
    /// Object to migrate from.
    pub provider_specific_machine_class: ProviderSpecificMachineClass,
    /// Class to fill in; fields not produced by migration are preserved.
    pub machine_class: MachineClass,
    /// Kind details for the source object.
    pub class_spec: ClassSpec,
}
