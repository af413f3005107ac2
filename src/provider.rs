//! Lifecycle mapper translating machine requests into device API calls.
//!
//! Every operation validates its inputs before opening a session, opens a
//! fresh session from the request's secret, and classifies backend failures
//! into [`MachineError`] codes.

use serde::Deserialize;
use tracing::{debug, error, info};

use crate::codes::MachineError;
use crate::device::{DeviceCreateRequest, DeviceService, SessionProvider};
use crate::driver::{
    ClassKind, CreateMachineRequest, CreateMachineResponse, DeleteMachineRequest,
    DeleteMachineResponse, GenerateMachineClassForMigrationRequest, GetMachineStatusRequest,
    GetMachineStatusResponse, GetVolumeIdsRequest, GetVolumeIdsResponse, ListMachinesRequest,
    ListMachinesResponse, MachineClass, ProviderSpecificMachineClass,
};
use crate::migration::fill_up_machine_class;
use crate::provider_id;
use crate::provider_spec::{ProviderSpec, Secret};
use crate::reservation::create_with_reservations;
use crate::validation::{
    FieldPath, SecretField, aggregate, validate_name, validate_provider_spec, validate_secret,
};

/// Provider name accepted in machine classes.
pub const PROVIDER_EQUINIX_METAL: &str = "EquinixMetal";

/// Kind of the deprecated machine class that can be migrated.
pub const PACKET_MACHINE_CLASS_KIND: &str = "PacketMachineClass";

const API_KEY_ONLY: [SecretField; 1] = [SecretField::ApiKey];

/// Equinix Metal machine provider.
#[derive(Clone, Debug)]
pub struct Provider<S> {
    sessions: S,
}

impl<S> Provider<S>
where
    S: SessionProvider,
{
    /// Creates a provider that opens sessions through `sessions`.
    #[must_use]
    pub const fn new(sessions: S) -> Self {
        Self { sessions }
    }

    /// Creates a device for `request.machine`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a foreign provider, an invalid spec,
    /// secret, or machine name; `Internal` when the provider spec cannot be decoded or
    /// no session can be opened; `Unavailable` when the backend cannot
    /// provide a device.
    pub async fn create_machine(
        &self,
        request: &CreateMachineRequest,
    ) -> Result<CreateMachineResponse, MachineError> {
        let name = &request.machine.name;
        info!(machine = %name, "machine creation request received");

        check_provider(&request.machine_class)?;
        let spec = decode_provider_spec(&request.machine_class, TagPolicy::Required)?;
        let secret = check_secret(request.secret.as_ref(), &[])?;
        check_name(name)?;

        let service = self.open_session(secret)?;
        let template = DeviceCreateRequest {
            hostname: name.clone(),
            plan: spec.machine_type.clone(),
            metro: spec.metro.clone(),
            billing_cycle: spec.billing_cycle.clone(),
            operating_system: spec.os.clone(),
            tags: spec.tags.clone(),
            project_ssh_keys: spec.ssh_keys.clone(),
            user_data: secret.user_data(),
            hardware_reservation_id: None,
            ipxe_script_url: Some(spec.ipxe_script_url.clone()).filter(|url| !url.is_empty()),
        };

        let device = create_with_reservations(
            &service,
            &spec.project_id,
            &template,
            &spec.reservation_ids,
            spec.reserved_devices_only,
        )
        .await
        .map_err(|err| {
            error!(machine = %name, error = %err, "could not create machine");
            MachineError::unavailable(format!("Could not create machine: {err}"))
        })?;

        let response = CreateMachineResponse {
            provider_id: provider_id::encode(&device),
            node_name: name.clone(),
            last_known_state: device.state,
        };
        info!(
            machine = %name,
            provider_id = %response.provider_id,
            "machine creation request processed"
        );
        Ok(response)
    }

    /// Deletes the device behind `request.machine.provider_id`.
    ///
    /// A device that no longer exists counts as deleted.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a foreign provider or a secret without
    /// an API key, `Internal` when no session can be opened, and `Unknown`
    /// for any other backend failure.
    pub async fn delete_machine(
        &self,
        request: &DeleteMachineRequest,
    ) -> Result<DeleteMachineResponse, MachineError> {
        info!(machine = %request.machine.name, "machine deletion request received");

        check_provider(&request.machine_class)?;
        let secret = check_secret(request.secret.as_ref(), &API_KEY_ONLY)?;
        let device_id = provider_id::decode(&request.machine.provider_id);
        let service = self.open_session(secret)?;

        match service.delete_device(device_id).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                info!(device_id, "no device matches the machine ID; treating as deleted");
            }
            Err(err) => {
                error!(device_id, error = %err, "could not terminate machine");
                return Err(MachineError::unknown(format!(
                    "Could not terminate machine {device_id}: {err}"
                )));
            }
        }

        info!(machine = %request.machine.name, "machine deletion request processed");
        Ok(DeleteMachineResponse::default())
    }

    /// Looks up the device behind `request.machine.provider_id`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a foreign provider or a secret without
    /// an API key, `Internal` when no session can be opened, and `NotFound`
    /// when the device cannot be fetched.
    pub async fn get_machine_status(
        &self,
        request: &GetMachineStatusRequest,
    ) -> Result<GetMachineStatusResponse, MachineError> {
        let name = &request.machine.name;
        info!(machine = %name, "machine status request received");

        check_provider(&request.machine_class)?;
        let secret = check_secret(request.secret.as_ref(), &API_KEY_ONLY)?;
        let device_id = provider_id::decode(&request.machine.provider_id);
        let service = self.open_session(secret)?;

        let device = service.get_device(device_id).await.map_err(|err| {
            MachineError::not_found(format!("Could not get device {device_id}: {err}"))
        })?;

        info!(machine = %name, state = %device.state, "machine status request processed");
        Ok(GetMachineStatusResponse {
            provider_id: provider_id::encode(&device),
            node_name: name.clone(),
        })
    }

    /// Lists the devices owned by `request.machine_class`, keyed by provider
    /// ID.
    ///
    /// Ownership is decided by the class's cluster and role tags. A class
    /// missing either tag owns nothing, and the backend is not consulted;
    /// the missing tags are not a validation failure here.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a foreign provider, an invalid spec, or
    /// a secret without an API key; `Internal` when the provider spec cannot be
    /// decoded or no session can be opened; `Unknown` when listing fails.
    pub async fn list_machines(
        &self,
        request: &ListMachinesRequest,
    ) -> Result<ListMachinesResponse, MachineError> {
        let class = &request.machine_class;
        info!(machine_class = %class.name, "list machines request received");

        check_provider(class)?;
        let spec = decode_provider_spec(class, TagPolicy::Optional)?;
        let secret = check_secret(request.secret.as_ref(), &API_KEY_ONLY)?;

        let Some(ownership) = spec.ownership_tags() else {
            debug!(machine_class = %class.name, "no ownership tags; nothing to list");
            return Ok(ListMachinesResponse::default());
        };

        let service = self.open_session(secret)?;
        let devices = service
            .list_project_devices(&spec.project_id)
            .await
            .map_err(|err| {
                let message = format!(
                    "Could not list devices for project {}: {err}",
                    spec.project_id
                );
                error!("{message}");
                MachineError::unknown(message)
            })?;

        let machine_list = devices
            .into_iter()
            .filter(|device| ownership.matches(&device.tags))
            .map(|device| (provider_id::encode(&device), device.hostname))
            .collect();

        info!(machine_class = %class.name, "list machines request processed");
        Ok(ListMachinesResponse { machine_list })
    }

    /// Equinix Metal has no provider-managed volumes.
    ///
    /// # Errors
    ///
    /// Always returns `Unimplemented`.
    pub fn get_volume_ids(
        &self,
        request: &GetVolumeIdsRequest,
    ) -> Result<GetVolumeIdsResponse, MachineError> {
        info!(volume_specs = ?request.volume_specs, "volume IDs request received");
        Err(MachineError::unimplemented(
            "Equinix Metal does not have storage",
        ))
    }

    /// Converts a deprecated `PacketMachineClass` into a machine class.
    ///
    /// Returns `request.machine_class` filled from the deprecated object.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when the class kind is not
    /// `PacketMachineClass`, `Unimplemented` when the object is not a
    /// deprecated class, and `Internal` when the provider spec cannot be
    /// serialised.
    pub fn generate_machine_class_for_migration(
        &self,
        request: GenerateMachineClassForMigrationRequest,
    ) -> Result<MachineClass, MachineError> {
        let GenerateMachineClassForMigrationRequest {
            provider_specific_machine_class,
            mut machine_class,
            class_spec,
        } = request;
        info!(class_spec = %class_spec, "machine class migration request received");

        if class_spec.kind != ClassKind::PacketMachineClass {
            return Err(MachineError::invalid_argument(format!(
                "Requested migration for kind '{}', we only support '{PACKET_MACHINE_CLASS_KIND}'",
                class_spec.kind
            )));
        }
        let ProviderSpecificMachineClass::Deprecated(packet) = provider_specific_machine_class
        else {
            return Err(MachineError::unimplemented(format!(
                "Migration of kind '{}' requires a {PACKET_MACHINE_CLASS_KIND} object",
                class_spec.kind
            )));
        };

        fill_up_machine_class(&packet, &mut machine_class)?;
        info!(machine_class = %machine_class.name, "machine class migration request processed");
        Ok(machine_class)
    }

    fn open_session(&self, secret: &Secret) -> Result<S::Service, MachineError> {
        self.sessions.new_session(secret).map_err(|err| {
            error!(error = %err, "could not open Equinix Metal session");
            MachineError::internal(format!("Could not open Equinix Metal session: {err}"))
        })
    }
}

fn check_provider(class: &MachineClass) -> Result<(), MachineError> {
    if class.provider == PROVIDER_EQUINIX_METAL {
        return Ok(());
    }
    Err(MachineError::invalid_argument(format!(
        "Requested for Provider '{}', we only support '{PROVIDER_EQUINIX_METAL}'",
        class.provider
    )))
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum TagPolicy {
    Required,
    Optional,
}

fn decode_provider_spec(
    class: &MachineClass,
    tags: TagPolicy,
) -> Result<ProviderSpec, MachineError> {
    let spec = ProviderSpec::deserialize(&class.provider_spec)
        .map_err(|err| MachineError::internal(err.to_string()))?;

    let mut errors = validate_provider_spec(&spec, &FieldPath::new("providerSpec"));
    if tags == TagPolicy::Optional {
        errors.retain(|err| !err.is_ownership_tag());
    }
    if errors.is_empty() {
        return Ok(spec);
    }
    let message = format!("Error while validating ProviderSpec {}", aggregate(&errors));
    debug!(machine_class = %class.name, "{message}");
    Err(MachineError::invalid_argument(message))
}

fn check_secret<'a>(
    secret: Option<&'a Secret>,
    fields: &[SecretField],
) -> Result<&'a Secret, MachineError> {
    let errors = validate_secret(secret, fields);
    match secret {
        Some(valid) if errors.is_empty() => Ok(valid),
        _ => {
            let message = format!("Error while validating Secret {}", aggregate(&errors));
            debug!("{message}");
            Err(MachineError::invalid_argument(message))
        }
    }
}

fn check_name(name: &str) -> Result<(), MachineError> {
    let errors = validate_name(name);
    if errors.is_empty() {
        return Ok(());
    }
    let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
    Err(MachineError::invalid_argument(messages.join("; ")))
}
