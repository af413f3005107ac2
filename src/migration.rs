//! Conversion of deprecated `PacketMachineClass` objects into machine classes.

use crate::codes::MachineError;
use crate::driver::{MachineClass, PacketMachineClass};
use crate::provider::PROVIDER_EQUINIX_METAL;
use crate::provider_spec::{API_VERSION, ProviderSpec};

/// Copies everything `packet` describes into `machine_class`.
///
/// Metadata, secret references, and the provider name are overwritten; the
/// provider spec is rebuilt from the deprecated spec and stored as JSON.
///
/// # Errors
///
/// Returns an `Internal` [`MachineError`] when the provider spec cannot be
/// serialised.
pub fn fill_up_machine_class(
    packet: &PacketMachineClass,
    machine_class: &mut MachineClass,
) -> Result<(), MachineError> {
    let spec = &packet.spec;
    let provider_spec = ProviderSpec {
        api_version: API_VERSION.to_owned(),
        facilities: spec.facility.clone(),
        machine_type: spec.machine_type.clone(),
        billing_cycle: spec.billing_cycle.clone(),
        os: spec.os.clone(),
        project_id: spec.project_id.clone(),
        tags: spec.tags.clone(),
        ssh_keys: spec.ssh_keys.clone(),
        user_data: spec.user_data.clone(),
        ..ProviderSpec::default()
    };

    machine_class.provider_spec = serde_json::to_value(&provider_spec)
        .map_err(|err| MachineError::internal(err.to_string()))?;
    machine_class.name.clone_from(&packet.name);
    machine_class.labels.clone_from(&packet.labels);
    machine_class.annotations.clone_from(&packet.annotations);
    machine_class.finalizers.clone_from(&packet.finalizers);
    machine_class.secret_ref.clone_from(&spec.secret_ref);
    machine_class
        .credentials_secret_ref
        .clone_from(&spec.credentials_secret_ref);
    PROVIDER_EQUINIX_METAL.clone_into(&mut machine_class.provider);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::driver::{PacketMachineClassSpec, SecretReference};
    use rstest::{fixture, rstest};

    fn pairs() -> BTreeMap<String, String> {
        BTreeMap::from([
            (String::from("key1"), String::from("value1")),
            (String::from("key2"), String::from("value2")),
        ])
    }

    #[fixture]
    fn packet_class() -> PacketMachineClass {
        PacketMachineClass {
            name: String::from("test-mc"),
            labels: pairs(),
            annotations: pairs(),
            finalizers: vec![String::from("mcm/finalizer")],
            spec: PacketMachineClassSpec {
                facility: vec![String::from("ewr1")],
                machine_type: String::from("c3.medium.x86"),
                billing_cycle: String::from("hourly"),
                os: String::from("ubuntu_2004"),
                project_id: String::from("abcdefg"),
                tags: vec![String::from("key1: value1"), String::from("key2: value2")],
                ssh_keys: Vec::new(),
                user_data: String::from("dummy-user-data"),
                secret_ref: Some(SecretReference::new("test-secret", "test-namespace")),
                credentials_secret_ref: Some(SecretReference::new(
                    "test-credentials",
                    "test-namespace",
                )),
            },
        }
    }

    #[rstest]
    fn copies_metadata_and_refs(packet_class: PacketMachineClass) {
        let mut class = MachineClass::default();
        fill_up_machine_class(&packet_class, &mut class).expect("migration succeeds");

        assert_eq!(class.name, "test-mc");
        assert_eq!(class.labels, pairs());
        assert_eq!(class.annotations, pairs());
        assert_eq!(class.finalizers, vec![String::from("mcm/finalizer")]);
        assert_eq!(class.provider, PROVIDER_EQUINIX_METAL);
        assert_eq!(class.secret_ref, packet_class.spec.secret_ref);
        assert_eq!(
            class.credentials_secret_ref,
            packet_class.spec.credentials_secret_ref
        );
    }

    #[rstest]
    fn rebuilds_provider_spec(packet_class: PacketMachineClass) {
        let mut class = MachineClass::default();
        fill_up_machine_class(&packet_class, &mut class).expect("migration succeeds");

        let spec: ProviderSpec =
            serde_json::from_value(class.provider_spec).expect("provider spec decodes");
        assert_eq!(
            spec,
            ProviderSpec {
                api_version: String::from(API_VERSION),
                facilities: vec![String::from("ewr1")],
                machine_type: String::from("c3.medium.x86"),
                billing_cycle: String::from("hourly"),
                os: String::from("ubuntu_2004"),
                project_id: String::from("abcdefg"),
                tags: vec![String::from("key1: value1"), String::from("key2: value2")],
                user_data: String::from("dummy-user-data"),
                ..ProviderSpec::default()
            }
        );
    }

    #[rstest]
    fn overwrites_previous_contents(packet_class: PacketMachineClass) {
        let mut class = MachineClass {
            name: String::from("stale"),
            provider: String::from("AWS"),
            finalizers: vec![String::from("other")],
            ..MachineClass::default()
        };
        fill_up_machine_class(&packet_class, &mut class).expect("migration succeeds");
        assert_eq!(class.name, "test-mc");
        assert_eq!(class.provider, PROVIDER_EQUINIX_METAL);
        assert_eq!(class.finalizers, vec![String::from("mcm/finalizer")]);
    }
}
