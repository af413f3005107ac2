//! Machine provider for Equinix Metal.
//!
//! The crate maps provider-agnostic machine requests (create, delete, status,
//! list) onto the Equinix Metal device API. [`Provider`] validates each
//! request, opens a per-request session through a [`SessionProvider`], and
//! classifies failures into [`MachineError`] codes. [`MetalSessionProvider`]
//! talks HTTP; [`test_support::InMemoryMetal`] stands in for it in tests.

pub mod codes;
pub mod config;
pub mod device;
pub mod driver;
pub mod metal;
pub mod migration;
pub mod provider;
pub mod provider_id;
pub mod provider_spec;
pub mod reservation;
pub mod test_support;
pub mod validation;

pub use codes::{Code, MachineError};
pub use config::{ConfigError, MetalConfig};
pub use device::{
    Device, DeviceCreateRequest, DeviceService, DeviceServiceError, ServiceFuture, SessionError,
    SessionProvider,
};
pub use driver::{
    ClassKind, ClassSpec, CreateMachineRequest, CreateMachineResponse, DeleteMachineRequest,
    DeleteMachineResponse, GenerateMachineClassForMigrationRequest, GetMachineStatusRequest,
    GetMachineStatusResponse, GetVolumeIdsRequest, GetVolumeIdsResponse, ListMachinesRequest,
    ListMachinesResponse, Machine, MachineClass, PacketMachineClass, PacketMachineClassSpec,
    ProviderSpecificMachineClass, SecretReference,
};
pub use metal::{MetalDeviceService, MetalSessionProvider};
pub use provider::{PACKET_MACHINE_CLASS_KIND, PROVIDER_EQUINIX_METAL, Provider};
pub use provider_spec::{ProviderSpec, Secret};
pub use reservation::ReservationError;
