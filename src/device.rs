//! Device service abstraction over the Equinix Metal device API.
//!
//! The lifecycle mapper only needs four calls against the provider, so this
//! module narrows the API to exactly those. [`crate::metal`] implements the
//! traits over HTTP; [`crate::test_support`] provides an in-memory double.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider_spec::Secret;

/// A provisioned device as reported by the backend.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Device {
    /// Backend-assigned identifier.
    pub id: String,
    /// Hostname given at creation.
    #[serde(default)]
    pub hostname: String,
    /// Device tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Facility the device landed in, when the backend reports one.
    #[serde(default)]
    pub facility: Option<Location>,
    /// Metro the device belongs to.
    #[serde(default)]
    pub metro: Option<Location>,
    /// Provisioning state (for example `active`).
    #[serde(default)]
    pub state: String,
    /// Billing cycle in effect.
    #[serde(default)]
    pub billing_cycle: Option<String>,
    /// Hardware reservation the device is bound to, if any.
    #[serde(default)]
    pub hardware_reservation: Option<Reference>,
    /// Creation timestamp as reported by the backend.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Last update timestamp as reported by the backend.
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Device {
    /// Returns the placement code used in provider IDs: the facility code,
    /// falling back to the metro code.
    #[must_use]
    pub fn location_code(&self) -> &str {
        self.facility
            .as_ref()
            .or(self.metro.as_ref())
            .map_or("", |location| location.code.as_str())
    }
}

/// Facility or metro reference.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Location {
    /// Short code such as `ewr1` or `ny`.
    #[serde(default)]
    pub code: String,
}

impl Location {
    /// Creates a location from its code.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

/// Reference to another API resource by identifier.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Reference {
    /// Identifier of the referenced resource.
    #[serde(default)]
    pub id: String,
    /// API path of the referenced resource.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub href: String,
}

/// Payload for creating a device in a metro.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct DeviceCreateRequest {
    /// Hostname for the device; the machine name.
    pub hostname: String,
    /// Hardware plan.
    pub plan: String,
    /// Metro to place the device in.
    pub metro: String,
    /// Billing cycle; omitted when empty.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub billing_cycle: String,
    /// Operating system slug.
    pub operating_system: String,
    /// Device tags.
    pub tags: Vec<String>,
    /// Project SSH keys to install.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub project_ssh_keys: Vec<String>,
    /// Cloud-init payload.
    #[serde(rename = "userdata", skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    /// Hardware reservation to bind to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware_reservation_id: Option<String>,
    /// Custom iPXE script URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipxe_script_url: Option<String>,
}

/// Errors raised by device services.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DeviceServiceError {
    /// The device (or project) does not exist.
    #[error("{status} {message}")]
    NotFound {
        /// HTTP status code reported by the backend.
        status: u16,
        /// Message returned by the backend.
        message: String,
    },
    /// The backend rejected the request.
    #[error("{status} {message}")]
    Api {
        /// HTTP status code reported by the backend.
        status: u16,
        /// Message returned by the backend.
        message: String,
    },
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),
    /// The response body could not be decoded.
    #[error("failed to decode {resource}: {message}")]
    Decode {
        /// Resource being decoded.
        resource: String,
        /// Decoder error message.
        message: String,
    },
}

impl DeviceServiceError {
    /// Returns `true` for [`DeviceServiceError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors raised while opening an authenticated session.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SessionError {
    /// The secret carried no usable API token.
    #[error("Equinix Metal api token required")]
    MissingToken,
    /// The HTTP client could not be constructed.
    #[error("failed to build http client: {0}")]
    Client(String),
}

/// Future returned by device service operations.
pub type ServiceFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, DeviceServiceError>> + Send + 'a>>;

/// Minimal device API used by the lifecycle mapper.
pub trait DeviceService: Send + Sync {
    /// Lists every device in a project.
    fn list_project_devices<'a>(&'a self, project_id: &'a str) -> ServiceFuture<'a, Vec<Device>>;

    /// Fetches a device, failing with [`DeviceServiceError::NotFound`] when
    /// it does not exist.
    fn get_device<'a>(&'a self, device_id: &'a str) -> ServiceFuture<'a, Device>;

    /// Creates a device in a project.
    fn create_device<'a>(
        &'a self,
        project_id: &'a str,
        request: &'a DeviceCreateRequest,
    ) -> ServiceFuture<'a, Device>;

    /// Deletes a device.
    fn delete_device<'a>(&'a self, device_id: &'a str) -> ServiceFuture<'a, ()>;
}

/// Opens a fresh authenticated [`DeviceService`] for each request.
///
/// Credentials differ per cluster, so sessions are never cached.
pub trait SessionProvider: Send + Sync {
    /// Concrete service returned for a session.
    type Service: DeviceService;

    /// Opens a session using the API token carried by `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MissingToken`] when the secret carries no
    /// token, or [`SessionError::Client`] when the transport cannot be built.
    fn new_session(&self, secret: &Secret) -> Result<Self::Service, SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_prefers_facility_over_metro() {
        let device = Device {
            id: String::from("000001"),
            facility: Some(Location::new("ewr1")),
            metro: Some(Location::new("ny")),
            ..Device::default()
        };
        assert_eq!(device.location_code(), "ewr1");

        let metro_only = Device {
            facility: None,
            ..device
        };
        assert_eq!(metro_only.location_code(), "ny");
    }

    #[test]
    fn create_request_omits_unset_optionals() {
        let request = DeviceCreateRequest {
            hostname: String::from("machine-0"),
            plan: String::from("c3.small.x86"),
            metro: String::from("ny"),
            operating_system: String::from("alpine_3.13"),
            ..DeviceCreateRequest::default()
        };
        let json = serde_json::to_value(&request).expect("request serialises");
        assert_eq!(json["hostname"], "machine-0");
        assert_eq!(json["operating_system"], "alpine_3.13");
        assert!(json.get("hardware_reservation_id").is_none());
        assert!(json.get("userdata").is_none());
        assert!(json.get("billing_cycle").is_none());
    }

    #[test]
    fn not_found_renders_status_and_message() {
        let err = DeviceServiceError::NotFound {
            status: 404,
            message: String::from("NOT FOUND"),
        };
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "404 NOT FOUND");
    }
}
