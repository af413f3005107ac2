//! Test support utilities shared across unit and integration tests.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Mutex;

use crate::device::{
    Device, DeviceCreateRequest, DeviceService, DeviceServiceError, Location, Reference,
    ServiceFuture, SessionError, SessionProvider,
};
use crate::provider_spec::Secret;

/// Facility assigned to devices created by [`InMemoryMetal`] by default.
pub const DEFAULT_FAKE_FACILITY: &str = "ewr1";

#[derive(Clone, Copy, Debug)]
enum FailureMode {
    Create,
    List,
    Delete,
}

impl FailureMode {
    const fn flag(self) -> u8 {
        match self {
            Self::Create => 0b001,
            Self::List => 0b010,
            Self::Delete => 0b100,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Failures(u8);

impl Failures {
    const fn set(&mut self, mode: FailureMode) {
        self.0 |= mode.flag();
    }

    const fn contains(self, mode: FailureMode) -> bool {
        self.0 & mode.flag() != 0
    }
}

#[derive(Clone, Debug)]
struct StoredDevice {
    project_id: String,
    device: Device,
}

#[derive(Debug)]
struct State {
    devices: Vec<StoredDevice>,
    next_id: u32,
    facility: String,
    rejected_reservations: BTreeSet<String>,
    create_attempts: Vec<DeviceCreateRequest>,
    failures: Failures,
}

impl Default for State {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            next_id: 0,
            facility: String::from(DEFAULT_FAKE_FACILITY),
            rejected_reservations: BTreeSet::new(),
            create_attempts: Vec::new(),
            failures: Failures::default(),
        }
    }
}

/// In-memory stand-in for the Equinix Metal device API.
///
/// Device IDs are a zero-padded sequence (`000001`, `000002`, ...). All
/// mutation happens under one lock, so concurrent creates never reuse an ID.
/// Missing devices answer `404 NOT FOUND` like the real API.
#[derive(Clone, Debug, Default)]
pub struct InMemoryMetal {
    state: Arc<Mutex<State>>,
    sessions_opened: Arc<AtomicUsize>,
}

impl InMemoryMetal {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a session without going through secret handling.
    #[must_use]
    pub fn service(&self) -> InMemoryDeviceService {
        InMemoryDeviceService {
            state: Arc::clone(&self.state),
        }
    }

    /// Sets the facility assigned to newly created devices.
    pub async fn set_facility(&self, facility: impl Into<String>) {
        self.state.lock().await.facility = facility.into();
    }

    /// Makes every create attempt using `reservation_id` fail.
    pub async fn reject_reservation(&self, reservation_id: impl Into<String>) {
        self.state
            .lock()
            .await
            .rejected_reservations
            .insert(reservation_id.into());
    }

    /// Makes every create attempt fail with a 503.
    pub async fn fail_create(&self) {
        self.state.lock().await.failures.set(FailureMode::Create);
    }

    /// Makes project listing fail with a 500.
    pub async fn fail_list(&self) {
        self.state.lock().await.failures.set(FailureMode::List);
    }

    /// Makes deletion fail with a 500.
    pub async fn fail_delete(&self) {
        self.state.lock().await.failures.set(FailureMode::Delete);
    }

    /// Seeds a device directly, bypassing create.
    pub async fn insert_device(&self, project_id: impl Into<String>, device: Device) {
        self.state.lock().await.devices.push(StoredDevice {
            project_id: project_id.into(),
            device,
        });
    }

    /// Returns a snapshot of all stored devices.
    pub async fn devices(&self) -> Vec<Device> {
        self.state
            .lock()
            .await
            .devices
            .iter()
            .map(|stored| stored.device.clone())
            .collect()
    }

    /// Returns every create request received, including rejected ones.
    pub async fn create_attempts(&self) -> Vec<DeviceCreateRequest> {
        self.state.lock().await.create_attempts.clone()
    }

    /// Returns how many sessions have been opened through
    /// [`SessionProvider::new_session`].
    #[must_use]
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }
}

impl SessionProvider for InMemoryMetal {
    type Service = InMemoryDeviceService;

    fn new_session(&self, secret: &Secret) -> Result<Self::Service, SessionError> {
        if secret.api_token().is_empty() {
            return Err(SessionError::MissingToken);
        }
        self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(self.service())
    }
}

/// Session handed out by [`InMemoryMetal`].
#[derive(Clone, Debug)]
pub struct InMemoryDeviceService {
    state: Arc<Mutex<State>>,
}

fn not_found() -> DeviceServiceError {
    DeviceServiceError::NotFound {
        status: 404,
        message: String::from("NOT FOUND"),
    }
}

impl DeviceService for InMemoryDeviceService {
    fn list_project_devices<'a>(&'a self, project_id: &'a str) -> ServiceFuture<'a, Vec<Device>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            if state.failures.contains(FailureMode::List) {
                return Err(DeviceServiceError::Api {
                    status: 500,
                    message: String::from("Internal Server Error"),
                });
            }
            Ok(state
                .devices
                .iter()
                .filter(|stored| stored.project_id == project_id)
                .map(|stored| stored.device.clone())
                .collect())
        })
    }

    fn get_device<'a>(&'a self, device_id: &'a str) -> ServiceFuture<'a, Device> {
        Box::pin(async move {
            self.state
                .lock()
                .await
                .devices
                .iter()
                .find(|stored| stored.device.id == device_id)
                .map(|stored| stored.device.clone())
                .ok_or_else(not_found)
        })
    }

    fn create_device<'a>(
        &'a self,
        project_id: &'a str,
        request: &'a DeviceCreateRequest,
    ) -> ServiceFuture<'a, Device> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.create_attempts.push(request.clone());

            if state.failures.contains(FailureMode::Create) {
                return Err(DeviceServiceError::Api {
                    status: 503,
                    message: String::from("Service Unavailable"),
                });
            }
            if let Some(reservation_id) = request.hardware_reservation_id.as_deref()
                && state.rejected_reservations.contains(reservation_id)
            {
                return Err(DeviceServiceError::Api {
                    status: 422,
                    message: format!("hardware reservation {reservation_id} is not available"),
                });
            }

            state.next_id += 1;
            let device = Device {
                id: format!("{:06}", state.next_id),
                hostname: request.hostname.clone(),
                tags: request.tags.clone(),
                facility: Some(Location::new(state.facility.clone())),
                metro: Some(Location::new(request.metro.clone())),
                state: String::from("queued"),
                billing_cycle: Some(request.billing_cycle.clone())
                    .filter(|cycle| !cycle.is_empty()),
                hardware_reservation: request.hardware_reservation_id.clone().map(|id| Reference {
                    id,
                    href: String::new(),
                }),
                created_at: None,
                updated_at: None,
            };
            state.devices.push(StoredDevice {
                project_id: project_id.to_owned(),
                device: device.clone(),
            });
            Ok(device)
        })
    }

    fn delete_device<'a>(&'a self, device_id: &'a str) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if state.failures.contains(FailureMode::Delete) {
                return Err(DeviceServiceError::Api {
                    status: 500,
                    message: String::from("Internal Server Error"),
                });
            }
            let before = state.devices.len();
            state.devices.retain(|stored| stored.device.id != device_id);
            if state.devices.len() == before {
                return Err(not_found());
            }
            Ok(())
        })
    }
}
