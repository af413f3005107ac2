//! Reservation-aware device creation.
//!
//! Hardware reservations are tried in the order given. Unless the caller
//! insists on reserved capacity, a final on-demand create follows when every
//! reservation is rejected.

use thiserror::Error;
use tracing::debug;

use crate::device::{Device, DeviceCreateRequest, DeviceService, DeviceServiceError};

/// Errors returned by [`create_with_reservations`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ReservationError {
    /// Every reservation was rejected and on-demand fallback is disallowed.
    #[error(
        "could not get a device with the provided reservation IDs, and reservedOnly is true"
    )]
    NoReservationAvailable,
    /// The backend rejected the final create attempt.
    #[error(transparent)]
    Backend(#[from] DeviceServiceError),
}

/// Creates exactly one device, preferring the given hardware reservations.
///
/// `template` is never mutated; each attempt works on its own copy with the
/// reservation attached (or cleared for on-demand capacity).
///
/// # Errors
///
/// Returns [`ReservationError::NoReservationAvailable`] when `reserved_only`
/// is set and no reservation succeeded, or [`ReservationError::Backend`]
/// with the on-demand failure otherwise.
pub async fn create_with_reservations<S>(
    service: &S,
    project_id: &str,
    template: &DeviceCreateRequest,
    reservation_ids: &[String],
    reserved_only: bool,
) -> Result<Device, ReservationError>
where
    S: DeviceService + ?Sized,
{
    if reservation_ids.is_empty() && !reserved_only {
        return create_on_demand(service, project_id, template).await;
    }

    for reservation_id in reservation_ids {
        let request = DeviceCreateRequest {
            hardware_reservation_id: Some(reservation_id.clone()),
            ..template.clone()
        };
        match service.create_device(project_id, &request).await {
            Ok(device) => return Ok(device),
            Err(err) => debug!(
                reservation_id = %reservation_id,
                error = %err,
                "hardware reservation rejected"
            ),
        }
    }

    if reserved_only {
        return Err(ReservationError::NoReservationAvailable);
    }

    debug!(
        attempted = reservation_ids.len(),
        "no hardware reservation available; falling back to on-demand capacity"
    );
    create_on_demand(service, project_id, template).await
}

async fn create_on_demand<S>(
    service: &S,
    project_id: &str,
    template: &DeviceCreateRequest,
) -> Result<Device, ReservationError>
where
    S: DeviceService + ?Sized,
{
    let request = DeviceCreateRequest {
        hardware_reservation_id: None,
        ..template.clone()
    };
    Ok(service.create_device(project_id, &request).await?)
}
