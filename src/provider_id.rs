//! Opaque provider IDs handed back to the lifecycle controller.
//!
//! IDs take the form `equinixmetal://<location>/<device-id>`. Decoding is
//! purely textual: the last `/`-separated segment is the device ID and the
//! scheme is never checked, so IDs minted under older location formats keep
//! resolving.

use crate::device::Device;

/// Scheme prefix of every provider ID.
pub const PROVIDER_ID_SCHEME: &str = "equinixmetal";

/// Builds the provider ID for `device`.
#[must_use]
pub fn encode(device: &Device) -> String {
    format!(
        "{PROVIDER_ID_SCHEME}://{}/{}",
        device.location_code(),
        device.id
    )
}

/// Extracts the raw device ID from a provider ID.
#[must_use]
pub fn decode(provider_id: &str) -> &str {
    provider_id.rsplit('/').next().unwrap_or(provider_id)
}
