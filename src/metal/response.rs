//! Response envelopes and status classification for the device API.

use serde::Deserialize;

use crate::device::{Device, DeviceServiceError};

/// One page of `GET /projects/{id}/devices`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DevicePage {
    /// Devices on this page.
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    meta: Option<PageMeta>,
}

impl DevicePage {
    /// Link to the following page, if any.
    #[must_use]
    pub fn next_href(&self) -> Option<&str> {
        self.meta
            .as_ref()
            .and_then(|meta| meta.next.as_ref())
            .map(|link| link.href.as_str())
            .filter(|href| !href.is_empty())
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
struct PageMeta {
    #[serde(default)]
    next: Option<Link>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct Link {
    #[serde(default)]
    href: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed.errors.join(", "),
        Ok(ErrorBody {
            error: Some(message),
            ..
        }) if !message.is_empty() => message,
        _ => body.trim().to_owned(),
    }
}

/// Maps an HTTP status and body onto the device service error taxonomy.
///
/// # Errors
///
/// Returns [`DeviceServiceError::NotFound`] for 404 and
/// [`DeviceServiceError::Api`] for any other non-2xx status. The message is
/// the joined `errors` array when the body carries one, else the raw body.
pub fn classify_response(status: u16, body: &str) -> Result<(), DeviceServiceError> {
    match status {
        200..=299 => Ok(()),
        404 => Err(DeviceServiceError::NotFound {
            status,
            message: error_message(body),
        }),
        _ => Err(DeviceServiceError::Api {
            status,
            message: error_message(body),
        }),
    }
}
