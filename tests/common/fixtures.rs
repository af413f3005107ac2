//! Shared machine class and secret fixtures for integration tests.
//!
//! Integration tests are compiled as separate crates (one per top-level file in
//! `tests/`). Placing shared fixtures under `tests/common/` avoids creating an
//! additional integration test binary while still allowing reuse via:
//!
//! ```rust
//! #[path = "common/fixtures.rs"]
//! mod fixtures;
//! ```

use metal_provider::provider_spec::{API_KEY, USER_DATA_KEY};
use metal_provider::{MachineClass, PROVIDER_EQUINIX_METAL, Secret};
use serde_json::{Value, json};

/// Project every fixture device lives in.
pub const PROJECT_ID: &str = "abcdefg";

/// Cluster ownership tag carried by the fixture class.
pub const CLUSTER_TAG: &str = "kubernetes.io/cluster/shoot-test: 1";

/// Role ownership tag carried by the fixture class.
pub const ROLE_TAG: &str = "kubernetes.io/role/test: 1";

/// Provider spec accepted by validation.
pub fn provider_spec() -> Value {
    json!({
        "metro": "ny",
        "facility": ["ewr1", "ny5"],
        "machineType": "c3.small.x86",
        "billingCycle": "hourly",
        "OS": "alpine_3.13",
        "projectID": PROJECT_ID,
        "tags": [CLUSTER_TAG, ROLE_TAG],
    })
}

/// Machine class for this provider wrapping `provider_spec`.
pub fn machine_class_with(provider_spec: Value) -> MachineClass {
    MachineClass {
        name: String::from("test-mc"),
        provider: String::from(PROVIDER_EQUINIX_METAL),
        provider_spec,
        ..MachineClass::default()
    }
}

/// Secret carrying an API token and user data.
pub fn secret() -> Secret {
    Secret::new()
        .with(API_KEY, "dummy-token")
        .with(USER_DATA_KEY, "dummy-user-data")
}
