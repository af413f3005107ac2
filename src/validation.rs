//! Structural validation of provider specs, secrets, and machine names.
//!
//! Every check here runs before a session is opened, so a request that fails
//! validation never reaches the device API.

use std::fmt;

use thiserror::Error;

use crate::provider_spec::{
    ALTERNATE_API_KEY, API_KEY, CLUSTER_TAG_MARKER, ProviderSpec, ROLE_TAG_MARKER, Secret,
    USER_DATA_KEY,
};

const NAME_MAX_LENGTH: usize = 63;
const NAME_FORMAT: &str = "[-a-z0-9]+";
const TAGS_PATH: &str = "spec.tags";

/// Dotted path to a field, rendered as `providerSpec.os`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldPath(String);

impl FieldPath {
    /// Creates a root path.
    #[must_use]
    pub fn new(root: impl Into<String>) -> Self {
        Self(root.into())
    }

    /// Returns the path extended by `name`.
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        if name.is_empty() {
            return self.clone();
        }
        Self(format!("{}.{name}", self.0))
    }

    /// Returns the rendered path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of field validation failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldErrorKind {
    /// A required value is missing or empty.
    Required,
}

impl fmt::Display for FieldErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => f.write_str("Required value"),
        }
    }
}

/// A single field validation failure.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{path}: {kind}: {detail}")]
pub struct FieldError {
    /// Failure kind.
    pub kind: FieldErrorKind,
    /// Path of the offending field.
    pub path: FieldPath,
    /// Operator-facing explanation.
    pub detail: String,
}

impl FieldError {
    /// Builds a [`FieldErrorKind::Required`] error.
    #[must_use]
    pub fn required(path: FieldPath, detail: impl Into<String>) -> Self {
        Self {
            kind: FieldErrorKind::Required,
            path,
            detail: detail.into(),
        }
    }

    /// Returns `true` when the error reports a missing ownership tag.
    #[must_use]
    pub fn is_ownership_tag(&self) -> bool {
        self.path.as_str().starts_with(TAGS_PATH)
    }
}

/// Joins field errors the way the controller renders aggregates: a single
/// error verbatim, several as `[a, b]`.
#[must_use]
pub fn aggregate(errors: &[FieldError]) -> String {
    let rendered: Vec<String> = errors.iter().map(ToString::to_string).collect();
    match rendered.as_slice() {
        [single] => single.clone(),
        _ => format!("[{}]", rendered.join(", ")),
    }
}

/// Checks that all fields required to create a device are present.
#[must_use]
pub fn validate_provider_spec(spec: &ProviderSpec, path: &FieldPath) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if spec.os.is_empty() {
        errors.push(FieldError::required(path.child("os"), "OS is required"));
    }
    if spec.machine_type.is_empty() {
        errors.push(FieldError::required(
            path.child("machineType"),
            "Machine Type is required",
        ));
    }
    if spec.project_id.is_empty() {
        errors.push(FieldError::required(
            path.child("projectID"),
            "Project ID is required",
        ));
    }
    if spec.metro.is_empty() {
        errors.push(FieldError::required(path.child("metro"), "Metro is required"));
    }
    errors.extend(validate_tags(&spec.tags, &FieldPath::new(TAGS_PATH)));
    errors
}

fn validate_tags(tags: &[String], path: &FieldPath) -> Vec<FieldError> {
    let has_cluster = tags.iter().any(|tag| tag.contains(CLUSTER_TAG_MARKER));
    let has_role = tags
        .iter()
        .any(|tag| !tag.contains(CLUSTER_TAG_MARKER) && tag.contains(ROLE_TAG_MARKER));

    let mut errors = Vec::new();
    if !has_cluster {
        errors.push(FieldError::required(
            path.child(CLUSTER_TAG_MARKER),
            format!("Tag required of the form {CLUSTER_TAG_MARKER}****"),
        ));
    }
    if !has_role {
        errors.push(FieldError::required(
            path.child(ROLE_TAG_MARKER),
            format!("Tag required of the form {ROLE_TAG_MARKER}****"),
        ));
    }
    errors
}

/// Secret entries a caller can ask [`validate_secret`] to check.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SecretField {
    /// The API token, under either accepted key name.
    ApiKey,
    /// The cloud-init payload.
    UserData,
}

/// Fields checked when the caller passes an empty list.
pub const DEFAULT_SECRET_FIELDS: [SecretField; 2] = [SecretField::ApiKey, SecretField::UserData];

/// Checks that `secret` carries every entry named in `fields`.
///
/// An empty `fields` slice checks [`DEFAULT_SECRET_FIELDS`].
#[must_use]
pub fn validate_secret(secret: Option<&Secret>, fields: &[SecretField]) -> Vec<FieldError> {
    let path = FieldPath::new("secretRef");
    let Some(secret) = secret else {
        return vec![FieldError::required(path, "secretRef is required")];
    };

    let checked = if fields.is_empty() {
        &DEFAULT_SECRET_FIELDS[..]
    } else {
        fields
    };

    checked
        .iter()
        .filter_map(|field| match field {
            SecretField::ApiKey
                if !secret.has_value(API_KEY) && !secret.has_value(ALTERNATE_API_KEY) =>
            {
                Some(FieldError::required(
                    path.child(API_KEY),
                    format!(
                        "Required Equinix Metal API Key one of '{API_KEY}' or '{ALTERNATE_API_KEY}'"
                    ),
                ))
            }
            SecretField::UserData if !secret.has_value(USER_DATA_KEY) => Some(
                FieldError::required(path.child(USER_DATA_KEY), "Required userData"),
            ),
            SecretField::ApiKey | SecretField::UserData => None,
        })
        .collect()
}

/// Reasons a machine name is rejected.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum NameError {
    /// The name is empty.
    #[error("name must not be blank")]
    Blank,
    /// The name exceeds the hostname label limit.
    #[error("name was length {length}, more than the maximum {max}")]
    TooLong {
        /// Actual length in bytes.
        length: usize,
        /// Permitted maximum.
        max: usize,
    },
    /// The name contains characters outside the allowed set.
    #[error("name did not match allowed regex '^{format}$'")]
    Format {
        /// Pattern the name must match.
        format: &'static str,
    },
}

/// Checks a machine name against the hostname policy, reporting every
/// violated rule.
#[must_use]
pub fn validate_name(name: &str) -> Vec<NameError> {
    let mut errors = Vec::new();
    if name.is_empty() {
        errors.push(NameError::Blank);
    }
    if name.len() > NAME_MAX_LENGTH {
        errors.push(NameError::TooLong {
            length: name.len(),
            max: NAME_MAX_LENGTH,
        });
    }
    if !matches_name_format(name) {
        errors.push(NameError::Format {
            format: NAME_FORMAT,
        });
    }
    errors
}

/// Equivalent of `^[-a-z0-9]+$`.
fn matches_name_format(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|byte| byte == b'-' || byte.is_ascii_lowercase() || byte.is_ascii_digit())
}
