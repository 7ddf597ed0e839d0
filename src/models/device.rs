//! Device model
//!
//! A device is a push endpoint: an alias, the endpoint URL, and optional
//! basic-auth credentials. Records are never edited in place; an edit builds
//! a fresh record that keeps the id.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::ids::DeviceId;

/// Kind of credential attached to a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationType {
    #[default]
    Basic,
}

/// Credential sent with every push to a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    #[serde(rename = "type", default)]
    pub kind: AuthorizationType,
    pub user: String,
    pub pwd: String,
    /// Precomputed `Authorization` header value
    pub value: String,
}

impl Authorization {
    /// Build a basic-auth credential
    pub fn basic(user: impl Into<String>, pwd: impl Into<String>) -> Self {
        let user = user.into();
        let pwd = pwd.into();
        let value = format!("Basic {}", STANDARD.encode(format!("{}:{}", user, pwd)));
        Self {
            kind: AuthorizationType::Basic,
            user,
            pwd,
            value,
        }
    }
}

/// User-supplied fields for creating or editing a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDraft {
    pub alias: String,
    pub api_url: String,
    pub authorization: Option<Authorization>,
}

impl DeviceDraft {
    /// Create a draft without credentials
    pub fn new(alias: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            api_url: api_url.into(),
            authorization: None,
        }
    }

    /// Attach credentials to the draft
    pub fn with_authorization(mut self, authorization: Authorization) -> Self {
        self.authorization = Some(authorization);
        self
    }
}

impl From<&Device> for DeviceDraft {
    fn from(device: &Device) -> Self {
        Self {
            alias: device.alias.clone(),
            api_url: device.api_url.clone(),
            authorization: device.authorization.clone(),
        }
    }
}

/// A push endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Stable identity, also the merge key on restore
    pub id: DeviceId,

    /// User-facing label
    pub alias: String,

    /// Normalized endpoint URL
    #[serde(rename = "apiURL")]
    pub api_url: String,

    /// Scheme and host of `api_url`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Last path segment of `api_url`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<Authorization>,

    /// RFC 3339 creation time
    #[serde(default)]
    pub created_at: String,

    /// Creation time in epoch milliseconds
    #[serde(default)]
    pub timestamp: i64,
}

impl Device {
    /// Create a new device stamped at `now`
    pub fn new(draft: DeviceDraft, now: DateTime<Utc>) -> Result<Self, DeviceValidationError> {
        let created_at = now.to_rfc3339_opts(SecondsFormat::Millis, true);
        Self::with_identity(DeviceId::from_timestamp(now), draft, created_at, now.timestamp_millis())
    }

    /// Build a record with a known identity, normalizing the URL
    pub fn with_identity(
        id: DeviceId,
        draft: DeviceDraft,
        created_at: String,
        timestamp: i64,
    ) -> Result<Self, DeviceValidationError> {
        if id.is_empty() {
            return Err(DeviceValidationError::EmptyId);
        }

        let api_url = normalize_api_url(&draft.api_url)?;
        let (server, device_key) = decompose_api_url(&api_url);

        let device = Self {
            id,
            alias: draft.alias.trim().to_string(),
            api_url,
            server,
            device_key,
            authorization: draft.authorization,
            created_at,
            timestamp,
        };
        device.validate()?;
        Ok(device)
    }

    /// Rebuild this record from its own fields, normalizing the URL again
    pub fn normalized(&self) -> Result<Self, DeviceValidationError> {
        Self::with_identity(
            self.id.clone(),
            DeviceDraft::from(self),
            self.created_at.clone(),
            self.timestamp,
        )
    }

    /// Validate the device
    pub fn validate(&self) -> Result<(), DeviceValidationError> {
        if self.id.is_empty() {
            return Err(DeviceValidationError::EmptyId);
        }

        if self.alias.trim().is_empty() {
            return Err(DeviceValidationError::EmptyAlias);
        }

        Ok(())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.alias, self.api_url)
    }
}

/// Normalize a user-entered endpoint URL
///
/// Adds `https://` when no scheme is given and guarantees the path ends in a
/// slash. Query and fragment are kept as given.
pub fn normalize_api_url(raw: &str) -> Result<String, DeviceValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DeviceValidationError::EmptyUrl);
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let mut url = Url::parse(&candidate)
        .map_err(|e| DeviceValidationError::InvalidUrl(format!("{}: {}", trimmed, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(DeviceValidationError::InvalidUrl(format!(
            "{}: unsupported scheme '{}'",
            trimmed,
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(DeviceValidationError::InvalidUrl(format!(
            "{}: missing host",
            trimmed
        )));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url.to_string())
}

/// Split a normalized URL into its server and device key
///
/// Both parts are `None` if the URL does not parse.
pub fn decompose_api_url(api_url: &str) -> (Option<String>, Option<String>) {
    let Ok(url) = Url::parse(api_url) else {
        return (None, None);
    };

    let server = url.host_str().map(|host| match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    });

    let device_key = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string);

    (server, device_key)
}

/// Validation errors for devices
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceValidationError {
    EmptyId,
    EmptyAlias,
    EmptyUrl,
    InvalidUrl(String),
}

impl fmt::Display for DeviceValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyId => write!(f, "Device id cannot be empty"),
            Self::EmptyAlias => write!(f, "Device alias cannot be empty"),
            Self::EmptyUrl => write!(f, "Device URL cannot be empty"),
            Self::InvalidUrl(reason) => write!(f, "Invalid device URL {}", reason),
        }
    }
}

impl std::error::Error for DeviceValidationError {}
