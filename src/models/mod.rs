//! Core data models
//!
//! Devices, settings and the snapshot shape that backups carry.

pub mod device;
pub mod ids;
pub mod settings;
pub mod snapshot;

pub use device::{
    decompose_api_url, normalize_api_url, Authorization, AuthorizationType, Device, DeviceDraft,
    DeviceValidationError,
};
pub use ids::DeviceId;
pub use settings::{AppSettings, ThemeMode, ENCRYPTION_CONFIG_KEY, THEME_MODE_KEY};
pub use snapshot::{RawSnapshot, Snapshot};
