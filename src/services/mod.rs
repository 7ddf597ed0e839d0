//! Service layer
//!
//! The device and settings services are the collaborators a restore writes
//! through. They own validation and the default-device rules, and record
//! every mutation in the audit log when one is configured.

pub mod device;
pub mod settings;

pub use device::DeviceService;
pub use settings::{NoopUiNotifier, SettingsService, UiNotifier};
