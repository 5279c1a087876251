//! topicsync core library — domain types, config store, settings, errors.
//!
//! Public API surface:
//! - [`types`] — newtypes and the per-channel [`SyncConfig`] record
//! - [`store`] — load / save / list channel configs under `~/.topicsync/`
//! - [`settings`] — credentials and operational toggles, read once at startup
//! - [`error`] — [`StoreError`] and [`ConfigError`]

pub mod error;
pub mod settings;
pub mod store;
pub mod types;

pub use error::{ConfigError, StoreError};
pub use settings::Settings;
pub use store::{ConfigListing, ConfigLoadFailure};
pub use types::{ChannelId, ScheduleEntry, ScheduleId, SyncConfig};
