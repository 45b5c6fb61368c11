pub mod config;
pub mod encoders;
pub mod error;
pub mod layout;
pub mod profiles;
pub mod render;
pub mod sanitize;
pub mod settings;
pub mod stream;
pub mod supervisor;

pub use config::SupervisorConfig;
pub use encoders::EncoderDescriptor;
pub use error::AppError;
pub use layout::RelayLayout;
pub use profiles::ProfileStore;
pub use settings::{DynSettingsStore, JsonSettingsStore, Settings, SettingsStore, Theme};
pub use stream::{EgressTarget, StreamConfig};
pub use supervisor::{SessionInfo, SessionState, Supervisor};
