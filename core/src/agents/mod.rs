pub mod config;
pub mod gateway;
pub mod normalizer;

pub use config::{GatewaySettings, MemoryModePreferences, ModePreferences, SqliteModePreferences};
pub use gateway::{BackendHealth, Gateway, HttpGateway, RawPayload, RawResult};
pub use normalizer::normalize;
