pub mod registry;

pub use registry::{ConfigError, RegistryConfig, ScannerConfig, StoreBackend};
