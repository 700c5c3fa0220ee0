pub mod clock;
pub mod registry_service;
pub mod security_scanner;

pub use clock::{Clock, SystemClock};
pub use registry_service::{RegistryError, RegistryResult, RegistryService};
pub use security_scanner::{
    CommandSecurityScanner, HttpSecurityScanner, ScanError, ScanResult, SecurityScanner,
};
