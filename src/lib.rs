pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registry_service: Arc<services::RegistryService>,
}

impl AppState {
    pub fn new(registry_service: services::RegistryService) -> Self {
        Self {
            registry_service: Arc::new(registry_service),
        }
    }
}
