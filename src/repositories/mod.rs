pub mod memory_repository;
pub mod object_store_repository;
pub mod server_repository;
pub mod sqlite_repository;

pub use memory_repository::InMemoryServerRepository;
pub use object_store_repository::ObjectStoreServerRepository;
pub use server_repository::{RepositoryError, RepositoryResult, ServerRepository};
pub use sqlite_repository::SqliteServerRepository;
