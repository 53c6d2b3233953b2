pub mod base;
pub mod file_storage;
pub mod memory_storage;
pub mod no_storage;
pub mod session_store;

// Re-export the primary storage items so code outside can do
// "use crate::store::{Storage, SessionStore};"
pub use base::{create_storage, Storage, StorageError};
pub use file_storage::FileStorage;
pub use memory_storage::MemoryStorage;
pub use no_storage::NoStorage;
pub use session_store::SessionStore;
