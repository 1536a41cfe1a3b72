// Document store implementations
pub mod store_trait;
pub mod memory_store;
pub mod file_store;
pub mod postgres_store;

pub use store_trait::*;
pub use memory_store::*;
pub use file_store::*;
pub use postgres_store::*;
