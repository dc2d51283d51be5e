/// Database model definitions.
pub mod models;
/// Player statistics storage and retrieval operations.
pub mod stats_store;
/// Storage abstraction layer for database operations.
pub mod storage;
