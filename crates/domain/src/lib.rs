//! postsaga domain crate
//!
//! This crate contains the core domain logic following hexagonal architecture:
//! - `model`: Domain entities and value objects
//! - `ports`: Trait definitions for the relational, object and metrics stores
//! - `policy`: Deadlines and retry rules for store calls
//! - `usecases`: The post lifecycle orchestrator (write sagas and read views)

pub mod model;
pub mod policy;
pub mod ports;
pub mod usecases;

pub use model::*;
pub use ports::*;
