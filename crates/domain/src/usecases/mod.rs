//! Application use cases / business logic

pub mod browse;
pub mod lifecycle;

#[cfg(test)]
pub(crate) mod fakes;

pub use lifecycle::{LifecycleConfig, LifecycleError, PostLifecycle, SagaStep, Store};
