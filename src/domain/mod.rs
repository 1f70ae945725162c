//! Domain layer types and invariants.

pub mod documents;
pub mod error;
pub mod event;
pub mod route;
pub mod types;
