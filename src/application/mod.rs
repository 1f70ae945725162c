//! Application services: route resolution, revalidation and search indexing.

pub mod error;
pub mod indexing;
pub mod invalidation;
pub mod resolver;
pub mod revalidation;
pub mod signature;
pub mod store;
