//! Credential sources for the supported registries.

pub mod ecr;
pub mod gcr;

pub use ecr::EcrSource;
pub use gcr::GcrSource;
