// src/builder/mod.rs

//! Developer pipeline: audit, plan, build, deploy
//!
//! These operations run in CI against descriptor files, not against an
//! installed roster: audit validates a descriptor, plan expands its
//! platforms into a build matrix, build produces the release archive and
//! deploy publishes it to the content server.

mod audit;
mod build;
mod deploy;
mod plan;

pub use audit::audit;
pub use build::build;
pub use deploy::{BlobStore, HttpBlobStore};
pub use plan::{expand_platforms, plan, BuildPlan, BuildPlatform};
