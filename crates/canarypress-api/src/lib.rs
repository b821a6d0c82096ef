//! Typed client for the release-management backend.
//!
//! The backend holds the weighted routing rules for each release group and
//! the instance membership of each cluster. Its JSON shapes (the
//! `result.default.light[]` and `result.instances[]` nesting) are an opaque
//! contract with an external service and are mirrored here verbatim rather
//! than flattened into friendlier types.

mod client;
mod error;
pub mod fake;
mod types;

pub use client::{ApiClient, ReleaseApi};
pub use error::{ApiError, ApiResult};
pub use types::{
    ClusterEnvelope, ClusterSnapshot, InstanceRecord, MetadataEntry, ReleaseGroup,
    ReleaseGroupEnvelope, RoutingConstraint, RuleSet,
};
