#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
pub mod constants;
pub mod escape;
pub mod resource;
pub mod subject;

pub use escape::{canonical_segment, path_escape};
pub use resource::{Action, PolicyResource};
pub use subject::Subject;
