//! Enumerate Amazon EKS cluster add-ons across regions.
//!
//! Add-ons are found with a cheap paginated listing call and completed with
//! a per-add-on describe call. The [`pipeline::Evaluator`] decides per query
//! whether the describe call is needed, fans out over regions and clusters,
//! and streams rows back as they are produced.

pub mod aws;
pub mod config;
pub mod output;
pub mod pipeline;
pub mod resource;

/// Version injected at compile time via EKS_ADDONS_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("EKS_ADDONS_VERSION") {
    Some(v) => v,
    None => "dev",
};
