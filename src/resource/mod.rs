//! Resource layer
//!
//! The EKS add-on resource: its data model, the remote operations it is
//! built from, and the two capabilities the evaluation driver uses.
//!
//! # Architecture
//!
//! - [`model`] - Clusters, add-on identities, lookup keys and full records
//! - [`api`] - The [`AddonApi`] seam and its HTTP implementation
//! - [`fetcher`] - Paginated listing ([`Lister`])
//! - [`hydrate`] - Detail calls with not-found suppression ([`Hydrator`])
//!
//! # Example
//!
//! ```ignore
//! use eks_addons::resource::{Hydrator, IgnoreErrors, LookupKey};
//!
//! async fn one(api: &dyn AddonApi, policy: &CallPolicy) -> anyhow::Result<()> {
//!     let ignore = IgnoreErrors::default();
//!     let addon = Hydrator::new(api, policy, &ignore)
//!         .hydrate(&LookupKey::new("prod", "vpc-cni"))
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod fetcher;
pub mod hydrate;
pub mod model;

pub use api::{AddonApi, ClientFactory, EksClientFactory, Page};
pub use fetcher::{paginate, Lister};
pub use hydrate::{Hydrator, IgnoreErrors, DEFAULT_IGNORE_CODES};
pub use model::{Addon, AddonIdentity, Arn, Cluster, HealthIssue, LookupKey};
