//! AWS API interaction module
//!
//! This module provides the plumbing for talking to the Amazon EKS REST API:
//! the HTTP client, per-region clients, error classification and the
//! region matrix.
//!
//! # Module Structure
//!
//! - [`client`] - Per-region EKS client and URL helpers
//! - [`error`] - Typed API errors and their classification
//! - [`http`] - HTTP utilities for REST API calls
//! - [`regions`] - Region matrix for fan-out
//!
//! # Example
//!
//! ```ignore
//! use eks_addons::aws::client::EksClient;
//! use eks_addons::aws::error::Operation;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = EksClient::new("us-east-1", None)?;
//!     let target = client.target("clusters");
//!     let page = client.get(&client.clusters_url(None), Operation::ListClusters, &target).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod http;
pub mod regions;
