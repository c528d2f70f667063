//! Detail hydration
//!
//! Turns a [`LookupKey`] into a full [`Addon`] with one DescribeAddon call.
//! Errors whose code is in the configured ignore set mean the add-on is gone
//! (usually deleted between the list and the describe) and hydrate to
//! `None` instead of failing.

use super::api::AddonApi;
use super::model::{Addon, LookupKey};
use crate::aws::error::{ApiError, Operation};
use crate::pipeline::policy::CallPolicy;
use std::collections::BTreeSet;

/// Error codes treated as "no such add-on" by default
pub const DEFAULT_IGNORE_CODES: &[&str] = &[
    "ResourceNotFoundException",
    "InvalidParameterException",
    "InvalidParameter",
];

/// Provider error codes that hydrate to an empty result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreErrors {
    codes: BTreeSet<String>,
}

impl Default for IgnoreErrors {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORE_CODES.iter().copied())
    }
}

impl IgnoreErrors {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            codes: codes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }

    pub fn should_ignore(&self, err: &ApiError) -> bool {
        self.codes.contains(&err.code)
    }
}

/// Detail capability for one region
#[derive(Clone, Copy)]
pub struct Hydrator<'a> {
    api: &'a dyn AddonApi,
    policy: &'a CallPolicy,
    ignore: &'a IgnoreErrors,
}

impl<'a> Hydrator<'a> {
    pub fn new(api: &'a dyn AddonApi, policy: &'a CallPolicy, ignore: &'a IgnoreErrors) -> Self {
        Self { api, policy, ignore }
    }

    /// Describe the add-on at `key`.
    ///
    /// `Ok(None)` when the add-on no longer exists. The returned record
    /// always carries `key`'s cluster and add-on names.
    pub async fn hydrate(&self, key: &LookupKey) -> Result<Option<Addon>, ApiError> {
        let target = format!("{} {}", self.api.region(), key.path());
        tracing::debug!(region = %self.api.region(), key = %key.path(), "DescribeAddon");

        let result = self
            .policy
            .call(Operation::DescribeAddon, &target, || self.api.describe_addon(key))
            .await;

        match result {
            Ok(addon) if addon.lookup_key() == *key => Ok(Some(addon)),
            Ok(addon) => Err(ApiError::new(
                Operation::DescribeAddon,
                target,
                None,
                "MismatchedIdentity",
                format!("response describes {}", addon.lookup_key().path()),
            )),
            Err(err) if self.ignore.should_ignore(&err) => {
                tracing::warn!(
                    region = %self.api.region(),
                    key = %key.path(),
                    code = %err.code,
                    "Add-on vanished before describe, skipping"
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(code: &str) -> ApiError {
        ApiError::new(Operation::DescribeAddon, "t", Some(400), code, "")
    }

    #[test]
    fn test_default_codes() {
        let ignore = IgnoreErrors::default();
        assert!(ignore.should_ignore(&err("ResourceNotFoundException")));
        assert!(ignore.should_ignore(&err("InvalidParameterException")));
        assert!(ignore.should_ignore(&err("InvalidParameter")));
        assert!(!ignore.should_ignore(&err("ThrottlingException")));
        assert!(!ignore.should_ignore(&err("AccessDeniedException")));
    }

    #[test]
    fn test_custom_codes_replace_defaults() {
        let ignore = IgnoreErrors::new(["AccessDeniedException"]);
        assert!(ignore.should_ignore(&err("AccessDeniedException")));
        assert!(!ignore.should_ignore(&err("ResourceNotFoundException")));
        assert_eq!(ignore.codes().collect::<Vec<_>>(), vec!["AccessDeniedException"]);
    }

    #[test]
    fn test_empty_ignore_set_suppresses_nothing() {
        let ignore = IgnoreErrors::new(Vec::<String>::new());
        assert!(!ignore.should_ignore(&err("ResourceNotFoundException")));
    }
}
