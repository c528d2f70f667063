//! Add-on data model
//!
//! Shapes returned by the EKS list and describe calls, decoded with serde
//! from the REST-JSON payloads.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Parent resource: an EKS cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Cluster {
    pub name: String,
}

impl Cluster {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Address of one DescribeAddon call
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LookupKey {
    pub cluster_name: String,
    pub addon_name: String,
}

impl LookupKey {
    pub fn new(cluster_name: impl Into<String>, addon_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            addon_name: addon_name.into(),
        }
    }

    /// Path of the resource, used in logs and error targets
    pub fn path(&self) -> String {
        format!("clusters/{}/addons/{}", self.cluster_name, self.addon_name)
    }
}

/// What ListAddons tells us about an add-on: only its name and parent
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AddonIdentity {
    pub cluster_name: String,
    pub addon_name: String,
}

impl AddonIdentity {
    pub fn new(cluster: &Cluster, addon_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster.name.clone(),
            addon_name: addon_name.into(),
        }
    }

    pub fn lookup_key(&self) -> LookupKey {
        LookupKey::new(&self.cluster_name, &self.addon_name)
    }
}

/// A health problem reported for an add-on
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthIssue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub resource_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AddonHealth {
    #[serde(default)]
    issues: Vec<HealthIssue>,
}

/// Full add-on description as returned by DescribeAddon
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addon {
    pub addon_name: String,
    pub cluster_name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub addon_version: Option<String>,
    #[serde(default, rename = "health", deserialize_with = "de_health_issues")]
    pub health_issues: Vec<HealthIssue>,
    #[serde(default, rename = "addonArn")]
    pub arn: Option<String>,
    #[serde(default, deserialize_with = "de_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de_timestamp")]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub service_account_role_arn: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Addon {
    pub fn lookup_key(&self) -> LookupKey {
        LookupKey::new(&self.cluster_name, &self.addon_name)
    }

    /// Alternate identifiers: the ARN, when known
    pub fn akas(&self) -> Vec<String> {
        self.arn.iter().cloned().collect()
    }

    pub fn parsed_arn(&self) -> Option<Arn> {
        self.arn.as_deref().and_then(Arn::parse)
    }
}

/// `{"addon": {...}}` envelope of DescribeAddon
#[derive(Debug, Deserialize)]
pub struct DescribeAddonResponse {
    pub addon: Addon,
}

/// One page of ListClusters
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListClustersPage {
    #[serde(default)]
    pub clusters: Vec<String>,
    #[serde(default)]
    pub next_token: Option<String>,
}

/// One page of ListAddons
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAddonsPage {
    #[serde(default)]
    pub addons: Vec<String>,
    #[serde(default)]
    pub next_token: Option<String>,
}

/// Components of an ARN: `arn:partition:service:region:account-id:resource`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account_id: String,
    pub resource: String,
}

impl Arn {
    pub fn parse(arn: &str) -> Option<Self> {
        let mut parts = arn.splitn(6, ':');
        if parts.next()? != "arn" {
            return None;
        }
        let partition = parts.next()?.to_string();
        let service = parts.next()?.to_string();
        let region = parts.next()?.to_string();
        let account_id = parts.next()?.to_string();
        let resource = parts.next()?.to_string();
        if partition.is_empty() || service.is_empty() {
            return None;
        }
        Some(Self {
            partition,
            service,
            region,
            account_id,
            resource,
        })
    }
}

fn de_health_issues<'de, D>(deserializer: D) -> Result<Vec<HealthIssue>, D::Error>
where
    D: Deserializer<'de>,
{
    let health: Option<AddonHealth> = Option::deserialize(deserializer)?;
    Ok(health.map(|h| h.issues).unwrap_or_default())
}

/// EKS sends timestamps as epoch seconds (possibly fractional); some
/// gateways re-encode them as RFC 3339 strings. Accept both.
fn de_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(f64),
        Text(String),
    }

    let raw: Option<Raw> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(Raw::Seconds(secs)) => {
            let whole = secs.trunc() as i64;
            let nanos = ((secs - secs.trunc()) * 1e9).round() as u32;
            Ok(Utc.timestamp_opt(whole, nanos.min(999_999_999)).single())
        }
        Some(Raw::Text(text)) => DateTime::parse_from_rfc3339(&text)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom),
    }
}
