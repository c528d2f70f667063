//! Result rows
//!
//! A row is an add-on identity tagged with the region it was found in, plus
//! the DescribeAddon record when the query needed one. Column values are
//! computed from that single record, so hydration happens at most once per
//! row no matter how many detail columns are selected.

use super::query::Column;
use crate::resource::{Addon, AddonIdentity};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub region: String,
    pub identity: AddonIdentity,
    pub detail: Option<Addon>,
}

fn timestamp(ts: Option<&DateTime<Utc>>) -> Value {
    ts.map(|t| Value::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
        .unwrap_or(Value::Null)
}

fn opt_str(value: Option<&String>) -> Value {
    value.map(|v| Value::String(v.clone())).unwrap_or(Value::Null)
}

impl Row {
    /// Row built from a listing entry only
    pub fn partial(region: impl Into<String>, identity: AddonIdentity) -> Self {
        Self {
            region: region.into(),
            identity,
            detail: None,
        }
    }

    /// Row built from a DescribeAddon record
    pub fn hydrated(region: impl Into<String>, addon: Addon) -> Self {
        Self {
            region: region.into(),
            identity: AddonIdentity {
                cluster_name: addon.cluster_name.clone(),
                addon_name: addon.addon_name.clone(),
            },
            detail: Some(addon),
        }
    }

    pub fn is_hydrated(&self) -> bool {
        self.detail.is_some()
    }

    /// Value of one column; detail columns are `null` on partial rows
    pub fn value(&self, column: Column) -> Value {
        match column {
            Column::AddonName | Column::Title => Value::String(self.identity.addon_name.clone()),
            Column::ClusterName => Value::String(self.identity.cluster_name.clone()),
            Column::Region => Value::String(self.region.clone()),
            _ => match &self.detail {
                Some(addon) => detail_value(addon, column),
                None => Value::Null,
            },
        }
    }

    /// Selected columns as a JSON object
    pub fn project(&self, columns: &[Column]) -> Map<String, Value> {
        columns
            .iter()
            .map(|c| (c.name().to_string(), self.value(*c)))
            .collect()
    }
}

fn detail_value(addon: &Addon, column: Column) -> Value {
    match column {
        Column::Arn => opt_str(addon.arn.as_ref()),
        Column::AddonVersion => opt_str(addon.addon_version.as_ref()),
        Column::Status => opt_str(addon.status.as_ref()),
        Column::CreatedAt => timestamp(addon.created_at.as_ref()),
        Column::ModifiedAt => timestamp(addon.modified_at.as_ref()),
        Column::ServiceAccountRoleArn => opt_str(addon.service_account_role_arn.as_ref()),
        Column::HealthIssues => serde_json::to_value(&addon.health_issues).unwrap_or(Value::Null),
        Column::Tags => Value::Object(
            addon
                .tags
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        ),
        Column::Akas => Value::Array(addon.akas().into_iter().map(Value::String).collect()),
        Column::Partition => addon
            .parsed_arn()
            .map(|arn| Value::String(arn.partition))
            .unwrap_or(Value::Null),
        Column::AccountId => addon
            .parsed_arn()
            .map(|arn| Value::String(arn.account_id))
            .unwrap_or(Value::Null),
        Column::AddonName | Column::Title | Column::ClusterName | Column::Region => Value::Null,
    }
}
