//! Query description
//!
//! What the caller asked for: which columns, which key-column values, which
//! regions, and how many rows. The driver reads it to pick the listing or
//! direct-describe path and to decide whether DescribeAddon is needed at all.

use crate::resource::LookupKey;
use std::fmt;
use std::str::FromStr;

/// Output columns of the add-on table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    AddonName,
    Arn,
    ClusterName,
    AddonVersion,
    Status,
    CreatedAt,
    ModifiedAt,
    ServiceAccountRoleArn,
    HealthIssues,
    Title,
    Tags,
    Akas,
    Partition,
    Region,
    AccountId,
}

impl Column {
    pub const ALL: [Column; 15] = [
        Column::AddonName,
        Column::Arn,
        Column::ClusterName,
        Column::AddonVersion,
        Column::Status,
        Column::CreatedAt,
        Column::ModifiedAt,
        Column::ServiceAccountRoleArn,
        Column::HealthIssues,
        Column::Title,
        Column::Tags,
        Column::Akas,
        Column::Partition,
        Column::Region,
        Column::AccountId,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::AddonName => "addon_name",
            Column::Arn => "arn",
            Column::ClusterName => "cluster_name",
            Column::AddonVersion => "addon_version",
            Column::Status => "status",
            Column::CreatedAt => "created_at",
            Column::ModifiedAt => "modified_at",
            Column::ServiceAccountRoleArn => "service_account_role_arn",
            Column::HealthIssues => "health_issues",
            Column::Title => "title",
            Column::Tags => "tags",
            Column::Akas => "akas",
            Column::Partition => "partition",
            Column::Region => "region",
            Column::AccountId => "account_id",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Column::AddonName => "The name of the add-on.",
            Column::Arn => "The Amazon Resource Name (ARN) of the add-on.",
            Column::ClusterName => "The name of the cluster.",
            Column::AddonVersion => "The version of the add-on.",
            Column::Status => "The status of the add-on.",
            Column::CreatedAt => "The date and time that the add-on was created.",
            Column::ModifiedAt => "The date and time that the add-on was last modified.",
            Column::ServiceAccountRoleArn => {
                "The ARN of the IAM role bound to the Kubernetes service account used by the add-on."
            }
            Column::HealthIssues => "An object that represents the add-on's health issues.",
            Column::Title => "Title of the resource.",
            Column::Tags => "The metadata applied to the add-on to assist with categorization and organization.",
            Column::Akas => "Array of globally unique identifier strings (also known as) for the resource.",
            Column::Partition => "The AWS partition in which the resource is located (aws, aws-cn, or aws-us-gov).",
            Column::Region => "The AWS Region in which the resource is located.",
            Column::AccountId => "The AWS Account ID in which the resource is located.",
        }
    }

    /// Whether the value only comes from DescribeAddon
    pub fn requires_hydration(self) -> bool {
        !matches!(
            self,
            Column::AddonName | Column::ClusterName | Column::Title | Column::Region
        )
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Column {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Column::ALL
            .iter()
            .copied()
            .find(|c| c.name() == wanted)
            .ok_or_else(|| anyhow::anyhow!("Unknown column: {}", s.trim()))
    }
}

/// Parse a comma-separated column list; `*` or an empty list selects all
pub fn parse_columns(spec: &str) -> anyhow::Result<Vec<Column>> {
    let mut columns = Vec::new();
    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if part == "*" {
            return Ok(Column::ALL.to_vec());
        }
        let column: Column = part.parse()?;
        if !columns.contains(&column) {
            columns.push(column);
        }
    }
    if columns.is_empty() {
        return Ok(Column::ALL.to_vec());
    }
    Ok(columns)
}

/// Equality (or IN-list) constraints on the key columns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyQuals {
    pub cluster_names: Vec<String>,
    pub addon_names: Vec<String>,
}

impl KeyQuals {
    /// Lookup keys for the direct-describe path: only when both key columns
    /// are constrained. Cross product, in qualifier order, without duplicates.
    pub fn lookup_keys(&self) -> Option<Vec<LookupKey>> {
        if self.cluster_names.is_empty() || self.addon_names.is_empty() {
            return None;
        }
        let mut keys = Vec::new();
        for cluster in &self.cluster_names {
            for addon in &self.addon_names {
                let key = LookupKey::new(cluster, addon);
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        Some(keys)
    }

    pub fn matches(&self, cluster_name: &str, addon_name: &str) -> bool {
        (self.cluster_names.is_empty() || self.cluster_names.iter().any(|c| c == cluster_name))
            && (self.addon_names.is_empty() || self.addon_names.iter().any(|a| a == addon_name))
    }
}

/// One evaluation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub columns: Vec<Column>,
    pub quals: KeyQuals,
    /// Region constraint; empty means every configured region
    pub regions: Vec<String>,
    pub limit: Option<usize>,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            columns: Column::ALL.to_vec(),
            quals: KeyQuals::default(),
            regions: Vec::new(),
            limit: None,
        }
    }
}

impl Query {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    pub fn with_clusters<I: IntoIterator<Item = S>, S: Into<String>>(mut self, clusters: I) -> Self {
        self.quals.cluster_names = clusters.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_addons<I: IntoIterator<Item = S>, S: Into<String>>(mut self, addons: I) -> Self {
        self.quals.addon_names = addons.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_regions<I: IntoIterator<Item = S>, S: Into<String>>(mut self, regions: I) -> Self {
        self.regions = regions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether any requested column needs DescribeAddon
    pub fn needs_hydration(&self) -> bool {
        self.columns.iter().any(|c| c.requires_hydration())
    }

    /// Keys for the direct-describe path, if the quals allow it
    pub fn direct_keys(&self) -> Option<Vec<LookupKey>> {
        self.quals.lookup_keys()
    }
}
