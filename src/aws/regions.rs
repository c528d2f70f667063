//! Region matrix
//!
//! Supplies the regions an evaluation fans out over, narrowed by any region
//! constraint the caller put on the query.

/// Commercial regions where EKS is available
pub fn list_regions() -> Vec<String> {
    [
        // US
        "us-east-1",
        "us-east-2",
        "us-west-1",
        "us-west-2",
        // Canada
        "ca-central-1",
        // Europe
        "eu-central-1",
        "eu-central-2",
        "eu-north-1",
        "eu-south-1",
        "eu-south-2",
        "eu-west-1",
        "eu-west-2",
        "eu-west-3",
        // Asia Pacific
        "ap-east-1",
        "ap-south-1",
        "ap-south-2",
        "ap-northeast-1",
        "ap-northeast-2",
        "ap-northeast-3",
        "ap-southeast-1",
        "ap-southeast-2",
        "ap-southeast-3",
        "ap-southeast-4",
        // Middle East / Africa
        "me-south-1",
        "me-central-1",
        "il-central-1",
        "af-south-1",
        // South America
        "sa-east-1",
    ]
    .iter()
    .map(|r| r.to_string())
    .collect()
}

/// Region names are lowercase letters, digits and hyphens, e.g. `us-gov-west-1`
pub fn validate_region(region: &str) -> bool {
    !region.is_empty()
        && region.len() <= 32
        && region.contains('-')
        && region.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !region.starts_with('-')
        && !region.ends_with('-')
}

/// Default region from the standard AWS environment variables
pub fn get_default_region() -> Option<String> {
    for var in ["AWS_REGION", "AWS_DEFAULT_REGION"] {
        if let Ok(region) = std::env::var(var) {
            if validate_region(&region) {
                return Some(region);
            }
            tracing::warn!("Invalid region format in {}", var);
        }
    }
    None
}

/// Set of regions configured for an evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionMatrix {
    regions: Vec<String>,
}

impl RegionMatrix {
    /// Build a matrix from configured regions, dropping duplicates and
    /// malformed names while keeping the configured order
    pub fn new<I, S>(regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for region in regions.into_iter().map(Into::into) {
            if !validate_region(&region) {
                tracing::warn!("Ignoring malformed region: {}", region);
                continue;
            }
            if !unique.contains(&region) {
                unique.push(region);
            }
        }
        Self { regions: unique }
    }

    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    /// Regions to evaluate for a query.
    ///
    /// With no constraint every configured region is returned. Otherwise the
    /// intersection, which may be empty.
    pub fn resolve(&self, constraint: &[String]) -> Vec<String> {
        if constraint.is_empty() {
            return self.regions.clone();
        }
        self.regions
            .iter()
            .filter(|r| constraint.contains(r))
            .cloned()
            .collect()
    }
}
