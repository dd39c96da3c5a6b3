//! Cascade deletion model: the closed set of environment-scoped tables and
//! the per-environment / per-organization summaries.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::unix_now;
use crate::error::ValidationError;

/// Tables whose rows are scoped by `environment_id` and removed with their
/// environment.
///
/// This is the only set of table names ever interpolated into statement
/// text; everything else is bound as a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletableTable {
    Feature,
    Experiment,
    Goal,
    Subscription,
    Push,
    Tag,
    Segment,
    FlagTrigger,
    ApiKey,
    AutoOpsRule,
    FeatureLastUsedInfo,
}

impl DeletableTable {
    pub const ALL: [DeletableTable; 11] = [
        Self::Feature,
        Self::Experiment,
        Self::Goal,
        Self::Subscription,
        Self::Push,
        Self::Tag,
        Self::Segment,
        Self::FlagTrigger,
        Self::ApiKey,
        Self::AutoOpsRule,
        Self::FeatureLastUsedInfo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feature => "feature",
            Self::Experiment => "experiment",
            Self::Goal => "goal",
            Self::Subscription => "subscription",
            Self::Push => "push",
            Self::Tag => "tag",
            Self::Segment => "segment",
            Self::FlagTrigger => "flag_trigger",
            Self::ApiKey => "api_key",
            Self::AutoOpsRule => "auto_ops_rule",
            Self::FeatureLastUsedInfo => "feature_last_used_info",
        }
    }
}

impl fmt::Display for DeletableTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeletableTable {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|table| table.as_str() == s)
            .ok_or_else(|| ValidationError::DisallowedTable(s.to_string()))
    }
}

/// A row in one of the [`DeletableTable`]s. Only the scoping columns are
/// modelled; payloads belong to the owning services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentRecord {
    pub id: String,
    pub environment_id: Uuid,
    pub name: String,
    pub created_at: i64,
}

impl EnvironmentRecord {
    pub fn new(id: impl Into<String>, environment_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            environment_id,
            name: name.into(),
            created_at: unix_now(),
        }
    }
}

/// What a cascade deletion removed (or, in a dry run, would remove) for
/// one environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentDeletionSummary {
    pub environment_id: Uuid,
    pub features: u64,
    pub experiments: u64,
    pub goals: u64,
    pub subscriptions: u64,
    pub pushes: u64,
    pub tags: u64,
    pub segments: u64,
    pub flag_triggers: u64,
    pub api_keys: u64,
    pub operations: u64,
    pub feature_last_used_infos: u64,
}

impl EnvironmentDeletionSummary {
    pub fn from_counts(environment_id: Uuid, counts: &BTreeMap<DeletableTable, u64>) -> Self {
        let get = |table| counts.get(&table).copied().unwrap_or(0);
        Self {
            environment_id,
            features: get(DeletableTable::Feature),
            experiments: get(DeletableTable::Experiment),
            goals: get(DeletableTable::Goal),
            subscriptions: get(DeletableTable::Subscription),
            pushes: get(DeletableTable::Push),
            tags: get(DeletableTable::Tag),
            segments: get(DeletableTable::Segment),
            flag_triggers: get(DeletableTable::FlagTrigger),
            api_keys: get(DeletableTable::ApiKey),
            operations: get(DeletableTable::AutoOpsRule),
            feature_last_used_infos: get(DeletableTable::FeatureLastUsedInfo),
        }
    }

    pub fn count(&self, table: DeletableTable) -> u64 {
        match table {
            DeletableTable::Feature => self.features,
            DeletableTable::Experiment => self.experiments,
            DeletableTable::Goal => self.goals,
            DeletableTable::Subscription => self.subscriptions,
            DeletableTable::Push => self.pushes,
            DeletableTable::Tag => self.tags,
            DeletableTable::Segment => self.segments,
            DeletableTable::FlagTrigger => self.flag_triggers,
            DeletableTable::ApiKey => self.api_keys,
            DeletableTable::AutoOpsRule => self.operations,
            DeletableTable::FeatureLastUsedInfo => self.feature_last_used_infos,
        }
    }

    pub fn total(&self) -> u64 {
        DeletableTable::ALL.iter().map(|t| self.count(*t)).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationDeletionSummary {
    pub organization_id: Uuid,
    pub projects: u64,
    pub environments: u64,
    pub accounts: u64,
    pub environment_summaries: Vec<EnvironmentDeletionSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_round_trip_and_unknown_names_are_refused() {
        for table in DeletableTable::ALL {
            assert_eq!(table.as_str().parse::<DeletableTable>(), Ok(table));
        }
        assert_eq!(
            "environment; DELETE organization".parse::<DeletableTable>(),
            Err(ValidationError::DisallowedTable(
                "environment; DELETE organization".into()
            ))
        );
        assert!("environment".parse::<DeletableTable>().is_err());
    }

    #[test]
    fn summary_has_a_field_per_table() {
        let counts: BTreeMap<_, _> = DeletableTable::ALL
            .iter()
            .enumerate()
            .map(|(i, t)| (*t, i as u64 + 1))
            .collect();
        let summary = EnvironmentDeletionSummary::from_counts(Uuid::nil(), &counts);
        for (i, table) in DeletableTable::ALL.iter().enumerate() {
            assert_eq!(summary.count(*table), i as u64 + 1);
        }
        assert_eq!(summary.total(), (1..=11).sum::<u64>());
    }

    #[test]
    fn missing_counts_are_zero() {
        let summary = EnvironmentDeletionSummary::from_counts(Uuid::nil(), &BTreeMap::new());
        assert_eq!(summary.total(), 0);
    }
}
