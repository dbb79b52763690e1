//! Table and migration descriptors.
//!
//! Both are built by the caller before any lock-sensitive work starts and
//! are only read by this crate.

use std::collections::BTreeSet;

use chrono::{DateTime, Local, Timelike};
use serde::{Deserialize, Serialize};

use crate::core::identifier::MAX_IDENTIFIER_LENGTH;

/// Prefix of archive table names.
pub const ARCHIVE_PREFIX: &str = "lhma";

/// A table taking part in a migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,

    /// Column names.
    #[serde(default)]
    pub columns: BTreeSet<String>,
}

impl Table {
    /// Create a table descriptor without column information.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: BTreeSet::new(),
        }
    }

    /// Attach column names.
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }
}

/// The origin table, its shadow copy, and the name the origin is archived
/// under once the shadow takes its place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    /// Live table being migrated.
    pub origin: Table,
    /// Shadow table holding the migrated copy.
    pub destination: Table,
    archive_name: String,
}

impl Migration {
    /// Create a migration started now.
    pub fn new(origin: Table, destination: Table) -> Self {
        Self::started_at(origin, destination, Local::now())
    }

    /// Create a migration with an explicit start time.
    ///
    /// The archive name is `lhma_<YYYY_MM_DD_HH_MM_SS_mmm>_<origin>`, cut to
    /// the 64-character identifier limit for long origin names.
    pub fn started_at(origin: Table, destination: Table, start: DateTime<Local>) -> Self {
        let archive_name: String = format!(
            "{}_{}_{:03}_{}",
            ARCHIVE_PREFIX,
            start.format("%Y_%m_%d_%H_%M_%S"),
            start.nanosecond() / 1_000_000 % 1000,
            origin.name
        )
        .chars()
        .take(MAX_IDENTIFIER_LENGTH)
        .collect();
        Self {
            origin,
            destination,
            archive_name,
        }
    }

    /// Override the derived archive name.
    pub fn with_archive_name(mut self, archive_name: impl Into<String>) -> Self {
        self.archive_name = archive_name.into();
        self
    }

    /// Name the origin table is renamed to by the switch.
    pub fn archive_name(&self) -> &str {
        &self.archive_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    use crate::core::identifier::validate_identifier;

    #[test]
    fn test_archive_name_derived_from_origin_and_start() {
        let start = Local
            .with_ymd_and_hms(2024, 3, 7, 9, 5, 1)
            .unwrap()
            .with_nanosecond(42_000_000)
            .unwrap();
        let migration = Migration::started_at(Table::new("orders"), Table::new("lhmn_orders"), start);
        assert_eq!(migration.archive_name(), "lhma_2024_03_07_09_05_01_042_orders");
    }

    #[test]
    fn test_archive_name_cut_to_identifier_limit() {
        let start = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 1).unwrap();
        let origin = "customer_subscription_billing_events_archive";
        let migration = Migration::started_at(Table::new(origin), Table::new("shadow"), start);

        let name = migration.archive_name();
        assert_eq!(name.chars().count(), MAX_IDENTIFIER_LENGTH);
        assert!(name.starts_with("lhma_2024_03_07_09_05_01_000_customer_subscription"));
        assert!(validate_identifier(name).is_ok());

        let short = Migration::started_at(Table::new("orders"), Table::new("shadow"), start);
        assert_eq!(short.archive_name(), "lhma_2024_03_07_09_05_01_000_orders");
    }

    #[test]
    fn test_archive_name_override() {
        let migration = Migration::new(Table::new("t"), Table::new("t_new")).with_archive_name("t_old");
        assert_eq!(migration.archive_name(), "t_old");
        assert_ne!(migration.archive_name(), migration.origin.name);
        assert_ne!(migration.archive_name(), migration.destination.name);
    }

    #[test]
    fn test_table_columns() {
        let table = Table::new("users").with_columns(["id", "email"]);
        assert!(table.columns.contains("email"));
        assert_eq!(table.columns.len(), 2);
    }
}
