//! Monitor deduplication: insert-if-absent keyed by phone
//!
//! [`MonitorDeduplicator::insert_if_absent`] must run inside
//! [`Database::write`](crate::db::Database::write). The `IMMEDIATE`
//! transaction holds SQLite's write lock from the phone lookup through the
//! insert, so two callers can never both observe "no monitor" for a phone.

use rusqlite::{params, Connection};
use tracing::{debug, error};

use crate::db::{fetch, insert_row};
use crate::error::{ProviderError, Result};
use crate::models::{ContentValues, Monitor, Value};
use crate::router::ResourceKind;
use crate::schema::monitor;

/// Result of a dedup lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupOutcome {
    /// A monitor already existed for the phone
    Existing(i64),
    /// A new monitor row was written
    Created(Monitor),
}

impl DedupOutcome {
    /// Id of the monitor the phone resolves to
    #[must_use]
    pub const fn monitor_id(&self) -> i64 {
        match self {
            Self::Existing(id) => *id,
            Self::Created(monitor) => monitor.id,
        }
    }
}

/// Insert-if-absent for monitors
#[derive(Debug, Copy, Clone)]
pub struct MonitorDeduplicator;

impl MonitorDeduplicator {
    /// Fill in the defaulted monitor columns, normalising the phone to text
    pub fn apply_defaults(values: &mut ContentValues) -> Result<String> {
        let phone = values
            .get_text(monitor::PHONE)
            .ok_or(ProviderError::MissingField {
                resource: "monitor",
                field: monitor::PHONE,
            })?;

        values.put(monitor::PHONE, phone.as_str());
        values.put_if_absent(monitor::ALIAS, phone.as_str());
        values.put_if_absent(monitor::EMAIL, "");
        values.put_if_absent(monitor::FIRST_NAME, "");
        values.put_if_absent(monitor::LAST_NAME, "");
        values.put_if_absent(monitor::INCOMING_MESSAGES, 0);
        Ok(phone)
    }

    /// Resolve the monitor for `values`' phone, inserting it if absent
    ///
    /// `values` must already carry the defaults from [`Self::apply_defaults`].
    pub fn insert_if_absent(conn: &Connection, values: &ContentValues) -> Result<DedupOutcome> {
        let phone = values.get_text(monitor::PHONE).ok_or(ProviderError::MissingField {
            resource: "monitor",
            field: monitor::PHONE,
        })?;

        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            monitor::ID,
            monitor::TABLE,
            monitor::PHONE
        ))?;
        let existing = stmt
            .query_map(params![phone], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        match existing.as_slice() {
            [] => {
                let id = insert_row(conn, monitor::TABLE, values)
                    .map_err(|e| ProviderError::insert_failed(ResourceKind::Monitor.path(), &e))?;
                let monitor = Self::load(conn, id)?;
                debug!(monitor_id = id, phone = %phone, "Created monitor");
                Ok(DedupOutcome::Created(monitor))
            },
            [id] => {
                debug!(monitor_id = id, phone = %phone, "Reusing existing monitor");
                Ok(DedupOutcome::Existing(*id))
            },
            ids => {
                error!(phone = %phone, count = ids.len(), "Duplicate monitors for phone");
                Err(ProviderError::IntegrityViolation {
                    phone,
                    count: ids.len(),
                })
            },
        }
    }

    fn load(conn: &Connection, id: i64) -> Result<Monitor> {
        let sql = format!("SELECT * FROM {} WHERE {} = ?", monitor::TABLE, monitor::ID);
        let rows = fetch(conn, &sql, &[Value::Integer(id)])?;
        let row = rows
            .first()
            .ok_or(ProviderError::Database(rusqlite::Error::QueryReturnedNoRows))?;
        Monitor::try_from(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use tempfile::tempdir;

    fn monitor_values(phone: &str) -> ContentValues {
        let mut values = ContentValues::new().with(monitor::PHONE, phone);
        MonitorDeduplicator::apply_defaults(&mut values).unwrap();
        values
    }

    #[test]
    fn test_apply_defaults() {
        let mut values = ContentValues::new().with(monitor::PHONE, 5_551_000).with(monitor::EMAIL, "a@b.org");
        let phone = MonitorDeduplicator::apply_defaults(&mut values).unwrap();

        assert_eq!(phone, "5551000");
        assert_eq!(values.get(monitor::PHONE), Some(&Value::from("5551000")));
        assert_eq!(values.get(monitor::ALIAS), Some(&Value::from("5551000")));
        assert_eq!(values.get(monitor::EMAIL), Some(&Value::from("a@b.org")));
        assert_eq!(values.get(monitor::INCOMING_MESSAGES), Some(&Value::Integer(0)));
    }

    #[test]
    fn test_apply_defaults_requires_phone() {
        let mut values = ContentValues::new().with(monitor::ALIAS, "nobody");
        let err = MonitorDeduplicator::apply_defaults(&mut values).unwrap_err();
        assert!(matches!(err, ProviderError::MissingField { field: "phone", .. }));
    }

    #[test]
    fn test_insert_if_absent_creates_then_reuses() {
        let temp_dir = tempdir().unwrap();
        let db = Database::new(temp_dir.path().join("dedup.db").to_str().unwrap()).unwrap();
        let values = monitor_values("555-1000");

        let first = db.write(|conn| MonitorDeduplicator::insert_if_absent(conn, &values)).unwrap();
        let DedupOutcome::Created(monitor) = &first else {
            panic!("expected a new monitor, got {first:?}");
        };
        assert_eq!(monitor.alias, "555-1000");

        let second = db.write(|conn| MonitorDeduplicator::insert_if_absent(conn, &values)).unwrap();
        assert_eq!(second, DedupOutcome::Existing(first.monitor_id()));
    }

    #[test]
    fn test_duplicate_rows_are_an_integrity_violation() {
        let temp_dir = tempdir().unwrap();
        let db = Database::new(temp_dir.path().join("corrupt.db").to_str().unwrap()).unwrap();
        db.write(|conn| {
            conn.execute_batch(
                "INSERT INTO rapidandroid_monitor (phone, alias) VALUES ('555-2000', 'a');
                 INSERT INTO rapidandroid_monitor (phone, alias) VALUES ('555-2000', 'b');",
            )?;
            Ok(())
        })
        .unwrap();

        let values = monitor_values("555-2000");
        let err = db
            .write(|conn| MonitorDeduplicator::insert_if_absent(conn, &values))
            .unwrap_err();
        assert!(matches!(err, ProviderError::IntegrityViolation { count: 2, .. }));
    }
}
