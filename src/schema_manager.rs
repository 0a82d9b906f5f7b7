//! Fixed and per-form table management
//!
//! The fixed tables are created by the embedded migration. Per-form data
//! tables are created by the administrative workflow; this module only
//! checks that they exist before data is written to them.

use std::sync::Arc;

use rusqlite::{params, Connection};
use tracing::{debug, warn};

use crate::db::Database;
use crate::error::{ProviderError, Result};
use crate::models::Form;
use crate::schema::{field, field_type, form, form_data, message, monitor};
use crate::validation::InputValidator;

/// Handle to an existing per-form data table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormTable {
    form_id: i64,
    name: String,
}

impl FormTable {
    /// Form owning the table
    #[must_use]
    pub const fn form_id(&self) -> i64 {
        self.form_id
    }

    /// Table name, `formdata_<prefix>`
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Owns the fixed tables and probes the dynamic ones
#[derive(Debug, Clone)]
pub struct SchemaManager {
    db: Arc<Database>,
}

impl SchemaManager {
    /// Fixed tables, in creation order
    pub const FIXED_TABLES: [&'static str; 5] = [
        monitor::TABLE,
        message::TABLE,
        form::TABLE,
        field_type::TABLE,
        field::TABLE,
    ];

    /// Create a manager over `db`
    #[must_use]
    pub const fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Run the fixed-table migration
    pub(crate) fn create_fixed_tables(conn: &Connection) -> Result<()> {
        conn.execute_batch(include_str!("../migrations/2009-01-09-000000_create_tables/up.sql"))?;
        debug!(tables = ?Self::FIXED_TABLES, "Fixed tables ready");
        Ok(())
    }

    /// Whether `formdata_<prefix>` exists
    pub fn table_exists_for_form(&self, prefix: &str) -> Result<bool> {
        self.db.read(|conn| Self::table_exists(conn, prefix))
    }

    /// Existence probe on an already checked-out connection
    pub(crate) fn table_exists(conn: &Connection, prefix: &str) -> Result<bool> {
        if !InputValidator::is_identifier(prefix) {
            return Ok(false);
        }

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            params![form_data::table_name(prefix)],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Resolve the data table of `form`, failing if it has not been created
    pub fn resolve_form_table(&self, form: &Form) -> Result<FormTable> {
        self.db.read(|conn| Self::resolve_form_table_in(conn, form))
    }

    pub(crate) fn resolve_form_table_in(conn: &Connection, form: &Form) -> Result<FormTable> {
        let prefix = form
            .prefix
            .as_deref()
            .ok_or_else(|| ProviderError::SchemaMismatch(format!("form {} has no prefix", form.id)))?;
        InputValidator::validate_form_prefix(prefix)?;

        if !Self::table_exists(conn, prefix)? {
            warn!(form_id = form.id, prefix = %prefix, "Form data table missing");
            return Err(ProviderError::SchemaMismatch(format!(
                "table {} does not exist for form {}",
                form_data::table_name(prefix),
                form.id
            )));
        }

        Ok(FormTable {
            form_id: form.id,
            name: form_data::table_name(prefix),
        })
    }

    /// Drop every form's data table. Destructive and unguarded; test tooling only.
    #[cfg(any(test, feature = "test-support"))]
    pub fn drop_all_form_data_tables(&self) -> Result<usize> {
        self.db.write(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM {} WHERE {} IS NOT NULL",
                form::PREFIX,
                form::TABLE,
                form::PREFIX
            ))?;
            let prefixes = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            drop(stmt);

            let mut dropped = 0;
            for prefix in prefixes {
                if Self::table_exists(conn, &prefix)? {
                    conn.execute_batch(&format!("DROP TABLE {};", form_data::table_name(&prefix)))?;
                    dropped += 1;
                }
            }

            warn!(dropped, "Dropped all form data tables");
            Ok(dropped)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn setup() -> (TempDir, SchemaManager) {
        let temp_dir = tempdir().unwrap();
        let db = Database::new(temp_dir.path().join("schema.db").to_str().unwrap()).unwrap();
        (temp_dir, SchemaManager::new(Arc::new(db)))
    }

    fn add_form(manager: &SchemaManager, prefix: &str, create_table: bool) -> Form {
        manager
            .db
            .write(|conn| {
                conn.execute(
                    "INSERT INTO rapidandroid_form (form_name, description, parse_method, prefix) VALUES (?1, '', 'simpleregex', ?1)",
                    params![prefix],
                )?;
                if create_table {
                    conn.execute_batch(&format!(
                        "CREATE TABLE formdata_{prefix} (id INTEGER PRIMARY KEY AUTOINCREMENT, message_id INTEGER)"
                    ))?;
                }
                Ok(Form {
                    id: conn.last_insert_rowid(),
                    form_name: prefix.to_string(),
                    description: String::new(),
                    parse_method: "simpleregex".to_string(),
                    prefix: Some(prefix.to_string()),
                })
            })
            .unwrap()
    }

    #[test]
    fn test_table_exists_for_form() {
        let (_dir, manager) = setup();
        add_form(&manager, "bednets", true);
        add_form(&manager, "nutrition", false);

        assert!(manager.table_exists_for_form("bednets").unwrap());
        assert!(!manager.table_exists_for_form("nutrition").unwrap());
        assert!(!manager.table_exists_for_form("x; DROP TABLE y").unwrap());
    }

    #[test]
    fn test_resolve_form_table() {
        let (_dir, manager) = setup();
        let form = add_form(&manager, "bednets", true);

        let table = manager.resolve_form_table(&form).unwrap();
        assert_eq!(table.name(), "formdata_bednets");
        assert_eq!(table.form_id(), form.id);

        let missing = add_form(&manager, "nutrition", false);
        let err = manager.resolve_form_table(&missing).unwrap_err();
        assert!(matches!(err, ProviderError::SchemaMismatch(_)));
    }

    #[test]
    fn test_drop_all_form_data_tables() {
        let (_dir, manager) = setup();
        add_form(&manager, "bednets", true);
        add_form(&manager, "malaria", true);
        add_form(&manager, "nutrition", false);

        assert_eq!(manager.drop_all_form_data_tables().unwrap(), 2);
        assert!(!manager.table_exists_for_form("bednets").unwrap());
        assert!(!manager.table_exists_for_form("malaria").unwrap());
        assert_eq!(manager.drop_all_form_data_tables().unwrap(), 0);
    }
}
