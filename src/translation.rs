//! Collaborator seams
//!
//! [`ModelTranslator`] supplies form definitions; [`MessageTranslator`] is
//! told whenever deduplication creates a new monitor. Both ship with a
//! store-backed default.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::db::{fetch, Database};
use crate::error::Result;
use crate::models::{Field, FieldType, Form, Monitor, Value};
use crate::schema::{field, field_type, form, monitor};

/// Supplies form, field and field type definitions
#[cfg_attr(test, mockall::automock)]
pub trait ModelTranslator: Send + Sync {
    /// Form by id
    fn form_by_id(&self, id: i64) -> Result<Option<Form>>;
    /// Every form
    fn all_forms(&self) -> Result<Vec<Form>>;
    /// Fields of a form, in sequence order
    fn fields_for_form(&self, form_id: i64) -> Result<Vec<Field>>;
    /// Field type by id
    fn field_type_by_id(&self, id: i64) -> Result<Option<FieldType>>;
}

/// Notified once per genuinely new monitor
#[cfg_attr(test, mockall::automock)]
pub trait MessageTranslator: Send + Sync {
    /// A monitor row was just created for a previously unknown phone
    fn monitor_created(&self, monitor: &Monitor);
}

/// [`ModelTranslator`] reading the fixed tables
#[derive(Debug, Clone)]
pub struct StoreModelTranslator {
    db: Arc<Database>,
}

impl StoreModelTranslator {
    /// Create a translator over `db`
    #[must_use]
    pub const fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl ModelTranslator for StoreModelTranslator {
    fn form_by_id(&self, id: i64) -> Result<Option<Form>> {
        let sql = format!("SELECT * FROM {} WHERE {} = ?", form::TABLE, form::ID);
        let rows = self.db.read(|conn| fetch(conn, &sql, &[Value::Integer(id)]))?;
        rows.first().map(Form::try_from).transpose()
    }

    fn all_forms(&self) -> Result<Vec<Form>> {
        let sql = format!("SELECT * FROM {} ORDER BY {}", form::TABLE, form::ID);
        self.db.read(|conn| fetch(conn, &sql, &[]))?.map_rows()
    }

    fn fields_for_form(&self, form_id: i64) -> Result<Vec<Field>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ? ORDER BY {}",
            field::TABLE,
            field::FORM_ID,
            field::SEQUENCE
        );
        self.db
            .read(|conn| fetch(conn, &sql, &[Value::Integer(form_id)]))?
            .map_rows()
    }

    fn field_type_by_id(&self, id: i64) -> Result<Option<FieldType>> {
        let sql = format!("SELECT * FROM {} WHERE {} = ?", field_type::TABLE, field_type::ID);
        let rows = self.db.read(|conn| fetch(conn, &sql, &[Value::Integer(id)]))?;
        rows.first().map(FieldType::try_from).transpose()
    }
}

/// In-memory phone → monitor id lookup kept current by the provider
#[derive(Debug, Default)]
pub struct MonitorDirectory {
    phones: RwLock<HashMap<String, i64>>,
}

impl MonitorDirectory {
    /// Empty directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory preloaded from the monitor table
    pub fn load(db: &Database) -> Result<Self> {
        let directory = Self::new();
        directory.reload(db)?;
        Ok(directory)
    }

    /// Replace the contents with the monitor table, returning the entry count
    pub fn reload(&self, db: &Database) -> Result<usize> {
        let sql = format!("SELECT {}, {} FROM {}", monitor::ID, monitor::PHONE, monitor::TABLE);
        let rows = db.read(|conn| fetch(conn, &sql, &[]))?;

        let mut phones = HashMap::with_capacity(rows.len());
        for row in &rows {
            phones.insert(row.get_string(monitor::PHONE)?, row.get_i64(monitor::ID)?);
        }

        let count = phones.len();
        *self.phones.write().unwrap_or_else(PoisonError::into_inner) = phones;
        debug!(monitors = count, "Monitor directory reloaded");
        Ok(count)
    }

    /// Monitor id for a phone
    #[must_use]
    pub fn monitor_id(&self, phone: &str) -> Option<i64> {
        self.phones
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(phone)
            .copied()
    }

    /// Number of known phones
    #[must_use]
    pub fn len(&self) -> usize {
        self.phones.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True when no phone is known
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MessageTranslator for MonitorDirectory {
    fn monitor_created(&self, monitor: &Monitor) {
        self.phones
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(monitor.phone.clone(), monitor.id);
    }
}
