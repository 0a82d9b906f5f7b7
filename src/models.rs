//! Data models for provider requests and results
//!
//! Inserts carry a [`ContentValues`] map; queries return a [`ResultSet`] of
//! column-named rows. The typed entities convert from those rows.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rusqlite::types::{ToSql, ToSqlOutput, Type, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, Result};
use crate::schema::{field, field_type, form, message, monitor};

/// A single column value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Integer value
    Integer(i64),
    /// Floating point value
    Real(f64),
    /// Text value
    Text(String),
    /// Boolean value, stored as 0/1
    Bool(bool),
}

impl Value {
    /// Integer view; booleans map to 0/1 and numeric text is parsed
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Null | Self::Real(_) => None,
        }
    }

    /// Boolean view; integers are true when non-zero
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Integer(i) => Some(*i != 0),
            Self::Text(s) => match s.as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            Self::Null | Self::Real(_) => None,
        }
    }

    /// Text rendering of any non-null value
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Integer(i) => Some(i.to_string()),
            Self::Real(f) => Some(f.to_string()),
            Self::Text(s) => Some(s.clone()),
            Self::Bool(b) => Some(b.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Text(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::from(rusqlite::types::Null),
            Self::Integer(i) => ToSqlOutput::from(*i),
            Self::Real(r) => ToSqlOutput::from(*r),
            Self::Text(s) => ToSqlOutput::from(s.as_str()),
            Self::Bool(b) => ToSqlOutput::from(*b),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(i) => Self::Integer(i),
            ValueRef::Real(r) => Self::Real(r),
            ValueRef::Text(t) | ValueRef::Blob(t) => Self::Text(String::from_utf8_lossy(t).into_owned()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Column → value map handed to `insert`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentValues {
    values: BTreeMap<String, Value>,
}

impl ContentValues {
    /// Create an empty map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`ContentValues::put`]
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.put(key, value);
        self
    }

    /// Set a column, replacing any previous value
    pub fn put(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Set a column only when it is absent
    pub fn put_if_absent(&mut self, key: &str, value: impl Into<Value>) {
        self.values.entry(key.to_string()).or_insert_with(|| value.into());
    }

    /// True when the column is present (even if NULL)
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Value for a column
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Text rendering of a column
    #[must_use]
    pub fn get_text(&self, key: &str) -> Option<String> {
        self.values.get(key).and_then(Value::to_text)
    }

    /// Remove a column
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Number of columns
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no columns are set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate columns in name order
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.values.iter()
    }
}

impl<'a> IntoIterator for &'a ContentValues {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ContentValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// One row of a query result
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub(crate) const fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Column names, in select order
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values, in select order
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value of a named column
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| self.values.get(idx))
    }

    fn require(&self, column: &str) -> Result<&Value> {
        self.get(column)
            .ok_or_else(|| ProviderError::Database(rusqlite::Error::InvalidColumnName(column.to_string())))
    }

    fn type_error(&self, column: &str, expected: Type) -> ProviderError {
        let idx = self.columns.iter().position(|c| c == column).unwrap_or_default();
        ProviderError::Database(rusqlite::Error::InvalidColumnType(idx, column.to_string(), expected))
    }

    /// Integer column
    pub fn get_i64(&self, column: &str) -> Result<i64> {
        self.require(column)?
            .as_i64()
            .ok_or_else(|| self.type_error(column, Type::Integer))
    }

    /// Boolean column
    pub fn get_bool(&self, column: &str) -> Result<bool> {
        self.require(column)?
            .as_bool()
            .ok_or_else(|| self.type_error(column, Type::Integer))
    }

    /// Text column
    pub fn get_string(&self, column: &str) -> Result<String> {
        self.require(column)?
            .to_text()
            .ok_or_else(|| self.type_error(column, Type::Text))
    }

    /// Nullable text column
    pub fn get_opt_string(&self, column: &str) -> Result<Option<String>> {
        Ok(self.require(column)?.to_text())
    }

    /// Column → value pairs, for serialization
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.columns.iter().cloned().zip(self.values.iter().cloned()).collect()
    }
}

/// Rows returned by a query
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    columns: Arc<[String]>,
    rows: Vec<Row>,
}

impl ResultSet {
    pub(crate) const fn new(columns: Arc<[String]>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Column names
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the query matched nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate rows
    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// First row, if any
    #[must_use]
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Convert every row into a typed entity
    pub fn map_rows<T>(&self) -> Result<Vec<T>>
    where
        T: for<'r> TryFrom<&'r Row, Error = ProviderError>,
    {
        self.rows.iter().map(T::try_from).collect()
    }
}

impl IntoIterator for ResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// A stored SMS message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Database primary key
    pub id: i64,
    /// Counterpart phone number
    pub phone: String,
    /// Message body
    pub text: String,
    /// Epoch milliseconds
    pub time: i64,
    /// True if sent from this device
    pub is_outgoing: bool,
    /// True if injected locally rather than received
    pub is_virtual: bool,
    /// Foreign key to the monitor table
    pub monitor_id: i64,
}

impl TryFrom<&Row> for Message {
    type Error = ProviderError;

    fn try_from(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_i64(message::ID)?,
            phone: row.get_string(message::PHONE)?,
            text: row.get_string(message::TEXT)?,
            time: row.get_i64(message::TIME)?,
            is_outgoing: row.get_bool(message::IS_OUTGOING)?,
            is_virtual: row.get_bool(message::IS_VIRTUAL)?,
            monitor_id: row.get_i64(message::MONITOR_ID)?,
        })
    }
}

/// A known SMS sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monitor {
    /// Database primary key
    pub id: i64,
    /// Phone identity
    pub phone: String,
    /// Display alias
    pub alias: String,
    /// Email address
    pub email: String,
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
    /// Incoming message counter
    pub incoming_messages: i64,
}

impl TryFrom<&Row> for Monitor {
    type Error = ProviderError;

    fn try_from(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_i64(monitor::ID)?,
            phone: row.get_string(monitor::PHONE)?,
            alias: row.get_string(monitor::ALIAS)?,
            email: row.get_string(monitor::EMAIL)?,
            first_name: row.get_string(monitor::FIRST_NAME)?,
            last_name: row.get_string(monitor::LAST_NAME)?,
            incoming_messages: row.get_i64(monitor::INCOMING_MESSAGES)?,
        })
    }
}

/// A user-defined message schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    /// Database primary key
    pub id: i64,
    /// Form name
    pub form_name: String,
    /// Description
    pub description: String,
    /// Parser identifier
    pub parse_method: String,
    /// Keyword prefix naming the form's data table
    pub prefix: Option<String>,
}

impl TryFrom<&Row> for Form {
    type Error = ProviderError;

    fn try_from(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_i64(form::ID)?,
            form_name: row.get_string(form::FORM_NAME)?,
            description: row.get_string(form::DESCRIPTION)?,
            parse_method: row.get_string(form::PARSE_METHOD)?,
            prefix: row.get_opt_string(form::PREFIX)?,
        })
    }
}

/// A typed, ordered slot within a form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Database primary key
    pub id: i64,
    /// Owning form
    pub form_id: i64,
    /// Field name, also the data table column
    pub name: String,
    /// Field type
    pub field_type_id: i64,
    /// Prompt text
    pub prompt: String,
    /// Ordering index within the form
    pub sequence: i64,
}

impl TryFrom<&Row> for Field {
    type Error = ProviderError;

    fn try_from(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_i64(field::ID)?,
            form_id: row.get_i64(field::FORM_ID)?,
            name: row.get_string(field::NAME)?,
            field_type_id: row.get_i64(field::FIELD_TYPE_ID)?,
            prompt: row.get_string(field::PROMPT)?,
            sequence: row.get_i64(field::SEQUENCE)?,
        })
    }
}

/// A reusable validation pattern and storage type tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldType {
    /// Primary key (caller supplied)
    pub id: i64,
    /// Type name
    pub name: String,
    /// Validation pattern
    pub regex: String,
    /// Storage type tag
    pub datatype: String,
}

impl TryFrom<&Row> for FieldType {
    type Error = ProviderError;

    fn try_from(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_i64(field_type::ID)?,
            name: row.get_string(field_type::NAME)?,
            regex: row.get_string(field_type::REGEX)?,
            datatype: row.get_string(field_type::DATATYPE)?,
        })
    }
}

/// Data for creating a new message
#[derive(Debug, Clone)]
pub struct NewMessage {
    /// Counterpart phone number
    pub phone: String,
    /// Message body
    pub text: String,
    /// True if sent from this device
    pub is_outgoing: bool,
    /// Epoch milliseconds (defaults to now)
    pub time: Option<i64>,
    /// Locally injected flag (defaults to false)
    pub is_virtual: Option<bool>,
}

impl From<NewMessage> for ContentValues {
    fn from(new: NewMessage) -> Self {
        let mut values = Self::new()
            .with(message::PHONE, new.phone)
            .with(message::TEXT, new.text)
            .with(message::IS_OUTGOING, new.is_outgoing);
        if let Some(time) = new.time {
            values.put(message::TIME, time);
        }
        if let Some(is_virtual) = new.is_virtual {
            values.put(message::IS_VIRTUAL, is_virtual);
        }
        values
    }
}

/// Data for creating a new monitor
#[derive(Debug, Clone, Default)]
pub struct NewMonitor {
    /// Phone identity
    pub phone: String,
    /// Display alias (defaults to the phone)
    pub alias: Option<String>,
    /// Email address
    pub email: Option<String>,
    /// First name
    pub first_name: Option<String>,
    /// Last name
    pub last_name: Option<String>,
}

impl From<NewMonitor> for ContentValues {
    fn from(new: NewMonitor) -> Self {
        let mut values = Self::new().with(monitor::PHONE, new.phone);
        for (column, value) in [
            (monitor::ALIAS, new.alias),
            (monitor::EMAIL, new.email),
            (monitor::FIRST_NAME, new.first_name),
            (monitor::LAST_NAME, new.last_name),
        ] {
            if let Some(value) = value {
                values.put(column, value);
            }
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Value)]) -> Row {
        let columns: Arc<[String]> = pairs.iter().map(|(c, _)| (*c).to_string()).collect();
        Row::new(columns, pairs.iter().map(|(_, v)| v.clone()).collect())
    }

    #[test]
    fn test_value_views() {
        assert_eq!(Value::Bool(true).as_i64(), Some(1));
        assert_eq!(Value::Text("42".into()).as_i64(), Some(42));
        assert_eq!(Value::Integer(0).as_bool(), Some(false));
        assert_eq!(Value::Integer(5551000).to_text().as_deref(), Some("5551000"));
        assert_eq!(Value::Null.to_text(), None);
    }

    #[test]
    fn test_content_values_put_if_absent() {
        let mut values = ContentValues::new().with("alias", "Bob");
        values.put_if_absent("alias", "555-1000");
        values.put_if_absent("email", "");
        assert_eq!(values.get("alias"), Some(&Value::from("Bob")));
        assert_eq!(values.get("email"), Some(&Value::from("")));
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_monitor_from_row() {
        let row = row(&[
            ("id", Value::Integer(1)),
            ("phone", Value::from("555-1000")),
            ("alias", Value::from("555-1000")),
            ("email", Value::from("")),
            ("first_name", Value::from("")),
            ("last_name", Value::from("")),
            ("incoming_messages", Value::Integer(0)),
        ]);
        let monitor = Monitor::try_from(&row).unwrap();
        assert_eq!(monitor.id, 1);
        assert_eq!(monitor.alias, "555-1000");
    }

    #[test]
    fn test_missing_column_is_error() {
        let row = row(&[("id", Value::Integer(1))]);
        assert!(Message::try_from(&row).is_err());
    }

    #[test]
    fn test_new_message_into_values() {
        let values: ContentValues = NewMessage {
            phone: "555-1000".into(),
            text: "hello".into(),
            is_outgoing: false,
            time: None,
            is_virtual: None,
        }
        .into();
        assert!(values.contains(message::IS_OUTGOING));
        assert!(!values.contains(message::TIME));
    }
}
