//! The data provider: insert, query and delete over every resource kind
//!
//! All mutations run through [`Database::write`], so a message insert
//! (sender resolution plus the message row) commits or rolls back as one
//! unit. Collaborator callbacks and change notifications run after commit.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::db::{fetch, insert_row, Database};
use crate::dedup::{DedupOutcome, MonitorDeduplicator};
use crate::error::{ProviderError, Result};
use crate::logging::OperationTimer;
use crate::metrics::MetricsCollector;
use crate::models::{ContentValues, ResultSet, Value};
use crate::notify::{ChangeNotifier, ChangeObserver, SubscriptionId};
use crate::router::{Locator, ResourceKind, Router};
use crate::schema::{field, field_type, form, message, monitor};
use crate::schema_manager::SchemaManager;
use crate::translation::{MessageTranslator, ModelTranslator, MonitorDirectory, StoreModelTranslator};
use crate::validation::InputValidator;

/// Where a successful insert landed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inserted {
    /// Locator of the new (or, for a dedup hit, existing) row
    ///
    /// Form data rows have no item route, so their locator is the
    /// `formdata/{formId}` address the insert was issued against.
    pub locator: Locator,
    /// Row id in the backing table
    pub row_id: i64,
}

/// Caller-side query and delete arguments
///
/// `clause` and `sort_order` are trusted SQL fragments; `clause` binds
/// `args` through positional `?` placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// Columns to return; `None` returns every column
    pub projection: Option<Vec<String>>,
    /// Extra `WHERE` fragment
    pub clause: Option<String>,
    /// Values bound to the placeholders in `clause`
    pub args: Vec<Value>,
    /// `ORDER BY` fragment
    pub sort_order: Option<String>,
}

impl Selection {
    /// Every row, every column
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Rows matching `clause`
    #[must_use]
    pub fn filter(clause: impl Into<String>, args: impl IntoIterator<Item = Value>) -> Self {
        Self {
            clause: Some(clause.into()),
            args: args.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Restrict the returned columns
    #[must_use]
    pub fn with_projection<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Order the results
    #[must_use]
    pub fn sorted_by(mut self, order: impl Into<String>) -> Self {
        self.sort_order = Some(order.into());
        self
    }

    /// Combine a locator predicate with the caller's clause
    fn where_clause(&self, predicate: Option<(&str, i64)>) -> (Option<String>, Vec<Value>) {
        let clause = self.clause.as_deref().filter(|clause| !clause.trim().is_empty());
        match (predicate, clause) {
            (Some((column, id)), Some(clause)) => {
                let mut args = Vec::with_capacity(self.args.len() + 1);
                args.push(Value::Integer(id));
                args.extend(self.args.iter().cloned());
                (Some(format!("{column} = ? AND ({clause})")), args)
            },
            (Some((column, id)), None) => (Some(format!("{column} = ?")), vec![Value::Integer(id)]),
            (None, Some(clause)) => (Some(clause.to_string()), self.args.clone()),
            (None, None) => (None, Vec::new()),
        }
    }
}

/// Local structured data provider
pub struct DataProvider {
    db: Arc<Database>,
    router: Arc<Router>,
    schema: SchemaManager,
    notifier: ChangeNotifier,
    models: Arc<dyn ModelTranslator>,
    messages: Arc<dyn MessageTranslator>,
    directory: Arc<MonitorDirectory>,
    metrics: MetricsCollector,
}

impl std::fmt::Debug for DataProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataProvider")
            .field("db", &self.db)
            .field("router", &self.router)
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

impl DataProvider {
    /// Provider over `db` with the store-backed collaborators
    pub fn new(db: Arc<Database>, router: Arc<Router>) -> Result<Self> {
        let directory = Arc::new(MonitorDirectory::load(&db)?);
        let metrics = MetricsCollector::default();
        metrics.describe();

        Ok(Self {
            schema: SchemaManager::new(Arc::clone(&db)),
            models: Arc::new(StoreModelTranslator::new(Arc::clone(&db))),
            messages: Arc::clone(&directory) as Arc<dyn MessageTranslator>,
            directory,
            notifier: ChangeNotifier::new(),
            db,
            router,
            metrics,
        })
    }

    /// Open the configured database and build a provider over it
    pub fn open(config: &AppConfig) -> Result<Self> {
        let db = Database::from_config(&config.database)?;
        let router = Arc::new(Router::new(&config.provider.authority));
        info!(authority = %router.authority(), "Data provider opened");
        Self::new(db, router)
    }

    /// Replace the form definition source
    #[must_use]
    pub fn with_model_translator(mut self, models: Arc<dyn ModelTranslator>) -> Self {
        self.models = models;
        self
    }

    /// Replace the new-monitor collaborator
    ///
    /// The built-in [`MonitorDirectory`] stops receiving new monitors once
    /// replaced.
    #[must_use]
    pub fn with_message_translator(mut self, messages: Arc<dyn MessageTranslator>) -> Self {
        self.messages = messages;
        self
    }

    /// The route table
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Phone to monitor id lookup kept current by monitor creation
    #[must_use]
    pub fn monitor_directory(&self) -> &MonitorDirectory {
        &self.directory
    }

    /// The per-form table manager
    #[must_use]
    pub const fn schema(&self) -> &SchemaManager {
        &self.schema
    }

    /// Insert `values` at `uri`
    pub fn insert(&self, uri: &str, values: ContentValues) -> Result<Inserted> {
        self.instrumented("insert", uri, |locator| self.insert_at(locator, values))
    }

    /// Query `uri`
    pub fn query(&self, uri: &str, selection: &Selection) -> Result<ResultSet> {
        self.instrumented("query", uri, |locator| self.query_at(locator, selection))
    }

    /// Query `uri` and watch it for later changes
    pub fn query_and_watch(
        &self,
        uri: &str,
        selection: &Selection,
        observer: Arc<dyn ChangeObserver>,
    ) -> Result<(ResultSet, SubscriptionId)> {
        self.instrumented("query", uri, |locator| {
            let rows = self.query_at(locator, selection)?;
            Ok((rows, self.notifier.register(locator, observer)))
        })
    }

    /// Delete rows at `uri`, returning how many were removed
    pub fn delete(&self, uri: &str, selection: &Selection) -> Result<usize> {
        self.instrumented("delete", uri, |locator| self.delete_at(locator, selection))
    }

    /// Updates are not supported for any resource
    pub fn update(&self, uri: &str, _values: &ContentValues, _selection: &Selection) -> Result<usize> {
        self.instrumented("update", uri, |locator| {
            Err(ProviderError::UnsupportedOperation(format!("update of {locator}")))
        })
    }

    /// Type string for `uri`
    pub fn content_type(&self, uri: &str) -> Result<String> {
        let locator = self.router.resolve(uri)?;
        Ok(self.router.content_type(&locator))
    }

    /// Watch `uri` for changes
    pub fn register_observer(&self, uri: &str, observer: Arc<dyn ChangeObserver>) -> Result<SubscriptionId> {
        let locator = self.router.resolve(uri)?;
        Ok(self.notifier.register(locator, observer))
    }

    /// Stop watching; false if the subscription was already gone
    pub fn unregister_observer(&self, id: SubscriptionId) -> bool {
        self.notifier.unregister(id)
    }

    fn instrumented<T>(&self, operation: &'static str, uri: &str, f: impl FnOnce(Locator) -> Result<T>) -> Result<T> {
        let timer = OperationTimer::new(operation, uri);
        let resolved = self.router.resolve(uri);
        let kind = resolved.as_ref().ok().map(|locator| locator.kind);

        let result = resolved.and_then(f);
        let duration = timer.finish();
        self.metrics
            .record_operation(operation, kind, duration, result.as_ref().err());

        if let Err(err) = &result {
            warn!(operation, uri = %uri, error = %err, kind = err.kind().as_str(), "Provider operation failed");
        }
        result
    }

    fn insert_at(&self, locator: Locator, values: ContentValues) -> Result<Inserted> {
        match (locator.kind, locator.id) {
            (ResourceKind::FormData, Some(form_id)) => self.insert_form_data(form_id, values),
            (ResourceKind::Message, None) => self.insert_message(values),
            (ResourceKind::Monitor, None) => self.insert_monitor(values),
            (ResourceKind::Form, None) => self.insert_definition(
                ResourceKind::Form,
                form::TABLE,
                values,
                &[form::FORM_NAME, form::DESCRIPTION, form::PARSE_METHOD],
            ),
            (ResourceKind::Field, None) => self.insert_definition(
                ResourceKind::Field,
                field::TABLE,
                values,
                &[field::FORM_ID, field::NAME, field::FIELD_TYPE_ID, field::PROMPT, field::SEQUENCE],
            ),
            (ResourceKind::FieldType, None) => self.insert_definition(
                ResourceKind::FieldType,
                field_type::TABLE,
                values,
                &[field_type::ID, field_type::NAME, field_type::REGEX, field_type::DATATYPE],
            ),
            _ => Err(ProviderError::UnsupportedOperation(format!("insert into {locator}"))),
        }
    }

    fn insert_message(&self, mut values: ContentValues) -> Result<Inserted> {
        InputValidator::require_fields(
            ResourceKind::Message.path(),
            &values,
            &[message::TEXT, message::PHONE, message::IS_OUTGOING],
        )?;
        values.put_if_absent(message::TIME, Utc::now().timestamp_millis());
        values.put_if_absent(message::IS_VIRTUAL, false);

        let mut sender = ContentValues::new();
        if let Some(phone) = values.get(message::PHONE) {
            sender.put(monitor::PHONE, phone.clone());
        }
        let phone = MonitorDeduplicator::apply_defaults(&mut sender)?;
        values.put(message::PHONE, phone);
        InputValidator::validate_columns(ResourceKind::Message.path(), &values)?;

        let (outcome, id) = self.db.write(|conn| {
            let outcome = MonitorDeduplicator::insert_if_absent(conn, &sender)?;
            values.put(message::MONITOR_ID, outcome.monitor_id());
            let id = insert_row(conn, message::TABLE, &values)
                .map_err(|e| ProviderError::insert_failed(ResourceKind::Message.path(), &e))?;
            Ok((outcome, id))
        })?;

        self.monitor_resolved(&outcome);
        debug!(message_id = id, monitor_id = outcome.monitor_id(), "Message stored");
        Ok(self.inserted(Locator::item(ResourceKind::Message, id), id))
    }

    fn insert_monitor(&self, mut values: ContentValues) -> Result<Inserted> {
        MonitorDeduplicator::apply_defaults(&mut values)?;
        InputValidator::validate_columns(ResourceKind::Monitor.path(), &values)?;

        let outcome = self
            .db
            .write(|conn| MonitorDeduplicator::insert_if_absent(conn, &values))?;
        self.monitor_resolved(&outcome);

        let id = outcome.monitor_id();
        Ok(Inserted {
            locator: Locator::item(ResourceKind::Monitor, id),
            row_id: id,
        })
    }

    /// Post-commit side effects of a dedup lookup; a hit has none
    fn monitor_resolved(&self, outcome: &DedupOutcome) {
        match outcome {
            DedupOutcome::Created(monitor) => {
                self.metrics.record_dedup(true);
                // A message insert that creates its sender also announces
                // monitor/{id}, on top of message/{id}. Monitor watchers rely on it.
                self.messages.monitor_created(monitor);
                self.publish(&Locator::item(ResourceKind::Monitor, monitor.id));
            },
            DedupOutcome::Existing(_) => self.metrics.record_dedup(false),
        }
    }

    fn insert_definition(
        &self,
        kind: ResourceKind,
        table: &str,
        values: ContentValues,
        required: &[&'static str],
    ) -> Result<Inserted> {
        InputValidator::require_fields(kind.path(), &values, required)?;
        InputValidator::validate_columns(kind.path(), &values)?;

        let id = self.db.write(|conn| {
            insert_row(conn, table, &values).map_err(|e| ProviderError::insert_failed(kind.path(), &e))
        })?;
        Ok(self.inserted(Locator::item(kind, id), id))
    }

    fn insert_form_data(&self, form_id: i64, values: ContentValues) -> Result<Inserted> {
        let locator = Locator::item(ResourceKind::FormData, form_id);
        let form = self
            .models
            .form_by_id(form_id)?
            .ok_or_else(|| ProviderError::SchemaMismatch(format!("form {form_id} does not exist")))?;
        InputValidator::validate_columns(&locator.path(), &values)?;

        let id = self.db.write(|conn| {
            let table = SchemaManager::resolve_form_table_in(conn, &form)?;
            insert_row(conn, table.name(), &values).map_err(|e| ProviderError::insert_failed(locator.path(), &e))
        })?;

        // Form data changes are announced on the form collection.
        self.publish(&Locator::collection(ResourceKind::Form));
        debug!(form_id, row_id = id, "Form data stored");
        Ok(Inserted { locator, row_id: id })
    }

    fn inserted(&self, locator: Locator, row_id: i64) -> Inserted {
        self.publish(&locator);
        Inserted { locator, row_id }
    }

    fn publish(&self, locator: &Locator) {
        let delivered = self.notifier.notify(locator);
        self.metrics.record_notification(locator.kind, delivered);
    }

    fn query_at(&self, locator: Locator, selection: &Selection) -> Result<ResultSet> {
        let (table, predicate) = match (locator.kind, locator.id) {
            (ResourceKind::MessagesByMonitor, Some(monitor_id)) => {
                (message::TABLE.to_string(), Some((message::MONITOR_ID, monitor_id)))
            },
            (ResourceKind::FormData, Some(form_id)) => (self.form_data_table(form_id)?, None),
            (_, id) => {
                let (table, id_column) = Self::fixed_table(locator)?;
                (table.to_string(), id.map(|id| (id_column, id)))
            },
        };

        let columns = match &selection.projection {
            Some(columns) if !columns.is_empty() => {
                InputValidator::validate_projection(&locator.path(), columns)?;
                columns.join(", ")
            },
            _ => "*".to_string(),
        };

        let (clause, args) = selection.where_clause(predicate);
        let mut sql = format!("SELECT {columns} FROM {table}");
        if let Some(clause) = clause {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }
        if let Some(order) = selection.sort_order.as_deref().filter(|order| !order.trim().is_empty()) {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }

        let rows = self.db.read(|conn| fetch(conn, &sql, &args))?;
        debug!(locator = %locator, rows = rows.len(), "Query executed");
        Ok(rows)
    }

    fn delete_at(&self, locator: Locator, selection: &Selection) -> Result<usize> {
        let (table, predicate) = match (locator.kind, locator.id) {
            (ResourceKind::Message, id) => (message::TABLE, id.map(|id| (message::ID, id))),
            (ResourceKind::Monitor, id) => (monitor::TABLE, id.map(|id| (monitor::ID, id))),
            (ResourceKind::MessagesByMonitor, Some(monitor_id)) => (message::TABLE, Some((message::MONITOR_ID, monitor_id))),
            _ => return Err(ProviderError::UnsupportedOperation(format!("delete from {locator}"))),
        };

        let (clause, args) = selection.where_clause(predicate);
        let sql = match clause {
            Some(clause) => format!("DELETE FROM {table} WHERE {clause}"),
            None => format!("DELETE FROM {table}"),
        };

        let removed = self
            .db
            .write(|conn| Ok(conn.execute(&sql, rusqlite::params_from_iter(args.iter()))?))?;
        debug!(locator = %locator, removed, "Rows deleted");
        Ok(removed)
    }

    fn form_data_table(&self, form_id: i64) -> Result<String> {
        let form = self
            .models
            .form_by_id(form_id)?
            .ok_or_else(|| ProviderError::SchemaMismatch(format!("form {form_id} does not exist")))?;
        Ok(self.schema.resolve_form_table(&form)?.name().to_string())
    }

    /// Table and primary key column behind a fixed-table locator
    fn fixed_table(locator: Locator) -> Result<(&'static str, &'static str)> {
        match locator.kind {
            ResourceKind::Message => Ok((message::TABLE, message::ID)),
            ResourceKind::Monitor => Ok((monitor::TABLE, monitor::ID)),
            ResourceKind::Form => Ok((form::TABLE, form::ID)),
            ResourceKind::Field => Ok((field::TABLE, field::ID)),
            ResourceKind::FieldType => Ok((field_type::TABLE, field_type::ID)),
            ResourceKind::MessagesByMonitor | ResourceKind::FormData => {
                Err(ProviderError::UnknownResource(locator.path()))
            },
        }
    }
}
