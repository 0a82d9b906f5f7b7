//! Per-form data table inserts and queries

use std::sync::Arc;

use rapidsms_provider::{ContentValues, DataProvider, Database, ErrorKind, Router, Selection};
use tempfile::TempDir;

fn setup() -> (TempDir, Arc<Database>, DataProvider) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_url = format!("sqlite://{}", temp_dir.path().join("formdata.db").display());
    let db = Arc::new(Database::new(&db_url).expect("Failed to create database"));
    let provider = DataProvider::new(Arc::clone(&db), Arc::new(Router::default())).expect("Failed to create provider");
    (temp_dir, db, provider)
}

fn add_form(provider: &DataProvider, prefix: &str) -> i64 {
    provider
        .insert(
            "form",
            ContentValues::new()
                .with("form_name", prefix)
                .with("description", "")
                .with("parse_method", "simpleregex")
                .with("prefix", prefix),
        )
        .expect("Form insert failed")
        .row_id
}

fn create_table(db: &Database, prefix: &str) {
    let conn = db.get_connection().expect("Failed to get connection");
    conn.execute_batch(&format!(
        "CREATE TABLE formdata_{prefix} (id INTEGER PRIMARY KEY AUTOINCREMENT, message_id INTEGER NOT NULL, village TEXT, nets INTEGER)"
    ))
    .expect("Failed to create form table");
}

#[test]
fn test_insert_and_query_form_data() {
    let (_dir, db, provider) = setup();
    let form_id = add_form(&provider, "bednets");
    create_table(&db, "bednets");
    assert!(provider.schema().table_exists_for_form("bednets").expect("probe failed"));

    let uri = format!("formdata/{form_id}");
    let inserted = provider
        .insert(
            &uri,
            ContentValues::new()
                .with("message_id", 1)
                .with("village", "Kisumu")
                .with("nets", 12),
        )
        .expect("Form data insert failed");
    assert_eq!(inserted.row_id, 1);

    let rows = provider.query(&uri, &Selection::all()).expect("Query failed");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows.first().and_then(|row| row.get_i64("nets").ok()), Some(12));
}

#[test]
fn test_missing_table_is_schema_mismatch() {
    let (_dir, _db, provider) = setup();
    let form_id = add_form(&provider, "nutrition");

    let err = provider
        .insert(&format!("formdata/{form_id}"), ContentValues::new().with("message_id", 1))
        .expect_err("Insert should fail");
    assert_eq!(err.kind(), ErrorKind::SchemaMismatch);

    let err = provider
        .query(&format!("formdata/{form_id}"), &Selection::all())
        .expect_err("Query should fail");
    assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
}

#[test]
fn test_unknown_form_is_schema_mismatch() {
    let (_dir, _db, provider) = setup();
    let err = provider
        .insert("formdata/42", ContentValues::new().with("message_id", 1))
        .expect_err("Insert should fail");
    assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
}

#[test]
fn test_invalid_column_is_insert_failed() {
    let (_dir, db, provider) = setup();
    let form_id = add_form(&provider, "bednets");
    create_table(&db, "bednets");

    let err = provider
        .insert(&format!("formdata/{form_id}"), ContentValues::new().with("nets) VALUES (1); --", 1))
        .expect_err("Insert should fail");
    assert_eq!(err.kind(), ErrorKind::InsertFailed);

    let err = provider
        .insert(&format!("formdata/{form_id}"), ContentValues::new().with("no_such_column", 1))
        .expect_err("Insert should fail");
    assert_eq!(err.kind(), ErrorKind::InsertFailed);
}
