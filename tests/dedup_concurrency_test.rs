//! Concurrent monitor resolution must never create duplicate senders

use std::sync::Arc;

use rapidsms_provider::{ContentValues, DataProvider, Database, Locator, Router, Selection, Value};
use tempfile::TempDir;

const THREADS: usize = 8;

fn open_provider(temp_dir: &TempDir) -> Arc<DataProvider> {
    let db_url = format!("sqlite://{}", temp_dir.path().join("concurrent.db").display());
    let db = Database::new(&db_url).expect("Failed to create database");
    Arc::new(DataProvider::new(Arc::new(db), Arc::new(Router::default())).expect("Failed to create provider"))
}

#[test]
fn test_concurrent_monitor_inserts_create_one_row() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let provider = open_provider(&temp_dir);

    let locators: Vec<Locator> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let provider = Arc::clone(&provider);
                scope.spawn(move || {
                    provider
                        .insert("monitor", ContentValues::new().with("phone", "555-1000"))
                        .expect("Monitor insert failed")
                        .locator
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().expect("thread panicked")).collect()
    });

    assert!(locators.windows(2).all(|pair| pair[0] == pair[1]));
    let rows = provider
        .query("monitor", &Selection::filter("phone = ?", [Value::from("555-1000")]))
        .expect("Query failed");
    assert_eq!(rows.len(), 1);
}

#[test]
fn test_concurrent_messages_share_one_sender() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let provider = open_provider(&temp_dir);

    std::thread::scope(|scope| {
        for n in 0..THREADS {
            let provider = Arc::clone(&provider);
            scope.spawn(move || {
                provider
                    .insert(
                        "message",
                        ContentValues::new()
                            .with("phone", "555-7000")
                            .with("text", format!("report {n}"))
                            .with("is_outgoing", false),
                    )
                    .expect("Message insert failed");
            });
        }
    });

    assert_eq!(provider.query("monitor", &Selection::all()).expect("Query failed").len(), 1);
    let messages = provider
        .query("messagesbymonitor/1", &Selection::all())
        .expect("Query failed");
    assert_eq!(messages.len(), THREADS);
}
