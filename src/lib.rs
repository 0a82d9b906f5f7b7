//! RapidSMS Provider - Local Structured Data for SMS Data Collection
//!
//! A Rust library exposing messages, monitors (known senders), form
//! definitions and per-form data tables through `content://` style
//! addresses, backed by SQLite.
//!
//! # Features
//!
//! - Insert, query and delete across every resource kind
//! - Atomic sender deduplication keyed by phone
//! - In-process change notification for observers
//! - Existence-checked per-form data tables
//! - Layered configuration, structured logging and metrics

/// Configuration management
pub mod config;
/// Database operations and connection pooling
pub mod db;
/// Monitor insert-if-absent
pub mod dedup;
/// Error types
pub mod error;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Change notification
pub mod notify;
/// The data provider
pub mod provider;
/// Address routing
pub mod router;
/// Database schema definitions
pub mod schema;
/// Fixed and per-form table management
pub mod schema_manager;
/// Collaborator traits and their defaults
pub mod translation;
/// Input validation and sanitization
pub mod validation;

// Re-export key components for easier access
pub use db::Database;
pub use error::{ErrorKind, ProviderError, Result};
pub use models::{ContentValues, Field, FieldType, Form, Message, Monitor, ResultSet, Row, Value};
pub use notify::{ChangeObserver, SubscriptionId};
pub use provider::{DataProvider, Inserted, Selection};
pub use router::{Locator, ResourceKind, Router};
