//! Urban Mobility Dashboard API Library
//!
//! This library provides the core functionality for the mobility dashboard
//! backend: the relational data models, the spreadsheet import contract, the
//! data synchronization service and the HTTP handlers.
//!
//! # Modules
//!
//! - `config`: Configuration management (profile, store, sources, CORS).
//! - `db`: Database connection, pool management and schema bootstrap.
//! - `errors`: Error handling types.
//! - `handlers`: Dashboard, metrics, sync and health HTTP handlers.
//! - `import_handler`: Spreadsheet upload handler.
//! - `import_schema`: Declared spreadsheet schema and typed row parsing.
//! - `models`: Core data models.
//! - `storage`: Trip and metric storage operations.
//! - `sync`: Data synchronization service.

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod import_handler;
pub mod import_schema;
pub mod models;
pub mod storage;
pub mod sync;
