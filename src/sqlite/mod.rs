//! SQLite backend for the marketplace engine.

pub mod db;
mod sqlite_impl;

pub use sqlite_impl::SqliteDatabase;
