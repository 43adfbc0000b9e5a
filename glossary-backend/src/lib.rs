//! Tagged glossary store with fuzzy, script-tolerant lookup.
//!
//! [`Glossary`] is the entry point. Terms and tags live in SQLite via
//! [`Database`]; text queries go through a [`search::SearchIndex`] that is
//! rebuilt lazily after writes.

pub mod config;
pub mod db;
pub mod error;
pub mod glossary;
pub mod models;
pub mod search;

pub use config::Config;
pub use db::Database;
pub use error::{GlossaryError, Result};
pub use glossary::{Glossary, QueryResult};
pub use models::{Tag, Term, TermInput};
