//! # sqlporter
//!
//! Convert SQL schema scripts between MySQL, PostgreSQL and SQLite.
//!
//! A script is split into statements, each `CREATE` statement is parsed into
//! a dialect-neutral [`Schema`](schema::Schema), and the schema is rendered
//! back out as another dialect's DDL. Scripts are read as streams, so large
//! dumps never sit in memory as a whole.
//!
//! ## Quick Example
//!
//! ```
//! use sqlporter::Dialect;
//!
//! let input = "CREATE TABLE users (id INT AUTO_INCREMENT PRIMARY KEY, name VARCHAR(50));";
//! let mut out = Vec::new();
//! sqlporter::convert(input.as_bytes(), &mut out, Dialect::MySql, Dialect::Postgres).unwrap();
//!
//! let sql = String::from_utf8(out).unwrap();
//! assert!(sql.contains("\"id\" SERIAL PRIMARY KEY"));
//! ```
//!
//! ## Pipeline
//!
//! | Stage | Module |
//! |-------|--------|
//! | Split | [`splitter`] |
//! | Classify + dispatch | [`classify`] |
//! | Parse | [`parser`] |
//! | Drive | [`stream`] |
//! | Render | [`transpiler`] |
//!
//! [`batch`] runs any handler over a slice of items with bounded
//! concurrency and a deadline; the CLI uses it to convert several files at
//! once.

pub mod batch;
pub mod cancel;
pub mod classify;
pub mod config;
pub mod error;
pub mod parser;
pub mod pool;
pub mod schema;
pub mod splitter;
pub mod stream;
pub mod transpiler;

pub use error::{PortError, Result};
pub use transpiler::Dialect;

pub mod prelude {
    pub use crate::batch::{BatchConfig, BatchProcessor, ItemContext};
    pub use crate::cancel::CancelToken;
    pub use crate::error::*;
    pub use crate::parser::{DdlParser, StatementParser};
    pub use crate::schema::*;
    pub use crate::stream::{GenerateOptions, StreamGenerator, StreamParser};
    pub use crate::transpiler::{Dialect, SqlGenerator};
}

/// Convert the script in `reader` from one dialect to another.
///
/// Parses the whole script sequentially, then writes the rendered schema.
pub fn convert<R, W>(reader: R, writer: W, from: Dialect, to: Dialect) -> Result<()>
where
    R: std::io::Read,
    W: std::io::Write,
{
    let schema = stream::StreamParser::new(from).parse_schema(reader)?;
    stream::StreamGenerator::new(to).generate_stream(&schema, writer)
}
