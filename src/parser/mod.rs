//! DDL parsing.
//!
//! Each dialect exposes the same six capabilities through
//! [`StatementParser`]: given the text of one statement already classified
//! by its leading keywords, extract exactly one entity or fail.
//!
//! # Example
//! ```
//! use sqlporter::parser::{DdlParser, StatementParser};
//! use sqlporter::Dialect;
//!
//! let parser = DdlParser::new(Dialect::MySql);
//! let table = parser
//!     .parse_table_statement("CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(50))")
//!     .unwrap();
//! assert_eq!(table.columns.len(), 2);
//! ```

pub mod grammar;


use crate::error::Result;
use crate::schema::{Function, Procedure, Table, TableIndex, Trigger, View};
use crate::transpiler::Dialect;

/// Per-kind parse capabilities of a dialect.
///
/// Implementations are shared by parallel parse workers and must be
/// stateless with respect to individual statements.
pub trait StatementParser: Send + Sync {
    fn parse_table_statement(&self, text: &str) -> Result<Table>;
    fn parse_view_statement(&self, text: &str) -> Result<View>;
    fn parse_function_statement(&self, text: &str) -> Result<Function>;
    fn parse_procedure_statement(&self, text: &str) -> Result<Procedure>;
    fn parse_trigger_statement(&self, text: &str) -> Result<Trigger>;
    fn parse_index_statement(&self, text: &str) -> Result<TableIndex>;
}

/// Grammar-backed parser for one of the supported dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DdlParser {
    dialect: Dialect,
}

impl DdlParser {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }
}

impl StatementParser for DdlParser {
    fn parse_table_statement(&self, text: &str) -> Result<Table> {
        grammar::create_table(text)
    }

    fn parse_view_statement(&self, text: &str) -> Result<View> {
        grammar::create_view(text)
    }

    fn parse_function_statement(&self, text: &str) -> Result<Function> {
        grammar::create_function(text)
    }

    fn parse_procedure_statement(&self, text: &str) -> Result<Procedure> {
        grammar::create_procedure(text)
    }

    fn parse_trigger_statement(&self, text: &str) -> Result<Trigger> {
        // PostgreSQL triggers fire per statement unless told otherwise.
        grammar::create_trigger(text, self.dialect != Dialect::Postgres)
    }

    fn parse_index_statement(&self, text: &str) -> Result<TableIndex> {
        grammar::create_index(text)
    }
}
