//! Generator traits and utilities.

use crate::schema::{Column, Function, Index, Procedure, Table, Trigger, View};
use crate::transpiler::ddl;

use super::Dialect;

/// Dialect-specific DDL rendering.
///
/// Render methods return one statement without its terminator. The
/// default table, index and view renderings are shared; dialects supply
/// quoting, type mapping and the routine forms.
pub trait SqlGenerator: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Quote an identifier (table or column name).
    fn quote_identifier(&self, name: &str) -> String;

    /// Map a canonical type to this dialect's spelling.
    fn map_type(&self, data_type: &str) -> String;

    /// Type of a column, which may depend on more than its data type
    /// (serial pseudo-types, SQLite rowid keys).
    fn column_type(&self, column: &Column) -> String {
        self.map_type(&column.data_type)
    }

    /// Default value as this dialect accepts it.
    fn map_default(&self, _column: &Column, value: &str) -> String {
        value.to_string()
    }

    /// Keyword marking an auto-increment column, if written inline.
    fn auto_increment_clause(&self, _column: &Column, _inline_pk: bool) -> Option<&'static str> {
        None
    }

    /// Whether `COMMENT '...'` is accepted on columns.
    fn column_comments(&self) -> bool {
        false
    }

    fn render_table(&self, table: &Table) -> String {
        ddl::build_create_table(self, table)
    }

    fn render_index(&self, table: &str, index: &Index) -> String {
        ddl::build_create_index(self, table, index)
    }

    fn render_view(&self, view: &View) -> String {
        ddl::build_create_view(self, view)
    }

    /// `None` when the dialect has no stored functions.
    fn render_function(&self, function: &Function) -> Option<String>;

    /// `None` when the dialect has no stored procedures.
    fn render_procedure(&self, procedure: &Procedure) -> Option<String>;

    fn render_trigger(&self, trigger: &Trigger) -> String;

    /// Triggers to render for one canonical trigger. Dialects allowing a
    /// single event per trigger split multi-event triggers.
    fn expand_trigger(&self, trigger: &Trigger) -> Vec<Trigger> {
        vec![trigger.clone()]
    }

    /// Delimiter to switch to around routine bodies containing the
    /// statement terminator.
    fn routine_delimiter(&self) -> Option<&'static str> {
        None
    }
}

/// Quote each part of a dotted name.
pub fn quote_path<G: SqlGenerator + ?Sized>(generator: &G, name: &str) -> String {
    name.split('.')
        .map(|part| generator.quote_identifier(part))
        .collect::<Vec<_>>()
        .join(".")
}

/// Quote a plain column name; expressions are left alone.
pub fn quote_column<G: SqlGenerator + ?Sized>(generator: &G, column: &str) -> String {
    if !column.is_empty() && column.chars().all(|c| c.is_alphanumeric() || c == '_') {
        generator.quote_identifier(column)
    } else {
        column.to_string()
    }
}

/// A type split into the parts generators care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParts {
    /// Upper-case base name, e.g. `VARCHAR`, `DOUBLE PRECISION`.
    pub base: String,
    /// Argument list without parentheses, e.g. `10,2`.
    pub args: Option<String>,
    pub unsigned: bool,
    pub array: bool,
}

impl TypeParts {
    pub fn parse(data_type: &str) -> Self {
        let mut ty = data_type.trim();
        let array = ty.ends_with("[]");
        if array {
            ty = ty[..ty.len() - 2].trim_end();
        }

        // Arguments keep their case: ENUM('a', 'b').
        let (head, args, tail) = match (ty.find('('), ty.rfind(')')) {
            (Some(open), Some(close)) if close > open => {
                (&ty[..open], Some(ty[open + 1..close].to_string()), &ty[close + 1..])
            }
            _ => (ty, None, ""),
        };

        let mut words: Vec<String> = head
            .split_whitespace()
            .chain(tail.split_whitespace())
            .map(|w| w.to_ascii_uppercase())
            .collect();
        let unsigned = words.iter().any(|w| w == "UNSIGNED");
        words.retain(|w| w != "UNSIGNED" && w != "ZEROFILL");

        Self {
            base: words.join(" "),
            args,
            unsigned,
            array,
        }
    }

    /// `BASE(args)`
    pub fn with_args(&self, base: &str) -> String {
        match &self.args {
            Some(args) => format!("{base}({args})"),
            None => base.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_parts() {
        let parts = TypeParts::parse("int(10) unsigned");
        assert_eq!(parts.base, "INT");
        assert_eq!(parts.args.as_deref(), Some("10"));
        assert!(parts.unsigned);
        assert!(!parts.array);

        let parts = TypeParts::parse("TEXT[]");
        assert_eq!(parts.base, "TEXT");
        assert!(parts.array);

        let parts = TypeParts::parse("TIMESTAMP(3) WITH TIME ZONE");
        assert_eq!(parts.base, "TIMESTAMP WITH TIME ZONE");
        assert_eq!(parts.with_args("TIMESTAMPTZ"), "TIMESTAMPTZ(3)");
    }
}
