//! Statement classification.
//!
//! A statement is routed to a parse capability by its leading keywords,
//! compared word by word and case-insensitively. Statements that match no
//! pattern (DML, `SET`, `DROP`, ...) are skipped.

use tracing::trace;

use crate::error::Result;
use crate::parser::StatementParser;
use crate::schema::{ObjectKind, SchemaObject};
use crate::splitter::Statement;

/// Leading keyword sequences, checked in order.
const PATTERNS: &[(&[&str], ObjectKind)] = &[
    (&["CREATE", "TABLE"], ObjectKind::Table),
    (&["CREATE", "VIEW"], ObjectKind::View),
    (&["CREATE", "FUNCTION"], ObjectKind::Function),
    (&["CREATE", "PROCEDURE"], ObjectKind::Procedure),
    (&["CREATE", "TRIGGER"], ObjectKind::Trigger),
    (&["CREATE", "OR", "REPLACE", "VIEW"], ObjectKind::View),
    (&["CREATE", "OR", "REPLACE", "FUNCTION"], ObjectKind::Function),
    (&["CREATE", "OR", "REPLACE", "PROCEDURE"], ObjectKind::Procedure),
    (&["CREATE", "OR", "REPLACE", "TRIGGER"], ObjectKind::Trigger),
    (&["CREATE", "TEMPORARY", "TABLE"], ObjectKind::Table),
    (&["CREATE", "TEMP", "TABLE"], ObjectKind::Table),
    (&["CREATE", "INDEX"], ObjectKind::Index),
    (&["CREATE", "UNIQUE", "INDEX"], ObjectKind::Index),
];

/// Kind of entity a statement defines, if any.
pub fn classify(text: &str) -> Option<ObjectKind> {
    let words: Vec<&str> = text
        .split(|c: char| c.is_whitespace() || c == '(')
        .filter(|w| !w.is_empty())
        .take(4)
        .collect();

    PATTERNS.iter().find_map(|(pattern, kind)| {
        let matches = pattern.len() <= words.len()
            && pattern
                .iter()
                .zip(&words)
                .all(|(expected, word)| word.eq_ignore_ascii_case(expected));
        matches.then_some(*kind)
    })
}

/// Classify a statement and run the matching parse capability.
///
/// `Ok(None)` means the statement is not a definition and was skipped.
/// Parse errors carry the statement's starting line.
pub fn dispatch(parser: &dyn StatementParser, statement: &Statement) -> Result<Option<SchemaObject>> {
    let Some(kind) = classify(&statement.text) else {
        trace!(seq = statement.seq, line = statement.line, "Skipping statement");
        return Ok(None);
    };

    let text = statement.text.as_str();
    let object = match kind {
        ObjectKind::Table => parser.parse_table_statement(text).map(SchemaObject::Table),
        ObjectKind::View => parser.parse_view_statement(text).map(SchemaObject::View),
        ObjectKind::Function => parser.parse_function_statement(text).map(SchemaObject::Function),
        ObjectKind::Procedure => parser
            .parse_procedure_statement(text)
            .map(SchemaObject::Procedure),
        ObjectKind::Trigger => parser.parse_trigger_statement(text).map(SchemaObject::Trigger),
        ObjectKind::Index => parser.parse_index_statement(text).map(SchemaObject::Index),
    };

    object.map(Some).map_err(|e| e.at_line(statement.line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PortError;
    use crate::parser::DdlParser;
    use crate::transpiler::Dialect;

    #[test]
    fn test_classify_basic_kinds() {
        assert_eq!(classify("CREATE TABLE t (a INT)"), Some(ObjectKind::Table));
        assert_eq!(classify("create view v as select 1"), Some(ObjectKind::View));
        assert_eq!(classify("CREATE FUNCTION f() RETURNS INT"), Some(ObjectKind::Function));
        assert_eq!(classify("CREATE PROCEDURE p()"), Some(ObjectKind::Procedure));
        assert_eq!(classify("CREATE TRIGGER tr"), Some(ObjectKind::Trigger));
    }

    #[test]
    fn test_classify_modifiers_and_indexes() {
        assert_eq!(
            classify("CREATE OR REPLACE FUNCTION f()"),
            Some(ObjectKind::Function)
        );
        assert_eq!(classify("CREATE  TEMPORARY\nTABLE x (a INT)"), Some(ObjectKind::Table));
        assert_eq!(classify("CREATE UNIQUE INDEX i ON t (a)"), Some(ObjectKind::Index));
        assert_eq!(classify("CREATE INDEX i ON t (a)"), Some(ObjectKind::Index));
    }

    #[test]
    fn test_classify_skips_other_statements() {
        assert_eq!(classify("SELECT 1"), None);
        assert_eq!(classify("INSERT INTO t VALUES (1)"), None);
        assert_eq!(classify("CREATE TABLESPACE ts"), None);
        assert_eq!(classify("CREATE"), None);
        assert_eq!(classify(""), None);
    }

    #[test]
    fn test_dispatch_routes_to_capability() {
        let parser = DdlParser::new(Dialect::MySql);
        let stmt = Statement::new(0, 1, "CREATE VIEW v AS SELECT * FROM t");
        let object = dispatch(&parser, &stmt).unwrap().unwrap();
        assert_eq!(object.kind(), ObjectKind::View);
        assert_eq!(object.name(), "v");

        let stmt = Statement::new(1, 2, "UPDATE t SET a = 1");
        assert!(dispatch(&parser, &stmt).unwrap().is_none());
    }

    #[test]
    fn test_dispatch_reports_statement_line() {
        let parser = DdlParser::new(Dialect::MySql);
        let stmt = Statement::new(3, 42, "CREATE TABLE broken AS SELECT 1");
        let err = dispatch(&parser, &stmt).unwrap_err();
        assert!(matches!(err, PortError::Parse { line: 42, .. }));
    }
}
