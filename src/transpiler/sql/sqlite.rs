use crate::schema::{Column, Function, Procedure, Trigger};
use crate::transpiler::ddl::{event_list, split_trigger_events};
use crate::transpiler::traits::{quote_path, SqlGenerator, TypeParts};
use crate::transpiler::Dialect;

pub struct SqliteGenerator;

impl SqlGenerator for SqliteGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn quote_identifier(&self, id: &str) -> String {
        format!("\"{}\"", id.replace('"', "\"\""))
    }

    fn map_type(&self, data_type: &str) -> String {
        let parts = TypeParts::parse(data_type);
        if parts.array {
            return "TEXT".to_string();
        }
        parts.with_args(&parts.base)
    }

    fn column_type(&self, column: &Column) -> String {
        // AUTOINCREMENT is only accepted on an INTEGER rowid key.
        if column.auto_increment {
            return "INTEGER".to_string();
        }
        self.map_type(&column.data_type)
    }

    fn auto_increment_clause(&self, column: &Column, inline_pk: bool) -> Option<&'static str> {
        (column.auto_increment && inline_pk).then_some("AUTOINCREMENT")
    }

    fn render_function(&self, _function: &Function) -> Option<String> {
        None
    }

    fn render_procedure(&self, _procedure: &Procedure) -> Option<String> {
        None
    }

    fn render_trigger(&self, trigger: &Trigger) -> String {
        let mut sql = format!(
            "CREATE TRIGGER {} {} {} ON {} FOR EACH ROW",
            quote_path(self, &trigger.name),
            trigger.timing,
            event_list(&trigger.events),
            quote_path(self, &trigger.table)
        );
        if let Some(cond) = &trigger.condition {
            sql.push_str(&format!(" WHEN {cond}"));
        }
        sql.push('\n');

        let body = trigger.body.trim();
        if body.get(..5).is_some_and(|head| head.eq_ignore_ascii_case("BEGIN")) {
            sql.push_str(body);
        } else {
            sql.push_str(&format!("BEGIN\n  {};\nEND", body.trim_end_matches(';')));
        }
        sql
    }

    fn expand_trigger(&self, trigger: &Trigger) -> Vec<Trigger> {
        split_trigger_events(trigger)
    }
}
