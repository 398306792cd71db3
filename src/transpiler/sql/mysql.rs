use crate::schema::{Column, Function, Procedure, Trigger};
use crate::transpiler::ddl::{build_parameters, event_list, split_trigger_events};
use crate::transpiler::traits::{quote_path, SqlGenerator, TypeParts};
use crate::transpiler::Dialect;

pub struct MySqlGenerator;

impl SqlGenerator for MySqlGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn map_type(&self, data_type: &str) -> String {
        let parts = TypeParts::parse(data_type);
        if parts.array {
            return "JSON".to_string();
        }
        let mapped = match parts.base.as_str() {
            "BOOLEAN" | "BOOL" => "TINYINT(1)".to_string(),
            "TIMESTAMPTZ" | "TIMESTAMP WITH TIME ZONE" | "TIMESTAMP WITHOUT TIME ZONE" => {
                parts.with_args("TIMESTAMP")
            }
            "DOUBLE PRECISION" => "DOUBLE".to_string(),
            "UUID" => "CHAR(36)".to_string(),
            "JSONB" => "JSON".to_string(),
            "BYTEA" => "BLOB".to_string(),
            "VARCHAR" if parts.args.is_none() => "VARCHAR(255)".to_string(),
            base => parts.with_args(base),
        };
        if parts.unsigned {
            format!("{mapped} UNSIGNED")
        } else {
            mapped
        }
    }

    fn auto_increment_clause(&self, column: &Column, _inline_pk: bool) -> Option<&'static str> {
        column.auto_increment.then_some("AUTO_INCREMENT")
    }

    fn column_comments(&self) -> bool {
        true
    }

    fn render_function(&self, function: &Function) -> Option<String> {
        let sql = format!(
            "CREATE FUNCTION {}({}) RETURNS {}\n{}",
            quote_path(self, &function.name),
            build_parameters(self, &function.parameters, false),
            self.map_type(&function.returns),
            function.body
        );
        Some(sql.trim_end().to_string())
    }

    fn render_procedure(&self, procedure: &Procedure) -> Option<String> {
        let sql = format!(
            "CREATE PROCEDURE {}({})\n{}",
            quote_path(self, &procedure.name),
            build_parameters(self, &procedure.parameters, true),
            procedure.body
        );
        Some(sql.trim_end().to_string())
    }

    fn render_trigger(&self, trigger: &Trigger) -> String {
        // No WHEN clause in MySQL; the condition guards the body instead.
        let body = match &trigger.condition {
            Some(cond) => format!(
                "IF {} THEN\n  {};\nEND IF",
                cond,
                trigger.body.trim_end_matches(';')
            ),
            None => trigger.body.clone(),
        };
        format!(
            "CREATE TRIGGER {} {} {} ON {} FOR EACH ROW\n{}",
            quote_path(self, &trigger.name),
            trigger.timing,
            event_list(&trigger.events),
            quote_path(self, &trigger.table),
            body
        )
    }

    fn expand_trigger(&self, trigger: &Trigger) -> Vec<Trigger> {
        split_trigger_events(trigger)
    }

    fn routine_delimiter(&self) -> Option<&'static str> {
        Some("$$")
    }
}
