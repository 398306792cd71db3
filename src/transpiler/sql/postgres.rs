use crate::schema::{Column, Function, Procedure, Trigger};
use crate::transpiler::ddl::{build_parameters, event_list};
use crate::transpiler::traits::{quote_path, SqlGenerator, TypeParts};
use crate::transpiler::Dialect;

pub struct PostgresGenerator;

impl PostgresGenerator {
    fn map_returns(&self, returns: &str) -> String {
        if returns.starts_with("TABLE(") || returns.starts_with("SETOF ") {
            returns.to_string()
        } else {
            self.map_type(returns)
        }
    }
}

/// Dollar-quote tag not occurring in `body`.
fn dollar_tag(body: &str) -> String {
    if !body.contains("$$") {
        return "$$".to_string();
    }
    let mut n = 0;
    loop {
        let tag = if n == 0 {
            "$body$".to_string()
        } else {
            format!("$body{n}$")
        };
        if !body.contains(&tag) {
            return tag;
        }
        n += 1;
    }
}

impl SqlGenerator for PostgresGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn map_type(&self, data_type: &str) -> String {
        let parts = TypeParts::parse(data_type);
        let base = parts.base.as_str();
        let mapped = match base {
            "TINYINT" if parts.args.as_deref() == Some("1") => "BOOLEAN".to_string(),
            "TINYINT" | "YEAR" => "SMALLINT".to_string(),
            "SMALLINT" if parts.unsigned => "INT".to_string(),
            "MEDIUMINT" => "INT".to_string(),
            "INT" | "INTEGER" if parts.unsigned => "BIGINT".to_string(),
            "BIGINT" if parts.unsigned => "NUMERIC(20)".to_string(),
            // Display widths mean nothing here.
            "INT" | "INTEGER" | "SMALLINT" | "BIGINT" => base.to_string(),
            "DATETIME" => parts.with_args("TIMESTAMP"),
            "DOUBLE" => "DOUBLE PRECISION".to_string(),
            "FLOAT" if parts.args.is_none() => "REAL".to_string(),
            "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
                "BYTEA".to_string()
            }
            "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET" => "TEXT".to_string(),
            _ => parts.with_args(base),
        };
        if parts.array {
            format!("{mapped}[]")
        } else {
            mapped
        }
    }

    fn column_type(&self, column: &Column) -> String {
        if column.auto_increment {
            match TypeParts::parse(&column.data_type).base.as_str() {
                "BIGINT" => return "BIGSERIAL".to_string(),
                "SMALLINT" | "TINYINT" => return "SMALLSERIAL".to_string(),
                "INT" | "INTEGER" | "MEDIUMINT" => return "SERIAL".to_string(),
                _ => {}
            }
        }
        self.map_type(&column.data_type)
    }

    fn map_default(&self, column: &Column, value: &str) -> String {
        if self.map_type(&column.data_type) == "BOOLEAN" {
            match value.trim_matches('\'') {
                "0" => return "FALSE".to_string(),
                "1" => return "TRUE".to_string(),
                _ => {}
            }
        }
        value.to_string()
    }

    fn render_function(&self, function: &Function) -> Option<String> {
        let tag = dollar_tag(&function.body);
        Some(format!(
            "CREATE FUNCTION {}({}) RETURNS {} AS {tag}\n{}\n{tag} LANGUAGE {}",
            quote_path(self, &function.name),
            build_parameters(self, &function.parameters, true),
            self.map_returns(&function.returns),
            function.body,
            function.language.as_deref().unwrap_or("plpgsql")
        ))
    }

    fn render_procedure(&self, procedure: &Procedure) -> Option<String> {
        let tag = dollar_tag(&procedure.body);
        Some(format!(
            "CREATE PROCEDURE {}({}) LANGUAGE {} AS {tag}\n{}\n{tag}",
            quote_path(self, &procedure.name),
            build_parameters(self, &procedure.parameters, true),
            procedure.language.as_deref().unwrap_or("plpgsql"),
            procedure.body
        ))
    }

    fn render_trigger(&self, trigger: &Trigger) -> String {
        let mut sql = format!(
            "CREATE TRIGGER {} {} {} ON {} FOR EACH {}",
            self.quote_identifier(&trigger.name),
            trigger.timing,
            event_list(&trigger.events),
            quote_path(self, &trigger.table),
            if trigger.for_each_row { "ROW" } else { "STATEMENT" }
        );
        if let Some(cond) = &trigger.condition {
            sql.push_str(&format!(" WHEN ({cond})"));
        }
        sql.push('\n');
        sql.push_str(&trigger.body);
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dollar_tag_avoids_body() {
        assert_eq!(dollar_tag("SELECT 1"), "$$");
        assert_eq!(dollar_tag("SELECT '$$'"), "$body$");
        assert_eq!(dollar_tag("$$ $body$"), "$body1$");
    }
}
