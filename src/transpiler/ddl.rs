//! DDL rendering shared by the dialect generators.

use crate::schema::{Column, ForeignKey, Index, Parameter, Table, Trigger, TriggerEvent, View};

use super::traits::{quote_column, quote_path, SqlGenerator};

/// Build a CREATE TABLE statement.
///
/// Indexes are not rendered here; callers emit them as separate
/// `CREATE INDEX` statements.
pub fn build_create_table<G: SqlGenerator + ?Sized>(generator: &G, table: &Table) -> String {
    let pk_columns = table.primary_key_columns();
    let inline_pk = table.primary_key.is_empty() && pk_columns.len() == 1;

    let mut lines: Vec<String> = table
        .columns
        .iter()
        .map(|col| build_column(generator, col, inline_pk && col.primary_key))
        .collect();

    if !inline_pk && !pk_columns.is_empty() {
        lines.push(format!(
            "    PRIMARY KEY ({})",
            quote_columns(generator, pk_columns)
        ));
    }
    for fk in &table.foreign_keys {
        lines.push(format!("    {}", build_foreign_key(generator, fk)));
    }

    format!(
        "CREATE TABLE {} (\n{}\n)",
        quote_path(generator, &table.name),
        lines.join(",\n")
    )
}

/// One column definition line.
pub fn build_column<G: SqlGenerator + ?Sized>(
    generator: &G,
    col: &Column,
    inline_pk: bool,
) -> String {
    let mut sql = format!(
        "    {} {}",
        generator.quote_identifier(&col.name),
        generator.column_type(col)
    );

    if !col.nullable && !inline_pk {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &col.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(&generator.map_default(col, default));
    }
    if inline_pk {
        sql.push_str(" PRIMARY KEY");
    }
    if col.auto_increment
        && let Some(clause) = generator.auto_increment_clause(col, inline_pk)
    {
        sql.push(' ');
        sql.push_str(clause);
    }
    if col.unique && !inline_pk {
        sql.push_str(" UNIQUE");
    }
    if let Some(reference) = &col.references {
        sql.push_str(&format!(" REFERENCES {}", quote_path(generator, &reference.table)));
        if !reference.column.is_empty() {
            sql.push_str(&format!(" ({})", generator.quote_identifier(&reference.column)));
        }
    }
    if let Some(comment) = &col.comment
        && generator.column_comments()
    {
        sql.push_str(&format!(" COMMENT '{}'", comment.replace('\'', "''")));
    }

    sql
}

fn build_foreign_key<G: SqlGenerator + ?Sized>(generator: &G, fk: &ForeignKey) -> String {
    let mut sql = String::new();
    if let Some(name) = &fk.name {
        sql.push_str(&format!("CONSTRAINT {} ", generator.quote_identifier(name)));
    }
    sql.push_str(&format!(
        "FOREIGN KEY ({}) REFERENCES {}",
        quote_columns(generator, fk.columns.iter().map(String::as_str)),
        quote_path(generator, &fk.ref_table)
    ));
    if !fk.ref_columns.is_empty() {
        sql.push_str(&format!(
            " ({})",
            quote_columns(generator, fk.ref_columns.iter().map(String::as_str))
        ));
    }
    if let Some(action) = &fk.on_delete {
        sql.push_str(&format!(" ON DELETE {action}"));
    }
    if let Some(action) = &fk.on_update {
        sql.push_str(&format!(" ON UPDATE {action}"));
    }
    sql
}

fn quote_columns<'a, G, I>(generator: &G, columns: I) -> String
where
    G: SqlGenerator + ?Sized,
    I: IntoIterator<Item = &'a str>,
{
    columns
        .into_iter()
        .map(|c| quote_column(generator, c))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn build_create_index<G: SqlGenerator + ?Sized>(
    generator: &G,
    table: &str,
    index: &Index,
) -> String {
    format!(
        "CREATE {}INDEX {} ON {} ({})",
        if index.unique { "UNIQUE " } else { "" },
        generator.quote_identifier(&index.name),
        quote_path(generator, table),
        quote_columns(generator, index.columns.iter().map(String::as_str))
    )
}

pub fn build_create_view<G: SqlGenerator + ?Sized>(generator: &G, view: &View) -> String {
    format!(
        "CREATE VIEW {} AS {}",
        quote_path(generator, &view.name),
        view.definition
    )
}

/// Parameter list of a routine signature.
pub fn build_parameters<G: SqlGenerator + ?Sized>(
    generator: &G,
    params: &[Parameter],
    with_modes: bool,
) -> String {
    params
        .iter()
        .map(|p| {
            let mut sql = String::new();
            if with_modes && let Some(mode) = p.mode {
                sql.push_str(&format!("{mode} "));
            }
            if !p.name.is_empty() {
                sql.push_str(&generator.quote_identifier(&p.name));
                sql.push(' ');
            }
            sql.push_str(&generator.map_type(&p.data_type));
            sql
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Events joined with `OR`.
pub fn event_list(events: &[TriggerEvent]) -> String {
    events
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// One trigger per event, for dialects that allow a single event.
/// Names get the event as suffix when a split happens.
pub fn split_trigger_events(trigger: &Trigger) -> Vec<Trigger> {
    if trigger.events.len() <= 1 {
        return vec![trigger.clone()];
    }
    trigger
        .events
        .iter()
        .map(|event| Trigger {
            name: format!(
                "{}_{}",
                trigger.name,
                event.to_string().to_ascii_lowercase()
            ),
            events: vec![*event],
            ..trigger.clone()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ParamMode, TriggerTiming};
    use crate::transpiler::Dialect;
    use pretty_assertions::assert_eq;

    fn users() -> Table {
        Table::new("users")
            .column(Column::new("id", "INT").primary_key().auto_increment())
            .column(Column::new("email", "VARCHAR(255)").not_null().unique())
            .column(Column::new("org_id", "INT").references("orgs", "id"))
    }

    #[test]
    fn test_inline_primary_key() {
        let sql = build_create_table(Dialect::Postgres.generator().as_ref(), &users());
        assert_eq!(
            sql,
            "CREATE TABLE \"users\" (\n    \"id\" SERIAL PRIMARY KEY,\n    \"email\" VARCHAR(255) NOT NULL UNIQUE,\n    \"org_id\" INT REFERENCES \"orgs\" (\"id\")\n)"
        );
    }

    #[test]
    fn test_composite_key_and_foreign_key() {
        let mut table = Table::new("memberships")
            .column(Column::new("user_id", "INT").not_null())
            .column(Column::new("group_id", "INT").not_null());
        table.primary_key = vec!["user_id".into(), "group_id".into()];
        table.foreign_keys.push(ForeignKey {
            name: Some("fk_user".into()),
            columns: vec!["user_id".into()],
            ref_table: "users".into(),
            ref_columns: vec!["id".into()],
            on_delete: Some("CASCADE".into()),
            on_update: None,
        });

        let sql = build_create_table(Dialect::MySql.generator().as_ref(), &table);
        assert_eq!(
            sql,
            "CREATE TABLE `memberships` (\n    `user_id` INT NOT NULL,\n    `group_id` INT NOT NULL,\n    PRIMARY KEY (`user_id`, `group_id`),\n    CONSTRAINT `fk_user` FOREIGN KEY (`user_id`) REFERENCES `users` (`id`) ON DELETE CASCADE\n)"
        );
    }

    #[test]
    fn test_index_keeps_expressions() {
        let index = Index::new("lower_email", vec!["lower(email)".into(), "id".into()]).unique();
        let sql = build_create_index(Dialect::Sqlite.generator().as_ref(), "users", &index);
        assert_eq!(
            sql,
            "CREATE UNIQUE INDEX \"lower_email\" ON \"users\" (lower(email), \"id\")"
        );
    }

    #[test]
    fn test_parameters() {
        let params = vec![
            Parameter {
                name: "src".into(),
                data_type: "INT".into(),
                mode: Some(ParamMode::In),
            },
            Parameter {
                name: String::new(),
                data_type: "TEXT".into(),
                mode: None,
            },
        ];
        let generator = Dialect::MySql.generator();
        assert_eq!(
            build_parameters(generator.as_ref(), &params, true),
            "IN `src` INT, TEXT"
        );
        assert_eq!(
            build_parameters(generator.as_ref(), &params, false),
            "`src` INT, TEXT"
        );
    }

    #[test]
    fn test_split_trigger_events() {
        let trigger = Trigger {
            name: "audit".into(),
            timing: TriggerTiming::After,
            events: vec![TriggerEvent::Insert, TriggerEvent::Update],
            table: "users".into(),
            for_each_row: true,
            condition: None,
            body: "INSERT INTO log VALUES (1)".into(),
        };
        let split = split_trigger_events(&trigger);
        let names: Vec<&str> = split.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["audit_insert", "audit_update"]);
        assert_eq!(split[1].events, vec![TriggerEvent::Update]);
        assert_eq!(event_list(&trigger.events), "INSERT OR UPDATE");
    }
}
