use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use sqlporter::pool::BufferPool;
use sqlporter::prelude::*;

const MYSQL: &str = "
-- users and their activity
CREATE TABLE users (
  id INT NOT NULL AUTO_INCREMENT,
  email VARCHAR(255) NOT NULL COMMENT 'login',
  active TINYINT(1) DEFAULT '1',
  PRIMARY KEY (id),
  UNIQUE KEY uk_email (email)
) ENGINE=InnoDB;

CREATE VIEW active_users AS SELECT * FROM users WHERE active = 1;

DELIMITER $$
CREATE PROCEDURE bump(INOUT n INT)
BEGIN
  SET n = n + 1;
END$$
DELIMITER ;

INSERT INTO users (email) VALUES ('a@example.com');

CREATE TRIGGER lower_email BEFORE INSERT ON users FOR EACH ROW SET NEW.email = LOWER(NEW.email);
";

const POSTGRES: &str = r#"
CREATE TABLE orgs (id SERIAL PRIMARY KEY, name TEXT NOT NULL);
CREATE TABLE users (
  id BIGSERIAL PRIMARY KEY,
  org_id INTEGER REFERENCES orgs(id),
  email VARCHAR(255) NOT NULL UNIQUE,
  active BOOLEAN DEFAULT TRUE
);
CREATE INDEX users_org_idx ON users (org_id);
CREATE FUNCTION touch() RETURNS trigger AS $$
BEGIN
  NEW.updated_at := now();
  RETURN NEW;
END;
$$ LANGUAGE plpgsql;
CREATE TRIGGER users_touch BEFORE UPDATE ON users FOR EACH ROW EXECUTE FUNCTION touch();
"#;

const SQLITE: &str = "
CREATE TABLE notes (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  body TEXT NOT NULL,
  author TEXT DEFAULT 'anon'
);
CREATE UNIQUE INDEX notes_body ON notes (body);
CREATE VIEW recent AS SELECT * FROM notes ORDER BY id DESC LIMIT 10;
CREATE TRIGGER notes_log AFTER INSERT ON notes
BEGIN
  INSERT INTO log (note_id) VALUES (NEW.id);
END;
";

fn parse(dialect: Dialect, sql: &str) -> Schema {
    StreamParser::new(dialect)
        .parse_schema(sql.as_bytes())
        .expect("script should parse")
}

fn generate(dialect: Dialect, schema: &Schema) -> String {
    StreamGenerator::new(dialect)
        .generate_string(schema)
        .expect("schema should render")
}

fn names(schema: &Schema) -> Vec<String> {
    let mut names: Vec<String> = schema
        .tables
        .iter()
        .map(|t| format!("table:{}", t.name))
        .chain(schema.views.iter().map(|v| format!("view:{}", v.name)))
        .chain(schema.functions.iter().map(|f| format!("function:{}", f.name)))
        .chain(schema.procedures.iter().map(|p| format!("procedure:{}", p.name)))
        .chain(schema.triggers.iter().map(|t| format!("trigger:{}", t.name)))
        .collect();
    names.sort();
    names
}

#[test]
fn test_concrete_scenario() {
    let mut objects = Vec::new();
    StreamParser::new(Dialect::MySql)
        .parse_stream(
            "CREATE TABLE t (id INT); CREATE VIEW v AS SELECT * FROM t;".as_bytes(),
            |obj| {
                objects.push(obj);
                Ok(())
            },
        )
        .unwrap();

    assert_eq!(
        objects,
        vec![
            SchemaObject::Table(Table::new("t").column(Column::new("id", "INT"))),
            SchemaObject::View(View {
                name: "v".into(),
                definition: "SELECT * FROM t".into(),
            }),
        ]
    );
}

#[test]
fn test_mysql_script_contents() {
    let schema = parse(Dialect::MySql, MYSQL);
    assert_eq!(
        names(&schema),
        vec![
            "procedure:bump",
            "table:users",
            "trigger:lower_email",
            "view:active_users"
        ]
    );
    let users = schema.table("users").unwrap();
    assert_eq!(users.indexes.len(), 1);
    assert_eq!(schema.procedures[0].body, "BEGIN\n  SET n = n + 1;\nEND");
}

#[test]
fn test_mysql_round_trip() {
    let schema = parse(Dialect::MySql, MYSQL);
    let sql = generate(Dialect::MySql, &schema);
    assert!(sql.contains("DELIMITER $$\nCREATE PROCEDURE `bump`(INOUT `n` INT)"));
    assert_eq!(parse(Dialect::MySql, &sql), schema);
}

#[test]
fn test_postgres_round_trip() {
    let schema = parse(Dialect::Postgres, POSTGRES);
    assert_eq!(schema.table("users").unwrap().indexes.len(), 1);
    let sql = generate(Dialect::Postgres, &schema);
    assert_eq!(parse(Dialect::Postgres, &sql), schema);
    assert_eq!(generate(Dialect::Postgres, &parse(Dialect::Postgres, &sql)), sql);
}

#[test]
fn test_sqlite_round_trip() {
    let schema = parse(Dialect::Sqlite, SQLITE);
    assert_eq!(schema.triggers.len(), 1);
    assert!(schema.triggers[0].body.starts_with("BEGIN"));
    let sql = generate(Dialect::Sqlite, &schema);
    assert_eq!(parse(Dialect::Sqlite, &sql), schema);
}

#[test]
fn test_mysql_to_postgres() {
    let mut out = Vec::new();
    sqlporter::convert(MYSQL.as_bytes(), &mut out, Dialect::MySql, Dialect::Postgres).unwrap();
    let sql = String::from_utf8(out).unwrap();

    assert!(sql.contains("\"id\" SERIAL PRIMARY KEY"), "{sql}");
    assert!(sql.contains("\"active\" BOOLEAN DEFAULT TRUE"), "{sql}");
    assert!(sql.contains("CREATE UNIQUE INDEX \"uk_email\" ON \"users\" (\"email\");"));
    assert!(sql.contains("CREATE PROCEDURE \"bump\"(INOUT \"n\" INT) LANGUAGE plpgsql AS $$"));
    assert!(!sql.contains("COMMENT"));

    // The converted script is valid input for its own dialect.
    let schema = parse(Dialect::Postgres, &sql);
    assert_eq!(names(&schema), names(&parse(Dialect::MySql, MYSQL)));
}

#[test]
fn test_postgres_to_sqlite_skips_functions() {
    let schema = parse(Dialect::Postgres, POSTGRES);
    let sql = generate(Dialect::Sqlite, &schema);
    assert!(!sql.contains("CREATE FUNCTION"));
    assert!(sql.contains("\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"));
    assert!(sql.contains("FOR EACH ROW\nBEGIN\n  EXECUTE FUNCTION touch();\nEND;"));
}

#[test]
fn test_generation_entity_order() {
    let sql = generate(Dialect::MySql, &parse(Dialect::MySql, MYSQL));
    let position = |needle: &str| sql.find(needle).unwrap_or_else(|| panic!("missing {needle}"));
    assert!(position("CREATE TABLE") < position("CREATE UNIQUE INDEX"));
    assert!(position("CREATE UNIQUE INDEX") < position("CREATE VIEW"));
    assert!(position("CREATE VIEW") < position("CREATE PROCEDURE"));
    assert!(position("CREATE PROCEDURE") < position("CREATE TRIGGER"));
}

#[test]
fn test_parallel_and_sequential_agree() {
    let script: String = (0..30)
        .map(|i| {
            format!(
                "CREATE TABLE t{i} (id INT PRIMARY KEY, v TEXT);\n\
                 CREATE INDEX t{i}_v ON t{i} (v);\n\
                 UPDATE t{i} SET v = 'x';\n\
                 CREATE VIEW v{i} AS SELECT * FROM t{i};\n"
            )
        })
        .collect();
    let parser = StreamParser::new(Dialect::Postgres);
    let sequential = parser.parse_schema(script.as_bytes()).unwrap();

    let mut unordered = Schema::new();
    parser
        .parse_stream_parallel(
            script.as_bytes(),
            |obj| {
                unordered.insert(obj);
                Ok(())
            },
            4,
        )
        .unwrap();
    assert_eq!(names(&unordered), names(&sequential));
    assert_eq!(unordered.object_count(), sequential.object_count());
    assert!(unordered.tables.iter().all(|t| t.indexes.len() == 1));

    let mut ordered = Schema::new();
    parser
        .parse_stream_parallel_ordered(
            script.as_bytes(),
            |obj| {
                ordered.insert(obj);
                Ok(())
            },
            4,
        )
        .unwrap();
    assert_eq!(ordered, sequential);
}

#[test]
fn test_skips_non_definitions() {
    let schema = parse(
        Dialect::MySql,
        "SET NAMES utf8mb4;\nSELECT 1;\nDROP TABLE IF EXISTS x;\nCREATE TABLESPACE ts ADD DATAFILE 'ts.ibd';",
    );
    assert!(schema.is_empty());
    assert!(parse(Dialect::Sqlite, "").is_empty());
}

#[test]
fn test_parse_error_carries_line() {
    let err = StreamParser::new(Dialect::MySql)
        .parse_schema("CREATE TABLE ok (id INT);\n\nCREATE FUNCTION f() BEGIN END;".as_bytes())
        .unwrap_err();
    assert!(matches!(err, PortError::Parse { line: 3, .. }), "{err:?}");
}

#[test]
fn test_batch_converts_many_scripts() {
    let scripts: Vec<String> = (0..12)
        .map(|i| format!("CREATE TABLE t{i} (id INT AUTO_INCREMENT PRIMARY KEY, n INT UNSIGNED);"))
        .collect();
    let pool = Arc::new(BufferPool::new(4096));
    let processor = BatchProcessor::new(
        BatchConfig::default()
            .with_workers(3)
            .with_buffer_pool(pool.clone()),
    );
    let outputs = Mutex::new(Vec::new());

    processor
        .process_batch(&CancelToken::new(), &scripts, |script, ctx| {
            let schema = StreamParser::new(Dialect::MySql).parse_schema(script.as_bytes())?;
            let buf = ctx.buffer().expect("pool configured");
            StreamGenerator::new(Dialect::Postgres).generate_stream(&schema, &mut *buf)?;
            outputs.lock().push(String::from_utf8_lossy(buf).into_owned());
            Ok(())
        })
        .unwrap();

    let outputs = outputs.into_inner();
    assert_eq!(outputs.len(), 12);
    assert!(outputs.iter().all(|sql| sql.contains("SERIAL PRIMARY KEY")));
    assert!(outputs.iter().all(|sql| sql.contains("\"n\" BIGINT")));
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn test_batch_reports_first_failure() {
    let scripts = vec![
        "CREATE TABLE a (id INT);".to_string(),
        "CREATE TABLE broken;".to_string(),
    ];
    let processor = BatchProcessor::new(BatchConfig::default().with_workers(1));
    let err = processor
        .process_batch(&CancelToken::new(), &scripts, |script, _ctx| {
            StreamParser::new(Dialect::MySql)
                .parse_schema(script.as_bytes())
                .map(|_| ())
        })
        .unwrap_err();
    assert!(matches!(err, PortError::Parse { .. }), "{err:?}");
}
