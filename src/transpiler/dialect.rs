use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PortError;
use crate::parser::DdlParser;
use crate::splitter::SplitOptions;
use crate::transpiler::sql::mysql::MySqlGenerator;
use crate::transpiler::sql::postgres::PostgresGenerator;
use crate::transpiler::sql::sqlite::SqliteGenerator;
use crate::transpiler::traits::SqlGenerator;

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Dialect {
    #[default]
    MySql,
    Postgres,
    Sqlite,
}

impl Dialect {
    pub const ALL: [Dialect; 3] = [Dialect::MySql, Dialect::Postgres, Dialect::Sqlite];

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Dialect::MySql => "MySQL / MariaDB (backticks, AUTO_INCREMENT, DELIMITER)",
            Dialect::Postgres => "PostgreSQL (SERIAL, dollar-quoted bodies)",
            Dialect::Sqlite => "SQLite (AUTOINCREMENT, BEGIN ... END triggers)",
        }
    }

    pub fn generator(&self) -> Box<dyn SqlGenerator> {
        match self {
            Dialect::MySql => Box::new(MySqlGenerator),
            Dialect::Postgres => Box::new(PostgresGenerator),
            Dialect::Sqlite => Box::new(SqliteGenerator),
        }
    }

    pub fn parser(&self) -> DdlParser {
        DdlParser::new(*self)
    }

    /// Lexical rules for splitting this dialect's scripts.
    pub fn split_options(&self) -> SplitOptions {
        let mut options = SplitOptions::default();
        match self {
            Dialect::MySql => {
                options.hash_comments = true;
                options.backslash_escapes = true;
                options.delimiter_directive = true;
            }
            Dialect::Postgres => options.dollar_quotes = true,
            Dialect::Sqlite => {
                options.bracket_identifiers = true;
                options.block_keywords = true;
            }
        }
        options
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            _ => Err(PortError::UnknownDialect(s.to_string())),
        }
    }
}

impl TryFrom<String> for Dialect {
    type Error = PortError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Dialect> for String {
    fn from(dialect: Dialect) -> Self {
        dialect.name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("PostgreSQL".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("pg".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("mariadb".parse::<Dialect>().unwrap(), Dialect::MySql);
        assert_eq!(" sqlite3 ".parse::<Dialect>().unwrap(), Dialect::Sqlite);
        assert!(matches!(
            "oracle".parse::<Dialect>(),
            Err(PortError::UnknownDialect(name)) if name == "oracle"
        ));
    }

    #[test]
    fn test_serde_uses_names() {
        let json = serde_json::to_string(&Dialect::Postgres).unwrap();
        assert_eq!(json, "\"postgres\"");
        let back: Dialect = serde_json::from_str("\"MySQL\"").unwrap();
        assert_eq!(back, Dialect::MySql);
        assert!(serde_json::from_str::<Dialect>("\"db2\"").is_err());
    }

    #[test]
    fn test_split_options() {
        assert!(Dialect::MySql.split_options().delimiter_directive);
        assert!(Dialect::Postgres.split_options().dollar_quotes);
        assert!(!Dialect::Postgres.split_options().hash_comments);
        assert!(Dialect::Sqlite.split_options().block_keywords);
        for dialect in Dialect::ALL {
            assert_eq!(dialect.split_options().delimiter, ";");
            assert_eq!(dialect.generator().dialect(), dialect);
        }
    }
}
