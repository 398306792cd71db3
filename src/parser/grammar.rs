//! nom grammar for the DDL statements the dialect parsers understand.
//!
//! ```text
//! create_table   = CREATE [TEMP|TEMPORARY] TABLE [IF NOT EXISTS] name "(" item ("," item)* ")" options*
//! item           = column_def | table_constraint
//! create_view    = CREATE [OR REPLACE] [TEMP] VIEW [IF NOT EXISTS] name ["(" cols ")"] AS definition
//! create_routine = CREATE [OR REPLACE] (FUNCTION|PROCEDURE) name "(" params ")" [RETURNS type] tail
//! create_trigger = CREATE [OR REPLACE] TRIGGER name timing event (OR event)* ON name clause* body
//! create_index   = CREATE [UNIQUE] INDEX [CONCURRENTLY] [IF NOT EXISTS] [name] ON name "(" cols ")"
//! ```
//!
//! Anything after the part the grammar cares about (table options, trailing
//! index options) is ignored. Unknown column options are skipped one token
//! at a time.

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::{anychar, char, multispace0},
    combinator::{map, opt, recognize},
    error::{Error, ErrorKind},
    multi::separated_list1,
    sequence::{pair, preceded, terminated, tuple},
    IResult,
};

use crate::error::{PortError, Result};
use crate::schema::*;

pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn fail<T>(input: &str, kind: ErrorKind) -> IResult<&str, T> {
    Err(nom::Err::Error(Error::new(input, kind)))
}

// ========================================================================
// Tokens
// ========================================================================

/// Case-insensitive keyword ending at a word boundary.
pub fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    move |input: &'a str| {
        let (input, _) = multispace0(input)?;
        let (rest, word) = tag_no_case(kw)(input)?;
        if rest.starts_with(is_ident_char) {
            return fail(input, ErrorKind::Tag);
        }
        Ok((rest, word))
    }
}

/// A bare word.
fn word(input: &str) -> IResult<&str, &str> {
    let (input, _) = multispace0(input)?;
    take_while1(is_ident_char)(input)
}

fn comma(input: &str) -> IResult<&str, char> {
    preceded(multispace0, char(','))(input)
}

fn quoted<'a>(open: char, close: char) -> impl FnMut(&'a str) -> IResult<&'a str, String> {
    move |input: &'a str| {
        let (input, _) = char(open)(input)?;
        let (rest, inner) = take_while(move |c| c != close)(input)?;
        let (rest, _) = char(close)(rest)?;
        Ok((rest, inner.to_string()))
    }
}

/// Identifier, bare or quoted with backticks, double quotes or brackets.
pub fn identifier(input: &str) -> IResult<&str, String> {
    let (input, _) = multispace0(input)?;
    alt((
        quoted('`', '`'),
        quoted('"', '"'),
        quoted('[', ']'),
        map(take_while1(is_ident_char), String::from),
    ))(input)
}

/// `schema.name`, quotes removed from each part.
pub fn qualified_name(input: &str) -> IResult<&str, String> {
    map(separated_list1(char('.'), identifier), |parts| parts.join("."))(input)
}

/// Contents of a balanced `( ... )` group, quotes respected.
pub fn parenthesized(input: &str) -> IResult<&str, &str> {
    let (input, _) = multispace0(input)?;
    let (body, _) = char('(')(input)?;
    let mut depth = 1usize;
    let mut quote: Option<char> = None;
    for (i, c) in body.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok((&body[i + 1..], &body[..i]));
                    }
                }
                _ => {}
            },
        }
    }
    fail(input, ErrorKind::Char)
}

/// A single-quoted literal, quotes included.
pub fn string_literal(input: &str) -> IResult<&str, &str> {
    let (start, _) = multispace0(input)?;
    let (body, _) = char('\'')(start)?;
    let mut chars = body.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '\'' => {
                if matches!(chars.peek(), Some((_, '\''))) {
                    chars.next();
                } else {
                    let end = i + 1;
                    return Ok((&body[end..], &start[..end + 1]));
                }
            }
            _ => {}
        }
    }
    fail(start, ErrorKind::Char)
}

/// Text of a literal without its quotes and escapes.
pub fn unquote_literal(literal: &str) -> String {
    let inner = literal
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(literal);
    inner.replace("''", "'").replace("\\'", "'")
}

/// Body of a `$tag$ ... $tag$` string.
pub fn dollar_quoted(input: &str) -> IResult<&str, &str> {
    let (input, _) = multispace0(input)?;
    let (rest, tag_text) = recognize(tuple((char('$'), take_while(is_word_char), char('$'))))(input)?;
    match rest.find(tag_text) {
        Some(end) => Ok((&rest[end + tag_text.len()..], &rest[..end])),
        None => fail(input, ErrorKind::TakeUntil),
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Consume one token of any kind; used to step over options we do not model.
fn skip_token(input: &str) -> IResult<&str, &str> {
    let (input, _) = multispace0(input)?;
    alt((
        recognize(parenthesized),
        string_literal,
        take_while1(is_ident_char),
        recognize(anychar),
    ))(input)
}

/// Split on `sep` at nesting depth zero, outside quotes. Parts are trimmed
/// and empty parts dropped.
pub fn split_top_level(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                c if c == sep && depth == 0 => {
                    parts.push(input[start..i].trim());
                    start = i + c.len_utf8();
                }
                _ => {}
            },
        }
    }
    parts.push(input[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

/// Column names of an index or key list. Prefix lengths and sort order are
/// dropped; expressions are kept verbatim.
pub fn column_list(input: &str) -> Vec<String> {
    split_top_level(input, ',')
        .into_iter()
        .map(|part| match identifier(part) {
            Ok((rest, name)) if is_column_tail(rest) => name,
            _ => part.to_string(),
        })
        .collect()
}

fn is_column_tail(rest: &str) -> bool {
    let mut rest = rest.trim();
    if let Ok((after, len)) = parenthesized(rest)
        && len.trim().chars().all(|c| c.is_ascii_digit())
    {
        rest = after.trim();
    }
    rest.is_empty() || rest.eq_ignore_ascii_case("ASC") || rest.eq_ignore_ascii_case("DESC")
}

// ========================================================================
// Types
// ========================================================================

fn array_suffix(input: &str) -> IResult<&str, &str> {
    preceded(multispace0, tag("[]"))(input)
}

fn type_suffix(input: &str) -> IResult<&str, &'static str> {
    alt((
        map(
            tuple((keyword("WITH"), keyword("TIME"), keyword("ZONE"))),
            |_| "WITH TIME ZONE",
        ),
        map(
            tuple((keyword("WITHOUT"), keyword("TIME"), keyword("ZONE"))),
            |_| "WITHOUT TIME ZONE",
        ),
        map(keyword("PRECISION"), |_| "PRECISION"),
        map(keyword("VARYING"), |_| "VARYING"),
        map(keyword("UNSIGNED"), |_| "UNSIGNED"),
        map(keyword("ZEROFILL"), |_| "ZEROFILL"),
    ))(input)
}

/// A data type as written: `VARCHAR(255)`, `DOUBLE PRECISION`,
/// `INT(10) UNSIGNED`, `TEXT[]`. Returned upper-cased.
pub fn data_type(input: &str) -> IResult<&str, String> {
    let (mut input, first) = word(input)?;
    let mut ty = first.to_ascii_uppercase();
    loop {
        if let Ok((rest, args)) = parenthesized(input) {
            let args: Vec<&str> = split_top_level(args, ',');
            ty.push('(');
            ty.push_str(&args.join(","));
            ty.push(')');
            input = rest;
            continue;
        }
        if let Ok((rest, _)) = array_suffix(input) {
            ty.push_str("[]");
            input = rest;
            continue;
        }
        if let Ok((rest, suffix)) = type_suffix(input) {
            ty.push(' ');
            ty.push_str(suffix);
            input = rest;
            continue;
        }
        break;
    }
    Ok((input, ty))
}

/// Canonical spelling of a type; the flag reports serial pseudo-types,
/// which become an auto-increment integer.
pub fn canonical_type(raw: &str) -> (String, bool) {
    let raw = raw.trim();
    let (base, rest) = match raw.find('(') {
        Some(i) => (raw[..i].trim_end(), &raw[i..]),
        None => (raw, ""),
    };
    let upper = base.to_ascii_uppercase();
    let base = match upper.as_str() {
        "SERIAL" | "SERIAL4" => return ("INT".to_string(), true),
        "BIGSERIAL" | "SERIAL8" => return ("BIGINT".to_string(), true),
        "SMALLSERIAL" | "SERIAL2" => return ("SMALLINT".to_string(), true),
        "INTEGER" | "INT4" => "INT",
        "INT8" => "BIGINT",
        "INT2" => "SMALLINT",
        "BOOL" => "BOOLEAN",
        "DOUBLE PRECISION" | "FLOAT8" => "DOUBLE",
        "FLOAT4" => "REAL",
        "CHARACTER VARYING" => "VARCHAR",
        "CHARACTER" => "CHAR",
        "TIMESTAMP WITH TIME ZONE" => "TIMESTAMPTZ",
        "TIMESTAMP WITHOUT TIME ZONE" => "TIMESTAMP",
        "BYTEA" => "BLOB",
        other => other,
    };
    (format!("{base}{rest}"), false)
}

// ========================================================================
// CREATE TABLE
// ========================================================================

#[derive(Debug, Clone, PartialEq)]
enum ColumnOption {
    NotNull,
    Null,
    Default(String),
    PrimaryKey,
    Unique,
    AutoIncrement,
    References(Reference),
    Comment(String),
    Skip,
}

#[derive(Debug, Clone, PartialEq)]
enum TableItem {
    Column(Column),
    PrimaryKey(Vec<String>),
    Unique(Option<String>, Vec<String>),
    Index(Option<String>, Vec<String>),
    ForeignKey(ForeignKey),
    Ignored,
}

fn if_not_exists(input: &str) -> IResult<&str, ()> {
    map(
        tuple((keyword("IF"), keyword("NOT"), keyword("EXISTS"))),
        |_| (),
    )(input)
}

fn or_replace(input: &str) -> IResult<&str, ()> {
    map(pair(keyword("OR"), keyword("REPLACE")), |_| ())(input)
}

fn temporary(input: &str) -> IResult<&str, &str> {
    alt((keyword("TEMPORARY"), keyword("TEMP")))(input)
}

fn default_value(input: &str) -> IResult<&str, String> {
    let (input, _) = multispace0(input)?;
    let (input, value) = alt((
        map(string_literal, String::from),
        map(recognize(parenthesized), |s: &str| s.trim().to_string()),
        map(
            recognize(pair(
                opt(char('-')),
                take_while1(|c: char| c.is_ascii_digit() || c == '.'),
            )),
            String::from,
        ),
        map(pair(word, opt(parenthesized)), |(w, args)| match args {
            Some(args) => format!("{}({})", w, args.trim()),
            None => w.to_string(),
        }),
    ))(input)?;
    // PostgreSQL casts (`'x'::text`) are dropped.
    let (input, _) = opt(pair(tag("::"), data_type))(input)?;
    Ok((input, value))
}

fn identity(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        keyword("GENERATED"),
        alt((
            keyword("ALWAYS"),
            recognize(pair(keyword("BY"), keyword("DEFAULT"))),
        )),
        keyword("AS"),
        keyword("IDENTITY"),
    )))(input)
}

fn column_option(input: &str) -> IResult<&str, ColumnOption> {
    alt((
        map(pair(keyword("NOT"), keyword("NULL")), |_| ColumnOption::NotNull),
        map(keyword("NULL"), |_| ColumnOption::Null),
        map(preceded(keyword("DEFAULT"), default_value), ColumnOption::Default),
        map(pair(keyword("PRIMARY"), keyword("KEY")), |_| {
            ColumnOption::PrimaryKey
        }),
        map(pair(keyword("UNIQUE"), opt(keyword("KEY"))), |_| {
            ColumnOption::Unique
        }),
        map(
            alt((keyword("AUTO_INCREMENT"), keyword("AUTOINCREMENT"), identity)),
            |_| ColumnOption::AutoIncrement,
        ),
        map(
            preceded(
                keyword("REFERENCES"),
                pair(qualified_name, opt(parenthesized)),
            ),
            |(table, cols)| {
                let column = cols
                    .and_then(|c| column_list(c).into_iter().next())
                    .unwrap_or_default();
                ColumnOption::References(Reference { table, column })
            },
        ),
        map(preceded(keyword("COMMENT"), string_literal), |lit| {
            ColumnOption::Comment(unquote_literal(lit))
        }),
        map(pair(keyword("CONSTRAINT"), identifier), |_| ColumnOption::Skip),
        map(preceded(keyword("CHECK"), parenthesized), |_| ColumnOption::Skip),
        map(skip_token, |_| ColumnOption::Skip),
    ))(input)
}

fn column_def(input: &str) -> IResult<&str, Column> {
    let (input, name) = identifier(input)?;
    let (mut input, raw_type) = data_type(input)?;
    let (data_type, serial) = canonical_type(&raw_type);
    let mut column = Column::new(name, data_type);
    column.auto_increment = serial;

    loop {
        let (rest, _) = multispace0(input)?;
        if rest.is_empty() {
            break;
        }
        let (rest, option) = column_option(rest)?;
        match option {
            ColumnOption::NotNull => column.nullable = false,
            ColumnOption::Null => column.nullable = true,
            ColumnOption::Default(value) => column.default = Some(value),
            ColumnOption::PrimaryKey => {
                column.primary_key = true;
                column.nullable = false;
            }
            ColumnOption::Unique => column.unique = true,
            ColumnOption::AutoIncrement => column.auto_increment = true,
            ColumnOption::References(reference) => column.references = Some(reference),
            ColumnOption::Comment(text) => column.comment = Some(text),
            ColumnOption::Skip => {}
        }
        input = rest;
    }

    Ok((input, column))
}

/// `[name] [USING method] (cols)`
fn index_tail(input: &str) -> IResult<&str, (Option<String>, Vec<String>)> {
    let (input, name) = opt(identifier)(input)?;
    let (input, _) = opt(pair(keyword("USING"), word))(input)?;
    let (input, cols) = parenthesized(input)?;
    Ok((input, (name, column_list(cols))))
}

fn referential_action(input: &str) -> IResult<&str, String> {
    alt((
        map(pair(keyword("SET"), keyword("NULL")), |_| "SET NULL".to_string()),
        map(pair(keyword("SET"), keyword("DEFAULT")), |_| {
            "SET DEFAULT".to_string()
        }),
        map(pair(keyword("NO"), keyword("ACTION")), |_| "NO ACTION".to_string()),
        map(keyword("CASCADE"), |_| "CASCADE".to_string()),
        map(keyword("RESTRICT"), |_| "RESTRICT".to_string()),
    ))(input)
}

fn foreign_key_tail(input: &str) -> IResult<&str, ForeignKey> {
    let (input, _) = opt(identifier)(input)?;
    let (input, cols) = parenthesized(input)?;
    let (input, _) = keyword("REFERENCES")(input)?;
    let (input, ref_table) = qualified_name(input)?;
    let (mut input, ref_cols) = opt(parenthesized)(input)?;

    let mut fk = ForeignKey {
        columns: column_list(cols),
        ref_table,
        ref_columns: ref_cols.map(column_list).unwrap_or_default(),
        ..ForeignKey::default()
    };

    loop {
        if let Ok((rest, action)) =
            preceded(pair(keyword("ON"), keyword("DELETE")), referential_action)(input)
        {
            fk.on_delete = Some(action);
            input = rest;
            continue;
        }
        if let Ok((rest, action)) =
            preceded(pair(keyword("ON"), keyword("UPDATE")), referential_action)(input)
        {
            fk.on_update = Some(action);
            input = rest;
            continue;
        }
        let (rest, _) = multispace0(input)?;
        if rest.is_empty() {
            break;
        }
        let (rest, _) = skip_token(rest)?;
        input = rest;
    }

    Ok((input, fk))
}

fn table_constraint(input: &str) -> IResult<&str, TableItem> {
    let (input, name) = opt(preceded(keyword("CONSTRAINT"), identifier))(input)?;

    if let Ok((rest, _)) = pair(keyword("PRIMARY"), keyword("KEY"))(input) {
        let (rest, (_, columns)) = index_tail(rest)?;
        return Ok((rest, TableItem::PrimaryKey(columns)));
    }
    if let Ok((rest, _)) =
        pair(keyword("UNIQUE"), opt(alt((keyword("KEY"), keyword("INDEX")))))(input)
    {
        let (rest, (index_name, columns)) = index_tail(rest)?;
        return Ok((rest, TableItem::Unique(index_name.or(name), columns)));
    }
    if let Ok((rest, _)) = pair(keyword("FOREIGN"), keyword("KEY"))(input) {
        let (rest, mut fk) = foreign_key_tail(rest)?;
        fk.name = name;
        return Ok((rest, TableItem::ForeignKey(fk)));
    }
    if let Ok((rest, _)) = preceded(
        opt(alt((keyword("FULLTEXT"), keyword("SPATIAL")))),
        alt((keyword("KEY"), keyword("INDEX"))),
    )(input)
    {
        let (rest, (index_name, columns)) = index_tail(rest)?;
        return Ok((rest, TableItem::Index(index_name, columns)));
    }
    if let Ok((rest, _)) = preceded(keyword("CHECK"), parenthesized)(input) {
        return Ok((rest, TableItem::Ignored));
    }

    fail(input, ErrorKind::Alt)
}

fn table_item(input: &str) -> IResult<&str, TableItem> {
    alt((table_constraint, map(column_def, TableItem::Column)))(input)
}

fn table_header(input: &str) -> IResult<&str, String> {
    let (input, _) = keyword("CREATE")(input)?;
    let (input, _) = opt(temporary)(input)?;
    let (input, _) = keyword("TABLE")(input)?;
    let (input, _) = opt(if_not_exists)(input)?;
    qualified_name(input)
}

fn generated_index_name(table: &str, columns: &[String], suffix: &str) -> String {
    let mut name = table.replace('.', "_");
    for col in columns {
        name.push('_');
        name.extend(col.chars().filter(|c| is_word_char(*c)));
    }
    name.push('_');
    name.push_str(suffix);
    name
}

/// Parse a `CREATE TABLE` statement.
pub fn create_table(text: &str) -> Result<Table> {
    let (rest, name) =
        table_header(text).map_err(|_| PortError::not_found(ObjectKind::Table))?;
    let (_, body) = parenthesized(rest)
        .map_err(|_| PortError::parse(0, format!("table {name}: expected a column list")))?;

    let mut table = Table::new(name);
    for part in split_top_level(body, ',') {
        let (_, item) = table_item(part).map_err(|_| {
            PortError::parse(0, format!("table {}: cannot parse '{}'", table.name, part))
        })?;
        match item {
            TableItem::Column(column) => table.columns.push(column),
            TableItem::PrimaryKey(columns) => table.primary_key = columns,
            TableItem::Unique(name, columns) => {
                let name =
                    name.unwrap_or_else(|| generated_index_name(&table.name, &columns, "key"));
                table.indexes.push(Index::new(name, columns).unique());
            }
            TableItem::Index(name, columns) => {
                let name =
                    name.unwrap_or_else(|| generated_index_name(&table.name, &columns, "idx"));
                table.indexes.push(Index::new(name, columns));
            }
            TableItem::ForeignKey(fk) => table.foreign_keys.push(fk),
            TableItem::Ignored => {}
        }
    }

    if table.columns.is_empty() {
        return Err(PortError::parse(0, format!("table {} has no columns", table.name)));
    }
    normalize_primary_key(&mut table);
    Ok(table)
}

/// A single-column table-level primary key becomes a column flag, so both
/// spellings of the same key compare equal.
fn normalize_primary_key(table: &mut Table) {
    if table.primary_key.len() == 1 {
        let key = table.primary_key[0].clone();
        if let Some(column) = table
            .columns
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(&key))
        {
            column.primary_key = true;
            column.nullable = false;
            table.primary_key.clear();
        }
        return;
    }
    for key in &table.primary_key {
        if let Some(column) = table
            .columns
            .iter_mut()
            .find(|c| c.name.eq_ignore_ascii_case(key))
        {
            column.nullable = false;
        }
    }
}

// ========================================================================
// CREATE VIEW
// ========================================================================

fn view_header(input: &str) -> IResult<&str, String> {
    let (input, _) = keyword("CREATE")(input)?;
    let (input, _) = opt(or_replace)(input)?;
    let (input, _) = opt(temporary)(input)?;
    let (input, _) = keyword("VIEW")(input)?;
    let (input, _) = opt(if_not_exists)(input)?;
    let (input, name) = qualified_name(input)?;
    let (input, _) = opt(parenthesized)(input)?;
    let (input, _) = keyword("AS")(input)?;
    Ok((input, name))
}

/// Parse a `CREATE VIEW` statement.
pub fn create_view(text: &str) -> Result<View> {
    let (rest, name) = view_header(text).map_err(|_| PortError::not_found(ObjectKind::View))?;
    let definition = rest.trim();
    if definition.is_empty() {
        return Err(PortError::parse(0, format!("view {name} has no definition")));
    }
    Ok(View {
        name,
        definition: definition.to_string(),
    })
}

// ========================================================================
// CREATE FUNCTION / PROCEDURE
// ========================================================================

fn routine_header<'a>(input: &'a str, kind: &'static str) -> IResult<&'a str, (String, &'a str)> {
    let (input, _) = keyword("CREATE")(input)?;
    let (input, _) = opt(or_replace)(input)?;
    let (input, _) = keyword(kind)(input)?;
    let (input, _) = opt(if_not_exists)(input)?;
    let (input, name) = qualified_name(input)?;
    let (input, params) = parenthesized(input)?;
    Ok((input, (name, params)))
}

fn param_mode(input: &str) -> IResult<&str, ParamMode> {
    alt((
        map(keyword("INOUT"), |_| ParamMode::InOut),
        map(keyword("IN"), |_| ParamMode::In),
        map(keyword("OUT"), |_| ParamMode::Out),
    ))(input)
}

fn parameter(input: &str) -> IResult<&str, Parameter> {
    let (input, mode) = opt(param_mode)(input)?;
    let (input, first) = identifier(input)?;
    match data_type(input) {
        Ok((rest, ty)) => Ok((
            rest,
            Parameter {
                name: first,
                data_type: canonical_type(&ty).0,
                mode,
            },
        )),
        // Type-only parameter, as PostgreSQL allows.
        Err(_) => Ok((
            input,
            Parameter {
                name: String::new(),
                data_type: canonical_type(&first).0,
                mode,
            },
        )),
    }
}

fn parameters(name: &str, params: &str) -> Result<Vec<Parameter>> {
    split_top_level(params, ',')
        .into_iter()
        .map(|part| {
            parameter(part).map(|(_, p)| p).map_err(|_| {
                PortError::parse(0, format!("routine {name}: cannot parse parameter '{part}'"))
            })
        })
        .collect()
}

fn returns(input: &str) -> IResult<&str, String> {
    let (input, _) = keyword("RETURNS")(input)?;
    alt((
        map(preceded(keyword("TABLE"), parenthesized), |cols| {
            format!("TABLE({})", cols.trim())
        }),
        map(preceded(keyword("SETOF"), data_type), |t| {
            format!("SETOF {}", canonical_type(&t).0)
        }),
        map(data_type, |t| canonical_type(&t).0),
    ))(input)
}

fn characteristic(input: &str) -> IResult<&str, ()> {
    map(
        alt((
            recognize(pair(keyword("NOT"), keyword("DETERMINISTIC"))),
            keyword("DETERMINISTIC"),
            recognize(pair(keyword("CONTAINS"), keyword("SQL"))),
            recognize(pair(keyword("NO"), keyword("SQL"))),
            recognize(tuple((keyword("READS"), keyword("SQL"), keyword("DATA")))),
            recognize(tuple((keyword("MODIFIES"), keyword("SQL"), keyword("DATA")))),
            recognize(tuple((
                opt(keyword("SQL")),
                keyword("SECURITY"),
                alt((keyword("DEFINER"), keyword("INVOKER"))),
            ))),
            recognize(pair(keyword("COMMENT"), string_literal)),
            recognize(pair(
                alt((
                    keyword("CHARSET"),
                    recognize(pair(keyword("CHARACTER"), keyword("SET"))),
                )),
                word,
            )),
            keyword("IMMUTABLE"),
            keyword("STABLE"),
            keyword("VOLATILE"),
            keyword("STRICT"),
            keyword("LEAKPROOF"),
            recognize(tuple((
                keyword("CALLED"),
                keyword("ON"),
                keyword("NULL"),
                keyword("INPUT"),
            ))),
            recognize(pair(keyword("PARALLEL"), word)),
            recognize(pair(alt((keyword("COST"), keyword("ROWS"))), word)),
        )),
        |_| (),
    )(input)
}

fn quoted_body(input: &str) -> IResult<&str, String> {
    preceded(
        keyword("AS"),
        alt((
            map(dollar_quoted, |s: &str| s.trim().to_string()),
            map(string_literal, |s| unquote_literal(s).trim().to_string()),
        )),
    )(input)
}

/// Characteristics, language and body after a routine signature.
fn routine_tail(mut input: &str) -> (String, Option<String>) {
    let mut body = None;
    let mut language = None;
    loop {
        let trimmed = input.trim_start();
        if trimmed.is_empty() {
            break;
        }
        if let Ok((rest, lang)) = preceded(keyword("LANGUAGE"), identifier)(trimmed) {
            language = Some(lang.to_ascii_lowercase());
            input = rest;
            continue;
        }
        if let Ok((rest, quoted)) = quoted_body(trimmed) {
            body = Some(quoted);
            input = rest;
            continue;
        }
        if let Ok((rest, _)) = characteristic(trimmed) {
            input = rest;
            continue;
        }
        // BEGIN ... END, RETURN expr, or any other inline body.
        body = Some(trimmed.trim_end().to_string());
        break;
    }
    (body.unwrap_or_default(), language)
}

/// Parse a `CREATE FUNCTION` statement.
pub fn create_function(text: &str) -> Result<Function> {
    let (rest, (name, params)) = routine_header(text, "FUNCTION")
        .map_err(|_| PortError::not_found(ObjectKind::Function))?;
    let parameters = parameters(&name, params)?;
    let (rest, returns) = returns(rest)
        .map_err(|_| PortError::parse(0, format!("function {name}: missing RETURNS clause")))?;
    let (body, language) = routine_tail(rest);
    Ok(Function {
        name,
        parameters,
        returns,
        body,
        language,
    })
}

/// Parse a `CREATE PROCEDURE` statement.
pub fn create_procedure(text: &str) -> Result<Procedure> {
    let (rest, (name, params)) = routine_header(text, "PROCEDURE")
        .map_err(|_| PortError::not_found(ObjectKind::Procedure))?;
    let parameters = parameters(&name, params)?;
    let (body, language) = routine_tail(rest);
    Ok(Procedure {
        name,
        parameters,
        body,
        language,
    })
}

// ========================================================================
// CREATE TRIGGER
// ========================================================================

fn trigger_header(input: &str) -> IResult<&str, String> {
    let (input, _) = keyword("CREATE")(input)?;
    let (input, _) = opt(or_replace)(input)?;
    let (input, _) = opt(keyword("CONSTRAINT"))(input)?;
    let (input, _) = keyword("TRIGGER")(input)?;
    let (input, _) = opt(if_not_exists)(input)?;
    qualified_name(input)
}

fn timing(input: &str) -> IResult<&str, TriggerTiming> {
    alt((
        map(keyword("BEFORE"), |_| TriggerTiming::Before),
        map(keyword("AFTER"), |_| TriggerTiming::After),
        map(pair(keyword("INSTEAD"), keyword("OF")), |_| {
            TriggerTiming::InsteadOf
        }),
    ))(input)
}

fn event(input: &str) -> IResult<&str, TriggerEvent> {
    alt((
        map(keyword("INSERT"), |_| TriggerEvent::Insert),
        map(keyword("DELETE"), |_| TriggerEvent::Delete),
        map(keyword("TRUNCATE"), |_| TriggerEvent::Truncate),
        map(
            pair(
                keyword("UPDATE"),
                opt(preceded(keyword("OF"), separated_list1(comma, identifier))),
            ),
            |_| TriggerEvent::Update,
        ),
    ))(input)
}

fn for_each(input: &str) -> IResult<&str, bool> {
    preceded(
        pair(keyword("FOR"), opt(keyword("EACH"))),
        alt((
            map(keyword("ROW"), |_| true),
            map(keyword("STATEMENT"), |_| false),
        )),
    )(input)
}

fn trigger_clause_to_skip(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(pair(alt((keyword("FOLLOWS"), keyword("PRECEDES"))), qualified_name)),
        recognize(pair(keyword("FROM"), qualified_name)),
        recognize(pair(keyword("NOT"), keyword("DEFERRABLE"))),
        keyword("DEFERRABLE"),
        recognize(pair(
            keyword("INITIALLY"),
            alt((keyword("DEFERRED"), keyword("IMMEDIATE"))),
        )),
    ))(input)
}

/// Parse a `CREATE TRIGGER` statement. `row_by_default` applies when no
/// `FOR EACH` clause is present.
pub fn create_trigger(text: &str, row_by_default: bool) -> Result<Trigger> {
    let (input, name) =
        trigger_header(text).map_err(|_| PortError::not_found(ObjectKind::Trigger))?;
    let (input, timing) = timing(input).map_err(|_| {
        PortError::parse(0, format!("trigger {name}: expected BEFORE, AFTER or INSTEAD OF"))
    })?;
    let (input, events) = separated_list1(keyword("OR"), event)(input)
        .map_err(|_| PortError::parse(0, format!("trigger {name}: expected an event")))?;
    let (mut input, table) = preceded(keyword("ON"), qualified_name)(input)
        .map_err(|_| PortError::parse(0, format!("trigger {name}: expected ON <table>")))?;

    let mut for_each_row = row_by_default;
    let mut condition = None;
    loop {
        if let Ok((rest, row)) = for_each(input) {
            for_each_row = row;
            input = rest;
            continue;
        }
        if let Ok((rest, cond)) = preceded(keyword("WHEN"), parenthesized)(input) {
            condition = Some(cond.trim().to_string());
            input = rest;
            continue;
        }
        if let Ok((rest, _)) = trigger_clause_to_skip(input) {
            input = rest;
            continue;
        }
        break;
    }

    let body = input.trim();
    if body.is_empty() {
        return Err(PortError::parse(0, format!("trigger {name} has no body")));
    }
    Ok(Trigger {
        name,
        timing,
        events,
        table,
        for_each_row,
        condition,
        body: body.to_string(),
    })
}

// ========================================================================
// CREATE INDEX
// ========================================================================

fn index_header(input: &str) -> IResult<&str, (bool, Option<String>, String)> {
    let (input, _) = keyword("CREATE")(input)?;
    let (input, unique) = map(opt(keyword("UNIQUE")), |u| u.is_some())(input)?;
    let (input, _) = keyword("INDEX")(input)?;
    let (input, _) = opt(keyword("CONCURRENTLY"))(input)?;
    let (input, _) = opt(if_not_exists)(input)?;
    let (input, name) = alt((
        map(terminated(identifier, keyword("ON")), Some),
        map(keyword("ON"), |_| None),
    ))(input)?;
    let (input, _) = opt(keyword("ONLY"))(input)?;
    let (input, table) = qualified_name(input)?;
    Ok((input, (unique, name, table)))
}

/// Parse a `CREATE [UNIQUE] INDEX` statement.
pub fn create_index(text: &str) -> Result<TableIndex> {
    let (rest, (unique, name, table)) =
        index_header(text).map_err(|_| PortError::not_found(ObjectKind::Index))?;
    let (_, columns) = preceded(opt(pair(keyword("USING"), word)), parenthesized)(rest)
        .map_err(|_| PortError::parse(0, format!("index on {table}: expected a column list")))?;

    let columns = column_list(columns);
    let name = name.unwrap_or_else(|| generated_index_name(&table, &columns, "idx"));
    Ok(TableIndex {
        table,
        index: Index {
            name,
            columns,
            unique,
        },
    })
}
