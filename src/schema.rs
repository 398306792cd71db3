//! Canonical, dialect-neutral schema model.
//!
//! Parse capabilities produce these types and generators consume them.
//! Column types are kept as normalised upper-case text (`INT`,
//! `VARCHAR(255)`) and mapped per dialect at render time.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A complete database schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub tables: Vec<Table>,
    pub views: Vec<View>,
    pub functions: Vec<Function>,
    pub procedures: Vec<Procedure>,
    pub triggers: Vec<Trigger>,
    /// Indexes whose table has not been seen yet.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detached_indexes: Vec<TableIndex>,
}

/// A table definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    /// Table-level primary key columns (composite or declared apart from the column).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<ForeignKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<Index>,
}

/// A column definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Inline `REFERENCES table(column)` on a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub table: String,
    pub column: String,
}

/// A table-level foreign key constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub ref_table: String,
    pub ref_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<String>,
}

/// An index definition, owned by its table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

/// A standalone `CREATE INDEX` statement: the index plus the table it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableIndex {
    pub table: String,
    pub index: Index,
}

/// A view definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub name: String,
    pub definition: String,
}

/// Parameter direction for routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParamMode {
    In,
    Out,
    InOut,
}

impl fmt::Display for ParamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamMode::In => write!(f, "IN"),
            ParamMode::Out => write!(f, "OUT"),
            ParamMode::InOut => write!(f, "INOUT"),
        }
    }
}

/// A routine parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ParamMode>,
}

/// A stored function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub returns: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// A stored procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerTiming {
    Before,
    After,
    InsteadOf,
}

impl fmt::Display for TriggerTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerTiming::Before => write!(f, "BEFORE"),
            TriggerTiming::After => write!(f, "AFTER"),
            TriggerTiming::InsteadOf => write!(f, "INSTEAD OF"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
    Truncate,
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerEvent::Insert => write!(f, "INSERT"),
            TriggerEvent::Update => write!(f, "UPDATE"),
            TriggerEvent::Delete => write!(f, "DELETE"),
            TriggerEvent::Truncate => write!(f, "TRUNCATE"),
        }
    }
}

/// A trigger definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub name: String,
    pub timing: TriggerTiming,
    pub events: Vec<TriggerEvent>,
    pub table: String,
    pub for_each_row: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    pub body: String,
}

/// Tag of a [`SchemaObject`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Table,
    View,
    Function,
    Procedure,
    Trigger,
    Index,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Table => "table",
            ObjectKind::View => "view",
            ObjectKind::Function => "function",
            ObjectKind::Procedure => "procedure",
            ObjectKind::Trigger => "trigger",
            ObjectKind::Index => "index",
        };
        f.write_str(name)
    }
}

/// One parsed entity, as handed to stream callbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "lowercase")]
pub enum SchemaObject {
    Table(Table),
    View(View),
    Function(Function),
    Procedure(Procedure),
    Trigger(Trigger),
    Index(TableIndex),
}

impl SchemaObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            SchemaObject::Table(_) => ObjectKind::Table,
            SchemaObject::View(_) => ObjectKind::View,
            SchemaObject::Function(_) => ObjectKind::Function,
            SchemaObject::Procedure(_) => ObjectKind::Procedure,
            SchemaObject::Trigger(_) => ObjectKind::Trigger,
            SchemaObject::Index(_) => ObjectKind::Index,
        }
    }

    /// Name of the entity (index name for indexes).
    pub fn name(&self) -> &str {
        match self {
            SchemaObject::Table(t) => &t.name,
            SchemaObject::View(v) => &v.name,
            SchemaObject::Function(f) => &f.name,
            SchemaObject::Procedure(p) => &p.name,
            SchemaObject::Trigger(t) => &t.name,
            SchemaObject::Index(i) => &i.index.name,
        }
    }
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parsed object to the schema.
    ///
    /// Indexes attach to their table. An index that arrives before its table
    /// (parallel parsing gives no ordering) is held until the table shows up.
    pub fn insert(&mut self, object: SchemaObject) {
        match object {
            SchemaObject::Table(mut table) => {
                let (mine, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.detached_indexes)
                    .into_iter()
                    .partition(|ti| same_name(&ti.table, &table.name));
                self.detached_indexes = rest;
                table.indexes.extend(mine.into_iter().map(|ti| ti.index));
                self.tables.push(table);
            }
            SchemaObject::View(view) => self.views.push(view),
            SchemaObject::Function(function) => self.functions.push(function),
            SchemaObject::Procedure(procedure) => self.procedures.push(procedure),
            SchemaObject::Trigger(trigger) => self.triggers.push(trigger),
            SchemaObject::Index(ti) => match self.table_mut(&ti.table) {
                Some(table) => table.indexes.push(ti.index),
                None => self.detached_indexes.push(ti),
            },
        }
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| same_name(&t.name, name))
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| same_name(&t.name, name))
    }

    /// Total number of entities, indexes included.
    pub fn object_count(&self) -> usize {
        self.tables.len()
            + self.tables.iter().map(|t| t.indexes.len()).sum::<usize>()
            + self.detached_indexes.len()
            + self.views.len()
            + self.functions.len()
            + self.procedures.len()
            + self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.object_count() == 0
    }
}

impl FromIterator<SchemaObject> for Schema {
    fn from_iter<I: IntoIterator<Item = SchemaObject>>(iter: I) -> Self {
        let mut schema = Schema::new();
        for object in iter {
            schema.insert(object);
        }
        schema
    }
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn column(mut self, col: Column) -> Self {
        self.columns.push(col);
        self
    }

    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    /// Primary key columns, whether declared on the table or on a column.
    pub fn primary_key_columns(&self) -> Vec<&str> {
        if !self.primary_key.is_empty() {
            return self.primary_key.iter().map(String::as_str).collect();
        }
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            default: None,
            primary_key: false,
            unique: false,
            auto_increment: false,
            references: None,
            comment: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn default(mut self, val: impl Into<String>) -> Self {
        self.default = Some(val.into());
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.references = Some(Reference {
            table: table.into(),
            column: column.into(),
        });
        self
    }
}

impl Index {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}
