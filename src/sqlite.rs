use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, ToSql};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::{EtlError, Result};

/// Core value types for SQLite operations
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Boolean(bool),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Boolean(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Real(_))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(v: ValueRef<'_>) -> Self {
        match v {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::from(rusqlite::types::Null),
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Real(f) => ToSqlOutput::from(*f),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
            Value::Blob(b) => ToSqlOutput::from(b.as_slice()),
            Value::Boolean(b) => ToSqlOutput::from(*b),
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r:.2}"),
            Value::Text(s) => f.write_str(s),
            Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
            Value::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// Parameter bindings for SQL queries, keyed by name without the leading `:`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Params {
    pub values: HashMap<String, Value>,
}

impl Params {
    /// Create a new Params object
    pub fn new() -> Self {
        Self::default()
    }
    /// Add a named value
    pub fn with_value(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}

/// SQL Query with typed parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub statement: String,
    pub params: Params,
}

impl SqlQuery {
    pub fn new(statement: &str) -> Self {
        Self {
            statement: statement.to_string(),
            params: Params::new(),
        }
    }
    pub fn with_value(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params = self.params.with_value(name, value);
        self
    }
}

/// Column names plus the rows returned by a statement.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Value of `column` in row `row`, if both exist.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }
}

/// Query operators for building advanced queries
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOperator {
    Equal(Value),
    NotEqual(Value),
    GreaterThan(Value),
    GreaterThanOrEqual(Value),
    LessThan(Value),
    LessThanOrEqual(Value),
    Like(String),
    In(Vec<Value>),
}

impl QueryOperator {
    /// `LIKE` pattern matching `text` anywhere, with wildcards in `text` taken literally.
    ///
    /// `Like` compares both sides through [`LOWER_FN`], so matching ignores case beyond ASCII.
    pub fn contains(text: &str) -> Self {
        let mut pattern = String::with_capacity(text.len() + 2);
        pattern.push('%');
        for c in text.chars() {
            if matches!(c, '%' | '_' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('%');
        QueryOperator::Like(pattern)
    }

    fn render(&self, column: &str, slot: &str, params: &mut Params) -> String {
        let binary = |op: &str, value: &Value, params: &mut Params| {
            params.values.insert(slot.to_string(), value.clone());
            format!("{column} {op} :{slot}")
        };
        match self {
            QueryOperator::Equal(v) => binary("=", v, params),
            QueryOperator::NotEqual(v) => binary("<>", v, params),
            QueryOperator::GreaterThan(v) => binary(">", v, params),
            QueryOperator::GreaterThanOrEqual(v) => binary(">=", v, params),
            QueryOperator::LessThan(v) => binary("<", v, params),
            QueryOperator::LessThanOrEqual(v) => binary("<=", v, params),
            QueryOperator::Like(pattern) => {
                params
                    .values
                    .insert(slot.to_string(), Value::Text(pattern.clone()));
                format!("{LOWER_FN}({column}) LIKE {LOWER_FN}(:{slot}) ESCAPE '\\'")
            }
            QueryOperator::In(values) if values.is_empty() => "0".to_string(),
            QueryOperator::In(values) => {
                let slots: Vec<String> = values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| {
                        let name = format!("{slot}_{i}");
                        params.values.insert(name.clone(), v.clone());
                        format!(":{name}")
                    })
                    .collect();
                format!("{column} IN ({})", slots.join(", "))
            }
        }
    }
}

/// Query builder for composable, immutable queries.
///
/// Conditions are ANDed together and rendered in field order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Query {
    pub conditions: BTreeMap<String, QueryOperator>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_condition(mut self, field: &str, op: QueryOperator) -> Self {
        self.conditions.insert(field.to_string(), op);
        self
    }

    /// Renders ` WHERE ...` (or nothing) and the parameters it binds.
    pub fn where_clause(&self) -> (String, Params) {
        let mut params = Params::new();
        if self.conditions.is_empty() {
            return (String::new(), params);
        }
        let clauses: Vec<String> = self
            .conditions
            .iter()
            .enumerate()
            .map(|(i, (field, op))| op.render(&ident(field), &format!("w{i}"), &mut params))
            .collect();
        (format!(" WHERE {}", clauses.join(" AND ")), params)
    }
}

/// CRUD operation types
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOperation {
    pub table: String,
    pub data: HashMap<String, Value>,
}

impl CreateOperation {
    pub fn new(table: &str, params: Params) -> Self {
        Self {
            table: table.to_string(),
            data: params.values,
        }
    }

    fn to_sql(&self) -> Result<SqlQuery> {
        let mut columns: Vec<&String> = self.data.keys().collect();
        if columns.is_empty() {
            return Err(EtlError::EmptyOperation {
                table: self.table.clone(),
            });
        }
        columns.sort();
        let names: Vec<&str> = columns.iter().map(|c| c.as_str()).collect();
        Ok(SqlQuery {
            statement: insert_sql(&self.table, &names),
            params: Params {
                values: self.data.clone(),
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadOperation {
    pub table: String,
    pub query: Query,
    pub fields: Option<Vec<String>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub order_by: Option<Vec<(String, bool)>>, // (field, is_ascending)
}

impl ReadOperation {
    pub fn new(table: &str, query: Query) -> Self {
        Self {
            table: table.to_string(),
            query,
            fields: None,
            limit: None,
            offset: None,
            order_by: None,
        }
    }

    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        self.fields = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn with_order(mut self, field: &str, ascending: bool) -> Self {
        self.order_by
            .get_or_insert_with(Vec::new)
            .push((field.to_string(), ascending));
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    fn to_sql(&self) -> SqlQuery {
        let fields = match &self.fields {
            Some(fields) if !fields.is_empty() => {
                fields.iter().map(|f| ident(f)).collect::<Vec<_>>().join(", ")
            }
            _ => "*".to_string(),
        };
        let (filter, params) = self.query.where_clause();
        let mut statement = format!("SELECT {fields} FROM {}{filter}", ident(&self.table));
        if let Some(order) = self.order_by.as_ref().filter(|o| !o.is_empty()) {
            let terms: Vec<String> = order
                .iter()
                .map(|(field, asc)| format!("{} {}", ident(field), if *asc { "ASC" } else { "DESC" }))
                .collect();
            statement.push_str(&format!(" ORDER BY {}", terms.join(", ")));
        }
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => {
                statement.push_str(&format!(" LIMIT {limit} OFFSET {offset}"))
            }
            (Some(limit), None) => statement.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => statement.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }
        SqlQuery { statement, params }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOperation {
    pub table: String,
    pub query: Query,
}

impl DeleteOperation {
    pub fn new(table: &str, query: Query) -> Self {
        Self {
            table: table.to_string(),
            query,
        }
    }

    fn to_sql(&self) -> SqlQuery {
        let (filter, params) = self.query.where_clause();
        SqlQuery {
            statement: format!("DELETE FROM {}{filter}", ident(&self.table)),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CrudOperation {
    Create(CreateOperation),
    Read(ReadOperation),
    Delete(DeleteOperation),
}

/// Outcome of a [`CrudOperation`].
#[derive(Debug, Clone, PartialEq)]
pub enum CrudResult {
    Affected(usize),
    Rows(QueryResult),
}

impl CrudResult {
    pub fn affected(&self) -> usize {
        match self {
            CrudResult::Affected(n) => *n,
            CrudResult::Rows(_) => 0,
        }
    }

    pub fn into_rows(self) -> QueryResult {
        match self {
            CrudResult::Rows(rows) => rows,
            CrudResult::Affected(_) => QueryResult::default(),
        }
    }
}

/// Schema definition for the SQLite database
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Schema {
    pub tables: Vec<TableDefinition>,
}

impl Schema {
    pub fn new() -> Self {
        Self { tables: Vec::new() }
    }
    pub fn add_table(mut self, table: TableDefinition) -> Self {
        self.tables.push(table);
        self
    }
    pub fn table(&self, name: &str) -> Option<&TableDefinition> {
        self.tables.iter().find(|t| t.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
    pub indexes: Vec<IndexDefinition>,
}

impl TableDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn column(mut self, name: &str, data_type: DataType) -> Self {
        self.columns.push(ColumnDefinition::new(name, data_type));
        self
    }

    pub fn foreign_key(mut self, key: ForeignKey) -> Self {
        self.foreign_keys.push(key);
        self
    }

    pub fn index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// `CREATE TABLE IF NOT EXISTS` for this table.
    pub fn create_sql(&self) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(ColumnDefinition::to_sql).collect();
        if !self.primary_key.is_empty() {
            let cols: Vec<String> = self.primary_key.iter().map(|c| ident(c)).collect();
            parts.push(format!("PRIMARY KEY ({})", cols.join(", ")));
        }
        parts.extend(self.foreign_keys.iter().map(ForeignKey::to_sql));
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            ident(&self.name),
            parts.join(",\n    ")
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub constraints: Vec<ColumnConstraint>,
}

impl ColumnDefinition {
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: ColumnConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", ident(&self.name), self.data_type.as_sql());
        for constraint in &self.constraints {
            sql.push(' ');
            sql.push_str(constraint.as_sql());
        }
        sql
    }
}

/// Declared column types. SQLite maps each onto a type affinity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DataType {
    Integer,
    Text,
    Real,
    Numeric,
    Date,
    Boolean,
    Blob,
}

impl DataType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Text => "TEXT",
            DataType::Real => "REAL",
            DataType::Numeric => "NUMERIC",
            DataType::Date => "DATE",
            DataType::Boolean => "BOOLEAN",
            DataType::Blob => "BLOB",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnConstraint {
    PrimaryKey,
    NotNull,
    Unique,
}

impl ColumnConstraint {
    fn as_sql(&self) -> &'static str {
        match self {
            ColumnConstraint::PrimaryKey => "PRIMARY KEY",
            ColumnConstraint::NotNull => "NOT NULL",
            ColumnConstraint::Unique => "UNIQUE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub column: String,
    pub foreign_table: String,
    pub foreign_column: String,
    pub on_delete: ForeignKeyAction,
    pub on_update: ForeignKeyAction,
}

impl ForeignKey {
    pub fn new(column: &str, foreign_table: &str, foreign_column: &str) -> Self {
        Self {
            column: column.to_string(),
            foreign_table: foreign_table.to_string(),
            foreign_column: foreign_column.to_string(),
            on_delete: ForeignKeyAction::NoAction,
            on_update: ForeignKeyAction::NoAction,
        }
    }

    fn to_sql(&self) -> String {
        let mut sql = format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            ident(&self.column),
            ident(&self.foreign_table),
            ident(&self.foreign_column)
        );
        if self.on_delete != ForeignKeyAction::NoAction {
            sql.push_str(" ON DELETE ");
            sql.push_str(self.on_delete.as_sql());
        }
        if self.on_update != ForeignKeyAction::NoAction {
            sql.push_str(" ON UPDATE ");
            sql.push_str(self.on_update.as_sql());
        }
        sql
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForeignKeyAction {
    NoAction,
    Cascade,
    SetNull,
    SetDefault,
    Restrict,
}

impl ForeignKeyAction {
    fn as_sql(&self) -> &'static str {
        match self {
            ForeignKeyAction::NoAction => "NO ACTION",
            ForeignKeyAction::Cascade => "CASCADE",
            ForeignKeyAction::SetNull => "SET NULL",
            ForeignKeyAction::SetDefault => "SET DEFAULT",
            ForeignKeyAction::Restrict => "RESTRICT",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexDefinition {
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
        }
    }

    /// `CREATE INDEX IF NOT EXISTS` on `table`.
    pub fn create_sql(&self, table: &str) -> String {
        let cols: Vec<String> = self.columns.iter().map(|c| ident(c)).collect();
        format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
            if self.unique { "UNIQUE " } else { "" },
            ident(&self.name),
            ident(table),
            cols.join(", ")
        )
    }
}

/// SQLite store configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SqliteConfig {
    /// Path to the SQLite database file; `None` keeps the database in memory
    pub db_path: Option<PathBuf>,
    /// Schema definition for the database
    pub schema: Schema,
    /// Drop the schema's tables before creating them
    pub reset: bool,
}

impl SqliteConfig {
    /// Create a new SQLite config with path and schema
    pub fn new(db_path: impl Into<PathBuf>, schema: Schema) -> Self {
        Self {
            db_path: Some(db_path.into()),
            schema,
            reset: false,
        }
    }

    pub fn in_memory(schema: Schema) -> Self {
        Self {
            db_path: None,
            schema,
            reset: false,
        }
    }

    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }
}

/// A single SQLite connection plus the schema it was opened with.
pub struct SqliteStore {
    config: SqliteConfig,
    conn: Connection,
}

impl SqliteStore {
    /// Open the database described by `config`. Parent directories are created as needed.
    pub fn open(config: SqliteConfig) -> Result<Self> {
        let conn = match &config.db_path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|source| EtlError::Open {
                        path: parent.to_path_buf(),
                        source,
                    })?;
                }
                info!("opening sqlite database at {}", path.display());
                Connection::open(path)?
            }
            None => {
                info!("opening in-memory sqlite database");
                Connection::open_in_memory()?
            }
        };
        // bundled builds enforce foreign keys; dimension IDs repeat across versions
        conn.pragma_update(None, "foreign_keys", false)?;
        conn.create_scalar_function(
            LOWER_FN,
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            unicode_lower,
        )?;
        Ok(Self { config, conn })
    }

    /// Create every table and index in the schema if absent, dropping them first on reset.
    pub fn initialize_schema(&self) -> Result<()> {
        let schema = &self.config.schema;
        if self.config.reset {
            for table in schema.tables.iter().rev() {
                debug!(table = %table.name, "dropping table");
                self.conn
                    .execute_batch(&format!("DROP TABLE IF EXISTS {}", ident(&table.name)))?;
            }
        }
        for table in &schema.tables {
            debug!(table = %table.name, "creating table");
            self.conn.execute_batch(&table.create_sql())?;
            for index in &table.indexes {
                self.conn.execute_batch(&index.create_sql(&table.name))?;
            }
        }
        Ok(())
    }

    /// Run a statement that returns no rows; yields the number of rows changed.
    pub fn execute(&self, query: &SqlQuery) -> Result<usize> {
        let mut stmt = self.conn.prepare_cached(&query.statement)?;
        let changed = with_named(&query.params, |bound| stmt.execute(bound))?;
        Ok(changed)
    }

    pub fn query(&self, query: &SqlQuery) -> Result<QueryResult> {
        let mut stmt = self.conn.prepare_cached(&query.statement)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();
        let rows = with_named(&query.params, |bound| {
            let mapped = stmt.query_map(bound, |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(Value::from))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?;
            mapped.collect::<rusqlite::Result<Vec<_>>>()
        })?;
        Ok(QueryResult { columns, rows })
    }

    /// Insert `rows` into `table` inside one transaction using a single prepared statement.
    pub fn insert_batch<I>(&mut self, table: &str, columns: &[&str], rows: I) -> Result<usize>
    where
        I: IntoIterator<Item = Params>,
    {
        if columns.is_empty() {
            return Err(EtlError::EmptyOperation {
                table: table.to_string(),
            });
        }
        let sql = insert_sql(table, columns);
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(&sql)?;
            for params in rows {
                inserted += with_named(&params, |bound| stmt.execute(bound))?;
            }
        }
        tx.commit()?;
        debug!(table, inserted, "batch committed");
        Ok(inserted)
    }

    /// Perform a CRUD operation (type-safe API)
    pub fn execute_crud(&self, op: &CrudOperation) -> Result<CrudResult> {
        match op {
            CrudOperation::Create(create) => {
                Ok(CrudResult::Affected(self.execute(&create.to_sql()?)?))
            }
            CrudOperation::Read(read) => Ok(CrudResult::Rows(self.query(&read.to_sql())?)),
            CrudOperation::Delete(delete) => {
                Ok(CrudResult::Affected(self.execute(&delete.to_sql())?))
            }
        }
    }

    /// One past the highest `ID` in `table`, or 1 when it is empty.
    pub fn next_id(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COALESCE(MAX(\"ID\"), 0) + 1 FROM {}", ident(table));
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }

    pub fn count(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", ident(table));
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }
}

/// SQL function lowering text with Unicode case rules; registered on every store.
pub const LOWER_FN: &str = "unicode_lower";

fn unicode_lower(ctx: &Context<'_>) -> rusqlite::Result<Option<String>> {
    Ok(match ctx.get_raw(0) {
        ValueRef::Null | ValueRef::Blob(_) => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).to_lowercase()),
    })
}

/// Quote an identifier for SQLite.
pub fn ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn insert_sql(table: &str, columns: &[&str]) -> String {
    let names: Vec<String> = columns.iter().map(|c| ident(c)).collect();
    let slots: Vec<String> = columns.iter().map(|c| format!(":{c}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        ident(table),
        names.join(", "),
        slots.join(", ")
    )
}

// rusqlite binds named parameters through a slice of (":name", value) pairs.
fn with_named<T>(
    params: &Params,
    f: impl FnOnce(&[(&str, &dyn ToSql)]) -> rusqlite::Result<T>,
) -> rusqlite::Result<T> {
    let names: Vec<(String, &Value)> = params
        .values
        .iter()
        .map(|(name, value)| (format!(":{name}"), value))
        .collect();
    let bound: Vec<(&str, &dyn ToSql)> = names
        .iter()
        .map(|(name, value)| (name.as_str(), *value as &dyn ToSql))
        .collect();
    f(&bound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_escapes_wildcards() {
        assert_eq!(
            QueryOperator::contains("50%_off\\"),
            QueryOperator::Like("%50\\%\\_off\\\\%".to_string())
        );
    }

    #[test]
    fn where_clause_is_field_ordered() {
        let (sql, params) = Query::new()
            .with_condition("b", QueryOperator::Equal(Value::Integer(2)))
            .with_condition("a", QueryOperator::In(vec![Value::Integer(1), Value::Integer(3)]))
            .where_clause();
        assert_eq!(sql, " WHERE \"a\" IN (:w0_0, :w0_1) AND \"b\" = :w1");
        assert_eq!(params.get("w0_1"), Some(&Value::Integer(3)));
        assert_eq!(params.get("w1"), Some(&Value::Integer(2)));
    }

    #[test]
    fn like_lowers_both_sides() {
        let (sql, params) = Query::new()
            .with_condition("address", QueryOperator::contains("Zürich"))
            .where_clause();
        assert_eq!(
            sql,
            " WHERE unicode_lower(\"address\") LIKE unicode_lower(:w0) ESCAPE '\\'"
        );
        assert_eq!(params.get("w0"), Some(&Value::from("%Zürich%")));
    }

    #[test]
    fn empty_in_matches_nothing() {
        let (sql, params) = Query::new()
            .with_condition("a", QueryOperator::In(vec![]))
            .where_clause();
        assert_eq!(sql, " WHERE 0");
        assert!(params.values.is_empty());
    }

    #[test]
    fn read_offset_without_limit() {
        let read = ReadOperation::new("t", Query::new())
            .with_fields(&["x"])
            .with_order("x", false)
            .with_offset(3);
        assert_eq!(
            read.to_sql().statement,
            "SELECT \"x\" FROM \"t\" ORDER BY \"x\" DESC LIMIT -1 OFFSET 3"
        );
    }

    #[test]
    fn create_table_renders_foreign_keys() {
        let mut fk = ForeignKey::new("owner", "people", "ID");
        fk.on_delete = ForeignKeyAction::Cascade;
        let mut table = TableDefinition::new("pets")
            .column("ID", DataType::Integer)
            .column("owner", DataType::Integer)
            .foreign_key(fk);
        table.columns[0] = ColumnDefinition::new("ID", DataType::Integer)
            .with_constraint(ColumnConstraint::NotNull);
        assert_eq!(
            table.create_sql(),
            "CREATE TABLE IF NOT EXISTS \"pets\" (\n    \"ID\" INTEGER NOT NULL,\n    \"owner\" INTEGER,\n    \
             FOREIGN KEY (\"owner\") REFERENCES \"people\" (\"ID\") ON DELETE CASCADE\n)"
        );
    }

    #[test]
    fn value_display() {
        assert_eq!(Value::Real(12.5).to_string(), "12.50");
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::from(Some("x")).to_string(), "x");
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }
}
