//! `SQLite`-backed [`QueryExecutor`].
//!
//! Statements are rendered from the planned queries against a configurable
//! [`SqliteSchema`]. Every query runs on its own connection inside
//! `spawn_blocking`, so the async workers never block a runtime thread on
//! disk I/O and never wait on each other's statements.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use lazygrid_core::{
    CountQuery, FilterSpec, FilterValue, IdListQuery, PageQuery, Row, RowId, Value,
};
use parking_lot::{Mutex, RwLock};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags};

use crate::traits::QueryExecutor;

/// A one-to-many table listing ids owned by a main-table row, e.g. the tags
/// of a tour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationTable {
    pub table: String,
    /// Column referencing the main table's id.
    pub owner_column: String,
    /// Column holding the associated id.
    pub id_column: String,
}

/// Where rows live and which columns a page materializes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteSchema {
    pub table: String,
    pub id_column: String,
    /// Columns copied into [`Row::values`], keyed by column name.
    pub columns: Vec<String>,
    pub tags: Option<AssociationTable>,
    pub markers: Option<AssociationTable>,
}

impl Default for SqliteSchema {
    /// The tour book: `TourData` with its tag join table and markers.
    fn default() -> Self {
        Self {
            table: "TourData".to_string(),
            id_column: "TourId".to_string(),
            columns: [
                "TourStartTime",
                "TourTitle",
                "tourDistance",
                "tourDeviceTime_Recorded",
                "tourType_typeId",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            tags: Some(AssociationTable {
                table: "TourData_TourTag".to_string(),
                owner_column: "TourData_tourId".to_string(),
                id_column: "TourTag_tagId".to_string(),
            }),
            markers: Some(AssociationTable {
                table: "TourMarker".to_string(),
                owner_column: "TourData_tourId".to_string(),
                id_column: "markerId".to_string(),
            }),
        }
    }
}

impl SqliteSchema {
    #[must_use]
    pub fn count_sql(&self, filter: &FilterSpec) -> String {
        format!(
            "SELECT COUNT(*) FROM {} WHERE 1=1{}",
            self.table,
            filter.clause()
        )
    }

    #[must_use]
    pub fn id_list_sql(&self, query: &IdListQuery) -> String {
        format!(
            "SELECT {} FROM {} WHERE 1=1{}{}",
            self.id_column,
            self.table,
            query.filter.clause(),
            query.order_by.to_sql()
        )
    }

    /// Page statement; binds the filter params, then `LIMIT ?`, `OFFSET ?`.
    #[must_use]
    pub fn page_sql(&self, query: &PageQuery) -> String {
        let mut sql = format!("SELECT {}.{}", self.table, self.id_column);
        for column in &self.columns {
            let _ = write!(sql, ", {column}");
        }
        for association in [&self.tags, &self.markers].into_iter().flatten() {
            let _ = write!(
                sql,
                ", (SELECT GROUP_CONCAT(a.{}) FROM {} a WHERE a.{} = {}.{})",
                association.id_column,
                association.table,
                association.owner_column,
                self.table,
                self.id_column
            );
        }
        let _ = write!(
            sql,
            " FROM {} WHERE 1=1{}{} LIMIT ? OFFSET ?",
            self.table,
            query.filter.clause(),
            query.order_by.to_sql()
        );
        sql
    }
}

/// Runs on every connection the executor opens, e.g. to register
/// functions or set pragmas.
pub type ConnectionInit = Arc<dyn Fn(&Connection) -> rusqlite::Result<()> + Send + Sync>;

/// Connections kept open between queries.
const MAX_IDLE: usize = 4;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

static MEMORY_DATABASES: AtomicU64 = AtomicU64::new(0);

enum ConnectionSource {
    File(PathBuf),
    /// Named `memdb` database shared by every connection in the process.
    Memory(String),
}

impl ConnectionSource {
    fn open(&self) -> rusqlite::Result<Connection> {
        let conn = match self {
            Self::File(path) => Connection::open(path)?,
            Self::Memory(uri) => Connection::open_with_flags(
                uri,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?,
        };
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }
}

struct ExecutorShared {
    source: ConnectionSource,
    schema: SqliteSchema,
    /// Used by [`SqliteExecutor::with_connection`]; for in-memory databases
    /// it also keeps the data alive while no query is running.
    anchor: Mutex<Connection>,
    idle: Mutex<Vec<Connection>>,
    init: RwLock<Option<ConnectionInit>>,
}

impl ExecutorShared {
    /// An idle connection, or a new one with the init hook applied.
    fn checkout(&self) -> anyhow::Result<Connection> {
        if let Some(conn) = self.idle.lock().pop() {
            return Ok(conn);
        }
        let conn = self.source.open().context("opening query connection")?;
        if let Some(init) = self.init.read().as_ref() {
            init(&conn)?;
        }
        Ok(conn)
    }

    fn checkin(&self, conn: Connection) {
        let mut idle = self.idle.lock();
        if idle.len() < MAX_IDLE {
            idle.push(conn);
        }
    }
}

/// Executes planned queries against one `SQLite` database.
///
/// Each running query holds its own connection, so a long id scan does not
/// hold up page fetches or the row count.
#[derive(Clone)]
pub struct SqliteExecutor {
    shared: Arc<ExecutorShared>,
}

impl SqliteExecutor {
    fn from_source(source: ConnectionSource, schema: SqliteSchema) -> rusqlite::Result<Self> {
        let anchor = source.open()?;
        Ok(Self {
            shared: Arc::new(ExecutorShared {
                source,
                schema,
                anchor: Mutex::new(anchor),
                idle: Mutex::new(Vec::new()),
                init: RwLock::new(None),
            }),
        })
    }

    /// # Errors
    ///
    /// Returns an error if the database file cannot be opened.
    pub fn open_path(path: impl AsRef<Path>, schema: SqliteSchema) -> anyhow::Result<Self> {
        let path = path.as_ref();
        Self::from_source(ConnectionSource::File(path.to_path_buf()), schema)
            .with_context(|| format!("opening sqlite database {}", path.display()))
    }

    /// Opens a private in-memory database that every query connection of
    /// this executor shares.
    ///
    /// # Errors
    ///
    /// Returns an error if `SQLite` cannot allocate the database.
    pub fn open_in_memory(schema: SqliteSchema) -> anyhow::Result<Self> {
        let n = MEMORY_DATABASES.fetch_add(1, Ordering::Relaxed);
        let uri = format!("file:/lazygrid-{}-{n}?vfs=memdb", std::process::id());
        Self::from_source(ConnectionSource::Memory(uri), schema)
            .context("opening in-memory sqlite database")
    }

    #[must_use]
    pub fn schema(&self) -> &SqliteSchema {
        &self.shared.schema
    }

    /// Runs `init` on the seeding connection now and on every query
    /// connection opened afterwards. Install it before the first query.
    ///
    /// # Errors
    ///
    /// Returns whatever `init` fails with on the seeding connection.
    pub fn on_connect(&self, init: ConnectionInit) -> anyhow::Result<()> {
        init(&self.shared.anchor.lock())?;
        *self.shared.init.write() = Some(init);
        // Reopened on demand with the hook applied.
        self.shared.idle.lock().clear();
        Ok(())
    }

    /// Runs `f` on a dedicated connection from the calling thread, e.g. to
    /// create or seed tables.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` fails with.
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> anyhow::Result<T> {
        let mut conn = self.shared.anchor.lock();
        Ok(f(&mut conn)?)
    }

    async fn run_blocking<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &SqliteSchema) -> anyhow::Result<T> + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || {
            let conn = shared.checkout()?;
            let result = f(&conn, &shared.schema);
            shared.checkin(conn);
            result
        })
        .await?
    }
}

#[async_trait]
impl QueryExecutor for SqliteExecutor {
    async fn execute_count(&self, query: &CountQuery) -> anyhow::Result<usize> {
        let filter = query.filter.clone();
        self.run_blocking(move |conn, schema| {
            let sql = schema.count_sql(&filter);
            let count: i64 = conn
                .query_row(&sql, params_from_iter(bind_params(&filter)), |r| r.get(0))
                .with_context(|| format!("running {sql}"))?;
            Ok(usize::try_from(count)?)
        })
        .await
    }

    async fn execute_id_list(&self, query: &IdListQuery) -> anyhow::Result<Vec<RowId>> {
        let query = query.clone();
        self.run_blocking(move |conn, schema| {
            let sql = schema.id_list_sql(&query);
            let mut stmt = conn
                .prepare(&sql)
                .with_context(|| format!("preparing {sql}"))?;
            let ids = stmt
                .query_map(params_from_iter(bind_params(&query.filter)), |r| {
                    r.get::<_, i64>(0)
                })?
                .map(|id| id.map(RowId))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ids)
        })
        .await
    }

    async fn execute_page(&self, query: &PageQuery) -> anyhow::Result<Vec<Row>> {
        let query = query.clone();
        self.run_blocking(move |conn, schema| {
            let sql = schema.page_sql(&query);
            let mut params = bind_params(&query.filter);
            params.push(SqlValue::Integer(i64::try_from(query.limit)?));
            params.push(SqlValue::Integer(i64::try_from(query.offset)?));

            let mut stmt = conn
                .prepare(&sql)
                .with_context(|| format!("preparing {sql}"))?;
            let mut rows = stmt.query(params_from_iter(params))?;
            let mut page = Vec::with_capacity(query.limit.min(1024));
            while let Some(r) = rows.next()? {
                let mut row = Row::new(RowId(r.get(0)?));
                for (i, column) in schema.columns.iter().enumerate() {
                    row.values.insert(column.clone(), to_value(r.get_ref(i + 1)?));
                }
                let mut index = schema.columns.len() + 1;
                if schema.tags.is_some() {
                    let ids: Option<String> = r.get(index)?;
                    row = row.with_tags(parse_id_list(ids.as_deref()));
                    index += 1;
                }
                if schema.markers.is_some() {
                    let ids: Option<String> = r.get(index)?;
                    row = row.with_markers(parse_id_list(ids.as_deref()));
                }
                page.push(row);
            }
            Ok(page)
        })
        .await
    }
}

fn bind_params(filter: &FilterSpec) -> Vec<SqlValue> {
    filter
        .params()
        .iter()
        .map(|p| match p {
            FilterValue::Int(v) => SqlValue::Integer(*v),
            FilterValue::Float(v) => SqlValue::Real(*v),
            FilterValue::Text(v) => SqlValue::Text(v.clone()),
        })
        .collect()
}

fn to_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(v) => Value::String(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => Value::Bytes(v.to_vec()),
    }
}

/// Parses a `GROUP_CONCAT` result such as `"3,1,2"`. Unparseable entries
/// are skipped.
fn parse_id_list(ids: Option<&str>) -> Vec<i64> {
    ids.map(|s| s.split(',').filter_map(|id| id.trim().parse().ok()).collect())
        .unwrap_or_default()
}
