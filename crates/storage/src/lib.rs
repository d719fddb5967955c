use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite, SqliteConnection,
};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use shared::{
    error::{DomainError, ErrorCode},
    paths::{CollectionPath, DocPath},
};

mod subscription;
pub use subscription::Subscription;

/// Top-level fields of a stored document.
pub type Fields = serde_json::Map<String, Value>;

const CHANGE_FEED_CAPACITY: usize = 256;
const SUBSCRIPTION_BUFFER: usize = 16;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(DocPath),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error(transparent)]
    Path(#[from] DomainError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("document encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::NotFound(_) => ErrorCode::NotFound,
            StoreError::InvalidQuery(_) | StoreError::InvalidDocument(_) | StoreError::Path(_) => {
                ErrorCode::Validation
            }
            StoreError::Unavailable(_) => ErrorCode::Unavailable,
            StoreError::Database(_) | StoreError::Encoding(_) => ErrorCode::Internal,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: DocPath,
    pub fields: Fields,
    /// Assigned by the store when the document is first written.
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl Document {
    pub fn id(&self) -> &str {
        self.path.id()
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }
}

/// Serializes a record into top-level document fields.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields),
        other => Err(StoreError::InvalidDocument(format!(
            "expected an object, got {other}"
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// All documents of one collection, optionally ordered by a top-level field.
/// Equal field values are tie-broken by document id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub collection: CollectionPath,
    pub order_by: Option<OrderBy>,
}

impl Query {
    pub fn collection(collection: CollectionPath) -> Self {
        Self {
            collection,
            order_by: None,
        }
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuerySnapshot {
    pub collection: CollectionPath,
    pub documents: Vec<Document>,
    pub read_time: DateTime<Utc>,
}

impl QuerySnapshot {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.documents.iter().map(Document::id).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    Overwrite,
    /// Only the given top-level fields are replaced.
    Merge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set {
        path: DocPath,
        fields: Fields,
        mode: SetMode,
    },
    /// Fails the whole batch if the document does not exist.
    Update { path: DocPath, fields: Fields },
    Delete { path: DocPath },
}

impl WriteOp {
    pub fn path(&self) -> &DocPath {
        match self {
            WriteOp::Set { path, .. } | WriteOp::Update { path, .. } | WriteOp::Delete { path } => {
                path
            }
        }
    }
}

/// Mutations applied atomically: every op lands or none does.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: DocPath, fields: Fields, mode: SetMode) -> &mut Self {
        self.ops.push(WriteOp::Set { path, fields, mode });
        self
    }

    pub fn update(&mut self, path: DocPath, fields: Fields) -> &mut Self {
        self.ops.push(WriteOp::Update { path, fields });
        self
    }

    pub fn delete(&mut self, path: DocPath) -> &mut Self {
        self.ops.push(WriteOp::Delete { path });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError>;
    /// Creates a document with a store-assigned id.
    async fn add(&self, collection: &CollectionPath, fields: Fields)
        -> Result<Document, StoreError>;
    async fn set(&self, path: &DocPath, fields: Fields, mode: SetMode) -> Result<(), StoreError>;
    async fn update(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError>;
    /// Deleting a missing document is not an error. Child collections are left in place.
    async fn delete(&self, path: &DocPath) -> Result<(), StoreError>;
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
    async fn query(&self, query: &Query) -> Result<QuerySnapshot, StoreError>;
    /// Pushes the current result set, then a fresh one after every commit touching
    /// the collection. Dropping the subscription stops it.
    fn subscribe(&self, query: Query) -> Subscription;
}

#[derive(Debug)]
struct ChangeSet {
    collections: BTreeSet<CollectionPath>,
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
    changes: broadcast::Sender<Arc<ChangeSet>>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // An in-memory database lives only as long as its connection.
        let pool_options = if database_url.starts_with("sqlite::memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open document store at '{database_url}'"))?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run document store migrations")?;

        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Ok(Self { pool, changes })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Every collection at or below `root`, e.g. all collections of one user.
    pub async fn collections_under(
        &self,
        root: &DocPath,
    ) -> Result<Vec<CollectionPath>, StoreError> {
        let prefix = format!("{root}/");
        let rows = sqlx::query(
            "SELECT DISTINCT collection FROM documents
             WHERE substr(collection, 1, ?1) = ?2
             ORDER BY collection ASC",
        )
        .bind(prefix.chars().count() as i64)
        .bind(&prefix)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| CollectionPath::parse(&r.get::<String, _>(0)).map_err(StoreError::from))
            .collect()
    }

    async fn run_query(&self, query: &Query) -> Result<QuerySnapshot, StoreError> {
        let rows = match &query.order_by {
            Some(order_by) => {
                if !is_plain_field(&order_by.field) {
                    return Err(StoreError::InvalidQuery(format!(
                        "cannot order by '{}'",
                        order_by.field
                    )));
                }
                let direction = match order_by.direction {
                    Direction::Ascending => "ASC",
                    Direction::Descending => "DESC",
                };
                let sql = format!(
                    "SELECT doc_id, data, create_time, update_time
                     FROM documents
                     WHERE collection = ?
                     ORDER BY json_extract(data, ?) {direction}, doc_id ASC"
                );
                sqlx::query(&sql)
                    .bind(query.collection.as_str())
                    .bind(format!("$.{}", order_by.field))
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query(
                    "SELECT doc_id, data, create_time, update_time
                     FROM documents
                     WHERE collection = ?
                     ORDER BY doc_id ASC",
                )
                .bind(query.collection.as_str())
                .fetch_all(&self.pool)
                .await?
            }
        };

        let documents = rows
            .iter()
            .map(|row| document_from_row(&query.collection, row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(QuerySnapshot {
            collection: query.collection.clone(),
            documents,
            read_time: Utc::now(),
        })
    }

    async fn apply(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        if ops.is_empty() {
            return Ok(());
        }
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        for op in &ops {
            apply_op(&mut tx, op, now).await?;
        }
        tx.commit().await?;

        let collections: BTreeSet<CollectionPath> =
            ops.iter().map(|op| op.path().collection().clone()).collect();
        debug!(ops = ops.len(), collections = collections.len(), "committed writes");
        self.notify(collections);
        Ok(())
    }

    fn notify(&self, collections: BTreeSet<CollectionPath>) {
        // No receivers simply means nobody is subscribed.
        let _ = self.changes.send(Arc::new(ChangeSet { collections }));
    }
}

#[async_trait]
impl DocumentStore for Storage {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query(
            "SELECT doc_id, data, create_time, update_time
             FROM documents
             WHERE collection = ? AND doc_id = ?",
        )
        .bind(path.collection().as_str())
        .bind(path.id())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| document_from_row(path.collection(), &r))
            .transpose()
    }

    async fn add(
        &self,
        collection: &CollectionPath,
        fields: Fields,
    ) -> Result<Document, StoreError> {
        let path = collection.doc(Uuid::new_v4().simple().to_string());
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO documents (collection, doc_id, data, create_time, update_time)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(collection.as_str())
        .bind(path.id())
        .bind(serde_json::to_string(&fields)?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(path = %path, "added document");
        self.notify(BTreeSet::from([collection.clone()]));
        Ok(Document {
            path,
            fields,
            create_time: now,
            update_time: now,
        })
    }

    async fn set(&self, path: &DocPath, fields: Fields, mode: SetMode) -> Result<(), StoreError> {
        self.apply(vec![WriteOp::Set {
            path: path.clone(),
            fields,
            mode,
        }])
        .await
    }

    async fn update(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError> {
        self.apply(vec![WriteOp::Update {
            path: path.clone(),
            fields,
        }])
        .await
    }

    async fn delete(&self, path: &DocPath) -> Result<(), StoreError> {
        self.apply(vec![WriteOp::Delete { path: path.clone() }])
            .await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        self.apply(batch.ops).await
    }

    async fn query(&self, query: &Query) -> Result<QuerySnapshot, StoreError> {
        self.run_query(query).await
    }

    fn subscribe(&self, query: Query) -> Subscription {
        // Registered before the first read so no commit can slip between them.
        let mut notices = self.changes.subscribe();
        let store = self.clone();
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);

        let task = tokio::spawn(async move {
            debug!(collection = %query.collection, "subscription started");
            if tx.send(store.run_query(&query).await).await.is_err() {
                return;
            }
            loop {
                match notices.recv().await {
                    Ok(change) if !change.collections.contains(&query.collection) => continue,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            collection = %query.collection,
                            skipped,
                            "subscription lagged behind change feed; re-reading"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                if tx.send(store.run_query(&query).await).await.is_err() {
                    break;
                }
            }
            debug!(collection = %query.collection, "subscription ended");
        });

        Subscription::spawned(rx, task)
    }
}

async fn apply_op(
    conn: &mut SqliteConnection,
    op: &WriteOp,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    match op {
        WriteOp::Set { path, fields, mode } => {
            let data = match mode {
                SetMode::Overwrite => fields.clone(),
                SetMode::Merge => {
                    let mut merged = load_fields(conn, path).await?.unwrap_or_default();
                    merged.extend(fields.clone());
                    merged
                }
            };
            sqlx::query(
                "INSERT INTO documents (collection, doc_id, data, create_time, update_time)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(collection, doc_id) DO UPDATE SET
                     data = excluded.data,
                     update_time = excluded.update_time",
            )
            .bind(path.collection().as_str())
            .bind(path.id())
            .bind(serde_json::to_string(&data)?)
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await?;
        }
        WriteOp::Update { path, fields } => {
            let Some(mut merged) = load_fields(conn, path).await? else {
                return Err(StoreError::NotFound(path.clone()));
            };
            merged.extend(fields.clone());
            sqlx::query(
                "UPDATE documents SET data = ?, update_time = ?
                 WHERE collection = ? AND doc_id = ?",
            )
            .bind(serde_json::to_string(&merged)?)
            .bind(now)
            .bind(path.collection().as_str())
            .bind(path.id())
            .execute(&mut *conn)
            .await?;
        }
        WriteOp::Delete { path } => {
            sqlx::query("DELETE FROM documents WHERE collection = ? AND doc_id = ?")
                .bind(path.collection().as_str())
                .bind(path.id())
                .execute(&mut *conn)
                .await?;
        }
    }
    Ok(())
}

async fn load_fields(
    conn: &mut SqliteConnection,
    path: &DocPath,
) -> Result<Option<Fields>, StoreError> {
    let row = sqlx::query("SELECT data FROM documents WHERE collection = ? AND doc_id = ?")
        .bind(path.collection().as_str())
        .bind(path.id())
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(r) => Ok(Some(serde_json::from_str::<Fields>(&r.get::<String, _>(0))?)),
        None => Ok(None),
    }
}

fn document_from_row(collection: &CollectionPath, row: &SqliteRow) -> Result<Document, StoreError> {
    Ok(Document {
        path: collection.doc(row.get::<String, _>(0)),
        fields: serde_json::from_str(&row.get::<String, _>(1))?,
        create_time: row.get::<DateTime<Utc>, _>(2),
        update_time: row.get::<DateTime<Utc>, _>(3),
    })
}

fn is_plain_field(field: &str) -> bool {
    !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
