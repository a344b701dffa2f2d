pub mod collections;
pub mod memory;
pub mod mongo;

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use mongodb::bson::{Bson, Document};
use thiserror::Error;

use crate::config::{ConnectionStrategy, StoreSettings};

pub use collections::{ResponsesCollection, UsersCollection};
pub use memory::MemoryConnector;
pub use mongo::MongoConnector;

/// Failures surfaced by the store.
///
/// `Connection` is only ever produced by [`Connector::acquire`], so handlers can
/// tell an unreachable store apart from a rejected operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    Connection(String),
    #[error("store query failed: {0}")]
    Query(String),
    #[error("duplicate key: {0}")]
    Duplicate(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Identifier assigned by the store to an inserted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredId(String);

impl StoredId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Bson> for StoredId {
    fn from(value: Bson) -> Self {
        match value {
            Bson::ObjectId(oid) => Self(oid.to_hex()),
            Bson::String(s) => Self(s),
            other => Self(other.to_string()),
        }
    }
}

impl fmt::Display for StoredId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_i32(self) -> i32 {
        match self {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }
}

/// A live handle to the document store, valid for one request.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn insert_one(&self, collection: &str, document: Document) -> StoreResult<StoredId>;

    /// First document whose fields equal every entry of `filter`.
    async fn find_one(&self, collection: &str, filter: Document) -> StoreResult<Option<Document>>;

    async fn find_all(&self, collection: &str, sort_by: &str, order: SortOrder) -> StoreResult<Vec<Document>>;

    async fn create_index(&self, collection: &str, field: &str, order: SortOrder, unique: bool) -> StoreResult<()>;

    /// Must be safe to call more than once.
    async fn close(&self) -> StoreResult<()>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    fn strategy(&self) -> ConnectionStrategy;

    async fn acquire(&self) -> StoreResult<Box<dyn Connection>>;

    /// Hands a connection back. Never fails; close errors are only logged.
    async fn release(&self, connection: Box<dyn Connection>) {
        if let Err(e) = connection.close().await {
            log::warn!("⚠️  Error closing store connection ({}): {}", self.strategy(), e);
        }
    }
}

/// Runs `op` against a freshly acquired connection and releases it afterwards,
/// whether `op` succeeds, fails or panics.
///
/// Acquire, `op` and release run on their own task: dropping the returned
/// future (a client hanging up mid-request) neither interrupts the store
/// operation nor skips the release.
pub async fn with_connection<T, F>(connector: Arc<dyn Connector>, op: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: for<'c> FnOnce(&'c dyn Connection) -> BoxFuture<'c, StoreResult<T>> + Send + 'static,
{
    let task = tokio::spawn(async move {
        let connection = connector.acquire().await?;
        let outcome = AssertUnwindSafe(op(connection.as_ref())).catch_unwind().await;
        connector.release(connection).await;

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    });

    match task.await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(StoreError::Query(format!("store task aborted: {}", e))),
    }
}

/// Creates the indexes both collections rely on.
pub async fn ensure_indexes(connector: Arc<dyn Connector>) -> StoreResult<()> {
    log::info!("🔧 Creating database indexes...");

    with_connection(connector, |conn| {
        async move {
            UsersCollection::new(conn).ensure_indexes().await?;
            log::info!("   ✅ Index ready: users(email, unique)");
            ResponsesCollection::new(conn).ensure_indexes().await?;
            log::info!("   ✅ Index ready: responses(timestamp desc)");
            Ok(())
        }
        .boxed()
    })
    .await
}

pub fn build_connector(settings: &StoreSettings) -> Arc<dyn Connector> {
    match settings.strategy {
        ConnectionStrategy::PerRequest => Arc::new(MongoConnector::per_request(settings)),
        ConnectionStrategy::Shared => Arc::new(MongoConnector::shared(settings)),
        ConnectionStrategy::Memory => Arc::new(MemoryConnector::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, oid::ObjectId};
    use std::time::Duration;

    #[test]
    fn test_stored_id_from_bson() {
        let oid = ObjectId::new();
        assert_eq!(StoredId::from(Bson::ObjectId(oid)).as_str(), oid.to_hex());
        assert_eq!(StoredId::from(Bson::String("abc".into())).to_string(), "abc");
        assert_eq!(StoredId::from(Bson::Int32(7)).as_str(), "7");
    }

    #[tokio::test]
    async fn test_with_connection_releases_on_success_and_error() {
        let store = MemoryConnector::new();

        let id = with_connection(store.handle(), |conn| {
            conn.insert_one("responses", doc! { "q": 1 }).boxed()
        })
        .await
        .unwrap();
        assert!(!id.as_str().is_empty());
        assert_eq!(store.open_connections(), 0);

        let result: StoreResult<()> = with_connection(store.handle(), |_conn| {
            async { Err::<(), _>(StoreError::Query("rejected".into())) }.boxed()
        })
        .await;
        assert!(matches!(result, Err(StoreError::Query(_))));
        assert_eq!(store.open_connections(), 0);
    }

    async fn explode(_conn: &dyn Connection) -> StoreResult<()> {
        panic!("handler blew up")
    }

    #[tokio::test]
    async fn test_with_connection_releases_on_panic() {
        let store = MemoryConnector::new();
        let inner = store.clone();

        let joined = tokio::spawn(async move {
            let _ = with_connection(inner.handle(), |conn| explode(conn).boxed()).await;
        })
        .await;

        assert!(joined.unwrap_err().is_panic());
        assert_eq!(store.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_dropped_caller_neither_interrupts_nor_leaks() {
        let store = MemoryConnector::new();

        let pending = with_connection(store.handle(), |conn| {
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                conn.insert_one("responses", doc! { "late": true }).await
            }
            .boxed()
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(5), pending).await;
        assert!(timed_out.is_err());

        for _ in 0..100 {
            if store.open_connections() == 0 && store.document_count("responses") == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(store.open_connections(), 0);
        assert_eq!(store.document_count("responses"), 1);
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_acquire() {
        let store = MemoryConnector::new();
        store.set_reachable(false);

        let result = with_connection(store.handle(), |conn| conn.find_one("users", doc! {}).boxed()).await;
        assert!(matches!(result, Err(StoreError::Connection(_))));
        assert_eq!(store.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_release_swallows_close_errors() {
        let store = MemoryConnector::new();
        store.fail_on_close(true);

        let found = with_connection(store.handle(), |conn| conn.find_one("users", doc! {}).boxed()).await;
        assert!(found.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ensure_indexes_enforces_unique_email() {
        let store = MemoryConnector::new();
        ensure_indexes(store.handle()).await.unwrap();

        with_connection(store.handle(), |conn| conn.insert_one("users", doc! { "email": "a@x.com" }).boxed())
            .await
            .unwrap();
        let second = with_connection(store.handle(), |conn| {
            conn.insert_one("users", doc! { "email": "a@x.com" }).boxed()
        })
        .await;

        assert!(matches!(second, Err(StoreError::Duplicate(_))));
        assert_eq!(store.document_count("users"), 1);
    }
}
