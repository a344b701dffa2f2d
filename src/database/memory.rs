use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, Bson, Document};

use super::{Connection, Connector, SortOrder, StoreError, StoreResult, StoredId};
use crate::config::ConnectionStrategy;

#[derive(Default)]
struct Collections {
    documents: HashMap<String, Vec<Document>>,
    unique_fields: HashMap<String, Vec<String>>,
}

struct MemoryState {
    collections: RwLock<Collections>,
    reachable: AtomicBool,
    fail_on_close: AtomicBool,
    open_connections: AtomicUsize,
}

/// In-process document store.
///
/// Cloning shares the underlying state, which lets tests keep a handle while the
/// app owns another one.
#[derive(Clone)]
pub struct MemoryConnector {
    state: Arc<MemoryState>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MemoryState {
                collections: RwLock::new(Collections::default()),
                reachable: AtomicBool::new(true),
                fail_on_close: AtomicBool::new(false),
                open_connections: AtomicUsize::new(0),
            }),
        }
    }

    /// Shares this store as a connector handle.
    pub fn handle(&self) -> Arc<dyn Connector> {
        Arc::new(self.clone())
    }

    /// Simulates an outage: every `acquire` fails while unreachable.
    pub fn set_reachable(&self, reachable: bool) {
        self.state.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn fail_on_close(&self, fail: bool) {
        self.state.fail_on_close.store(fail, Ordering::SeqCst);
    }

    /// Connections acquired and not yet released.
    pub fn open_connections(&self) -> usize {
        self.state.open_connections.load(Ordering::SeqCst)
    }

    pub fn document_count(&self, collection: &str) -> usize {
        self.state
            .collections
            .read()
            .map(|c| c.documents.get(collection).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    fn strategy(&self) -> ConnectionStrategy {
        ConnectionStrategy::Memory
    }

    async fn acquire(&self) -> StoreResult<Box<dyn Connection>> {
        if !self.state.reachable.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("memory store is unreachable".to_string()));
        }
        self.state.open_connections.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            state: self.state.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

struct MemoryConnection {
    state: Arc<MemoryState>,
    closed: AtomicBool,
}

impl MemoryConnection {
    fn poisoned() -> StoreError {
        StoreError::Query("memory store lock poisoned".to_string())
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn insert_one(&self, collection: &str, mut document: Document) -> StoreResult<StoredId> {
        let mut collections = self.state.collections.write().map_err(|_| Self::poisoned())?;

        if !document.contains_key("_id") {
            document.insert("_id", ObjectId::new());
        }
        let id = document.get("_id").cloned().unwrap_or(Bson::Null);

        let unique_fields = collections.unique_fields.get(collection).cloned().unwrap_or_default();
        let existing = collections.documents.entry(collection.to_string()).or_default();

        for field in std::iter::once("_id").chain(unique_fields.iter().map(String::as_str)) {
            if let Some(value) = document.get(field) {
                if existing.iter().any(|doc| doc.get(field) == Some(value)) {
                    return Err(StoreError::Duplicate(format!("{}.{} = {}", collection, field, value)));
                }
            }
        }

        existing.push(document);
        Ok(StoredId::from(id))
    }

    async fn find_one(&self, collection: &str, filter: Document) -> StoreResult<Option<Document>> {
        let collections = self.state.collections.read().map_err(|_| Self::poisoned())?;

        Ok(collections.documents.get(collection).and_then(|docs| {
            docs.iter()
                .find(|doc| filter.iter().all(|(key, value)| doc.get(key) == Some(value)))
                .cloned()
        }))
    }

    async fn find_all(&self, collection: &str, sort_by: &str, order: SortOrder) -> StoreResult<Vec<Document>> {
        let collections = self.state.collections.read().map_err(|_| Self::poisoned())?;

        let mut docs = collections.documents.get(collection).cloned().unwrap_or_default();
        docs.sort_by(|a, b| compare_bson(a.get(sort_by), b.get(sort_by)));
        if order == SortOrder::Descending {
            docs.reverse();
        }
        Ok(docs)
    }

    async fn create_index(&self, collection: &str, field: &str, _order: SortOrder, unique: bool) -> StoreResult<()> {
        if !unique {
            return Ok(());
        }
        let mut collections = self.state.collections.write().map_err(|_| Self::poisoned())?;
        let fields = collections.unique_fields.entry(collection.to_string()).or_default();
        if !fields.iter().any(|f| f == field) {
            fields.push(field.to_string());
        }
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.open_connections.fetch_sub(1, Ordering::SeqCst);
        }
        if self.state.fail_on_close.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("memory store refused to close".to_string()));
        }
        Ok(())
    }
}

// Missing values sort first, like the real store.
fn compare_bson(a: Option<&Bson>, b: Option<&Bson>) -> CmpOrdering {
    match (a, b) {
        (None, None) => CmpOrdering::Equal,
        (None, Some(_)) => CmpOrdering::Less,
        (Some(_), None) => CmpOrdering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Bson::DateTime(a), Bson::DateTime(b)) => a.cmp(b),
            (Bson::String(a), Bson::String(b)) => a.cmp(b),
            _ => match (as_f64(a), as_f64(b)) {
                (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(CmpOrdering::Equal),
                _ => CmpOrdering::Equal,
            },
        },
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, DateTime};

    #[tokio::test]
    async fn test_find_one_matches_every_filter_field() {
        let store = MemoryConnector::new();
        let conn = store.acquire().await.unwrap();

        conn.insert_one("users", doc! { "email": "a@x.com", "gender": "F" }).await.unwrap();
        conn.insert_one("users", doc! { "email": "b@x.com", "gender": "F" }).await.unwrap();

        let found = conn
            .find_one("users", doc! { "email": "b@x.com", "gender": "F" })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.get_str("email").unwrap(), "b@x.com");
        assert!(conn.find_one("users", doc! { "email": "c@x.com" }).await.unwrap().is_none());
        assert!(conn.find_one("missing", doc! {}).await.unwrap().is_none());

        store.release(conn).await;
        assert_eq!(store.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_find_all_sorts_by_field() {
        let store = MemoryConnector::new();
        let conn = store.acquire().await.unwrap();

        for millis in [2_000, 1_000, 3_000] {
            conn.insert_one("responses", doc! { "timestamp": DateTime::from_millis(millis) })
                .await
                .unwrap();
        }
        conn.insert_one("responses", doc! { "untimed": true }).await.unwrap();

        let newest_first = conn.find_all("responses", "timestamp", SortOrder::Descending).await.unwrap();
        let stamps: Vec<Option<i64>> = newest_first
            .iter()
            .map(|d| d.get_datetime("timestamp").ok().map(|t| t.timestamp_millis()))
            .collect();
        assert_eq!(stamps, vec![Some(3_000), Some(2_000), Some(1_000), None]);

        let oldest_first = conn.find_all("responses", "timestamp", SortOrder::Ascending).await.unwrap();
        assert!(oldest_first[0].get("timestamp").is_none());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let store = MemoryConnector::new();
        let conn = store.acquire().await.unwrap();
        assert_eq!(store.open_connections(), 1);

        conn.close().await.unwrap();
        conn.close().await.unwrap();
        assert_eq!(store.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_explicit_ids_must_be_unique() {
        let store = MemoryConnector::new();
        let conn = store.acquire().await.unwrap();

        let id = conn.insert_one("responses", doc! { "_id": "fixed" }).await.unwrap();
        assert_eq!(id.as_str(), "fixed");
        let again = conn.insert_one("responses", doc! { "_id": "fixed" }).await;
        assert!(matches!(again, Err(StoreError::Duplicate(_))));
    }
}
