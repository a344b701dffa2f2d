use std::time::Duration;

use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, FindOptions, IndexOptions};
use mongodb::{Client, Database, IndexModel};
use tokio::sync::OnceCell;

use super::{Connection, Connector, SortOrder, StoreError, StoreResult, StoredId};
use crate::config::{ConnectionStrategy, StoreSettings};

const APP_NAME: &str = "survey-service";
const DUPLICATE_KEY_CODE: i32 = 11000;

enum Mode {
    PerRequest,
    /// Connected at most once, even when the first requests race.
    Shared(OnceCell<Client>),
}

pub struct MongoConnector {
    uri: String,
    database: String,
    timeout: Duration,
    max_pool_size: u32,
    mode: Mode,
}

impl MongoConnector {
    pub fn per_request(settings: &StoreSettings) -> Self {
        Self::with_mode(settings, Mode::PerRequest)
    }

    pub fn shared(settings: &StoreSettings) -> Self {
        Self::with_mode(settings, Mode::Shared(OnceCell::new()))
    }

    fn with_mode(settings: &StoreSettings, mode: Mode) -> Self {
        Self {
            uri: settings.uri.clone(),
            database: settings.database.clone(),
            timeout: settings.timeout,
            max_pool_size: settings.max_pool_size,
            mode,
        }
    }

    async fn client_options(&self, pooled: bool) -> Result<ClientOptions, MongoError> {
        let mut options = ClientOptions::parse(&self.uri).await?;
        options.app_name = Some(APP_NAME.to_string());
        options.connect_timeout = Some(self.timeout);
        options.server_selection_timeout = Some(self.timeout);

        if pooled {
            options.max_pool_size = Some(self.max_pool_size);
            options.min_pool_size = Some(1);
            options.max_idle_time = Some(Duration::from_secs(300));
        } else {
            // One request, one operation at a time
            options.max_pool_size = Some(1);
        }

        Ok(options)
    }

    /// Builds a client and pings the database so that an unreachable server
    /// or rejected credentials fail here rather than on the first query.
    async fn connect(&self, pooled: bool) -> StoreResult<Client> {
        log::debug!("🔌 Connecting to MongoDB (pooled: {})", pooled);

        let options = self.client_options(pooled).await.map_err(connection_error)?;
        let client = Client::with_options(options).map_err(connection_error)?;

        if let Err(e) = client.database(&self.database).run_command(doc! { "ping": 1 }).await {
            log::error!("❌ MongoDB connection failed: {}", e);
            log::error!("   Check MONGODB_URI, credentials and network access to the server");
            if !pooled {
                client.shutdown().await;
            }
            return Err(connection_error(e));
        }

        log::debug!("✅ MongoDB connection established");
        Ok(client)
    }
}

#[async_trait]
impl Connector for MongoConnector {
    fn strategy(&self) -> ConnectionStrategy {
        match self.mode {
            Mode::PerRequest => ConnectionStrategy::PerRequest,
            Mode::Shared(_) => ConnectionStrategy::Shared,
        }
    }

    async fn acquire(&self) -> StoreResult<Box<dyn Connection>> {
        match &self.mode {
            Mode::PerRequest => {
                let client = self.connect(false).await?;
                Ok(Box::new(MongoConnection::new(client, &self.database, true)))
            }
            Mode::Shared(cell) => {
                // A failed first connect leaves the cell empty so the next request retries.
                let client = cell.get_or_try_init(|| self.connect(true)).await?;
                Ok(Box::new(MongoConnection::new(client.clone(), &self.database, false)))
            }
        }
    }
}

pub struct MongoConnection {
    client: Client,
    db: Database,
    /// Only owned clients are shut down on close; the shared one outlives every request.
    owned: bool,
}

impl MongoConnection {
    fn new(client: Client, database: &str, owned: bool) -> Self {
        let db = client.database(database);
        Self { client, db, owned }
    }
}

#[async_trait]
impl Connection for MongoConnection {
    async fn insert_one(&self, collection: &str, document: Document) -> StoreResult<StoredId> {
        let result = self
            .db
            .collection::<Document>(collection)
            .insert_one(document)
            .await
            .map_err(query_error)?;

        Ok(StoredId::from(result.inserted_id))
    }

    async fn find_one(&self, collection: &str, filter: Document) -> StoreResult<Option<Document>> {
        self.db
            .collection::<Document>(collection)
            .find_one(filter)
            .await
            .map_err(query_error)
    }

    async fn find_all(&self, collection: &str, sort_by: &str, order: SortOrder) -> StoreResult<Vec<Document>> {
        let mut sort = Document::new();
        sort.insert(sort_by, order.as_i32());
        let options = FindOptions::builder().sort(sort).build();

        let cursor = self
            .db
            .collection::<Document>(collection)
            .find(doc! {})
            .with_options(options)
            .await
            .map_err(query_error)?;

        cursor.try_collect().await.map_err(query_error)
    }

    async fn create_index(&self, collection: &str, field: &str, order: SortOrder, unique: bool) -> StoreResult<()> {
        let mut keys = Document::new();
        keys.insert(field, order.as_i32());

        let index = IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().unique(unique).build())
            .build();

        self.db
            .collection::<Document>(collection)
            .create_index(index)
            .await
            .map_err(query_error)?;

        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        if self.owned {
            self.client.clone().shutdown().await;
        }
        Ok(())
    }
}

fn connection_error(error: MongoError) -> StoreError {
    StoreError::Connection(error.to_string())
}

fn query_error(error: MongoError) -> StoreError {
    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY_CODE => {
            StoreError::Duplicate(write_error.message.clone())
        }
        _ => StoreError::Query(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{with_connection, ResponsesCollection};
    use futures::FutureExt;
    use std::sync::Arc;

    fn settings(uri: &str) -> StoreSettings {
        StoreSettings {
            uri: uri.to_string(),
            database: "surveyDB_test".to_string(),
            strategy: ConnectionStrategy::PerRequest,
            timeout: Duration::from_millis(300),
            max_pool_size: 2,
        }
    }

    #[test]
    fn test_strategy_reported() {
        let s = settings("mongodb://localhost:27017");
        assert_eq!(MongoConnector::per_request(&s).strategy(), ConnectionStrategy::PerRequest);
        assert_eq!(MongoConnector::shared(&s).strategy(), ConnectionStrategy::Shared);
    }

    #[tokio::test]
    async fn test_malformed_uri_is_connection_error() {
        let connector = MongoConnector::per_request(&settings("not-a-mongo-uri"));
        let result = connector.acquire().await;
        assert!(matches!(result, Err(StoreError::Connection(_))));
    }

    #[tokio::test]
    async fn test_shared_connect_failure_is_retried() {
        let connector = MongoConnector::shared(&settings("not-a-mongo-uri"));
        assert!(matches!(connector.acquire().await, Err(StoreError::Connection(_))));
        assert!(matches!(connector.acquire().await, Err(StoreError::Connection(_))));
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_mongodb_round_trip() {
        dotenv::dotenv().ok();
        let uri = std::env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let connectors: [Arc<dyn Connector>; 2] = [
            Arc::new(MongoConnector::per_request(&settings(&uri))),
            Arc::new(MongoConnector::shared(&settings(&uri))),
        ];
        for connector in connectors {
            let listed = with_connection(connector, |conn| {
                async move {
                    let responses = ResponsesCollection::new(conn);
                    responses.ensure_indexes().await?;
                    responses.list().await
                }
                .boxed()
            })
            .await;
            assert!(listed.is_ok());
        }
    }
}
