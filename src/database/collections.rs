use mongodb::bson::{self, doc};

use super::{Connection, SortOrder, StoreError, StoreResult, StoredId};
use crate::models::{ResponseRecord, UserRecord};

pub const USERS: &str = "users";
pub const RESPONSES: &str = "responses";

/// Typed access to the `users` collection.
pub struct UsersCollection<'c> {
    connection: &'c dyn Connection,
}

impl<'c> UsersCollection<'c> {
    pub fn new(connection: &'c dyn Connection) -> Self {
        Self { connection }
    }

    pub async fn insert(&self, user: &UserRecord) -> StoreResult<StoredId> {
        let document = bson::to_document(user)
            .map_err(|e| StoreError::Query(format!("failed to encode user: {}", e)))?;
        self.connection.insert_one(USERS, document).await
    }

    pub async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        self.connection
            .find_one(USERS, doc! { "email": email })
            .await?
            .map(|document| {
                bson::from_document(document)
                    .map_err(|e| StoreError::Query(format!("failed to decode user: {}", e)))
            })
            .transpose()
    }

    pub async fn ensure_indexes(&self) -> StoreResult<()> {
        self.connection.create_index(USERS, "email", SortOrder::Ascending, true).await
    }
}

/// Typed access to the `responses` collection.
pub struct ResponsesCollection<'c> {
    connection: &'c dyn Connection,
}

impl<'c> ResponsesCollection<'c> {
    pub fn new(connection: &'c dyn Connection) -> Self {
        Self { connection }
    }

    pub async fn insert(&self, record: ResponseRecord) -> StoreResult<StoredId> {
        self.connection.insert_one(RESPONSES, record.into_document()).await
    }

    /// Every response, newest first.
    pub async fn list(&self) -> StoreResult<Vec<ResponseRecord>> {
        let documents = self
            .connection
            .find_all(RESPONSES, "timestamp", SortOrder::Descending)
            .await?;

        Ok(documents.into_iter().map(ResponseRecord::from_document).collect())
    }

    pub async fn ensure_indexes(&self) -> StoreResult<()> {
        self.connection
            .create_index(RESPONSES, "timestamp", SortOrder::Descending, false)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{Connector, MemoryConnector};
    use mongodb::bson::DateTime;

    fn user(email: &str) -> UserRecord {
        UserRecord {
            id: None,
            email: email.to_string(),
            password: "p".to_string(),
            first_name: Some("Ana".to_string()),
            last_name: None,
            gender: "F".to_string(),
            grade_level: "10".to_string(),
            registration_date: DateTime::now(),
        }
    }

    #[tokio::test]
    async fn test_users_insert_and_find() {
        let store = MemoryConnector::new();
        let conn = store.acquire().await.unwrap();
        let users = UsersCollection::new(conn.as_ref());

        let id = users.insert(&user("a@x.com")).await.unwrap();
        let found = users.find_by_email("a@x.com").await.unwrap().unwrap();

        assert_eq!(found.id.map(|oid| oid.to_hex()), Some(id.to_string()));
        assert_eq!(found.first_name.as_deref(), Some("Ana"));
        assert_eq!(found.last_name, None);
        assert!(users.find_by_email("b@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_responses_listed_newest_first() {
        let store = MemoryConnector::new();
        let conn = store.acquire().await.unwrap();
        let responses = ResponsesCollection::new(conn.as_ref());

        assert!(responses.list().await.unwrap().is_empty());

        for (i, millis) in [10_i64, 30, 20].into_iter().enumerate() {
            let record = ResponseRecord::new(doc! { "n": i as i32 }, DateTime::from_millis(millis));
            responses.insert(record).await.unwrap();
        }

        let listed = responses.list().await.unwrap();
        let order: Vec<i32> = listed.iter().map(|r| r.fields.get_i32("n").unwrap()).collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert!(listed.iter().all(|r| r.id.is_some()));
    }
}
