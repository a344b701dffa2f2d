use std::sync::Arc;

use futures::FutureExt;
use mongodb::bson::DateTime;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::database::{with_connection, Connector, StoreError, StoreResult, StoredId, UsersCollection};
use crate::models::UserRecord;

pub const MISSING_FIELDS_MESSAGE: &str = "Missing required fields (email, password, gender, gradeLevel).";
pub const EMAIL_TAKEN_MESSAGE: &str = "Email already registered.";

const DISPLAY_ID_RANGE: std::ops::RangeInclusive<u32> = 10_000_000..=99_999_999;

#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub grade_level: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RegisterResponse {
    pub message: String,
    /// Display-only number. Not stored, not unique, never use it as a key.
    #[serde(rename = "userID")]
    pub user_id: u32,
    #[serde(rename = "mongoId")]
    pub mongo_id: String,
}

#[derive(Debug, PartialEq)]
pub enum RegistrationOutcome {
    Created(StoredId),
    EmailTaken,
}

impl RegisterRequest {
    /// Names of required fields that are absent or empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("email", &self.email),
            ("password", &self.password),
            ("gender", &self.gender),
            ("gradeLevel", &self.grade_level),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, str::is_empty))
        .map(|(name, _)| name)
        .collect()
    }

    /// Builds the record to store, or returns the missing field names.
    pub fn into_user(self, registered_at: DateTime) -> Result<UserRecord, Vec<&'static str>> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(missing);
        }

        let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());

        Ok(UserRecord {
            id: None,
            email: self.email.unwrap_or_default(),
            password: self.password.unwrap_or_default(),
            first_name: non_empty(self.first_name),
            last_name: non_empty(self.last_name),
            gender: self.gender.unwrap_or_default(),
            grade_level: self.grade_level.unwrap_or_default(),
            registration_date: registered_at,
        })
    }
}

/// Random number shown to clients after registration.
pub fn display_user_id() -> u32 {
    rand::thread_rng().gen_range(DISPLAY_ID_RANGE)
}

/// Stores `user` unless its email is already registered.
///
/// The lookup catches the common case; the unique index on `users.email`
/// catches two registrations racing past the lookup.
pub async fn register(connector: Arc<dyn Connector>, user: UserRecord) -> StoreResult<RegistrationOutcome> {
    let outcome = with_connection(connector, move |conn| {
        async move {
            let users = UsersCollection::new(conn);

            if users.find_by_email(&user.email).await?.is_some() {
                return Ok(RegistrationOutcome::EmailTaken);
            }

            users.insert(&user).await.map(RegistrationOutcome::Created)
        }
        .boxed()
    })
    .await;

    match outcome {
        Err(StoreError::Duplicate(_)) => Ok(RegistrationOutcome::EmailTaken),
        other => other,
    }
}
