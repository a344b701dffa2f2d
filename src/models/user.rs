use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// A registered user as stored in the `users` collection.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none", default)]
    pub id: Option<ObjectId>,
    pub email: String,
    pub password: String, // stored as given
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: String,
    pub grade_level: String,
    pub registration_date: DateTime,
}
