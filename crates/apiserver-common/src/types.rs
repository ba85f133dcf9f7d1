use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A worker profile as returned by the API.
///
/// Business fields use lowercase JSON names; the system-managed fields keep
/// their capitalised names (`CreatedAt`, `UpdatedAt`, `DeletedAt`, `Version`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Worker {
    /// Unique, immutable key
    pub username: String,
    #[serde(rename = "firstname")]
    pub first_name: String,
    #[serde(rename = "lastname")]
    pub last_name: String,
    pub city: String,
    pub division: String,
    pub position: String,
    pub salary: i64,
    #[serde(rename = "CreatedAt")]
    pub created_at: DateTime<FixedOffset>,
    #[serde(rename = "UpdatedAt")]
    pub updated_at: DateTime<FixedOffset>,
    /// `null` while the record is alive
    #[serde(rename = "DeletedAt")]
    pub deleted_at: Option<DateTime<FixedOffset>>,
    #[serde(rename = "Version")]
    pub version: i32,
}

impl Worker {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Request body for creating or updating a worker.
///
/// Missing fields decode to their zero value, so a body without `username`
/// yields an empty string which the handlers reject.
///
/// # Examples
///
/// ```
/// use apiserver_common::types::WorkerPayload;
///
/// let payload: WorkerPayload =
///     serde_json::from_str(r#"{"username":"masud","firstname":"Masudur","salary":55}"#).unwrap();
/// assert_eq!(payload.username, "masud");
/// assert_eq!(payload.first_name, "Masudur");
/// assert!(payload.city.is_empty());
/// assert!(!payload.username_is_blank());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct WorkerPayload {
    pub username: String,
    #[serde(rename = "firstname")]
    pub first_name: String,
    #[serde(rename = "lastname")]
    pub last_name: String,
    pub city: String,
    pub division: String,
    pub position: String,
    pub salary: i64,
}

impl WorkerPayload {
    pub fn username_is_blank(&self) -> bool {
        self.username.trim().is_empty()
    }
}

impl From<&Worker> for WorkerPayload {
    fn from(w: &Worker) -> Self {
        Self {
            username: w.username.clone(),
            first_name: w.first_name.clone(),
            last_name: w.last_name.clone(),
            city: w.city.clone(),
            division: w.division.clone(),
            position: w.position.clone(),
            salary: w.salary,
        }
    }
}
