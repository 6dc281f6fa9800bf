use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::{Coll, Id};

/// What a mutation did, for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Created,
    Updated,
    Deleted,
    AcceptToggled,
    ClaimSubmitted,
    ClaimDecided,
    RoleChanged,
    SettingsUpdated,
}

impl From<ActivityAction> for Bson {
    fn from(action: ActivityAction) -> Self {
        to_bson(&action).expect("Serialisation is infallible")
    }
}

/// Core activity log entry data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityCore {
    pub actor_id: Id,
    pub action: ActivityAction,
    /// Collection name of the touched record.
    pub subject: String,
    pub subject_id: Id,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

/// An activity entry without an ID, ready for insertion.
pub type NewActivityEntry = ActivityCore;

/// An activity entry from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub entry: ActivityCore,
}

impl Deref for ActivityEntry {
    type Target = ActivityCore;

    fn deref(&self) -> &Self::Target {
        &self.entry
    }
}

/// Append an entry to the activity log. Best-effort: a failed append is
/// logged and never fails the mutation it trails.
pub async fn record(
    activity: &Coll<NewActivityEntry>,
    actor_id: Id,
    action: ActivityAction,
    subject: &str,
    subject_id: Id,
    summary: impl Into<String>,
) {
    let entry = NewActivityEntry {
        actor_id,
        action,
        subject: subject.to_string(),
        subject_id,
        summary: summary.into(),
        created_at: Utc::now(),
    };
    if let Err(err) = activity.insert_one(&entry, None).await {
        warn!("Failed to append activity entry for {subject} {subject_id}: {err}");
    }
}
