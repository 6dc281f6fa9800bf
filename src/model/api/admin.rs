use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::Role,
    db::{
        activity::{ActivityAction, ActivityEntry},
        user::User,
    },
    mongodb::Id,
};

/// An admin changing a user's role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RoleChangeRequest {
    pub role: Role,
}

/// An admin ruling on an ownership claim.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClaimDecision {
    pub approve: bool,
}

/// Replacement site settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub site_name: String,
    pub tagline: String,
    pub contact_email: String,
    pub listings_per_page: u32,
}

impl SettingsUpdate {
    pub fn validate(&self) -> Result<()> {
        if self.site_name.trim().is_empty() {
            return Err(Error::validation("Site name must not be empty"));
        }
        if !self.contact_email.contains('@') {
            return Err(Error::validation("Contact email must be an email address"));
        }
        if self.listings_per_page == 0 {
            return Err(Error::validation("Listings per page must be positive"));
        }
        Ok(())
    }
}

/// A user row in the admin user manager. No password hash leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Id,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.user.username,
            display_name: user.user.display_name,
            role: user.user.role,
            joined_at: user.user.joined_at,
        }
    }
}

/// An activity log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityView {
    pub id: Id,
    pub actor_id: Id,
    pub action: ActivityAction,
    pub subject: String,
    pub subject_id: Id,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

impl From<ActivityEntry> for ActivityView {
    fn from(entry: ActivityEntry) -> Self {
        Self {
            id: entry.id,
            actor_id: entry.entry.actor_id,
            action: entry.entry.action,
            subject: entry.entry.subject,
            subject_id: entry.entry.subject_id,
            summary: entry.entry.summary,
            created_at: entry.entry.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_updates_are_shape_checked() {
        let update = SettingsUpdate {
            site_name: "AutoDir".to_string(),
            tagline: "".to_string(),
            contact_email: "hello@autodir.example".to_string(),
            listings_per_page: 20,
        };
        assert!(update.validate().is_ok());

        let update = SettingsUpdate { site_name: " ".to_string(), ..update };
        assert!(update.validate().is_err());

        let update = SettingsUpdate {
            site_name: "AutoDir".to_string(),
            contact_email: "not-an-email".to_string(),
            ..update
        };
        assert!(update.validate().is_err());
    }
}
