use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::doc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::Role,
    mongodb::{Coll, Id},
};

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

/// Core user data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCore {
    pub username: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

impl UserCore {
    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        // Unwrap safe: hashes are only ever produced by `Credentials::into_user`,
        // so they are always well-formed encodings.
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap()
    }
}

/// A user without an ID, ready for insertion.
pub type NewUser = UserCore;

/// A user from the database, with their unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}

/// Look a user up by ID, failing with `NotFound` if absent.
pub async fn user_by_id(users: &Coll<User>, id: Id) -> Result<User> {
    users
        .find_one(id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("User {}", id)))
}

/// Change a user's role. Refuses to demote the last admin, since that would
/// lock everyone out of the administrative backend.
pub async fn change_role(users: &Coll<User>, target: Id, new_role: Role) -> Result<User> {
    let user = user_by_id(users, target).await?;

    if user.role.is_admin() && !new_role.is_admin() {
        let admins = doc! { "role": Role::Admin };
        if users.count_documents(admins, None).await? == 1 {
            return Err(Error::validation("Cannot demote the last admin"));
        }
    }

    let update = doc! {
        "$set": { "role": new_role }
    };
    users.update_one(target.as_doc(), update, None).await?;
    user_by_id(users, target).await
}

/// Ensure there is at least one admin account, creating the default one with
/// the configured bootstrap password if necessary.
///
/// This operation is idempotent.
pub async fn ensure_admin_exists(users: &Coll<NewUser>, bootstrap_password: &str) -> Result<()> {
    let admins = doc! { "role": Role::Admin };
    if users.count_documents(admins, None).await? > 0 {
        return Ok(());
    }

    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    let password_hash =
        argon2::hash_encoded(bootstrap_password.as_bytes(), &salt, &argon2::Config::default())
            .unwrap(); // Safe because the default `Config` is valid.

    let admin = NewUser {
        username: DEFAULT_ADMIN_USERNAME.to_string(),
        display_name: "Site Administrator".to_string(),
        password_hash,
        role: Role::Admin,
        joined_at: Utc::now(),
    };
    users.insert_one(admin, None).await?;
    info!("Created default admin account '{DEFAULT_ADMIN_USERNAME}'");
    Ok(())
}
