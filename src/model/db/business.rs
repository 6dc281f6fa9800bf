use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::{bson::doc, Client};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{slugify, Role},
    mongodb::{in_transaction, Coll, Id},
    permissions,
};

use super::{claim::Claim, review::Review, vehicle::Vehicle};

/// A business's street address. Everything beyond the city is optional;
/// mobile businesses often list only a service area.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    pub street: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postcode: Option<String>,
}

/// Core business listing data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessCore {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub category_id: Option<Id>,
    /// Unset until an ownership claim is approved.
    pub owner_id: Option<Id>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub address: Address,
    pub created_at: DateTime<Utc>,
}

impl BusinessCore {
    pub fn new(name: String, description: String, address: Address) -> Self {
        let slug = slugify(&name);
        Self {
            name,
            slug,
            description,
            category_id: None,
            owner_id: None,
            phone: None,
            website: None,
            address,
            created_at: Utc::now(),
        }
    }
}

/// A business without an ID, ready for insertion.
pub type NewBusiness = BusinessCore;

/// A business from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Business {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub business: BusinessCore,
}

impl Deref for Business {
    type Target = BusinessCore;

    fn deref(&self) -> &Self::Target {
        &self.business
    }
}

impl DerefMut for Business {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.business
    }
}

pub async fn business_by_id(businesses: &Coll<Business>, id: Id) -> Result<Business> {
    businesses
        .find_one(id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Business {}", id)))
}

/// Delete a business listing and everything hanging off it: vehicles,
/// reviews, and claims, in one transaction.
///
/// Permitted to the business's owner or a moderator-equivalent caller;
/// unowned listings may only be deleted by moderators.
pub async fn delete_business(
    client: &Client,
    businesses: &Coll<Business>,
    vehicles: &Coll<Vehicle>,
    reviews: &Coll<Review>,
    claims: &Coll<Claim>,
    business_id: Id,
    caller_id: Id,
    caller_role: Role,
) -> Result<()> {
    in_transaction!(client, |session| {
        let business = businesses
            .find_one_with_session(business_id.as_doc(), None, &mut session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Business {}", business_id)))?;

        if !permissions::maybe_owner_or_moderator(caller_id, caller_role, business.owner_id) {
            return Err(Error::permission_denied(format!(
                "Business {} may only be deleted by its owner or a moderator",
                business_id
            )));
        }

        businesses
            .delete_one_with_session(business_id.as_doc(), None, &mut session)
            .await?;
        let by_business = doc! { "business_id": business_id };
        vehicles
            .delete_many_with_session(by_business.clone(), None, &mut session)
            .await?;
        reviews
            .delete_many_with_session(by_business.clone(), None, &mut session)
            .await?;
        claims
            .delete_many_with_session(by_business, None, &mut session)
            .await?;
        Ok(())
    })
}
