use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, to_bson, Bson},
    Client,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::{in_transaction, is_duplicate_key, Coll, Id};

use super::business::Business;

/// Lifecycle of an ownership claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Pending,
    Approved,
    Rejected,
}

impl From<ClaimStatus> for Bson {
    fn from(status: ClaimStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

/// Core ownership-claim data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimCore {
    pub business_id: Id,
    pub claimant_id: Id,
    /// The claimant's case for why the listing is theirs.
    pub message: String,
    pub status: ClaimStatus,
    pub created_at: DateTime<Utc>,
    pub decided_by: Option<Id>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl ClaimCore {
    pub fn new(business_id: Id, claimant_id: Id, message: String) -> Self {
        Self {
            business_id,
            claimant_id,
            message,
            status: ClaimStatus::Pending,
            created_at: Utc::now(),
            decided_by: None,
            decided_at: None,
        }
    }
}

/// A claim without an ID, ready for insertion.
pub type NewClaim = ClaimCore;

/// A claim from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub claim: ClaimCore,
}

impl Deref for Claim {
    type Target = ClaimCore;

    fn deref(&self) -> &Self::Target {
        &self.claim
    }
}

impl DerefMut for Claim {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.claim
    }
}

/// Submit an ownership claim for an unowned business. The partial unique
/// index on pending claims turns a double submit into a validation error
/// instead of a duplicate record.
pub async fn submit_claim(
    claims: &Coll<NewClaim>,
    businesses: &Coll<Business>,
    business_id: Id,
    claimant_id: Id,
    message: String,
) -> Result<Id> {
    let business = businesses
        .find_one(business_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Business {}", business_id)))?;
    if business.owner_id.is_some() {
        return Err(Error::validation(format!(
            "Business {} already has an owner",
            business_id
        )));
    }

    let claim = NewClaim::new(business_id, claimant_id, message);
    let result = claims.insert_one(&claim, None).await;
    match result {
        Ok(inserted) => Ok(inserted
            .inserted_id
            .as_object_id()
            .unwrap() // Valid because the ID comes directly from the DB.
            .into()),
        Err(err) if is_duplicate_key(&err) => Err(Error::validation(
            "You already have a pending claim for this business",
        )),
        Err(err) => Err(err.into()),
    }
}

/// Decide a pending claim.
///
/// Approval hands the business to the claimant and rejects every competing
/// pending claim; both writes share the claim-update transaction so two
/// near-simultaneous approvals cannot both take effect.
pub async fn decide_claim(
    client: &Client,
    claims: &Coll<Claim>,
    businesses: &Coll<Business>,
    claim_id: Id,
    approve: bool,
    decider_id: Id,
) -> Result<Claim> {
    in_transaction!(client, |session| {
        let claim = claims
            .find_one_with_session(claim_id.as_doc(), None, &mut session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Claim {}", claim_id)))?;
        if claim.status != ClaimStatus::Pending {
            return Err(Error::validation(format!(
                "Claim {} has already been decided",
                claim_id
            )));
        }

        let status = if approve {
            ClaimStatus::Approved
        } else {
            ClaimStatus::Rejected
        };
        let decide = doc! {
            "$set": {
                "status": status,
                "decided_by": decider_id,
                "decided_at": to_bson(&Utc::now()).expect("Serialisation is infallible"),
            }
        };
        claims
            .update_one_with_session(claim_id.as_doc(), decide, None, &mut session)
            .await?;

        if approve {
            let assign = doc! { "$set": { "owner_id": claim.claimant_id } };
            businesses
                .update_one_with_session(claim.business_id.as_doc(), assign, None, &mut session)
                .await?;

            let competitors = doc! {
                "business_id": claim.business_id,
                "status": ClaimStatus::Pending,
                "_id": { "$ne": Bson::from(claim_id) },
            };
            let reject = doc! {
                "$set": {
                    "status": ClaimStatus::Rejected,
                    "decided_by": decider_id,
                    "decided_at": to_bson(&Utc::now()).expect("Serialisation is infallible"),
                }
            };
            claims
                .update_many_with_session(competitors, reject, None, &mut session)
                .await?;
        }

        claims
            .find_one_with_session(claim_id.as_doc(), None, &mut session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Claim {}", claim_id)))
    })
}
