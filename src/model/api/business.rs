use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    db::{
        business::{Address, Business, BusinessCore, NewBusiness},
        claim::{Claim, ClaimStatus},
        review::{RatingSummary, Review},
    },
    mongodb::Id,
};

/// A business listing as submitted through the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessRequest {
    pub name: String,
    pub description: String,
    pub category_id: Option<Id>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub street: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postcode: Option<String>,
}

impl BusinessRequest {
    pub fn validate(&self) -> Result<()> {
        if crate::model::common::slugify(&self.name).is_empty() {
            return Err(Error::validation(
                "Business name must contain letters or digits",
            ));
        }
        if self.description.trim().is_empty() {
            return Err(Error::validation("Business description must not be empty"));
        }
        if self.city.trim().is_empty() {
            return Err(Error::validation("Business city must not be empty"));
        }
        Ok(())
    }

    pub fn into_core(self) -> NewBusiness {
        let mut core = BusinessCore::new(
            self.name,
            self.description,
            Address {
                street: self.street,
                city: self.city,
                region: self.region,
                postcode: self.postcode,
            },
        );
        core.category_id = self.category_id;
        core.phone = self.phone;
        core.website = self.website;
        core
    }
}

/// Query filters for the business directory, all applied in the database.
#[derive(Debug, Clone, Default)]
pub struct BusinessFilter {
    pub category: Option<Id>,
    pub city: Option<String>,
    /// Anchored, case-insensitive name prefix.
    pub name: Option<String>,
}

impl BusinessFilter {
    pub fn filter_doc(&self) -> Document {
        let mut filter = doc! {};
        if let Some(category) = self.category {
            filter.insert("category_id", category);
        }
        if let Some(ref city) = self.city {
            filter.insert("address.city", city);
        }
        if let Some(ref name) = self.name {
            filter.insert(
                "name",
                doc! { "$regex": format!("^{name}"), "$options": "i" },
            );
        }
        filter
    }
}

/// A directory row: listing essentials plus review aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessSummary {
    pub id: Id,
    pub name: String,
    pub slug: String,
    pub city: String,
    pub category_id: Option<Id>,
    pub owner_id: Option<Id>,
    pub average_rating: Option<f64>,
    pub review_count: u64,
}

impl BusinessSummary {
    pub fn new(business: Business, rating: Option<RatingSummary>) -> Self {
        Self {
            id: business.id,
            name: business.business.name,
            slug: business.business.slug,
            city: business.business.address.city,
            category_id: business.business.category_id,
            owner_id: business.business.owner_id,
            average_rating: rating.map(|summary| summary.average_rating),
            review_count: rating.map_or(0, |summary| summary.review_count),
        }
    }
}

/// The full business page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessDetail {
    pub id: Id,
    #[serde(flatten)]
    pub business: BusinessCore,
    pub average_rating: Option<f64>,
    pub review_count: u64,
}

impl BusinessDetail {
    pub fn new(business: Business, rating: Option<RatingSummary>) -> Self {
        Self {
            id: business.id,
            business: business.business,
            average_rating: rating.map(|summary| summary.average_rating),
            review_count: rating.map_or(0, |summary| summary.review_count),
        }
    }
}

/// A review as submitted through the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub rating: u8,
    pub title: String,
    pub body: String,
}

impl ReviewRequest {
    pub fn validate(&self) -> Result<()> {
        if !(1..=5).contains(&self.rating) {
            return Err(Error::validation("Rating must be between 1 and 5"));
        }
        if self.title.trim().is_empty() {
            return Err(Error::validation("Review title must not be empty"));
        }
        if self.body.trim().is_empty() {
            return Err(Error::validation("Review body must not be empty"));
        }
        Ok(())
    }
}

/// A review as rendered under a business.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewView {
    pub id: Id,
    pub author_id: Id,
    pub rating: u8,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl From<Review> for ReviewView {
    fn from(review: Review) -> Self {
        Self {
            id: review.id,
            author_id: review.review.author_id,
            rating: review.review.rating,
            title: review.review.title,
            body: review.review.body,
            created_at: review.review.created_at,
        }
    }
}

/// An ownership claim as submitted through the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub message: String,
}

impl ClaimRequest {
    pub fn validate(&self) -> Result<()> {
        if self.message.trim().is_empty() {
            return Err(Error::validation("Claim message must not be empty"));
        }
        Ok(())
    }
}

/// A claim as rendered in the admin queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimView {
    pub id: Id,
    pub business_id: Id,
    pub claimant_id: Id,
    pub message: String,
    pub status: ClaimStatus,
    pub created_at: DateTime<Utc>,
    pub decided_by: Option<Id>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl From<Claim> for ClaimView {
    fn from(claim: Claim) -> Self {
        Self {
            id: claim.id,
            business_id: claim.claim.business_id,
            claimant_id: claim.claim.claimant_id,
            message: claim.claim.message,
            status: claim.claim.status,
            created_at: claim.claim.created_at,
            decided_by: claim.claim.decided_by,
            decided_at: claim.claim.decided_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_compose_into_one_document() {
        let category = Id::new();
        let filter = BusinessFilter {
            category: Some(category),
            city: Some("Sheffield".to_string()),
            name: Some("Smi".to_string()),
        };
        let doc = filter.filter_doc();
        assert_eq!(doc.get_object_id("category_id").unwrap().to_hex(), category.to_string());
        assert_eq!(doc.get_str("address.city").unwrap(), "Sheffield");
        let regex = doc.get_document("name").unwrap();
        assert_eq!(regex.get_str("$regex").unwrap(), "^Smi");
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(BusinessFilter::default().filter_doc().is_empty());
    }

    #[test]
    fn review_ratings_are_bounded() {
        let review = |rating| ReviewRequest {
            rating,
            title: "Great".to_string(),
            body: "Solid work".to_string(),
        };
        assert!(review(0).validate().is_err());
        assert!(review(1).validate().is_ok());
        assert!(review(5).validate().is_ok());
        assert!(review(6).validate().is_err());
    }
}
