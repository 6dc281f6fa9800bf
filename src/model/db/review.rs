use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{doc, from_document, Bson};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::{is_duplicate_key, Coll, Id};

use super::business::Business;

/// Core review data. One review per member per business, enforced by a
/// unique index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewCore {
    pub business_id: Id,
    pub author_id: Id,
    /// Star rating, 1 to 5 inclusive.
    pub rating: u8,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl ReviewCore {
    pub fn new(business_id: Id, author_id: Id, rating: u8, title: String, body: String) -> Self {
        Self {
            business_id,
            author_id,
            rating,
            title,
            body,
            created_at: Utc::now(),
        }
    }
}

/// A review without an ID, ready for insertion.
pub type NewReview = ReviewCore;

/// A review from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub review: ReviewCore,
}

impl Deref for Review {
    type Target = ReviewCore;

    fn deref(&self) -> &Self::Target {
        &self.review
    }
}

impl DerefMut for Review {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.review
    }
}

/// Derived rating aggregates for a business, computed in the database from
/// the reviews collection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub average_rating: f64,
    pub review_count: u64,
}

/// Group document produced by the ratings pipeline.
#[derive(Debug, Deserialize)]
struct RatingRow {
    #[serde(rename = "_id")]
    business_id: Id,
    average_rating: f64,
    review_count: u64,
}

/// Compute rating aggregates for a set of businesses with a single
/// `$match`/`$group` pipeline. Businesses with no reviews are absent from
/// the result.
pub async fn rating_summaries(
    reviews: &Coll<Review>,
    business_ids: &[Id],
) -> Result<HashMap<Id, RatingSummary>> {
    if business_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let ids = business_ids.iter().copied().map(Bson::from).collect::<Vec<_>>();
    let pipeline = vec![
        doc! { "$match": { "business_id": { "$in": ids } } },
        doc! { "$group": {
            "_id": "$business_id",
            "average_rating": { "$avg": "$rating" },
            "review_count": { "$sum": 1 },
        } },
    ];

    let rows: Vec<mongodb::bson::Document> =
        reviews.aggregate(pipeline, None).await?.try_collect().await?;

    let mut summaries = HashMap::with_capacity(rows.len());
    for row in rows {
        let row: RatingRow = from_document(row)?;
        summaries.insert(
            row.business_id,
            RatingSummary {
                average_rating: row.average_rating,
                review_count: row.review_count,
            },
        );
    }
    Ok(summaries)
}

/// Submit a review for a business. A second review by the same member for
/// the same business trips the unique index and surfaces as a validation
/// failure.
pub async fn submit_review(
    reviews: &Coll<NewReview>,
    businesses: &Coll<Business>,
    review: NewReview,
) -> Result<Id> {
    businesses
        .find_one(review.business_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Business {}", review.business_id)))?;

    match reviews.insert_one(&review, None).await {
        Ok(inserted) => Ok(inserted
            .inserted_id
            .as_object_id()
            .unwrap() // Valid because the ID comes directly from the DB.
            .into()),
        Err(err) if is_duplicate_key(&err) => Err(Error::validation(
            "You have already reviewed this business",
        )),
        Err(err) => Err(err.into()),
    }
}
