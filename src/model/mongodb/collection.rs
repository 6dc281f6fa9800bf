use std::ops::Deref;

use mongodb::{
    bson::doc,
    error::{Error as DbError, ErrorKind, WriteError, WriteFailure},
    options::IndexOptions,
    Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    activity::{ActivityEntry, NewActivityEntry},
    answer::{Answer, NewAnswer},
    business::{Business, NewBusiness},
    category::{Category, NewCategory},
    claim::{Claim, NewClaim},
    comment::{Comment, NewComment},
    post::{NewPost, Post},
    question::{NewQuestion, Question},
    review::{NewReview, Review},
    settings::SiteSettings,
    user::{NewUser, User},
    vehicle::{NewVehicle, Vehicle},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `derive(Clone)` would demand `T: Clone`, which we don't need.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

// User collections
const USERS: &str = "users";
impl MongoCollection for User {
    const NAME: &'static str = USERS;
}
impl MongoCollection for NewUser {
    const NAME: &'static str = USERS;
}

// Business collections
const BUSINESSES: &str = "businesses";
impl MongoCollection for Business {
    const NAME: &'static str = BUSINESSES;
}
impl MongoCollection for NewBusiness {
    const NAME: &'static str = BUSINESSES;
}

// Vehicle collections
const VEHICLES: &str = "vehicles";
impl MongoCollection for Vehicle {
    const NAME: &'static str = VEHICLES;
}
impl MongoCollection for NewVehicle {
    const NAME: &'static str = VEHICLES;
}

// Blog post collections
const POSTS: &str = "posts";
impl MongoCollection for Post {
    const NAME: &'static str = POSTS;
}
impl MongoCollection for NewPost {
    const NAME: &'static str = POSTS;
}

// Comment collections
const COMMENTS: &str = "comments";
impl MongoCollection for Comment {
    const NAME: &'static str = COMMENTS;
}
impl MongoCollection for NewComment {
    const NAME: &'static str = COMMENTS;
}

// Question collections
const QUESTIONS: &str = "questions";
impl MongoCollection for Question {
    const NAME: &'static str = QUESTIONS;
}
impl MongoCollection for NewQuestion {
    const NAME: &'static str = QUESTIONS;
}

// Answer collections
const ANSWERS: &str = "answers";
impl MongoCollection for Answer {
    const NAME: &'static str = ANSWERS;
}
impl MongoCollection for NewAnswer {
    const NAME: &'static str = ANSWERS;
}

// Review collections
const REVIEWS: &str = "reviews";
impl MongoCollection for Review {
    const NAME: &'static str = REVIEWS;
}
impl MongoCollection for NewReview {
    const NAME: &'static str = REVIEWS;
}

// Category collections
const CATEGORIES: &str = "categories";
impl MongoCollection for Category {
    const NAME: &'static str = CATEGORIES;
}
impl MongoCollection for NewCategory {
    const NAME: &'static str = CATEGORIES;
}

// Activity log collections
const ACTIVITY: &str = "activity";
impl MongoCollection for ActivityEntry {
    const NAME: &'static str = ACTIVITY;
}
impl MongoCollection for NewActivityEntry {
    const NAME: &'static str = ACTIVITY;
}

// Settings collection
const SETTINGS: &str = "settings";
impl MongoCollection for SiteSettings {
    const NAME: &'static str = SETTINGS;
}

// Claim collections
const CLAIMS: &str = "claims";
impl MongoCollection for Claim {
    const NAME: &'static str = CLAIMS;
}
impl MongoCollection for NewClaim {
    const NAME: &'static str = CLAIMS;
}

/// Did a write trip a unique index?
pub fn is_duplicate_key(err: &DbError) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(WriteError { code: 11000, .. }))
    )
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Usernames are login identifiers.
    let username_index = IndexModel::builder()
        .keys(doc! {"username": 1})
        .options(unique.clone())
        .build();
    Coll::<User>::from_db(db)
        .create_index(username_index, None)
        .await?;

    // Slugs are URL identifiers.
    let slug_index = IndexModel::builder()
        .keys(doc! {"slug": 1})
        .options(unique.clone())
        .build();
    Coll::<Business>::from_db(db)
        .create_index(slug_index.clone(), None)
        .await?;
    Coll::<Post>::from_db(db)
        .create_index(slug_index.clone(), None)
        .await?;
    Coll::<Category>::from_db(db)
        .create_index(slug_index, None)
        .await?;

    // One review per member per business.
    let review_index = IndexModel::builder()
        .keys(doc! {"business_id": 1, "author_id": 1})
        .options(unique.clone())
        .build();
    Coll::<Review>::from_db(db)
        .create_index(review_index, None)
        .await?;

    // Answers are looked up by their question.
    let answer_index = IndexModel::builder()
        .keys(doc! {"question_id": 1})
        .build();
    Coll::<Answer>::from_db(db)
        .create_index(answer_index, None)
        .await?;

    // Database-level backstop for the at-most-one-accepted-answer invariant.
    // Shares a key pattern with the lookup index above, so it needs its own
    // name alongside the differing partial filter.
    let accepted_index = IndexModel::builder()
        .keys(doc! {"question_id": 1})
        .options(
            IndexOptions::builder()
                .name("one_accepted_answer_per_question".to_string())
                .unique(true)
                .partial_filter_expression(doc! {"accepted": true})
                .build(),
        )
        .build();
    Coll::<Answer>::from_db(db)
        .create_index(accepted_index, None)
        .await?;

    // One live claim per member per business.
    let pending_claim_index = IndexModel::builder()
        .keys(doc! {"business_id": 1, "claimant_id": 1})
        .options(
            IndexOptions::builder()
                .name("one_pending_claim_per_member".to_string())
                .unique(true)
                .partial_filter_expression(doc! {"status": "pending"})
                .build(),
        )
        .build();
    Coll::<Claim>::from_db(db)
        .create_index(pending_claim_index, None)
        .await?;

    // Listing and log scans.
    Coll::<Vehicle>::from_db(db)
        .create_index(IndexModel::builder().keys(doc! {"business_id": 1}).build(), None)
        .await?;
    Coll::<Question>::from_db(db)
        .create_index(IndexModel::builder().keys(doc! {"tags": 1}).build(), None)
        .await?;
    Coll::<Comment>::from_db(db)
        .create_index(IndexModel::builder().keys(doc! {"post_id": 1}).build(), None)
        .await?;
    Coll::<Claim>::from_db(db)
        .create_index(IndexModel::builder().keys(doc! {"business_id": 1}).build(), None)
        .await?;
    Coll::<ActivityEntry>::from_db(db)
        .create_index(IndexModel::builder().keys(doc! {"created_at": -1}).build(), None)
        .await?;

    Ok(())
}
