use mongodb::{bson::doc, Client};
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::AuthToken,
        business::{
            BusinessDetail, BusinessFilter, BusinessRequest, BusinessSummary, ClaimRequest,
            ReviewRequest, ReviewView,
        },
        pagination::{Paginated, PaginationRequest},
    },
    db::{
        activity::{self, ActivityAction, NewActivityEntry},
        business::{self, Business, NewBusiness},
        category::Category,
        claim::{self, Claim, NewClaim},
        review::{self, NewReview, Review, ReviewCore},
        vehicle::Vehicle,
    },
    mongodb::{Coll, Id},
    permissions,
};

pub fn routes() -> Vec<Route> {
    routes![
        list_businesses,
        create_business,
        view_business,
        edit_business,
        delete_business,
        list_reviews,
        post_review,
        delete_review,
        submit_claim,
        list_categories,
    ]
}

#[get("/businesses?<category>&<city>&<name>&<pagination..>")]
async fn list_businesses(
    category: Option<Id>,
    city: Option<String>,
    name: Option<String>,
    pagination: PaginationRequest,
    businesses: Coll<Business>,
    reviews: Coll<Review>,
) -> Result<Json<Paginated<BusinessSummary>>> {
    let filter = BusinessFilter { category, city, name }.filter_doc();
    let page: Vec<Business> = businesses
        .find(filter.clone(), pagination.find_options(doc! { "name": 1 }))
        .await?
        .try_collect()
        .await?;
    let total = businesses.count_documents(filter, None).await?;

    // One aggregation joins the whole page against the reviews collection.
    let ids = page.iter().map(|business| business.id).collect::<Vec<_>>();
    let ratings = review::rating_summaries(&reviews, &ids).await?;

    let summaries = page
        .into_iter()
        .map(|business| {
            let rating = ratings.get(&business.id).copied();
            BusinessSummary::new(business, rating)
        })
        .collect();
    Ok(Json(pagination.to_paginated(total, summaries)))
}

#[post("/businesses", data = "<request>", format = "json")]
async fn create_business(
    token: AuthToken,
    request: Json<BusinessRequest>,
    new_businesses: Coll<NewBusiness>,
    businesses: Coll<Business>,
    activity_log: Coll<NewActivityEntry>,
) -> Result<Json<BusinessDetail>> {
    request.validate()?;
    let core = request.0.into_core();

    let new_id: Id = match new_businesses.insert_one(&core, None).await {
        Ok(inserted) => inserted
            .inserted_id
            .as_object_id()
            .unwrap() // Valid because the ID comes directly from the DB.
            .into(),
        Err(err) if crate::model::mongodb::is_duplicate_key(&err) => {
            return Err(Error::validation(format!(
                "A business named \"{}\" is already listed",
                core.name
            )))
        }
        Err(err) => return Err(err.into()),
    };

    activity::record(
        &activity_log,
        token.id,
        ActivityAction::Created,
        "businesses",
        new_id,
        format!("Listed \"{}\"", core.name),
    )
    .await;

    let created = business::business_by_id(&businesses, new_id).await?;
    Ok(Json(BusinessDetail::new(created, None)))
}

#[get("/businesses/<business_id>")]
async fn view_business(
    business_id: Id,
    businesses: Coll<Business>,
    reviews: Coll<Review>,
) -> Result<Json<BusinessDetail>> {
    let business = business::business_by_id(&businesses, business_id).await?;
    let rating = review::rating_summaries(&reviews, &[business_id])
        .await?
        .remove(&business_id);
    Ok(Json(BusinessDetail::new(business, rating)))
}

#[put("/businesses/<business_id>", data = "<request>", format = "json")]
async fn edit_business(
    token: AuthToken,
    business_id: Id,
    request: Json<BusinessRequest>,
    businesses: Coll<Business>,
    reviews: Coll<Review>,
    activity_log: Coll<NewActivityEntry>,
) -> Result<Json<BusinessDetail>> {
    request.validate()?;

    let business = business::business_by_id(&businesses, business_id).await?;
    if !permissions::maybe_owner_or_moderator(token.id, token.role, business.owner_id) {
        return Err(Error::permission_denied(format!(
            "Business {} may only be edited by its owner or a moderator",
            business_id
        )));
    }

    // The slug is a stable URL identifier; renames don't regenerate it.
    let request = request.0;
    let mut set = doc! {
        "name": &request.name,
        "description": &request.description,
        "address.city": &request.city,
    };
    set.insert("category_id", optional(request.category_id));
    set.insert("phone", optional(request.phone.clone()));
    set.insert("website", optional(request.website.clone()));
    set.insert("address.street", optional(request.street.clone()));
    set.insert("address.region", optional(request.region.clone()));
    set.insert("address.postcode", optional(request.postcode.clone()));
    businesses
        .update_one(business_id.as_doc(), doc! { "$set": set }, None)
        .await?;

    activity::record(
        &activity_log,
        token.id,
        ActivityAction::Updated,
        "businesses",
        business_id,
        format!("Edited \"{}\"", request.name),
    )
    .await;

    let updated = business::business_by_id(&businesses, business_id).await?;
    let rating = review::rating_summaries(&reviews, &[business_id])
        .await?
        .remove(&business_id);
    Ok(Json(BusinessDetail::new(updated, rating)))
}

#[delete("/businesses/<business_id>")]
async fn delete_business(
    token: AuthToken,
    business_id: Id,
    businesses: Coll<Business>,
    vehicles: Coll<Vehicle>,
    reviews: Coll<Review>,
    claims: Coll<Claim>,
    activity_log: Coll<NewActivityEntry>,
    db_client: &State<Client>,
) -> Result<()> {
    business::delete_business(
        db_client,
        &businesses,
        &vehicles,
        &reviews,
        &claims,
        business_id,
        token.id,
        token.role,
    )
    .await?;

    activity::record(
        &activity_log,
        token.id,
        ActivityAction::Deleted,
        "businesses",
        business_id,
        "Removed a business listing and its vehicles, reviews, and claims",
    )
    .await;

    Ok(())
}

#[get("/businesses/<business_id>/reviews?<pagination..>")]
async fn list_reviews(
    business_id: Id,
    pagination: PaginationRequest,
    businesses: Coll<Business>,
    reviews: Coll<Review>,
) -> Result<Json<Paginated<ReviewView>>> {
    business::business_by_id(&businesses, business_id).await?;

    let filter = doc! { "business_id": business_id };
    let page: Vec<Review> = reviews
        .find(
            filter.clone(),
            pagination.find_options(doc! { "created_at": -1 }),
        )
        .await?
        .try_collect()
        .await?;
    let total = reviews.count_documents(filter, None).await?;

    let views = page.into_iter().map(ReviewView::from).collect();
    Ok(Json(pagination.to_paginated(total, views)))
}

#[post("/businesses/<business_id>/reviews", data = "<request>", format = "json")]
async fn post_review(
    token: AuthToken,
    business_id: Id,
    request: Json<ReviewRequest>,
    businesses: Coll<Business>,
    new_reviews: Coll<NewReview>,
    activity_log: Coll<NewActivityEntry>,
) -> Result<Json<ReviewView>> {
    request.validate()?;
    let request = request.0;

    let core = ReviewCore::new(business_id, token.id, request.rating, request.title, request.body);
    let new_id = review::submit_review(&new_reviews, &businesses, core.clone()).await?;

    activity::record(
        &activity_log,
        token.id,
        ActivityAction::Created,
        "reviews",
        new_id,
        format!("Reviewed business {} ({} stars)", business_id, core.rating),
    )
    .await;

    Ok(Json(Review { id: new_id, review: core }.into()))
}

#[delete("/businesses/<business_id>/reviews/<review_id>")]
async fn delete_review(
    token: AuthToken,
    business_id: Id,
    review_id: Id,
    reviews: Coll<Review>,
    activity_log: Coll<NewActivityEntry>,
) -> Result<()> {
    let filter = doc! { "_id": review_id, "business_id": business_id };
    let review = reviews
        .find_one(filter.clone(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Review {}", review_id)))?;

    if !permissions::owner_or_moderator(token.id, token.role, review.author_id) {
        return Err(Error::permission_denied(format!(
            "Review {} may only be deleted by its author or a moderator",
            review_id
        )));
    }

    reviews.delete_one(filter, None).await?;

    activity::record(
        &activity_log,
        token.id,
        ActivityAction::Deleted,
        "reviews",
        review_id,
        format!("Deleted a review of business {}", business_id),
    )
    .await;

    Ok(())
}

#[post("/businesses/<business_id>/claims", data = "<request>", format = "json")]
async fn submit_claim(
    token: AuthToken,
    business_id: Id,
    request: Json<ClaimRequest>,
    businesses: Coll<Business>,
    new_claims: Coll<NewClaim>,
    activity_log: Coll<NewActivityEntry>,
) -> Result<Json<Id>> {
    request.validate()?;

    let claim_id =
        claim::submit_claim(&new_claims, &businesses, business_id, token.id, request.0.message)
            .await?;

    activity::record(
        &activity_log,
        token.id,
        ActivityAction::ClaimSubmitted,
        "claims",
        claim_id,
        format!("Claimed ownership of business {}", business_id),
    )
    .await;

    Ok(Json(claim_id))
}

/// Optional edit fields write as null when cleared.
fn optional<T: Into<mongodb::bson::Bson>>(value: Option<T>) -> mongodb::bson::Bson {
    value.map_or(mongodb::bson::Bson::Null, Into::into)
}

#[get("/categories")]
async fn list_categories(categories: Coll<Category>) -> Result<Json<Vec<Category>>> {
    let all: Vec<Category> = categories
        .find(None, mongodb::options::FindOptions::builder().sort(doc! { "name": 1 }).build())
        .await?
        .try_collect()
        .await?;
    Ok(Json(all))
}
