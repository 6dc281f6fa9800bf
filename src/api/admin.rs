use mongodb::{bson::doc, Client};
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        admin::{ActivityView, ClaimDecision, RoleChangeRequest, SettingsUpdate, UserSummary},
        auth::{Admin, AuthToken},
        business::ClaimView,
        pagination::{Paginated, PaginationRequest},
    },
    db::{
        activity::{self, ActivityAction, ActivityEntry, NewActivityEntry},
        business::Business,
        category::{self, Category, NewCategory},
        claim::{self, Claim, ClaimStatus},
        settings::{self, SiteSettings},
        user::{self, User},
    },
    mongodb::{Coll, Id},
};

pub fn routes() -> Vec<Route> {
    routes![
        list_users,
        change_user_role,
        list_claims,
        decide_claim,
        activity_log,
        get_settings,
        update_settings,
        create_category,
        delete_category,
    ]
}

#[get("/admin/users?<pagination..>")]
async fn list_users(
    _token: AuthToken<Admin>,
    pagination: PaginationRequest,
    users: Coll<User>,
) -> Result<Json<Paginated<UserSummary>>> {
    let page: Vec<User> = users
        .find(None, pagination.find_options(doc! { "username": 1 }))
        .await?
        .try_collect()
        .await?;
    let total = users.count_documents(None, None).await?;

    let summaries = page.into_iter().map(UserSummary::from).collect();
    Ok(Json(pagination.to_paginated(total, summaries)))
}

#[put("/admin/users/<user_id>/role", data = "<request>", format = "json")]
async fn change_user_role(
    token: AuthToken<Admin>,
    user_id: Id,
    request: Json<RoleChangeRequest>,
    users: Coll<User>,
    activity_log: Coll<NewActivityEntry>,
) -> Result<Json<UserSummary>> {
    let updated = user::change_role(&users, user_id, request.role).await?;

    activity::record(
        &activity_log,
        token.id,
        ActivityAction::RoleChanged,
        "users",
        user_id,
        format!("Set {} to {}", updated.username, request.role),
    )
    .await;

    Ok(Json(updated.into()))
}

#[get("/admin/claims?<status>&<pagination..>")]
async fn list_claims(
    _token: AuthToken<Admin>,
    status: Option<&str>,
    pagination: PaginationRequest,
    claims: Coll<Claim>,
) -> Result<Json<Paginated<ClaimView>>> {
    let filter = match status {
        Some("pending") => doc! { "status": ClaimStatus::Pending },
        Some("approved") => doc! { "status": ClaimStatus::Approved },
        Some("rejected") => doc! { "status": ClaimStatus::Rejected },
        Some(other) => {
            return Err(Error::validation(format!("Unknown claim status: {other}")))
        }
        None => doc! {},
    };

    let page: Vec<Claim> = claims
        .find(
            filter.clone(),
            pagination.find_options(doc! { "created_at": 1 }),
        )
        .await?
        .try_collect()
        .await?;
    let total = claims.count_documents(filter, None).await?;

    let views = page.into_iter().map(ClaimView::from).collect();
    Ok(Json(pagination.to_paginated(total, views)))
}

#[post("/admin/claims/<claim_id>/decide", data = "<decision>", format = "json")]
async fn decide_claim(
    token: AuthToken<Admin>,
    claim_id: Id,
    decision: Json<ClaimDecision>,
    claims: Coll<Claim>,
    businesses: Coll<Business>,
    activity_log: Coll<NewActivityEntry>,
    db_client: &State<Client>,
) -> Result<Json<ClaimView>> {
    let decided =
        claim::decide_claim(db_client, &claims, &businesses, claim_id, decision.approve, token.id)
            .await?;

    activity::record(
        &activity_log,
        token.id,
        ActivityAction::ClaimDecided,
        "claims",
        claim_id,
        format!(
            "{} claim on business {}",
            if decision.approve { "Approved" } else { "Rejected" },
            decided.business_id
        ),
    )
    .await;

    Ok(Json(decided.into()))
}

#[get("/admin/activity?<pagination..>")]
async fn activity_log(
    _token: AuthToken<Admin>,
    pagination: PaginationRequest,
    activity: Coll<ActivityEntry>,
) -> Result<Json<Paginated<ActivityView>>> {
    let page: Vec<ActivityEntry> = activity
        .find(None, pagination.find_options(doc! { "created_at": -1 }))
        .await?
        .try_collect()
        .await?;
    let total = activity.count_documents(None, None).await?;

    let views = page.into_iter().map(ActivityView::from).collect();
    Ok(Json(pagination.to_paginated(total, views)))
}

#[get("/settings")]
async fn get_settings(settings: Coll<SiteSettings>) -> Result<Json<SiteSettings>> {
    Ok(Json(settings::current_settings(&settings).await?))
}

#[put("/admin/settings", data = "<request>", format = "json")]
async fn update_settings(
    token: AuthToken<Admin>,
    request: Json<SettingsUpdate>,
    settings: Coll<SiteSettings>,
    activity_log: Coll<NewActivityEntry>,
) -> Result<Json<SiteSettings>> {
    request.validate()?;
    let request = request.0;

    let current = settings::current_settings(&settings).await?;
    let replacement = SiteSettings {
        id: current.id,
        site_name: request.site_name,
        tagline: request.tagline,
        contact_email: request.contact_email,
        listings_per_page: request.listings_per_page,
    };
    settings
        .replace_one(current.id.as_doc(), &replacement, None)
        .await?;

    activity::record(
        &activity_log,
        token.id,
        ActivityAction::SettingsUpdated,
        "settings",
        current.id,
        "Updated site settings",
    )
    .await;

    Ok(Json(replacement))
}

#[post("/admin/categories", data = "<name>", format = "json")]
async fn create_category(
    token: AuthToken<Admin>,
    name: Json<String>,
    new_categories: Coll<NewCategory>,
    categories: Coll<Category>,
    activity_log: Coll<NewActivityEntry>,
) -> Result<Json<Category>> {
    let name = name.0;
    if crate::model::common::slugify(&name).is_empty() {
        return Err(Error::validation(
            "Category name must contain letters or digits",
        ));
    }

    let core = NewCategory::new(name);
    let new_id: Id = match new_categories.insert_one(&core, None).await {
        Ok(inserted) => inserted
            .inserted_id
            .as_object_id()
            .unwrap() // Valid because the ID comes directly from the DB.
            .into(),
        Err(err) if crate::model::mongodb::is_duplicate_key(&err) => {
            return Err(Error::validation(format!(
                "Category \"{}\" already exists",
                core.name
            )))
        }
        Err(err) => return Err(err.into()),
    };

    activity::record(
        &activity_log,
        token.id,
        ActivityAction::Created,
        "categories",
        new_id,
        format!("Created category \"{}\"", core.name),
    )
    .await;

    let created = categories
        .find_one(new_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Category {}", new_id)))?;
    Ok(Json(created))
}

#[delete("/admin/categories/<category_id>")]
async fn delete_category(
    token: AuthToken<Admin>,
    category_id: Id,
    categories: Coll<Category>,
    businesses: Coll<Business>,
    activity_log: Coll<NewActivityEntry>,
) -> Result<()> {
    category::delete_category(&categories, &businesses, category_id).await?;

    activity::record(
        &activity_log,
        token.id,
        ActivityAction::Deleted,
        "categories",
        category_id,
        "Deleted a category",
    )
    .await;

    Ok(())
}
