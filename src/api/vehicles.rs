use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::AuthToken,
        pagination::{Paginated, PaginationRequest},
        vehicle::{VehicleFilter, VehicleRequest, VehicleSort, VehicleUpdate, VehicleView},
    },
    common::Role,
    db::{
        activity::{self, ActivityAction, NewActivityEntry},
        business::{self, Business},
        vehicle::{NewVehicle, Vehicle, VehicleStatus},
    },
    mongodb::{Coll, Id},
    permissions,
};

pub fn routes() -> Vec<Route> {
    routes![
        search_vehicles,
        list_vehicle,
        view_vehicle,
        edit_vehicle,
        delete_vehicle,
    ]
}

#[get(
    "/vehicles?<business>&<make>&<model>&<status>&<year_min>&<year_max>&<price_min>&<price_max>&<sort>&<pagination..>"
)]
#[allow(clippy::too_many_arguments)]
async fn search_vehicles(
    business: Option<Id>,
    make: Option<String>,
    model: Option<String>,
    status: Option<VehicleStatus>,
    year_min: Option<i32>,
    year_max: Option<i32>,
    price_min: Option<i64>,
    price_max: Option<i64>,
    sort: Option<VehicleSort>,
    pagination: PaginationRequest,
    vehicles: Coll<Vehicle>,
) -> Result<Json<Paginated<VehicleView>>> {
    let filter = VehicleFilter {
        business,
        make,
        model,
        status,
        year_min,
        year_max,
        price_min,
        price_max,
    }
    .filter_doc();
    let sort = sort.unwrap_or(VehicleSort::Newest);

    let page: Vec<Vehicle> = vehicles
        .find(filter.clone(), pagination.find_options(sort.sort_doc()))
        .await?
        .try_collect()
        .await?;
    let total = vehicles.count_documents(filter, None).await?;

    let views = page.into_iter().map(VehicleView::from).collect();
    Ok(Json(pagination.to_paginated(total, views)))
}

#[post("/businesses/<business_id>/vehicles", data = "<request>", format = "json")]
async fn list_vehicle(
    token: AuthToken,
    business_id: Id,
    request: Json<VehicleRequest>,
    businesses: Coll<Business>,
    new_vehicles: Coll<NewVehicle>,
    vehicles: Coll<Vehicle>,
    activity_log: Coll<NewActivityEntry>,
) -> Result<Json<VehicleView>> {
    request.validate()?;

    let business = business::business_by_id(&businesses, business_id).await?;
    if !permissions::maybe_owner_or_moderator(token.id, token.role, business.owner_id) {
        return Err(Error::permission_denied(format!(
            "Only the owner of business {} or a moderator may list vehicles for it",
            business_id
        )));
    }

    let core = request.0.into_core(business_id);
    let new_id: Id = new_vehicles
        .insert_one(&core, None)
        .await?
        .inserted_id
        .as_object_id()
        .unwrap() // Valid because the ID comes directly from the DB.
        .into();

    activity::record(
        &activity_log,
        token.id,
        ActivityAction::Created,
        "vehicles",
        new_id,
        format!("Listed {} {} {}", core.year, core.make, core.model),
    )
    .await;

    let created = vehicle_by_id(&vehicles, new_id).await?;
    Ok(Json(created.into()))
}

#[get("/vehicles/<vehicle_id>")]
async fn view_vehicle(vehicle_id: Id, vehicles: Coll<Vehicle>) -> Result<Json<VehicleView>> {
    let vehicle = vehicle_by_id(&vehicles, vehicle_id).await?;
    Ok(Json(vehicle.into()))
}

#[put("/vehicles/<vehicle_id>", data = "<request>", format = "json")]
async fn edit_vehicle(
    token: AuthToken,
    vehicle_id: Id,
    request: Json<VehicleUpdate>,
    vehicles: Coll<Vehicle>,
    businesses: Coll<Business>,
    activity_log: Coll<NewActivityEntry>,
) -> Result<Json<VehicleView>> {
    request.validate()?;

    let vehicle = vehicle_by_id(&vehicles, vehicle_id).await?;
    check_seller_permission(&businesses, &vehicle, token.id, token.role).await?;

    vehicles
        .update_one(vehicle_id.as_doc(), request.update_doc(), None)
        .await?;

    activity::record(
        &activity_log,
        token.id,
        ActivityAction::Updated,
        "vehicles",
        vehicle_id,
        format!("Updated {} {} {}", vehicle.year, vehicle.make, vehicle.model),
    )
    .await;

    let updated = vehicle_by_id(&vehicles, vehicle_id).await?;
    Ok(Json(updated.into()))
}

#[delete("/vehicles/<vehicle_id>")]
async fn delete_vehicle(
    token: AuthToken,
    vehicle_id: Id,
    vehicles: Coll<Vehicle>,
    businesses: Coll<Business>,
    activity_log: Coll<NewActivityEntry>,
) -> Result<()> {
    let vehicle = vehicle_by_id(&vehicles, vehicle_id).await?;
    check_seller_permission(&businesses, &vehicle, token.id, token.role).await?;

    vehicles.delete_one(vehicle_id.as_doc(), None).await?;

    activity::record(
        &activity_log,
        token.id,
        ActivityAction::Deleted,
        "vehicles",
        vehicle_id,
        format!("Delisted {} {} {}", vehicle.year, vehicle.make, vehicle.model),
    )
    .await;

    Ok(())
}

async fn vehicle_by_id(vehicles: &Coll<Vehicle>, id: Id) -> Result<Vehicle> {
    vehicles
        .find_one(id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Vehicle {}", id)))
}

/// A vehicle belongs to its selling business: only that business's owner or
/// a moderator may touch it.
async fn check_seller_permission(
    businesses: &Coll<Business>,
    vehicle: &Vehicle,
    caller_id: Id,
    caller_role: Role,
) -> Result<()> {
    let business = business::business_by_id(businesses, vehicle.business_id).await?;
    if !permissions::maybe_owner_or_moderator(caller_id, caller_role, business.owner_id) {
        return Err(Error::permission_denied(format!(
            "Vehicle {} may only be changed by the selling business's owner or a moderator",
            vehicle.id
        )));
    }
    Ok(())
}
