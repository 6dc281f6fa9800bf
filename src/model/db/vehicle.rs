use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Whether a vehicle is still for sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromFormField)]
#[serde(rename_all = "lowercase")]
pub enum VehicleStatus {
    Listed,
    Sold,
}

impl From<VehicleStatus> for Bson {
    fn from(status: VehicleStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

/// Core vehicle listing data. Every vehicle is sold by a business.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleCore {
    pub business_id: Id,
    pub make: String,
    pub model: String,
    pub year: i32,
    /// Asking price in whole currency units.
    pub price: i64,
    pub mileage: u32,
    pub description: String,
    pub status: VehicleStatus,
    pub created_at: DateTime<Utc>,
}

/// A vehicle without an ID, ready for insertion.
pub type NewVehicle = VehicleCore;

/// A vehicle from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vehicle: VehicleCore,
}

impl Deref for Vehicle {
    type Target = VehicleCore;

    fn deref(&self) -> &Self::Target {
        &self.vehicle
    }
}

impl DerefMut for Vehicle {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.vehicle
    }
}
