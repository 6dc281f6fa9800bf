use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    db::vehicle::{NewVehicle, Vehicle, VehicleCore, VehicleStatus},
    mongodb::Id,
};

/// Model years older than this are assumed to be typos.
const OLDEST_MODEL_YEAR: i32 = 1900;

/// A vehicle listing as submitted through the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleRequest {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price: i64,
    pub mileage: u32,
    pub description: String,
}

impl VehicleRequest {
    pub fn validate(&self) -> Result<()> {
        if self.make.trim().is_empty() || self.model.trim().is_empty() {
            return Err(Error::validation("Vehicle make and model must not be empty"));
        }
        let next_year = chrono::Datelike::year(&Utc::now()) + 1;
        if !(OLDEST_MODEL_YEAR..=next_year).contains(&self.year) {
            return Err(Error::validation(format!(
                "Model year must be between {OLDEST_MODEL_YEAR} and {next_year}"
            )));
        }
        if self.price < 0 {
            return Err(Error::validation("Price must not be negative"));
        }
        Ok(())
    }

    pub fn into_core(self, business_id: Id) -> NewVehicle {
        VehicleCore {
            business_id,
            make: self.make,
            model: self.model,
            year: self.year,
            price: self.price,
            mileage: self.mileage,
            description: self.description,
            status: VehicleStatus::Listed,
            created_at: Utc::now(),
        }
    }
}

/// Sort orders for vehicle listings, applied in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromFormField)]
pub enum VehicleSort {
    Newest,
    PriceAsc,
    PriceDesc,
    YearDesc,
}

impl VehicleSort {
    pub fn sort_doc(self) -> Document {
        match self {
            Self::Newest => doc! { "created_at": -1 },
            Self::PriceAsc => doc! { "price": 1, "created_at": -1 },
            Self::PriceDesc => doc! { "price": -1, "created_at": -1 },
            Self::YearDesc => doc! { "year": -1, "created_at": -1 },
        }
    }
}

/// Query filters for vehicle search: equality on seller/make/model/status,
/// ranges on year and price. All applied in the database.
#[derive(Debug, Clone, Default)]
pub struct VehicleFilter {
    pub business: Option<Id>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub status: Option<VehicleStatus>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
}

impl VehicleFilter {
    pub fn filter_doc(&self) -> Document {
        let mut filter = doc! {};
        if let Some(business) = self.business {
            filter.insert("business_id", business);
        }
        if let Some(ref make) = self.make {
            filter.insert("make", make);
        }
        if let Some(ref model) = self.model {
            filter.insert("model", model);
        }
        if let Some(status) = self.status {
            filter.insert("status", status);
        }
        if let Some(range) = range_doc(self.year_min, self.year_max) {
            filter.insert("year", range);
        }
        if let Some(range) = range_doc(self.price_min, self.price_max) {
            filter.insert("price", range);
        }
        filter
    }
}

fn range_doc<T: Into<mongodb::bson::Bson>>(min: Option<T>, max: Option<T>) -> Option<Document> {
    let mut range = doc! {};
    if let Some(min) = min {
        range.insert("$gte", min);
    }
    if let Some(max) = max {
        range.insert("$lte", max);
    }
    (!range.is_empty()).then_some(range)
}

/// A vehicle as rendered in listings and detail pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleView {
    pub id: Id,
    #[serde(flatten)]
    pub vehicle: VehicleCore,
}

impl From<Vehicle> for VehicleView {
    fn from(vehicle: Vehicle) -> Self {
        Self {
            id: vehicle.id,
            vehicle: vehicle.vehicle,
        }
    }
}

/// A partial update to a vehicle listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleUpdate {
    pub price: Option<i64>,
    pub mileage: Option<u32>,
    pub description: Option<String>,
    pub status: Option<VehicleStatus>,
}

impl VehicleUpdate {
    pub fn validate(&self) -> Result<()> {
        if matches!(self.price, Some(price) if price < 0) {
            return Err(Error::validation("Price must not be negative"));
        }
        Ok(())
    }

    /// A `$set` document of just the provided fields.
    pub fn update_doc(&self) -> Document {
        let mut set = doc! {};
        if let Some(price) = self.price {
            set.insert("price", price);
        }
        if let Some(mileage) = self.mileage {
            set.insert("mileage", mileage as i64);
        }
        if let Some(ref description) = self.description {
            set.insert("description", description);
        }
        if let Some(status) = self.status {
            set.insert("status", status);
        }
        doc! { "$set": set }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_render_as_gte_lte() {
        let filter = VehicleFilter {
            year_min: Some(2010),
            year_max: Some(2020),
            price_max: Some(15_000),
            ..Default::default()
        };
        let doc = filter.filter_doc();
        let year = doc.get_document("year").unwrap();
        assert_eq!(year.get_i32("$gte").unwrap(), 2010);
        assert_eq!(year.get_i32("$lte").unwrap(), 2020);
        let price = doc.get_document("price").unwrap();
        assert!(price.get("$gte").is_none());
        assert_eq!(price.get_i64("$lte").unwrap(), 15_000);
    }

    #[test]
    fn open_ranges_are_omitted() {
        assert!(VehicleFilter::default().filter_doc().is_empty());
    }

    #[test]
    fn rejects_nonsense_listings() {
        let listing = VehicleRequest {
            make: "Volvo".to_string(),
            model: "V60".to_string(),
            year: 1850,
            price: 9_000,
            mileage: 80_000,
            description: "Tidy estate".to_string(),
        };
        assert!(listing.validate().is_err());

        let listing = VehicleRequest { year: 2018, ..listing };
        assert!(listing.validate().is_ok());

        let listing = VehicleRequest { price: -1, ..listing };
        assert!(listing.validate().is_err());
    }

    #[test]
    fn update_sets_only_provided_fields() {
        let update = VehicleUpdate {
            price: Some(8_500),
            mileage: None,
            description: None,
            status: Some(VehicleStatus::Sold),
        };
        let set = update.update_doc().get_document("$set").unwrap().clone();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get_i64("price").unwrap(), 8_500);
        assert_eq!(set.get_str("status").unwrap(), "sold");
    }
}
