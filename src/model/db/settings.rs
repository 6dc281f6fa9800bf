use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::mongodb::{Coll, Id};

/// Site-wide settings. A singleton document; the collection never holds more
/// than one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSettings {
    #[serde(rename = "_id")]
    pub id: Id,
    pub site_name: String,
    pub tagline: String,
    pub contact_email: String,
    /// Default page size for public listings.
    pub listings_per_page: u32,
}

impl SiteSettings {
    fn initial() -> Self {
        Self {
            id: Id::new(),
            site_name: "AutoDir".to_string(),
            tagline: "Find trusted motor trade near you".to_string(),
            contact_email: "hello@autodir.example".to_string(),
            listings_per_page: 20,
        }
    }
}

/// Load the settings singleton.
///
/// Panics iff [`ensure_settings_exist`] has not run, which cannot happen
/// after a successful launch.
pub async fn current_settings(settings: &Coll<SiteSettings>) -> Result<SiteSettings> {
    Ok(settings
        .find_one(None, None)
        .await?
        .expect("Settings are created at launch"))
}

/// Ensure the settings singleton exists, seeding defaults on first launch.
///
/// This operation is idempotent.
pub async fn ensure_settings_exist(settings: &Coll<SiteSettings>) -> Result<()> {
    if settings.find_one(None, None).await?.is_none() {
        settings.insert_one(SiteSettings::initial(), None).await?;
        info!("Seeded default site settings");
    }
    Ok(())
}
