use std::ops::{Deref, DerefMut};

use mongodb::bson::doc;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::slugify,
    mongodb::{Coll, Id},
};

use super::business::Business;

/// Core business category data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCore {
    pub name: String,
    pub slug: String,
}

impl CategoryCore {
    pub fn new(name: String) -> Self {
        let slug = slugify(&name);
        Self { name, slug }
    }
}

/// A category without an ID, ready for insertion.
pub type NewCategory = CategoryCore;

/// A category from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub category: CategoryCore,
}

impl Deref for Category {
    type Target = CategoryCore;

    fn deref(&self) -> &Self::Target {
        &self.category
    }
}

impl DerefMut for Category {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.category
    }
}

/// Delete a category, refusing while any business still references it.
pub async fn delete_category(
    categories: &Coll<Category>,
    businesses: &Coll<Business>,
    category_id: Id,
) -> Result<()> {
    let referencing = doc! { "category_id": category_id };
    let in_use = businesses.count_documents(referencing, None).await?;
    if in_use > 0 {
        return Err(Error::validation(format!(
            "Category {} is still used by {} businesses",
            category_id, in_use
        )));
    }

    let deleted = categories.delete_one(category_id.as_doc(), None).await?;
    if deleted.deleted_count == 0 {
        return Err(Error::not_found(format!("Category {}", category_id)));
    }
    Ok(())
}
