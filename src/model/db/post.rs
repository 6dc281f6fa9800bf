use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::{bson::doc, Client};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::slugify,
    mongodb::{in_transaction, Coll, Id},
};

use super::comment::Comment;

/// Core blog post data. Posts are staff-authored; `published` gates public
/// visibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostCore {
    pub title: String,
    pub slug: String,
    pub body: String,
    pub tags: Vec<String>,
    pub author_id: Id,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PostCore {
    pub fn new(title: String, body: String, tags: Vec<String>, author_id: Id, published: bool) -> Self {
        let slug = slugify(&title);
        Self {
            title,
            slug,
            body,
            tags,
            author_id,
            published,
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}

/// A post without an ID, ready for insertion.
pub type NewPost = PostCore;

/// A post from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub post: PostCore,
}

impl Deref for Post {
    type Target = PostCore;

    fn deref(&self) -> &Self::Target {
        &self.post
    }
}

impl DerefMut for Post {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.post
    }
}

/// Delete a post and its comments in one transaction.
pub async fn delete_post(
    client: &Client,
    posts: &Coll<Post>,
    comments: &Coll<Comment>,
    post_id: Id,
) -> Result<()> {
    in_transaction!(client, |session| {
        let deleted = posts
            .delete_one_with_session(post_id.as_doc(), None, &mut session)
            .await?;
        if deleted.deleted_count == 0 {
            return Err(Error::not_found(format!("Post {}", post_id)));
        }
        let by_post = doc! { "post_id": post_id };
        comments
            .delete_many_with_session(by_post, None, &mut session)
            .await?;
        Ok(())
    })
}
