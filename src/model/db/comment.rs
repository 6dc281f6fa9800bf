use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core comment data, attached to a blog post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentCore {
    pub post_id: Id,
    pub author_id: Id,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl CommentCore {
    pub fn new(post_id: Id, author_id: Id, body: String) -> Self {
        Self {
            post_id,
            author_id,
            body,
            created_at: Utc::now(),
        }
    }
}

/// A comment without an ID, ready for insertion.
pub type NewComment = CommentCore;

/// A comment from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub comment: CommentCore,
}

impl Deref for Comment {
    type Target = CommentCore;

    fn deref(&self) -> &Self::Target {
        &self.comment
    }
}

impl DerefMut for Comment {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.comment
    }
}
