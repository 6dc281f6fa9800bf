use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    db::{comment::Comment, post::Post},
    mongodb::Id,
};

/// A blog post as submitted by staff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRequest {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published: bool,
}

impl PostRequest {
    pub fn validate(&self) -> Result<()> {
        if crate::model::common::slugify(&self.title).is_empty() {
            return Err(Error::validation(
                "Post title must contain letters or digits",
            ));
        }
        if self.body.trim().is_empty() {
            return Err(Error::validation("Post body must not be empty"));
        }
        if self.tags.iter().any(|tag| tag.trim().is_empty()) {
            return Err(Error::validation("Tags must not be empty"));
        }
        Ok(())
    }
}

/// A post row in the blog index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: Id,
    pub title: String,
    pub slug: String,
    pub tags: Vec<String>,
    pub author_id: Id,
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Post> for PostSummary {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            title: post.post.title,
            slug: post.post.slug,
            tags: post.post.tags,
            author_id: post.post.author_id,
            published: post.post.published,
            created_at: post.post.created_at,
        }
    }
}

/// A full post page: the article plus its comments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub summary: PostSummary,
    pub body: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub comments: Vec<CommentView>,
}

impl PostDetail {
    pub fn new(post: Post, comments: Vec<Comment>) -> Self {
        let body = post.post.body.clone();
        let updated_at = post.post.updated_at;
        Self {
            summary: post.into(),
            body,
            updated_at,
            comments: comments.into_iter().map(CommentView::from).collect(),
        }
    }
}

/// A comment as submitted by a member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRequest {
    pub body: String,
}

impl CommentRequest {
    pub fn validate(&self) -> Result<()> {
        if self.body.trim().is_empty() {
            return Err(Error::validation("Comment body must not be empty"));
        }
        Ok(())
    }
}

/// A comment as rendered under a post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
    pub id: Id,
    pub author_id: Id,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl From<Comment> for CommentView {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            author_id: comment.comment.author_id,
            body: comment.comment.body,
            created_at: comment.comment.created_at,
        }
    }
}
