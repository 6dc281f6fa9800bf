use chrono::Utc;
use mongodb::{
    bson::{doc, to_bson},
    Client,
};
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::{AuthToken, Moderator},
        pagination::{Paginated, PaginationRequest},
        post::{CommentRequest, PostDetail, PostRequest, PostSummary},
    },
    db::{
        activity::{self, ActivityAction, NewActivityEntry},
        comment::{Comment, CommentCore, NewComment},
        post::{self, NewPost, Post, PostCore},
    },
    mongodb::{Coll, Id},
    permissions,
};

pub fn routes() -> Vec<Route> {
    routes![
        list_posts,
        write_post,
        view_post,
        edit_post,
        delete_post,
        post_comment,
        delete_comment,
    ]
}

#[get("/posts?<tag>&<pagination..>")]
async fn list_posts(
    staff: Option<AuthToken<Moderator>>,
    tag: Option<String>,
    pagination: PaginationRequest,
    posts: Coll<Post>,
) -> Result<Json<Paginated<PostSummary>>> {
    let mut filter = doc! {};
    if let Some(tag) = tag {
        filter.insert("tags", tag);
    }
    // Drafts are staff-only.
    if staff.is_none() {
        filter.insert("published", true);
    }

    let page: Vec<Post> = posts
        .find(
            filter.clone(),
            pagination.find_options(doc! { "created_at": -1 }),
        )
        .await?
        .try_collect()
        .await?;
    let total = posts.count_documents(filter, None).await?;

    let summaries = page.into_iter().map(PostSummary::from).collect();
    Ok(Json(pagination.to_paginated(total, summaries)))
}

#[post("/posts", data = "<request>", format = "json")]
async fn write_post(
    token: AuthToken<Moderator>,
    request: Json<PostRequest>,
    new_posts: Coll<NewPost>,
    posts: Coll<Post>,
    comments: Coll<Comment>,
    activity_log: Coll<NewActivityEntry>,
) -> Result<Json<PostDetail>> {
    request.validate()?;
    let request = request.0;

    let core = PostCore::new(
        request.title,
        request.body,
        request.tags,
        token.id,
        request.published,
    );
    let new_id: Id = match new_posts.insert_one(&core, None).await {
        Ok(inserted) => inserted
            .inserted_id
            .as_object_id()
            .unwrap() // Valid because the ID comes directly from the DB.
            .into(),
        Err(err) if crate::model::mongodb::is_duplicate_key(&err) => {
            return Err(Error::validation(format!(
                "A post titled \"{}\" already exists",
                core.title
            )))
        }
        Err(err) => return Err(err.into()),
    };

    activity::record(
        &activity_log,
        token.id,
        ActivityAction::Created,
        "posts",
        new_id,
        format!("Wrote \"{}\"", core.title),
    )
    .await;

    post_detail(&posts, &comments, new_id, true).await
}

#[get("/posts/<post_id>")]
async fn view_post(
    staff: Option<AuthToken<Moderator>>,
    post_id: Id,
    posts: Coll<Post>,
    comments: Coll<Comment>,
) -> Result<Json<PostDetail>> {
    post_detail(&posts, &comments, post_id, staff.is_some()).await
}

#[put("/posts/<post_id>", data = "<request>", format = "json")]
async fn edit_post(
    token: AuthToken<Moderator>,
    post_id: Id,
    request: Json<PostRequest>,
    posts: Coll<Post>,
    comments: Coll<Comment>,
    activity_log: Coll<NewActivityEntry>,
) -> Result<Json<PostDetail>> {
    request.validate()?;

    posts
        .find_one(post_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Post {}", post_id)))?;

    let request = request.0;
    let update = doc! {
        "$set": {
            "title": &request.title,
            "body": &request.body,
            "tags": request.tags.clone(),
            "published": request.published,
            "updated_at": to_bson(&Utc::now()).expect("Serialisation is infallible"),
        }
    };
    posts.update_one(post_id.as_doc(), update, None).await?;

    activity::record(
        &activity_log,
        token.id,
        ActivityAction::Updated,
        "posts",
        post_id,
        format!("Edited \"{}\"", request.title),
    )
    .await;

    post_detail(&posts, &comments, post_id, true).await
}

#[delete("/posts/<post_id>")]
async fn delete_post(
    token: AuthToken<Moderator>,
    post_id: Id,
    posts: Coll<Post>,
    comments: Coll<Comment>,
    activity_log: Coll<NewActivityEntry>,
    db_client: &State<Client>,
) -> Result<()> {
    post::delete_post(db_client, &posts, &comments, post_id).await?;

    activity::record(
        &activity_log,
        token.id,
        ActivityAction::Deleted,
        "posts",
        post_id,
        "Deleted a post and its comments",
    )
    .await;

    Ok(())
}

#[post("/posts/<post_id>/comments", data = "<request>", format = "json")]
async fn post_comment(
    token: AuthToken,
    post_id: Id,
    request: Json<CommentRequest>,
    posts: Coll<Post>,
    comments: Coll<Comment>,
    new_comments: Coll<NewComment>,
    activity_log: Coll<NewActivityEntry>,
) -> Result<Json<PostDetail>> {
    request.validate()?;

    // Comments are for published posts only.
    let published = doc! { "_id": post_id, "published": true };
    posts
        .find_one(published, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Post {}", post_id)))?;

    let comment = CommentCore::new(post_id, token.id, request.0.body);
    let new_id: Id = new_comments
        .insert_one(&comment, None)
        .await?
        .inserted_id
        .as_object_id()
        .unwrap() // Valid because the ID comes directly from the DB.
        .into();

    activity::record(
        &activity_log,
        token.id,
        ActivityAction::Created,
        "comments",
        new_id,
        format!("Commented on post {}", post_id),
    )
    .await;

    post_detail(&posts, &comments, post_id, false).await
}

#[delete("/posts/<post_id>/comments/<comment_id>")]
async fn delete_comment(
    token: AuthToken,
    post_id: Id,
    comment_id: Id,
    comments: Coll<Comment>,
    activity_log: Coll<NewActivityEntry>,
) -> Result<()> {
    let filter = doc! { "_id": comment_id, "post_id": post_id };
    let comment = comments
        .find_one(filter.clone(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Comment {}", comment_id)))?;

    if !permissions::owner_or_moderator(token.id, token.role, comment.author_id) {
        return Err(Error::permission_denied(format!(
            "Comment {} may only be deleted by its author or a moderator",
            comment_id
        )));
    }

    comments.delete_one(filter, None).await?;

    activity::record(
        &activity_log,
        token.id,
        ActivityAction::Deleted,
        "comments",
        comment_id,
        format!("Deleted a comment on post {}", post_id),
    )
    .await;

    Ok(())
}

/// Load a post page. Unpublished posts are visible to staff only; to anyone
/// else they don't exist.
async fn post_detail(
    posts: &Coll<Post>,
    comments: &Coll<Comment>,
    post_id: Id,
    include_drafts: bool,
) -> Result<Json<PostDetail>> {
    let mut filter = post_id.as_doc();
    if !include_drafts {
        filter.insert("published", true);
    }
    let post = posts
        .find_one(filter, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Post {}", post_id)))?;

    let by_post = doc! { "post_id": post_id };
    let options = mongodb::options::FindOptions::builder()
        .sort(doc! { "created_at": 1 })
        .build();
    let post_comments: Vec<Comment> = comments
        .find(by_post, options)
        .await?
        .try_collect()
        .await?;

    Ok(Json(PostDetail::new(post, post_comments)))
}
