use mongodb::bson::doc;
use rocket::{
    http::{Cookie, CookieJar},
    serde::json::Json,
    Route, State,
};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::{
        admin::UserSummary,
        auth::{AuthToken, Credentials, RegisterRequest, AUTH_TOKEN_COOKIE},
    },
    db::user::{user_by_id, NewUser, User},
    mongodb::{is_duplicate_key, Coll, Id},
};

pub fn routes() -> Vec<Route> {
    routes![register, login, logout, whoami]
}

#[post("/auth/register", data = "<request>", format = "json")]
async fn register(
    request: Json<RegisterRequest>,
    new_users: Coll<NewUser>,
    users: Coll<User>,
    cookies: &CookieJar<'_>,
    config: &State<Config>,
) -> Result<Json<UserSummary>> {
    let user = request.0.into_user()?;

    // The unique index on usernames is the real arbiter; racing registrations
    // surface as a duplicate key, not as two accounts.
    let new_id: Id = match new_users.insert_one(&user, None).await {
        Ok(inserted) => inserted
            .inserted_id
            .as_object_id()
            .unwrap() // Valid because the ID comes directly from the DB.
            .into(),
        Err(err) if is_duplicate_key(&err) => {
            return Err(Error::validation(format!(
                "Username already taken: {}",
                user.username
            )))
        }
        Err(err) => return Err(err.into()),
    };

    // Sign the new member straight in.
    let db_user = user_by_id(&users, new_id).await?;
    let token = AuthToken::for_user(&db_user);
    cookies.add(token.into_cookie(config));

    Ok(Json(db_user.into()))
}

#[post("/auth/login", data = "<credentials>", format = "json")]
async fn login(
    credentials: Json<Credentials>,
    users: Coll<User>,
    cookies: &CookieJar<'_>,
    config: &State<Config>,
) -> Result<Json<UserSummary>> {
    let with_username = doc! {
        "username": &credentials.username,
    };

    let user = users
        .find_one(with_username, None)
        .await?
        .filter(|user| user.verify_password(&credentials.password))
        .ok_or_else(|| {
            Error::Unauthorized("No user found with that username and password".to_string())
        })?;

    let token = AuthToken::for_user(&user);
    cookies.add(token.into_cookie(config));

    Ok(Json(user.into()))
}

#[delete("/auth")]
fn logout(cookies: &CookieJar<'_>) {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
}

#[get("/auth/me")]
async fn whoami(token: AuthToken, users: Coll<User>) -> Result<Json<UserSummary>> {
    let user = user_by_id(&users, token.id).await?;
    Ok(Json(user.into()))
}
