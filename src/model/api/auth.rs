use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use mongodb::Database;
use rand::Rng;
use rocket::{
    http::{Cookie, SameSite, Status},
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::{
    common::Role,
    db::user::User,
    mongodb::{Coll, Id},
};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Minimum role a route demands of its caller.
pub trait AccessLevel {
    const MINIMUM: Role;
}

/// Any signed-in user.
pub struct Member;
/// Moderator-equivalent callers.
pub struct Moderator;
/// The administrative backend.
pub struct Admin;

impl AccessLevel for Member {
    const MINIMUM: Role = Role::Member;
}
impl AccessLevel for Moderator {
    const MINIMUM: Role = Role::Moderator;
}
impl AccessLevel for Admin {
    const MINIMUM: Role = Role::Admin;
}

/// An authentication token representing a signed-in user.
///
/// The type parameter is the access level the receiving route demands; the
/// request guard enforces it against the user's **current** role in the
/// database, so promotions, demotions, and deletions take effect on the next
/// request rather than at token expiry.
#[derive(Serialize, Deserialize)]
pub struct AuthToken<L = Member> {
    pub id: Id,
    #[serde(rename = "rol")]
    pub role: Role,
    #[serde(skip)]
    phantom: PhantomData<L>,
}

impl AuthToken<Member> {
    /// Create a new token for the given user.
    pub fn for_user(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role,
            phantom: PhantomData,
        }
    }
}

impl<L> AuthToken<L> {
    /// Does this token satisfy the given minimum role?
    pub fn satisfies(&self, minimum: Role) -> bool {
        self.role >= minimum
    }

    #[allow(clippy::missing_panics_doc)]
    /// Serialize this token into a cookie.
    pub fn into_cookie(self, config: &Config) -> Cookie<'static> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .expect("JWT encoding is infallible with default settings");

        Cookie::build(AUTH_TOKEN_COOKIE, token)
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish()
    }

    /// Deserialize a token from a cookie.
    pub fn from_cookie(cookie: &Cookie<'_>, config: &Config) -> Result<Self, Error> {
        let token = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<L>>| claims.claims.token)?;
        Ok(token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<L> {
    #[serde(flatten, bound = "")]
    token: AuthToken<L>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r, L> FromRequest<'r> for AuthToken<L>
where
    L: AccessLevel + Send,
{
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let Some(cookie) = req.cookies().get(AUTH_TOKEN_COOKIE) else {
            return Outcome::Failure((
                Status::Unauthorized,
                Error::Unauthorized("Not signed in".to_string()),
            ));
        };

        let mut token: Self = match Self::from_cookie(cookie, config) {
            Ok(token) => token,
            Err(err) => return Outcome::Failure((Status::Unauthorized, err)),
        };

        // The token's embedded role is only a hint; the user's live record
        // decides what they may do now.
        let db = req.guard::<&State<Database>>().await.unwrap();
        let user = match Coll::<User>::from_db(db).find_one(token.id.as_doc(), None).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized("Account no longer exists".to_string()),
                ))
            }
            Err(err) => return Outcome::Failure((Status::InternalServerError, err.into())),
        };
        token.role = user.role;

        if !token.satisfies(L::MINIMUM) {
            return Outcome::Failure((
                Status::Forbidden,
                Error::permission_denied(format!("This action requires the {} role", L::MINIMUM)),
            ));
        }
        Outcome::Success(token)
    }
}

/// Raw sign-in credentials. Never stored; the password only ever persists as
/// an argon2 hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// A sign-up request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub display_name: String,
    pub password: String,
}

impl RegisterRequest {
    /// Validate the request and hash the password into an insertable user.
    pub fn into_user(self) -> Result<crate::model::db::user::NewUser, Error> {
        if self.username.trim().is_empty() {
            return Err(Error::validation("Username must not be empty"));
        }
        if self.display_name.trim().is_empty() {
            return Err(Error::validation("Display name must not be empty"));
        }
        if self.password.len() < MIN_PASSWORD_LENGTH {
            return Err(Error::validation(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        // 16 bytes of salt is the recommended size for argon2.
        let mut salt = [0_u8; 16];
        rand::thread_rng().fill(&mut salt);
        let password_hash =
            argon2::hash_encoded(self.password.as_bytes(), &salt, &argon2::Config::default())
                .unwrap(); // Safe because the default `Config` is valid.

        Ok(crate::model::db::user::NewUser {
            username: self.username,
            display_name: self.display_name,
            password_hash,
            role: Role::Member,
            joined_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, display_name: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            display_name: display_name.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn registration_hashes_the_password() {
        let user = request("gearhead", "Gear Head", "horsepower").into_user().unwrap();
        assert_eq!(user.role, Role::Member);
        assert_ne!(user.password_hash, "horsepower");
        assert!(user.verify_password("horsepower"));
        assert!(!user.verify_password("horsepowers"));
    }

    #[test]
    fn registration_rejects_bad_shapes() {
        assert!(request("", "Gear Head", "horsepower").into_user().is_err());
        assert!(request("gearhead", "  ", "horsepower").into_user().is_err());
        assert!(request("gearhead", "Gear Head", "short").into_user().is_err());
    }
}
