use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::config::Config;
use crate::database::schema::User;
use crate::error::DomainError;
use crate::schema::{Id, UserRole};

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Id, username: String, role: UserRole, lifetime: Duration) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + lifetime).timestamp();

        Self {
            user_id: id,
            username,
            role,
            iat,
            exp,
        }
    }
}

/// The acting user, as threaded explicitly through every SDK call.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionData {
    pub user_id: Id,
    pub username: String,
    pub role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    pub fn new(user_id: Id, username: &str, role: UserRole) -> Self {
        Self {
            user_id,
            username: username.to_owned(),
            is_admin: role == UserRole::Admin,
            role,
        }
    }

    pub fn authenticate(&self, action: ActionType) -> Result<(), DomainError> {
        if !action.authenticate(self) {
            return Err(DomainError::unauthorized());
        }
        Ok(())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData::new(value.user_id, &value.username, value.role)
    }
}

fn signing_key(config: &Config) -> Result<Hmac<Sha256>, DomainError> {
    Hmac::new_from_slice(config.jwt_secret.as_bytes())
        .map_err(|e| DomainError::Internal(format!("Invalid signing key: {e}")))
}

pub fn generate_jwt_session(user: &User, config: &Config) -> Result<String, DomainError> {
    let key = signing_key(config)?;
    let claims = JwtSessionData::new(
        user.id,
        user.username.to_owned(),
        user.role.to_owned(),
        Duration::hours(config.session_lifetime_hours),
    );

    claims
        .sign_with_key(&key)
        .map_err(|e| DomainError::Internal(format!("Failed to sign session: {e}")))
}

pub fn verify_jwt_session(token: &str, config: &Config) -> Result<JwtSessionData, DomainError> {
    let key = signing_key(config)?;

    let session: JwtSessionData = token.verify_with_key(&key).map_err(|_| {
        DomainError::InvalidSession(String::from("Invalid Session; Invalid token"))
    })?;

    let now = Local::now().timestamp();
    if (session.exp - now).is_negative() {
        return Err(DomainError::InvalidSession(String::from(
            "Invalid session; Token expired",
        )));
    }

    Ok(session)
}
