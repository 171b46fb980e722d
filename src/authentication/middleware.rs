use std::sync::Arc;

use warp::{reject::Rejection, Filter};

use super::jwt::{verify_jwt_session, SessionData};
use crate::{config::Config, error::DomainError};

const TOKEN_PREFIX: &str = "Token ";

/// Extracts the session token from an `Authorization: Token <jwt>` header.
/// `Bearer` is accepted as well.
pub fn parse_authorization(header: &str) -> Option<&str> {
    let header = header.trim();

    header
        .strip_prefix(TOKEN_PREFIX)
        .or_else(|| header.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub fn session_from_header(header: &str, config: &Config) -> Result<SessionData, DomainError> {
    let token = parse_authorization(header).ok_or_else(|| {
        DomainError::InvalidSession(String::from("Invalid Session; Malformed authorization header"))
    })?;

    verify_jwt_session(token, config).map(SessionData::from)
}

pub fn with_session(
    config: Arc<Config>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::<String>("authorization").and_then(move |header: String| {
        let config = config.clone();
        async move {
            session_from_header(&header, &config).map_err(|e| {
                log::trace!("> Rejected session: {e}");
                Rejection::from(e)
            })
        }
    })
}

pub fn with_possible_session(
    config: Arc<Config>,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").map(move |header: Option<String>| {
        header.and_then(|header| session_from_header(&header, &config).ok())
    })
}
