use std::sync::Arc;

use warp::{reject::Rejection, Filter};

use super::jwt::{verify_jwt_session, SessionData};
use crate::error::Error;

const TOKEN_SCHEMES: &[&str] = &["Token ", "Bearer "];

fn read_token(header: &str) -> Option<&str> {
    TOKEN_SCHEMES
        .iter()
        .find_map(|scheme| header.strip_prefix(scheme))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn authorize(header: Option<String>, secret: &[u8]) -> Result<SessionData, Error> {
    let header = header.ok_or_else(|| {
        Error::Unauthorized(String::from("Authentication credentials were not provided"))
    })?;
    let token = read_token(&header)
        .ok_or_else(|| Error::Unauthorized(String::from("Invalid authorization header")))?;

    verify_jwt_session(token, secret).map(SessionData::from)
}

pub fn with_session(
    secret: Arc<Vec<u8>>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let secret = secret.clone();
        async move { authorize(header, &secret).map_err(warp::reject::custom) }
    })
}

/// Anonymous readers pass through as `None`; a bad token is still rejected.
pub fn with_possible_session(
    secret: Arc<Vec<u8>>,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let secret = secret.clone();
        async move {
            match header {
                Some(header) => authorize(Some(header), &secret)
                    .map(Some)
                    .map_err(warp::reject::custom),
                None => Ok(None),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_both_token_schemes() {
        assert_eq!(read_token("Token abc"), Some("abc"));
        assert_eq!(read_token("Bearer abc "), Some("abc"));
        assert_eq!(read_token("Basic abc"), None);
        assert_eq!(read_token("Token "), None);
    }
}
