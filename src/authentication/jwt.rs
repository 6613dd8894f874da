use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::constants::SESSION_LIFETIME_HOURS;
use crate::database::schema::User;
use crate::error::Error;
use crate::schema::{UserRole, Uuid};

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Uuid, username: String, role: UserRole) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(SESSION_LIFETIME_HOURS)).timestamp();

        Self {
            user_id: id,
            username,
            role,
            iat,
            exp,
        }
    }
}

/// The acting user of a request.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionData {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    pub is_admin: bool,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), Error> {
        if !action.authenticate(self) {
            return Err(Error::forbidden());
        }
        Ok(())
    }

    /// Owners may touch their own rows, `elevated` lets the role touch anyone's.
    pub fn authenticate_owner(
        &self,
        owner_id: Uuid,
        own: ActionType,
        elevated: ActionType,
    ) -> Result<(), Error> {
        self.authenticate(own)?;
        if owner_id == self.user_id || elevated.authenticate(self) {
            return Ok(());
        }
        Err(Error::forbidden())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            username: value.username,
            user_id: value.user_id,
            is_admin: value.role == UserRole::Admin,
            role: value.role,
        }
    }
}

fn signing_key(secret: &[u8]) -> Result<Hmac<Sha256>, Error> {
    Hmac::new_from_slice(secret)
        .map_err(|_e| Error::Internal(String::from("Invalid session signing key")))
}

pub fn generate_jwt_session(user: &User, secret: &[u8]) -> Result<String, Error> {
    let key = signing_key(secret)?;
    let claims = JwtSessionData::new(user.id, user.username.to_owned(), user.role.to_owned());

    claims
        .sign_with_key(&key)
        .map_err(|e| Error::Internal(format!("Failed to sign session: {e}")))
}

pub fn verify_jwt_session(token: &str, secret: &[u8]) -> Result<JwtSessionData, Error> {
    let key = signing_key(secret)?;

    let session: JwtSessionData = token
        .verify_with_key(&key)
        .map_err(|_| Error::Unauthorized(String::from("Invalid session; Invalid token")))?;

    let now = Local::now().timestamp();
    if (session.exp - now).is_negative() {
        return Err(Error::Unauthorized(String::from(
            "Invalid session; Token expired",
        )));
    }

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const SECRET: &[u8] = b"test-secret";

    fn user() -> User {
        User {
            id: 7,
            email: "bob@example.com".to_string(),
            username: "bob".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            role: UserRole::Admin,
        }
    }

    #[test]
    fn signed_session_verifies() {
        let token = generate_jwt_session(&user(), SECRET).unwrap();
        let session: SessionData = verify_jwt_session(&token, SECRET).unwrap().into();

        assert_eq!(session.user_id, 7);
        assert_eq!(session.username, "bob");
        assert!(session.is_admin);
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let token = generate_jwt_session(&user(), SECRET).unwrap();
        let error = verify_jwt_session(&token, b"other-secret").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn expired_session_is_rejected() {
        let key = signing_key(SECRET).unwrap();
        let mut claims = JwtSessionData::new(7, "bob".to_string(), UserRole::User);
        claims.exp = claims.iat - 60;
        let token = claims.sign_with_key(&key).unwrap();

        let error = verify_jwt_session(&token, SECRET).unwrap_err();
        assert_eq!(error.to_string(), "Invalid session; Token expired");
    }

    #[test]
    fn owners_and_admins_may_manage() {
        let user = SessionData {
            user_id: 1,
            username: "alice".to_string(),
            role: UserRole::User,
            is_admin: false,
        };
        assert!(user
            .authenticate_owner(1, ActionType::ManageOwnRecipes, ActionType::ManageAllRecipes)
            .is_ok());
        assert_eq!(
            user.authenticate_owner(2, ActionType::ManageOwnRecipes, ActionType::ManageAllRecipes)
                .unwrap_err()
                .kind(),
            ErrorKind::Forbidden
        );

        let admin = SessionData {
            role: UserRole::Admin,
            is_admin: true,
            ..user
        };
        assert!(admin
            .authenticate_owner(2, ActionType::ManageOwnRecipes, ActionType::ManageAllRecipes)
            .is_ok());
    }
}
