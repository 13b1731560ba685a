use crate::server::{ServerError, run_blocking};
use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::TypedHeader;
use blogicum_common::model::{
    Id,
    auth::{AuthToken, AuthTokenHash},
    user::{User, UserMarker},
};
use blogicum_db::client::DbClient;
use headers::{Authorization, authorization::Bearer};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::debug;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// The requester, identified by a valid bearer token.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AuthenticatedUser {
    id: Id<UserMarker>,
    token_hash: AuthTokenHash,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user_id(&self) -> Id<UserMarker> {
        self.id
    }

    /// Hash of the token this request was made with.
    #[must_use]
    pub fn token_hash(&self) -> &AuthTokenHash {
        &self.token_hash
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let request_token: AuthToken = <AuthorizationHeader as FromRequestParts<S>>::from_request_parts(parts, state)
            .await
            .map_err(ServerError::InvalidAuthorizationHeader)?
            .token()
            .parse()?;

        let user_id = request_token.user_id;
        let token_hash = run_blocking(move || request_token.hash()).await??;

        let authentication = Arc::<DbClient>::from_ref(state)
            .fetch_auth(&token_hash)
            .await?
            .ok_or(ServerError::InvalidToken)?;

        // The token names its user; a hash match under another user is still a forgery.
        if authentication.user != user_id {
            return Err(ServerError::InvalidToken);
        }

        if authentication.is_expired_at(OffsetDateTime::now_utc()) {
            debug!(user_id = %authentication.user, "Rejecting expired token");
            return Err(ServerError::InvalidToken);
        }

        Ok(Self {
            id: authentication.user,
            token_hash,
        })
    }
}

/// Anonymous when no `Authorization` header is sent. A header with a bad
/// token is still rejected.
impl<S> OptionalFromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(None);
        }

        <Self as FromRequestParts<S>>::from_request_parts(parts, state)
            .await
            .map(Some)
    }
}

/// An authenticated user with the staff flag set.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct StaffUser {
    user: User,
}

impl StaffUser {
    #[must_use]
    pub fn user_id(&self) -> Id<UserMarker> {
        self.user.id
    }
}

impl<S> FromRequestParts<S> for StaffUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let authenticated =
            <AuthenticatedUser as FromRequestParts<S>>::from_request_parts(parts, state).await?;
        let user_id = authenticated.user_id();

        let user = Arc::<DbClient>::from_ref(state)
            .fetch_user(user_id)
            .await?
            .ok_or(ServerError::InvalidToken)?;

        StaffUser::try_from(user)
    }
}

impl TryFrom<User> for StaffUser {
    type Error = ServerError;

    fn try_from(user: User) -> Result<Self, Self::Error> {
        if !user.is_staff {
            return Err(ServerError::StaffOnly(user.id));
        }

        Ok(Self { user })
    }
}

#[cfg(test)]
mod tests {
    use super::StaffUser;
    use crate::server::{ServerError, fixtures};

    #[test]
    fn only_staff_pass() {
        let staff = StaffUser::try_from(fixtures::user(1, true)).unwrap();
        assert_eq!(u64::from(staff.user_id()), 1);

        let result = StaffUser::try_from(fixtures::user(2, false));
        assert!(matches!(result, Err(ServerError::StaffOnly(id)) if u64::from(id) == 2));
    }
}
