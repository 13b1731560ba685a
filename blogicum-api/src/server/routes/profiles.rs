use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::{Json, Query},
    routes::on_conflict,
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use blogicum_common::{
    model::{
        post::Post,
        user::{Participant, ProfileForm, User, Username},
    },
    pagination::{Page, PageQuery},
};
use blogicum_db::{client::DbClient, query::PostFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_profile)
        .typed_get(get_own_profile)
        .typed_put(update_own_profile)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}", rejection(ServerError))]
struct ProfilePath {
    username: Username,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct Profile {
    user: User,
    posts: Page<Post>,
}

/// Owners see their drafts and scheduled posts too.
async fn get_profile(
    ProfilePath { username }: ProfilePath,
    State(db): State<Arc<DbClient>>,
    viewer: Option<AuthenticatedUser>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Profile>> {
    let user = db
        .fetch_user_by_username(&username)
        .await?
        .ok_or(ServerError::UserByUsernameNotFound(username))?;

    let is_owner = viewer.is_some_and(|viewer| viewer.user_id() == user.id);
    let filter = if is_owner {
        PostFilter::all()
    } else {
        PostFilter::visible_at(OffsetDateTime::now_utc())
    }
    .by_author(user.id);

    let posts = db.fetch_post_page(&filter, &page).await?;

    Ok(Json(Profile { user, posts }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile", rejection(ServerError))]
struct OwnProfilePath();

async fn get_own_profile(
    OwnProfilePath(): OwnProfilePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<Participant>> {
    let participant = db
        .fetch_participant(user.user_id())
        .await?
        .ok_or(ServerError::InvalidToken)?;

    Ok(Json(participant))
}

async fn update_own_profile(
    OwnProfilePath(): OwnProfilePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(form): Json<ProfileForm>,
) -> Result<Json<Participant>> {
    let participant = on_conflict(db.update_profile(user.user_id(), &form).await, || {
        ServerError::UsernameTaken(form.username.clone())
    })?
    .ok_or(ServerError::InvalidToken)?;

    Ok(Json(participant))
}
