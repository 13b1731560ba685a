use crate::server::{
    Result, ServerError, ServerRouter,
    auth::{AuthenticatedUser, StaffUser},
    json::{Created, Json, Query},
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use blogicum_common::{
    model::{
        Id,
        category::{Category, CategorySlug},
        post::{Post, PostForm, PostMarker},
        user::UserMarker,
    },
    pagination::{Page, PageQuery},
};
use blogicum_db::{client::DbClient, query::PostFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_index)
        .typed_post(create_post)
        .typed_get(get_category_posts)
        .typed_get(get_post)
        .typed_put(update_post)
        .typed_delete(delete_post)
}

/// The post, if `viewer` may see it right now.
pub(super) async fn fetch_visible_post(
    db: &DbClient,
    post_id: Id<PostMarker>,
    viewer: Option<Id<UserMarker>>,
) -> Result<Post> {
    db.fetch_post(post_id)
        .await?
        .filter(|post| post.is_visible_to(viewer, OffsetDateTime::now_utc()))
        .ok_or(ServerError::PostByIdNotFound(post_id))
}

async fn fetch_own_post(
    db: &DbClient,
    post_id: Id<PostMarker>,
    user_id: Id<UserMarker>,
) -> Result<Post> {
    let post = db
        .fetch_post(post_id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(post_id))?;

    ensure_post_author(&post, user_id)?;
    Ok(post)
}

fn ensure_post_author(post: &Post, user_id: Id<UserMarker>) -> Result<()> {
    if !post.is_authored_by(Some(user_id)) {
        return Err(ServerError::NotPostAuthor(post.id));
    }

    Ok(())
}

async fn check_references(db: &DbClient, form: &PostForm) -> Result<()> {
    if db.fetch_category(form.category).await?.is_none() {
        return Err(ServerError::UnknownCategory(form.category));
    }
    if let Some(location) = form.location
        && db.fetch_location(location).await?.is_none()
    {
        return Err(ServerError::UnknownLocation(location));
    }

    Ok(())
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct PostsPath();

async fn get_index(
    PostsPath(): PostsPath,
    State(db): State<Arc<DbClient>>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<Post>>> {
    let filter = PostFilter::visible_at(OffsetDateTime::now_utc());
    let posts = db.fetch_post_page(&filter, &page).await?;

    Ok(Json(posts))
}

async fn create_post(
    PostsPath(): PostsPath,
    State(db): State<Arc<DbClient>>,
    user: StaffUser,
    Json(form): Json<PostForm>,
) -> Result<Created<Post>> {
    check_references(&db, &form).await?;

    let post = db.create_post(user.user_id(), &form).await?;

    Ok(Created(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/category/{slug}", rejection(ServerError))]
struct CategoryPostsPath {
    slug: CategorySlug,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct CategoryPosts {
    category: Category,
    posts: Page<Post>,
}

async fn get_category_posts(
    CategoryPostsPath { slug }: CategoryPostsPath,
    State(db): State<Arc<DbClient>>,
    Query(page): Query<PageQuery>,
) -> Result<Json<CategoryPosts>> {
    let category = db
        .fetch_category_by_slug(&slug)
        .await?
        .filter(|category| category.is_published)
        .ok_or(ServerError::CategoryBySlugNotFound(slug))?;

    let filter = PostFilter::visible_at(OffsetDateTime::now_utc()).in_category(category.id);
    let posts = db.fetch_post_page(&filter, &page).await?;

    Ok(Json(CategoryPosts { category, posts }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{post_id}", rejection(ServerError))]
struct PostPath {
    post_id: Id<PostMarker>,
}

async fn get_post(
    PostPath { post_id }: PostPath,
    State(db): State<Arc<DbClient>>,
    viewer: Option<AuthenticatedUser>,
) -> Result<Json<Post>> {
    let viewer = viewer.map(|viewer| viewer.user_id());
    let post = fetch_visible_post(&db, post_id, viewer).await?;

    Ok(Json(post))
}

async fn update_post(
    PostPath { post_id }: PostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(form): Json<PostForm>,
) -> Result<Json<Post>> {
    fetch_own_post(&db, post_id, user.user_id()).await?;
    check_references(&db, &form).await?;

    let post = db
        .update_post(post_id, &form)
        .await?
        .ok_or(ServerError::PostByIdNotFound(post_id))?;

    Ok(Json(post))
}

async fn delete_post(
    PostPath { post_id }: PostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    fetch_own_post(&db, post_id, user.user_id()).await?;

    if !db.delete_post(post_id).await? {
        return Err(ServerError::PostByIdNotFound(post_id));
    }

    info!(%post_id, user_id = %user.user_id(), "Deleted post");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::ensure_post_author;
    use crate::server::{ServerError, fixtures};
    use axum::http::StatusCode;
    use blogicum_common::model::Id;

    #[test]
    fn only_the_author_may_change_a_post() {
        let post = fixtures::post(10, fixtures::user(1, true));

        assert!(ensure_post_author(&post, Id::from(1)).is_ok());

        let err = ensure_post_author(&post, Id::from(2)).unwrap_err();
        assert!(matches!(err, ServerError::NotPostAuthor(id) if id == post.id));
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }
}
