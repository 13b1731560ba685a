use crate::server::{
    Result, ServerError, ServerRouter,
    auth::AuthenticatedUser,
    json::{Created, Json, Query},
    routes::posts::fetch_visible_post,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use blogicum_common::{
    model::{
        Id,
        comment::{Comment, CommentForm, CommentMarker},
        post::PostMarker,
        user::UserMarker,
    },
    pagination::{Page, PageQuery},
};
use blogicum_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_comments)
        .typed_post(create_comment)
        .typed_put(update_comment)
        .typed_delete(delete_comment)
}

async fn fetch_own_comment(
    db: &DbClient,
    post_id: Id<PostMarker>,
    comment_id: Id<CommentMarker>,
    user_id: Id<UserMarker>,
) -> Result<Comment> {
    let comment = db
        .fetch_comment(post_id, comment_id)
        .await?
        .ok_or(ServerError::CommentByIdNotFound(comment_id))?;

    ensure_comment_author(&comment, user_id)?;
    Ok(comment)
}

fn ensure_comment_author(comment: &Comment, user_id: Id<UserMarker>) -> Result<()> {
    if !comment.is_authored_by(user_id) {
        return Err(ServerError::NotCommentAuthor(comment.id));
    }

    Ok(())
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{post_id}/comments", rejection(ServerError))]
struct CommentsPath {
    post_id: Id<PostMarker>,
}

async fn get_comments(
    CommentsPath { post_id }: CommentsPath,
    State(db): State<Arc<DbClient>>,
    viewer: Option<AuthenticatedUser>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<Comment>>> {
    let viewer = viewer.map(|viewer| viewer.user_id());
    fetch_visible_post(&db, post_id, viewer).await?;

    let comments = db.fetch_comment_page(post_id, &page).await?;

    Ok(Json(comments))
}

async fn create_comment(
    CommentsPath { post_id }: CommentsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(form): Json<CommentForm>,
) -> Result<Created<Comment>> {
    fetch_visible_post(&db, post_id, Some(user.user_id())).await?;

    let comment = db.create_comment(post_id, user.user_id(), &form).await?;

    debug!(comment_id = %comment.id, %post_id, "Created comment");
    Ok(Created(comment))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{post_id}/comments/{comment_id}", rejection(ServerError))]
struct CommentPath {
    post_id: Id<PostMarker>,
    comment_id: Id<CommentMarker>,
}

async fn update_comment(
    CommentPath {
        post_id,
        comment_id,
    }: CommentPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(form): Json<CommentForm>,
) -> Result<Json<Comment>> {
    fetch_own_comment(&db, post_id, comment_id, user.user_id()).await?;

    let comment = db
        .update_comment(comment_id, &form)
        .await?
        .ok_or(ServerError::CommentByIdNotFound(comment_id))?;

    Ok(Json(comment))
}

async fn delete_comment(
    CommentPath {
        post_id,
        comment_id,
    }: CommentPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    fetch_own_comment(&db, post_id, comment_id, user.user_id()).await?;

    if !db.delete_comment(comment_id).await? {
        return Err(ServerError::CommentByIdNotFound(comment_id));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::ensure_comment_author;
    use crate::server::{ServerError, fixtures};
    use axum::http::StatusCode;
    use blogicum_common::model::Id;

    #[test]
    fn only_the_author_may_change_a_comment() {
        let comment = fixtures::comment(20, Id::from(10), fixtures::user(3, false));

        assert!(ensure_comment_author(&comment, Id::from(3)).is_ok());

        let err = ensure_comment_author(&comment, Id::from(1)).unwrap_err();
        assert!(matches!(err, ServerError::NotCommentAuthor(id) if id == comment.id));
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }
}
