use crate::server::{
    Result, ServerError, ServerRouter,
    auth::StaffUser,
    json::{Created, Json},
    routes::on_conflict,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use blogicum_common::model::category::{Category, CategoryForm, CategorySlug};
use blogicum_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_categories)
        .typed_post(create_category)
        .typed_get(get_all_categories)
        .typed_put(update_category)
        .typed_delete(delete_category)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/categories", rejection(ServerError))]
struct CategoriesPath();

async fn get_categories(
    CategoriesPath(): CategoriesPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<Category>>> {
    let categories = db.fetch_categories(false).await?;

    Ok(Json(categories))
}

async fn create_category(
    CategoriesPath(): CategoriesPath,
    State(db): State<Arc<DbClient>>,
    user: StaffUser,
    Json(form): Json<CategoryForm>,
) -> Result<Created<Category>> {
    let category = on_conflict(db.create_category(&form).await, || {
        ServerError::SlugTaken(form.slug.clone())
    })?;

    info!(slug = %category.slug, user_id = %user.user_id(), "Created category");
    Ok(Created(category))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/admin/categories", rejection(ServerError))]
struct AllCategoriesPath();

/// Unpublished categories included.
async fn get_all_categories(
    AllCategoriesPath(): AllCategoriesPath,
    State(db): State<Arc<DbClient>>,
    _user: StaffUser,
) -> Result<Json<Vec<Category>>> {
    let categories = db.fetch_categories(true).await?;

    Ok(Json(categories))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/categories/{slug}", rejection(ServerError))]
struct CategoryPath {
    slug: CategorySlug,
}

async fn update_category(
    CategoryPath { slug }: CategoryPath,
    State(db): State<Arc<DbClient>>,
    _user: StaffUser,
    Json(form): Json<CategoryForm>,
) -> Result<Json<Category>> {
    let category = on_conflict(db.update_category(&slug, &form).await, || {
        ServerError::SlugTaken(form.slug.clone())
    })?
    .ok_or(ServerError::CategoryBySlugNotFound(slug))?;

    Ok(Json(category))
}

async fn delete_category(
    CategoryPath { slug }: CategoryPath,
    State(db): State<Arc<DbClient>>,
    user: StaffUser,
) -> Result<StatusCode> {
    if !db.delete_category(&slug).await? {
        return Err(ServerError::CategoryBySlugNotFound(slug));
    }

    info!(%slug, user_id = %user.user_id(), "Deleted category");
    Ok(StatusCode::NO_CONTENT)
}
