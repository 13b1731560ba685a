use crate::server::{
    Result, ServerError, ServerRouter,
    auth::StaffUser,
    json::{Created, Json},
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use blogicum_common::model::{
    Id,
    location::{Location, LocationForm, LocationMarker},
};
use blogicum_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_locations)
        .typed_post(create_location)
        .typed_put(update_location)
        .typed_delete(delete_location)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/locations", rejection(ServerError))]
struct LocationsPath();

async fn get_locations(
    LocationsPath(): LocationsPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<Location>>> {
    let locations = db.fetch_locations(false).await?;

    Ok(Json(locations))
}

async fn create_location(
    LocationsPath(): LocationsPath,
    State(db): State<Arc<DbClient>>,
    _user: StaffUser,
    Json(form): Json<LocationForm>,
) -> Result<Created<Location>> {
    let location = db.create_location(&form).await?;

    Ok(Created(location))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/locations/{location_id}", rejection(ServerError))]
struct LocationPath {
    location_id: Id<LocationMarker>,
}

async fn update_location(
    LocationPath { location_id }: LocationPath,
    State(db): State<Arc<DbClient>>,
    _user: StaffUser,
    Json(form): Json<LocationForm>,
) -> Result<Json<Location>> {
    let location = db
        .update_location(location_id, &form)
        .await?
        .ok_or(ServerError::LocationByIdNotFound(location_id))?;

    Ok(Json(location))
}

async fn delete_location(
    LocationPath { location_id }: LocationPath,
    State(db): State<Arc<DbClient>>,
    _user: StaffUser,
) -> Result<StatusCode> {
    if !db.delete_location(location_id).await? {
        return Err(ServerError::LocationByIdNotFound(location_id));
    }

    Ok(StatusCode::NO_CONTENT)
}
