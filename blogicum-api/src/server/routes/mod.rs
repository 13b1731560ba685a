use crate::server::{Result, ServerError, ServerRouter};
use blogicum_db::client::DbError;

mod accounts;
mod categories;
mod comments;
mod locations;
mod posts;
mod profiles;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(accounts::routes())
        .merge(profiles::routes())
        .merge(posts::routes())
        .merge(comments::routes())
        .merge(categories::routes())
        .merge(locations::routes())
}

/// Turns a unique constraint violation into the given client error.
fn on_conflict<T>(
    result: Result<T, DbError>,
    conflict: impl FnOnce() -> ServerError,
) -> Result<T> {
    result.map_err(|err| {
        if err.is_unique_violation() {
            conflict()
        } else {
            err.into()
        }
    })
}
