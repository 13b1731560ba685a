use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use blogicum_common::{
    model::{
        FormError, Id,
        auth::{AuthTokenDecodeError, AuthTokenHashError, PasswordHashError},
        category::{CategoryMarker, CategorySlug},
        comment::CommentMarker,
        location::LocationMarker,
        post::PostMarker,
        user::{UserMarker, Username},
    },
    util::PositiveDuration,
};
use blogicum_db::client::{DbClient, DbError};
use json::Json;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::error;

mod auth;
#[cfg(test)]
mod fixtures;
mod json;
mod routes;

pub type ServerRouter = Router<ServerState>;

/// How issued tokens behave.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct AuthConfig {
    /// `None` issues tokens that never expire.
    pub token_lifetime: Option<PositiveDuration>,
}

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub db_client: Arc<DbClient>,
    pub auth_config: AuthConfig,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

/// Runs Argon2 and other CPU-heavy work off the async worker threads.
pub async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(ServerError::BlockingTask)
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query string rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided auth token could not be decoded: {0}")]
    InvalidAuthToken(#[from] AuthTokenDecodeError),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),
    #[error("A blocking task failed: {0}")]
    BlockingTask(JoinError),
    #[error("Provided token was invalid")]
    InvalidToken,
    #[error("Please enter a correct username and password.")]
    InvalidCredentials,
    #[error("Your old password was entered incorrectly.")]
    WrongOldPassword,
    #[error(transparent)]
    Form(#[from] FormError),
    #[error("User {0} is not a staff member.")]
    StaffOnly(Id<UserMarker>),
    #[error("Only the author may change post {0}.")]
    NotPostAuthor(Id<PostMarker>),
    #[error("Only the author may change comment {0}.")]
    NotCommentAuthor(Id<CommentMarker>),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("Comment with id {0} was not found.")]
    CommentByIdNotFound(Id<CommentMarker>),
    #[error("User {0} was not found.")]
    UserByUsernameNotFound(Username),
    #[error("Category {0} was not found.")]
    CategoryBySlugNotFound(CategorySlug),
    #[error("Location with id {0} was not found.")]
    LocationByIdNotFound(Id<LocationMarker>),
    #[error("Category with id {0} does not exist.")]
    UnknownCategory(Id<CategoryMarker>),
    #[error("Location with id {0} does not exist.")]
    UnknownLocation(Id<LocationMarker>),
    #[error("A user with the username {0} already exists.")]
    UsernameTaken(Username),
    #[error("A category with the slug {0} already exists.")]
    SlugTaken(CategorySlug),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::CommentByIdNotFound(_)
            | ServerError::UserByUsernameNotFound(_)
            | ServerError::CategoryBySlugNotFound(_)
            | ServerError::LocationByIdNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidAuthorizationHeader(rejection) if rejection.is_missing() => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::InvalidToken
            | ServerError::InvalidCredentials
            | ServerError::WrongOldPassword => StatusCode::UNAUTHORIZED,
            ServerError::StaffOnly(_)
            | ServerError::NotPostAuthor(_)
            | ServerError::NotCommentAuthor(_) => StatusCode::FORBIDDEN,
            ServerError::UsernameTaken(_) | ServerError::SlugTaken(_) => StatusCode::CONFLICT,
            ServerError::QueryRejection(_)
            | ServerError::JsonRejection(_)
            | ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAuthToken(_)
            | ServerError::Form(_)
            | ServerError::UnknownCategory(_)
            | ServerError::UnknownLocation(_) => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_)
            | ServerError::Database(_)
            | ServerError::AuthTokenHash(_)
            | ServerError::PasswordHash(_)
            | ServerError::BlockingTask(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
struct ErrorResponse {
    status: u16,
    /// Only client errors explain themselves.
    message: Option<String>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            status: status.as_u16(),
            message: status.is_client_error().then(|| self.to_string()),
        };
        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthConfig, ServerError, ServerState, routes, run_blocking};
    use axum::{
        Router,
        body::Body,
        http::{Method, Request, StatusCode, header},
    };
    use blogicum_common::{
        model::{FormError, Id},
        snowflake::{ProcessId, WorkerId},
    };
    use blogicum_db::client::DbClient;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;
    use tower::ServiceExt;

    /// A router whose pool never connects until a query runs.
    fn app() -> Router {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://blogicum@localhost/blogicum")
            .unwrap();
        let db_client = DbClient::new(pool, WorkerId::default(), ProcessId::default());

        routes().with_state(ServerState {
            db_client: Arc::new(db_client),
            auth_config: AuthConfig::default(),
        })
    }

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();

        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn json(method: Method, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            ServerError::StaffOnly(Id::from(1)).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServerError::Form(FormError::PasswordMismatch).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ServerError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ServerError::PostByIdNotFound(Id::from(3)).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn blocking_work_returns_its_value() {
        let value = run_blocking(|| 6 * 7).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let (status, body) = send(get("/nowhere")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], 404);
        assert!(body["message"].as_str().unwrap().contains("/nowhere"));
    }

    #[tokio::test]
    async fn malformed_post_id_is_404() {
        let (status, _) = send(get("/posts/first")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_token_is_401() {
        let (status, body) = send(get("/profile")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], 401);

        let request = json(Method::POST, "/posts/1/comments", r#"{"text": "Hi"}"#);
        let (status, _) = send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn garbage_token_is_400() {
        let request = Request::get("/profile")
            .header(header::AUTHORIZATION, "Bearer nonsense")
            .body(Body::empty())
            .unwrap();

        let (status, _) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn registration_form_is_checked_before_storage() {
        let mismatch = r#"{
            "username": "speaker1",
            "password": "correct horse",
            "password_confirmation": "battery staple",
            "give_personal_data": true
        }"#;
        let (status, body) = send(json(Method::POST, "/auth/registration", mismatch)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "The two password fields didn't match.");

        let no_consent = r#"{
            "username": "speaker1",
            "password": "correct horse",
            "password_confirmation": "correct horse"
        }"#;
        let (status, _) = send(json(Method::POST, "/auth/registration", no_consent)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let bad_username = r#"{
            "username": "no spaces allowed",
            "password": "correct horse",
            "password_confirmation": "correct horse",
            "give_personal_data": true
        }"#;
        let (status, _) = send(json(Method::POST, "/auth/registration", bad_username)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unparseable_body_is_400() {
        let (status, _) = send(json(Method::POST, "/auth/login", "{")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
