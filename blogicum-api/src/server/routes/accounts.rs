use crate::server::{
    AuthConfig, Result, ServerError, ServerRouter, run_blocking,
    auth::AuthenticatedUser,
    json::{Created, Json},
    routes::on_conflict,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use blogicum_common::model::{
    Id,
    auth::{
        AuthToken, Authentication, IssuedToken, LoginForm, PasswordChangeForm, PasswordDigest,
    },
    user::{Registered, RegistrationForm, UserMarker},
};
use blogicum_db::client::DbClient;
use serde::Deserialize;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, info};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(register)
        .typed_post(login)
        .typed_post(logout)
        .typed_post(change_password)
}

async fn issue_token(
    db: &DbClient,
    auth_config: AuthConfig,
    user_id: Id<UserMarker>,
) -> Result<IssuedToken> {
    let token = AuthToken::generate_random(user_id);
    let token_str = token.as_token_str();

    let authentication = Authentication {
        user: user_id,
        token_hash: run_blocking(move || token.hash()).await??,
        created_at: OffsetDateTime::now_utc(),
        expires_after: auth_config.token_lifetime,
    };
    db.create_auth(&authentication).await?;

    Ok(IssuedToken {
        token: token_str,
        expires_at: authentication.expires_at(),
    })
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/registration", rejection(ServerError))]
struct RegistrationPath();

async fn register(
    RegistrationPath(): RegistrationPath,
    State(db): State<Arc<DbClient>>,
    State(auth_config): State<AuthConfig>,
    Json(form): Json<RegistrationForm>,
) -> Result<Created<Registered>> {
    form.validate()?;

    let password = form.password.clone();
    let digest = run_blocking(move || PasswordDigest::new(&password)).await??;
    let profile = on_conflict(
        db.create_user(&form.profile, &digest, form.give_personal_data)
            .await,
        || ServerError::UsernameTaken(form.profile.username.clone()),
    )?;

    info!(user_id = %profile.user.id, username = %profile.user.username, "Registered user");
    let token = issue_token(&db, auth_config, profile.user.id).await?;

    Ok(Created(Registered { profile, token }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/login", rejection(ServerError))]
struct LoginPath();

async fn login(
    LoginPath(): LoginPath,
    State(db): State<Arc<DbClient>>,
    State(auth_config): State<AuthConfig>,
    Json(form): Json<LoginForm>,
) -> Result<Json<IssuedToken>> {
    let LoginForm { username, password } = form;

    let Some(credentials) = db.fetch_credentials(&username).await? else {
        run_blocking(move || PasswordDigest::verify_absent(&password)).await??;
        debug!(%username, "Login for unknown user");
        return Err(ServerError::InvalidCredentials);
    };

    let digest = credentials.digest.clone();
    if !run_blocking(move || digest.verify(&password)).await?? {
        debug!(user_id = %credentials.user, "Wrong password");
        return Err(ServerError::InvalidCredentials);
    }

    let token = issue_token(&db, auth_config, credentials.user).await?;

    Ok(Json(token))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/logout", rejection(ServerError))]
struct LogoutPath();

async fn logout(
    LogoutPath(): LogoutPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    db.delete_auth(user.token_hash()).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/password_change", rejection(ServerError))]
struct PasswordChangePath();

async fn change_password(
    PasswordChangePath(): PasswordChangePath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(form): Json<PasswordChangeForm>,
) -> Result<StatusCode> {
    let credentials = db
        .fetch_user_credentials(user.user_id())
        .await?
        .ok_or(ServerError::InvalidToken)?;

    let digest = credentials.digest;
    let old_password = form.old_password.clone();
    if !run_blocking(move || digest.verify(&old_password)).await?? {
        return Err(ServerError::WrongOldPassword);
    }
    form.validate(&credentials.username)?;

    let new_password = form.new_password.clone();
    let digest = run_blocking(move || PasswordDigest::new(&new_password)).await??;
    db.update_password(user.user_id(), &digest).await?;
    let revoked = db
        .delete_other_auths(user.user_id(), user.token_hash())
        .await?;

    info!(user_id = %user.user_id(), revoked, "Changed password");
    Ok(StatusCode::NO_CONTENT)
}
