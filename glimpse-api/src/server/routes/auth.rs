use crate::server::{AuthSettings, Result, ServerError, ServerRouter, json::Json};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use glimpse_common::model::user::{CreateUser, User};
use glimpse_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_post(register)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/register", rejection(ServerError))]
struct RegisterPath();

/// The token is only ever shown here.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct Registration {
    user: User,
    token: String,
}

async fn register(
    RegisterPath(): RegisterPath,
    State(db): State<Arc<DbClient>>,
    State(settings): State<AuthSettings>,
    Json(user): Json<CreateUser>,
) -> Result<(StatusCode, Json<Registration>)> {
    let (user, token) = db.register_user(&user, settings.token_ttl).await?;

    Ok((
        StatusCode::CREATED,
        Json(Registration {
            user,
            token: token.to_string(),
        }),
    ))
}
