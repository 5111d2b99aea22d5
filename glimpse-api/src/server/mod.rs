use crate::imagekit::ImageKitClient;
use axum::{
    Router,
    extract::{
        FromRef, Request,
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use glimpse_common::{
    model::{
        Id,
        auth::{AuthTokenDecodeError, AuthTokenHashError},
        post::InvalidCaptionError,
        user::UserMarker,
    },
    util::PositiveDuration,
};
use glimpse_core::error::{MutationError, StoreError};
use glimpse_db::client::{DbClient, DbError};
use json::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

mod auth;
mod json;
mod routes;

pub type ServerRouter = Router<ServerState>;

/// Settings for `/auth` that do not belong to any client.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct AuthSettings {
    pub token_ttl: Option<PositiveDuration>,
}

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub db_client: Arc<DbClient>,
    pub media_host: Arc<ImageKitClient>,
    pub auth_settings: AuthSettings,
}

/// All routes, with `max_upload_bytes` applied as the body limit of `/upload`.
pub fn routes(max_upload_bytes: usize) -> ServerRouter {
    routes::routes(max_upload_bytes).fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("Incoming multipart form rejected: {0}")]
    MultipartRejection(#[from] MultipartRejection),
    #[error("Reading the multipart form failed: {0}")]
    Multipart(#[from] MultipartError),
    #[error("The upload did not contain a file")]
    MissingFile,
    #[error(transparent)]
    InvalidCaption(#[from] InvalidCaptionError),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided auth token could not be decoded: {0}")]
    InvalidAuthToken(#[from] AuthTokenDecodeError),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error("Provided token was invalid")]
    InvalidToken,
    #[error(transparent)]
    Database(#[from] DbError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Mutation(#[from] MutationError),
    #[error("User with id {0} was not found.")]
    UserByIdNotFound(Id<UserMarker>),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_) | ServerError::UserByIdNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ServerError::PathRejection(rejection) => rejection.status(),
            // Values that parse as JSON but fail validation are still malformed input.
            ServerError::JsonRejection(JsonRejection::JsonDataError(_)) => StatusCode::BAD_REQUEST,
            ServerError::JsonRejection(rejection) => rejection.status(),
            ServerError::MultipartRejection(rejection) => rejection.status(),
            ServerError::Multipart(err) => err.status(),
            ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAuthToken(_)
            | ServerError::InvalidToken => StatusCode::UNAUTHORIZED,
            ServerError::MissingFile | ServerError::InvalidCaption(_) => StatusCode::BAD_REQUEST,
            ServerError::Database(DbError::EmailTaken) => StatusCode::CONFLICT,
            ServerError::Database(err) if err.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Store(err) | ServerError::Mutation(MutationError::Store(err))
                if err.is_unavailable() =>
            {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ServerError::Mutation(MutationError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::Mutation(MutationError::Forbidden { .. }) => StatusCode::FORBIDDEN,
            ServerError::JsonResponse(_)
            | ServerError::AuthTokenHash(_)
            | ServerError::Database(_)
            | ServerError::Store(_)
            | ServerError::Mutation(MutationError::Store(_) | MutationError::MediaHost(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        // Server-side failures can carry store or upstream details.
        let message = status.is_client_error().then(|| self.to_string());
        let error_response = ErrorResponse {
            status: status.as_u16(),
            message,
        };
        (status, Json(error_response)).into_response()
    }
}
