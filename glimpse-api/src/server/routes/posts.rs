use crate::{
    imagekit::ImageKitClient,
    server::{Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json},
};
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State};
use axum_extra::routing::{RouterExt, TypedPath};
use glimpse_common::model::{
    Id,
    post::{Caption, Post, PostMarker, PostUpdate},
};
use glimpse_core::{media::MediaUpload, mutation};
use glimpse_db::client::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const FALLBACK_FILE_NAME: &str = "upload";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

pub fn routes(max_upload_bytes: usize) -> ServerRouter {
    let uploads = ServerRouter::new()
        .typed_post(upload)
        .layer(DefaultBodyLimit::max(max_upload_bytes));

    ServerRouter::new()
        .merge(uploads)
        .typed_delete(delete_post)
        .typed_patch(update_post)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/upload", rejection(ServerError))]
struct UploadPath();

/// The fields of an upload form. Unknown fields are ignored.
#[derive(Debug)]
struct UploadForm {
    file: MediaUpload,
    caption: Option<Caption>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut file = None;
        let mut caption = String::new();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_owned);
            match name.as_deref() {
                Some("file") => {
                    let file_name = field.file_name().unwrap_or(FALLBACK_FILE_NAME).to_owned();
                    let content_type = field
                        .content_type()
                        .unwrap_or(FALLBACK_CONTENT_TYPE)
                        .to_owned();
                    let bytes = field.bytes().await?;

                    file = Some(MediaUpload {
                        bytes: bytes.to_vec(),
                        file_name,
                        content_type,
                    });
                }
                Some("caption") => caption = field.text().await?,
                _ => {}
            }
        }

        Ok(Self {
            file: file.ok_or(ServerError::MissingFile)?,
            caption: Caption::new_optional(caption)?,
        })
    }
}

impl<S> FromRequest<S> for UploadForm
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = Multipart::from_request(req, state).await?;
        Self::read(multipart).await
    }
}

async fn upload(
    UploadPath(): UploadPath,
    State(db): State<Arc<DbClient>>,
    State(media_host): State<Arc<ImageKitClient>>,
    user: AuthenticatedUser,
    form: UploadForm,
) -> Result<Json<Post>> {
    let post =
        mutation::create_post(&*db, &*media_host, user.user_id(), form.file, form.caption).await?;

    Ok(Json(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct DeletePostPath {
    id: Id<PostMarker>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct DeleteResponse {
    success: bool,
    message: &'static str,
}

async fn delete_post(
    DeletePostPath { id }: DeletePostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<Json<DeleteResponse>> {
    mutation::delete_post(&*db, user.user_id(), id).await?;

    Ok(Json(DeleteResponse {
        success: true,
        message: "Post deleted successfully",
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/post/{id}", rejection(ServerError))]
struct UpdatePostPath {
    id: Id<PostMarker>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct UpdateResponse {
    success: bool,
    likes_count: u64,
}

async fn update_post(
    UpdatePostPath { id }: UpdatePostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(update): Json<PostUpdate>,
) -> Result<Json<UpdateResponse>> {
    let outcome = mutation::update_post(&*db, user.user_id(), id, update).await?;

    Ok(Json(UpdateResponse {
        success: true,
        likes_count: outcome.likes_count,
    }))
}
